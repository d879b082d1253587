//! 📡 HttpTransport: a blocking `reqwest` client in a trench coat.
//!
//! Built once from a [`ClientConfig`]: connect timeout, read timeout, optional CA bundle,
//! extra headers, optional `user:password` credential. Then it just executes requests,
//! one at a time, and reports back.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, trace};

use crate::app_config::ClientConfig;
use crate::error::{EsError, Result};
use crate::transport::{HttpMethod, Transport, TransportRequest, TransportResponse};

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// 🔒 Basic-auth pieces, split out of the `user:password` string once.
#[derive(Clone)]
struct Credentials {
    username: String,
    password: Option<String>,
}

impl Credentials {
    fn parse(user_passwd: &str) -> Self {
        match user_passwd.split_once(':') {
            Some((username, password)) => Self {
                username: username.to_owned(),
                password: Some(password.to_owned()),
            },
            None => Self {
                username: user_passwd.to_owned(),
                password: None,
            },
        }
    }
}

/// 📡 The production [`Transport`]: `reqwest::blocking::Client` plus optional basic auth.
pub struct HttpTransport {
    client: Client,
    credentials: Option<Credentials>,
}

// 🎭 manual Debug so the password never lands in a log line. the username can stay, it's shy but not secret.
impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("client", &self.client)
            .field(
                "username",
                &self.credentials.as_ref().map(|c| c.username.as_str()),
            )
            .finish()
    }
}

impl HttpTransport {
    /// 🚀 Build the blocking client from config.
    ///
    /// - `connect_timeout_secs` bounds the handshake.
    /// - `timeout_secs` bounds the whole exchange; `0` means no timeout at all.
    /// - `ca_path` adds a PEM root certificate on top of the platform roots.
    /// - `headers` ride along on every request.
    ///
    /// 💀 Fails with a Transport error when the CA file is unreadable, a header is malformed,
    /// or reqwest refuses to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));

        builder = if config.timeout_secs > 0 {
            builder.timeout(Duration::from_secs(config.timeout_secs))
        } else {
            builder.timeout(None)
        };

        if let Some(ca_path) = &config.ca_path {
            let pem = std::fs::read(ca_path).map_err(|e| {
                EsError::transport(format!(
                    "could not read CA bundle '{}': {}",
                    ca_path.display(),
                    e
                ))
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                EsError::transport(format!(
                    "CA bundle '{}' is not a PEM certificate: {}",
                    ca_path.display(),
                    e
                ))
            })?;
            builder = builder.add_root_certificate(certificate);
            debug!("🔒 Trusting extra CA bundle at {}", ca_path.display());
        }

        if !config.headers.is_empty() {
            let mut headers = HeaderMap::with_capacity(config.headers.len());
            for (name, value) in &config.headers {
                let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    EsError::transport(format!("invalid header name '{}': {}", name, e))
                })?;
                let header_value = HeaderValue::from_str(value).map_err(|e| {
                    EsError::transport(format!("invalid value for header '{}': {}", name, e))
                })?;
                headers.insert(header_name, header_value);
            }
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|e| {
            EsError::transport(format!(
                "💀 The HTTP client refused to be born. reqwest said: {}",
                e
            ))
        })?;

        Ok(Self {
            client,
            credentials: config.user_passwd.as_deref().map(Credentials::parse),
        })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &TransportRequest) -> Result<TransportResponse> {
        trace!("📡 {} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .header(CONTENT_TYPE, request.content_type.as_str());

        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.username, credentials.password.as_ref());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(|e| {
            EsError::transport(format!(
                "{} {} never got an answer: {}",
                request.method, request.url, e
            ))
        })?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| {
            EsError::transport(format!(
                "{} {} answered {} but the body got lost on the way: {}",
                request.method, request.url, status, e
            ))
        })?;

        trace!("✅ {} {} -> {} ({} bytes)", request.method, request.url, status, body.len());
        Ok(TransportResponse { status, body })
    }
}
