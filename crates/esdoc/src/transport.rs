//! 🔌 Transport: the one door between this crate and the network.
//!
//! 🚰 A [`Transport`] takes a [`TransportRequest`], does exactly one HTTP exchange, and hands
//! back a [`TransportResponse`] envelope (status + body). No retries. No pooling promises.
//! No memory of the previous call. Goldfish-grade statelessness. 🐟
//!
//! Two implementations ship with the crate:
//! - [`HttpTransport`]: the real thing, a blocking `reqwest` client.
//! - [`InMemoryTransport`]: a scripted stand-in that records every request. For tests,
//!   and for anyone who wants to exercise the client without a cluster humming in the corner.
//!
//! A failed exchange comes back as an [`EsError`](crate::error::EsError) of kind
//! [`Transport`](crate::error::ErrorKind::Transport). The client decides what that means. 🦆

use std::fmt;

use crate::error::Result;

pub mod http;
pub mod in_mem;

pub use http::HttpTransport;
pub use in_mem::InMemoryTransport;

/// 📡 The five verbs this client ever speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Put,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 📦 What the body is wearing.
///
/// `/_bulk` wants `application/x-ndjson`. Everyone else gets plain JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Json,
    Ndjson,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Ndjson => "application/x-ndjson",
        }
    }
}

/// 📨 One outbound request: verb, absolute URL, optional body, content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<String>,
    pub content_type: ContentType,
}

impl TransportRequest {
    /// 🔧 A JSON request. The common case. The 95% case.
    pub fn json(method: HttpMethod, url: impl Into<String>, body: Option<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body,
            content_type: ContentType::Json,
        }
    }

    /// 📡 An NDJSON POST. Bulk only.
    pub fn ndjson(url: impl Into<String>, body: String) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(body),
            content_type: ContentType::Ndjson,
        }
    }
}

/// ✉️ The response envelope: status code and raw body, nothing shared, nothing mutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// ✅ Elasticsearch-admin flavored success: exactly 200, not "any 2xx".
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// 🔌 Executes a single HTTP exchange, synchronously.
///
/// # Contract 📜
/// - Blocks until the exchange finishes or the configured timeout fires.
/// - `Ok` means *a response arrived*, whatever its status. Status interpretation is the
///   caller's job.
/// - `Err` is always [`ErrorKind::Transport`](crate::error::ErrorKind::Transport).
pub trait Transport: Send + Sync {
    fn execute(&self, request: &TransportRequest) -> Result<TransportResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &TransportRequest) -> Result<TransportResponse> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &TransportRequest) -> Result<TransportResponse> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute(&self, request: &TransportRequest) -> Result<TransportResponse> {
        (**self).execute(request)
    }
}
