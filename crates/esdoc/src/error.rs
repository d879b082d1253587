//! 💀 Errors: the three flavors of "it didn't work".
//!
//! 🎬 *[a request leaves the client. a response comes back. something is wrong with it.]*
//!
//! Every failure this crate can produce is an [`EsError`], tagged with an [`ErrorKind`]:
//!
//! - [`ErrorKind::Transport`]: the HTTP call itself died (refused, timed out, DNS said no).
//!   Document operations never hand these to the caller. They turn them into `false`,
//!   `""`, `0` or `None` and move on with their lives.
//! - [`ErrorKind::Protocol`]: the node answered, but the answer is not JSON, is empty,
//!   or is missing a field the operation needs.
//! - [`ErrorKind::Application`]: the node answered with an explicit `error`/`reason`.
//!
//! Each error carries the raw response body, the request (method, URL, payload) when the
//! client runs in debug mode, and a call-stack snapshot taken when it was built. 🦆

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

use thiserror::Error;

use crate::transport::HttpMethod;

/// 🏷️ Which of the three failure families an [`EsError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 📡 The HTTP call never produced a response.
    Transport,
    /// 🧩 The response broke the wire contract.
    Protocol,
    /// 🚨 The server explicitly reported an error.
    Application,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Application => "application",
        };
        f.write_str(label)
    }
}

/// 📸 What we asked for, frozen in time. Only attached in debug mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub method: HttpMethod,
    pub url: String,
    pub payload: Option<String>,
}

impl RequestSnapshot {
    pub fn new(method: HttpMethod, url: impl Into<String>, payload: Option<&str>) -> Self {
        Self {
            method,
            url: url.into(),
            payload: payload.map(str::to_owned),
        }
    }
}

impl fmt::Display for RequestSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.method, self.url)?;
        if let Some(payload) = &self.payload {
            write!(f, " [data: {}]", payload)?;
        }
        Ok(())
    }
}

/// 💀 The one error type to rule them all.
///
/// Built with [`EsError::transport`], [`EsError::protocol`] or [`EsError::application`],
/// then decorated with [`EsError::with_response`] / [`EsError::with_request`].
/// Callers branch on [`EsError::kind`].
#[derive(Debug, Error)]
#[error("💀 {kind} error: {message}")]
pub struct EsError {
    kind: ErrorKind,
    message: String,
    response: Option<String>,
    request: Option<RequestSnapshot>,
    stack: Option<String>,
}

impl EsError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        // 📸 forced, so the snapshot is there whatever RUST_BACKTRACE says
        let backtrace = Backtrace::force_capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };
        Self {
            kind,
            message: message.into(),
            response: None,
            request: None,
            stack,
        }
    }

    /// 📡 The wire gave up on us.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// 🧩 The node said something, just not something we can use.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// 🚨 The node said "error" out loud.
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Application, message)
    }

    /// 📦 Attach the raw response body.
    pub fn with_response(mut self, body: impl Into<String>) -> Self {
        self.response = Some(body.into());
        self
    }

    /// 📸 Attach the request that caused all this.
    pub fn with_request(mut self, request: RequestSnapshot) -> Self {
        self.request = Some(request);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The raw response body, if there was one.
    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    /// The request snapshot. `None` unless the client was built with `debug = true`.
    pub fn request(&self) -> Option<&RequestSnapshot> {
        self.request.as_ref()
    }

    /// The call-stack snapshot taken at construction.
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn is_transport(&self) -> bool {
        self.kind == ErrorKind::Transport
    }
}

/// 🎯 Result alias, because typing the whole thing gets old around the fourth time.
pub type Result<T> = std::result::Result<T, EsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_error_wears_its_kind_on_its_sleeve() {
        let err = EsError::protocol("field \"found\" must exist")
            .with_response(r#"{"_index":"twitter"}"#)
            .with_request(RequestSnapshot::new(
                HttpMethod::Get,
                "http://localhost:9200/twitter/tweet/1",
                None,
            ));

        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.message(), "field \"found\" must exist");
        assert_eq!(err.response(), Some(r#"{"_index":"twitter"}"#));
        assert_eq!(
            err.request().map(|r| r.url.as_str()),
            Some("http://localhost:9200/twitter/tweet/1")
        );
        assert!(err.to_string().contains("protocol error"));
        assert!(!err.is_transport());
    }

    #[test]
    fn the_one_where_every_error_brings_its_own_stack() {
        let err = EsError::protocol("response is not JSON");
        assert!(err.stack_trace().is_some_and(|stack| !stack.is_empty()));
    }

    #[test]
    fn the_one_where_a_bare_error_has_no_baggage() {
        let err = EsError::application("index_not_found_exception");
        assert_eq!(err.kind(), ErrorKind::Application);
        assert!(err.response().is_none());
        assert!(err.request().is_none());
    }

    #[test]
    fn the_one_where_the_snapshot_prints_its_payload() {
        let snapshot =
            RequestSnapshot::new(HttpMethod::Post, "http://es:9200/_bulk", Some("{}\n"));
        assert_eq!(snapshot.to_string(), "(POST) http://es:9200/_bulk [data: {}\n]");
    }
}
