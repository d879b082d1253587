//! 🔍 Diagnostics: where failures go to be witnessed.
//!
//! 🎬 *[a request fails. nobody hears it. did it even fail?]*
//!
//! Every failure path in the client hands a [`FailureReport`] to a [`FailureSink`]:
//! the operation name, method, URL, payload, raw response, status and a short reason.
//! The default sink, [`NoopSink`], hears nothing and says nothing. [`TracingSink`] turns
//! each report into a structured `warn!` event and is picked automatically when the
//! client runs with `debug = true`. Bring your own sink for anything fancier. 🦆

use tracing::warn;

use crate::transport::HttpMethod;

/// 📋 One failure, fully described. Borrowed, so building it costs nothing.
#[derive(Debug, Clone, Copy)]
pub struct FailureReport<'a> {
    pub operation: &'a str,
    pub method: HttpMethod,
    pub url: &'a str,
    pub payload: Option<&'a str>,
    /// Raw response body. `None` when the transport never produced one.
    pub response: Option<&'a str>,
    pub status: Option<u16>,
    pub reason: &'a str,
}

/// 🚰 Receives failure reports. Must never panic, must never block for long.
pub trait FailureSink: Send + Sync {
    fn record(&self, report: &FailureReport<'_>);
}

/// 🕳️ The default: a sink that is also a void.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl FailureSink for NoopSink {
    fn record(&self, _report: &FailureReport<'_>) {}
}

/// 📣 Routes reports into `tracing` at WARN level, one field per detail.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn record(&self, report: &FailureReport<'_>) {
        warn!(
            operation = report.operation,
            method = %report.method,
            url = report.url,
            payload = report.payload.unwrap_or(""),
            response = report.response.unwrap_or(""),
            status = report.status,
            "💀 {} failed: {}",
            report.operation,
            report.reason
        );
    }
}
