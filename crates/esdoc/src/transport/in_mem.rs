//! 🧪 InMemoryTransport: a cluster-shaped puppet.
//!
//! Queue up replies, hand it to a client, then read back the journal of every request the
//! client made. Replies are served strictly first-in, first-out. When the script runs dry,
//! the next request gets a Transport error, which is exactly what a dead node looks like.
//!
//! Clones share the same script and journal, so a test can keep one handle and give the
//! other to the client. 🦆

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::error::{EsError, Result};
use crate::transport::{Transport, TransportRequest, TransportResponse};

#[derive(Debug, Clone)]
enum Reply {
    Respond(TransportResponse),
    Fail(String),
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Reply>,
    journal: Vec<TransportRequest>,
}

/// 🎭 Scripted [`Transport`] with a request journal.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    script: Arc<Mutex<Script>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    // 🔒 a poisoned lock only means some test panicked mid-push. the data is still fine to read.
    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 📦 Queue a raw reply.
    pub fn respond(&self, status: u16, body: impl Into<String>) -> &Self {
        self.script()
            .replies
            .push_back(Reply::Respond(TransportResponse::new(status, body)));
        self
    }

    /// 📦 Queue a JSON reply.
    pub fn respond_json(&self, status: u16, body: &Value) -> &Self {
        self.respond(status, body.to_string())
    }

    /// 💀 Queue a transport-level failure. The request is still journaled.
    pub fn fail(&self, message: impl Into<String>) -> &Self {
        self.script().replies.push_back(Reply::Fail(message.into()));
        self
    }

    /// 📜 Every request executed so far, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.script().journal.clone()
    }

    pub fn request_count(&self) -> usize {
        self.script().journal.len()
    }

    /// How many scripted replies are still waiting for a request.
    pub fn pending(&self) -> usize {
        self.script().replies.len()
    }

    /// 🗑️ Forget the journal. Queued replies stay queued.
    pub fn clear_journal(&self) {
        self.script().journal.clear();
    }
}

impl Transport for InMemoryTransport {
    fn execute(&self, request: &TransportRequest) -> Result<TransportResponse> {
        let mut script = self.script();
        script.journal.push(request.clone());
        match script.replies.pop_front() {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(EsError::transport(message)),
            None => Err(EsError::transport(format!(
                "no scripted reply left for {} {}",
                request.method, request.url
            ))),
        }
    }
}
