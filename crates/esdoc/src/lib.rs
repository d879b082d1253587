//! # esdoc 📡
//!
//! A synchronous client for the Elasticsearch 2.x document API: single-document CRUD,
//! search, counts, index admin, scroll scans and `/_bulk` batches.
//!
//! ```no_run
//! use esdoc::{BulkBuilder, ClientConfig, ElasticClient};
//! use serde_json::json;
//!
//! # fn main() -> esdoc::Result<()> {
//! let client = ElasticClient::connect(ClientConfig::new("http://localhost:9200"))?;
//! client.index("twitter", "tweet", "1", &json!({"user": "kimchy"}))?;
//!
//! let mut batch = BulkBuilder::new();
//! batch.index("twitter", "tweet", "2", &json!({"user": "someone"}));
//! client.bulk_batch(&batch)?;
//!
//! let everything = client.full_scan("twitter", "tweet", r#"{"query":{"match_all":{}}}"#, 500)?;
//! # let _ = everything;
//! # Ok(())
//! # }
//! ```
//!
//! Transport failures never escape a document operation: they come back as `false`, `""`,
//! `0` or `None`. Everything else that goes wrong is an [`EsError`] tagged with an
//! [`ErrorKind`]. 🦆

pub mod app_config;
pub mod bulk;
pub mod client;
pub mod common;
pub mod diagnostics;
pub mod error;
pub mod scroll;
pub mod transport;

pub use app_config::{ClientConfig, load_config};
pub use bulk::{BulkBuilder, BulkOperation};
pub use client::ElasticClient;
pub use common::{BulkResponse, DocumentRef, FoundDocument, SearchOutcome};
pub use diagnostics::{FailureReport, FailureSink, NoopSink, TracingSink};
pub use error::{ErrorKind, EsError, RequestSnapshot, Result};
pub use scroll::{DEFAULT_SCROLL_SIZE, ScrollCursor, ScrollState};
pub use transport::{HttpMethod, HttpTransport, InMemoryTransport, Transport};
