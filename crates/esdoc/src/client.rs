//! # 📡 THE DOCUMENT CLIENT
//!
//! 🎬 COLD OPEN: INT. APPLICATION SERVER, MID-AFTERNOON
//!
//! Somebody needs a document. Not a folder, not a stream, one document, by id.
//! They could hand-build `PUT /twitter/tweet/1` with a JSON body and parse whatever comes back.
//! They could also floss every day. Nobody does either. So here we are.
//!
//! 🚀 [`ElasticClient`] turns the Elasticsearch 2.x document REST API into plain method calls.
//! Every operation follows the same routine:
//!
//! 1. 🔒 mutating and the client is read-only? return the negative result, touch nothing.
//! 2. 📡 build `{node}/{index}/{type}/{id-or-op}`, hand it to the [`Transport`].
//! 3. 💤 transport failed? report it to the failure sink and return the negative result
//!    (`false`, `""`, `0`, `None`, an empty [`SearchOutcome`]).
//! 4. 🧩 parse the body as JSON. Empty or not JSON is a Protocol error.
//! 5. ✅ apply the operation's success predicate. A server-reported `error`/`reason` is an
//!    Application error, anything else missing is a Protocol error.
//!
//! The client holds no mutable state, so it is `Send + Sync` whenever its transport is.
//!
//! 🦆 (the duck is read-only too. it has never mutated anything in its life.)

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, trace};

use crate::app_config::ClientConfig;
use crate::bulk::BulkBuilder;
use crate::common::{BulkResponse, FoundDocument, SearchOutcome};
use crate::diagnostics::{FailureReport, FailureSink, NoopSink, TracingSink};
use crate::error::{ErrorKind, EsError, RequestSnapshot, Result};
use crate::transport::{
    HttpMethod, HttpTransport, Transport, TransportRequest, TransportResponse,
};

/// 🤝 One finished request/response pair. Kept together so failures can describe both.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub(crate) request: TransportRequest,
    pub(crate) response: TransportResponse,
}

/// 🔍 Pull a server-reported failure out of a response body.
///
/// Looks at a top-level string `reason` first, then at `error`, which is either a string
/// (1.x style) or an object with a string `reason` (2.x style). Any other non-empty `error`
/// is rendered as JSON text. `null` and `false` mean "no error".
pub(crate) fn server_error(value: &Value) -> Option<String> {
    if let Some(reason) = value.get("reason").and_then(Value::as_str) {
        return Some(reason.to_owned());
    }
    match value.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(message) => Some(message.clone()),
        other => Some(
            other
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// 📡 A synchronous client bound to one node.
///
/// Build it with [`ElasticClient::connect`] for real HTTP, or [`ElasticClient::with_transport`]
/// for anything implementing [`Transport`]. Both ping `GET /` first and refuse to hand back a
/// client for a node that is not there.
pub struct ElasticClient<T: Transport = HttpTransport> {
    node: String,
    config: ClientConfig,
    transport: T,
    sink: Arc<dyn FailureSink>,
}

impl<T: Transport + fmt::Debug> fmt::Debug for ElasticClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 🎭 the sink is a trait object with no Debug. it stays out of the picture.
        f.debug_struct("ElasticClient")
            .field("node", &self.node)
            .field("read_only", &self.config.read_only)
            .field("debug", &self.config.debug)
            .field("transport", &self.transport)
            .finish()
    }
}

impl ElasticClient<HttpTransport> {
    /// 🚀 Build an [`HttpTransport`] from `config` and connect through it.
    ///
    /// # Errors
    /// 💀 Transport-kind error when the HTTP client can't be built or the node does not answer
    /// the liveness check.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(&config)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> ElasticClient<T> {
    /// 🔌 Wrap an existing transport. Pings the node before returning.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let sink: Arc<dyn FailureSink> = if config.debug {
            Arc::new(TracingSink)
        } else {
            Arc::new(NoopSink)
        };
        let client = Self {
            node: config.normalized_node().to_owned(),
            config,
            transport,
            sink,
        };

        if !client.is_active() {
            return Err(EsError::transport(format!(
                "Cannot connect to node {}: node is not active",
                client.node
            )));
        }
        debug!("🚀 Connected to {} (read_only={})", client.node, client.config.read_only);
        Ok(client)
    }

    /// 🚰 Swap the failure sink. The default is [`NoopSink`], or [`TracingSink`] in debug mode.
    pub fn with_failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    /// 📡 The normalized node URL, no trailing slash.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// 🔧 The config this client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 🔌 The transport every request goes through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ===================== plumbing =====================

    pub(crate) fn index_url(&self, index: &str) -> String {
        format!("{}/{}", self.node, index)
    }

    pub(crate) fn type_url(&self, index: &str, doc_type: &str) -> String {
        format!("{}/{}/{}", self.node, index, doc_type)
    }

    pub(crate) fn doc_url(&self, index: &str, doc_type: &str, id: &str) -> String {
        format!("{}/{}/{}/{}", self.node, index, doc_type, id)
    }

    pub(crate) fn root_url(&self, path: &str) -> String {
        format!("{}/{}", self.node, path)
    }

    /// 🔒 True when `operation` must be skipped because the client is read-only.
    pub(crate) fn refuse_write(&self, operation: &str) -> bool {
        if self.config.read_only {
            debug!("🔒 Read-only client, {} skipped without a request", operation);
        }
        self.config.read_only
    }

    /// 📡 Run one exchange. A transport failure is reported to the sink and becomes `None`.
    pub(crate) fn call(&self, operation: &str, request: TransportRequest) -> Option<Exchange> {
        trace!("📡 {}: {} {}", operation, request.method, request.url);
        match self.transport.execute(&request) {
            Ok(response) => Some(Exchange { request, response }),
            Err(err) => {
                debug!("💤 {} never got a response: {}", operation, err.message());
                self.sink.record(&FailureReport {
                    operation,
                    method: request.method,
                    url: &request.url,
                    payload: request.body.as_deref(),
                    response: None,
                    status: None,
                    reason: err.message(),
                });
                None
            }
        }
    }

    /// 🚨 Tell the sink about a failure without turning it into an error.
    pub(crate) fn notify(&self, operation: &str, exchange: &Exchange, reason: &str) {
        self.sink.record(&FailureReport {
            operation,
            method: exchange.request.method,
            url: &exchange.request.url,
            payload: exchange.request.body.as_deref(),
            response: Some(&exchange.response.body),
            status: Some(exchange.response.status),
            reason,
        });
    }

    /// 💀 Build an error for `exchange`, report it, attach the response (and the request
    /// in debug mode).
    pub(crate) fn fail(
        &self,
        operation: &str,
        kind: ErrorKind,
        message: impl Into<String>,
        exchange: &Exchange,
    ) -> EsError {
        let message = message.into();
        self.notify(operation, exchange, &message);

        let err = EsError::new(kind, message).with_response(exchange.response.body.clone());
        if self.config.debug {
            err.with_request(RequestSnapshot::new(
                exchange.request.method,
                exchange.request.url.clone(),
                exchange.request.body.as_deref(),
            ))
        } else {
            err
        }
    }

    /// 🧩 An expected field is missing: Application if the server explained why, Protocol if not.
    pub(crate) fn missing(
        &self,
        operation: &str,
        value: &Value,
        field: &str,
        exchange: &Exchange,
    ) -> EsError {
        match server_error(value) {
            Some(reason) => self.fail(operation, ErrorKind::Application, reason, exchange),
            None => self.fail(
                operation,
                ErrorKind::Protocol,
                format!("response has no field {}", field),
                exchange,
            ),
        }
    }

    /// 🧩 The body must be JSON and must not be empty.
    pub(crate) fn parse(&self, operation: &str, exchange: &Exchange) -> Result<Value> {
        let body = exchange.response.body.trim();
        if body.is_empty() {
            return Err(self.fail(operation, ErrorKind::Protocol, "empty response body", exchange));
        }
        match serde_json::from_str::<Value>(body) {
            Ok(value) if is_blank(&value) => Err(self.fail(
                operation,
                ErrorKind::Protocol,
                "response body is empty JSON",
                exchange,
            )),
            Ok(value) => Ok(value),
            Err(e) => Err(self.fail(
                operation,
                ErrorKind::Protocol,
                format!("response is not JSON: {}", e),
                exchange,
            )),
        }
    }

    // ===================== liveness =====================

    /// 💓 `GET /`: alive if the transport answered and the body is non-empty JSON or the
    /// status is 200.
    pub fn is_active(&self) -> bool {
        let Some(exchange) = self.call(
            "is_active",
            TransportRequest::json(HttpMethod::Get, format!("{}/", self.node), None),
        ) else {
            return false;
        };

        exchange.response.is_ok()
            || serde_json::from_str::<Value>(&exchange.response.body)
                .is_ok_and(|value| !is_blank(&value))
    }

    // ===================== single documents =====================

    /// 📝 Index `doc` under an explicit id. `true` when the response carries `_version` or
    /// `created`.
    pub fn index(&self, index: &str, doc_type: &str, id: &str, doc: &Value) -> Result<bool> {
        const OP: &str = "index";
        if self.refuse_write(OP) {
            return Ok(false);
        }
        let request = TransportRequest::json(
            HttpMethod::Put,
            self.doc_url(index, doc_type, id),
            Some(doc.to_string()),
        );
        let Some(exchange) = self.call(OP, request) else {
            return Ok(false);
        };
        let value = self.parse(OP, &exchange)?;

        if let Some(reason) = server_error(&value) {
            return Err(self.fail(OP, ErrorKind::Application, reason, &exchange));
        }
        if value.get("_version").is_some() || value.get("created").is_some() {
            return Ok(true);
        }
        Err(self.missing(OP, &value, "\"_version\" or \"created\"", &exchange))
    }

    /// 🎲 Index `doc` and let the server pick the id. Returns the id, or `""` when read-only
    /// or the transport failed.
    pub fn index_auto_id(&self, index: &str, doc_type: &str, doc: &Value) -> Result<String> {
        const OP: &str = "index_auto_id";
        if self.refuse_write(OP) {
            return Ok(String::new());
        }
        let request = TransportRequest::json(
            HttpMethod::Post,
            self.type_url(index, doc_type),
            Some(doc.to_string()),
        );
        let Some(exchange) = self.call(OP, request) else {
            return Ok(String::new());
        };
        let value = self.parse(OP, &exchange)?;

        if let Some(reason) = server_error(&value) {
            return Err(self.fail(OP, ErrorKind::Application, reason, &exchange));
        }
        match value.get("_id").and_then(Value::as_str) {
            Some(id) => Ok(id.to_owned()),
            None => Err(self.missing(OP, &value, "\"_id\"", &exchange)),
        }
    }

    /// 📄 Fetch one document.
    ///
    /// `Ok(None)` only when the transport failed. A document that does not exist is an
    /// Application error; a response without `found` is a Protocol error.
    pub fn get_document(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
    ) -> Result<Option<FoundDocument>> {
        const OP: &str = "get_document";
        let request =
            TransportRequest::json(HttpMethod::Get, self.doc_url(index, doc_type, id), None);
        let Some(exchange) = self.call(OP, request) else {
            return Ok(None);
        };
        let value = self.parse(OP, &exchange)?;

        let found = value.get("found").and_then(Value::as_bool);
        match found {
            Some(true) => serde_json::from_value(value).map(Some).map_err(|e| {
                self.fail(
                    OP,
                    ErrorKind::Protocol,
                    format!("found document does not have the expected shape: {}", e),
                    &exchange,
                )
            }),
            Some(false) => Err(self.fail(
                OP,
                ErrorKind::Application,
                format!("document {}/{}/{} not found", index, doc_type, id),
                &exchange,
            )),
            None => Err(self.missing(OP, &value, "\"found\"", &exchange)),
        }
    }

    /// 🔍 Search for documents whose `field` matches `value`.
    pub fn get_document_by_field(
        &self,
        index: &str,
        doc_type: &str,
        field: &str,
        value: &Value,
    ) -> Result<SearchOutcome> {
        let mut matcher = Map::new();
        matcher.insert(field.to_owned(), value.clone());
        let query = json!({ "query": { "match": matcher } });
        self.search(index, doc_type, &query.to_string())
    }

    /// ❓ Does the document exist? Reads the `found` flag.
    pub fn exist(&self, index: &str, doc_type: &str, id: &str) -> Result<bool> {
        const OP: &str = "exist";
        let request =
            TransportRequest::json(HttpMethod::Get, self.doc_url(index, doc_type, id), None);
        let Some(exchange) = self.call(OP, request) else {
            return Ok(false);
        };
        let value = self.parse(OP, &exchange)?;

        match value.get("found").and_then(Value::as_bool) {
            Some(found) => Ok(found),
            None => Err(self.missing(OP, &value, "\"found\"", &exchange)),
        }
    }

    /// 🗑️ Delete one document.
    ///
    /// `true` on `found: true` or `result: "deleted"`. A document that was already gone
    /// (`found: false`, `result: "not_found"`) is `false`, not an error.
    pub fn delete_document(&self, index: &str, doc_type: &str, id: &str) -> Result<bool> {
        const OP: &str = "delete_document";
        if self.refuse_write(OP) {
            return Ok(false);
        }
        let request =
            TransportRequest::json(HttpMethod::Delete, self.doc_url(index, doc_type, id), None);
        let Some(exchange) = self.call(OP, request) else {
            return Ok(false);
        };
        let value = self.parse(OP, &exchange)?;

        let found = value.get("found").and_then(Value::as_bool);
        let result = value.get("result").and_then(Value::as_str);
        if found == Some(true) || result == Some("deleted") {
            return Ok(true);
        }
        if found == Some(false) || result == Some("not_found") {
            self.notify(OP, &exchange, "document was not there to delete");
            return Ok(false);
        }
        Err(self.missing(OP, &value, "\"found\" or \"result\"", &exchange))
    }

    /// 🧹 Delete every document of a type through the delete-by-query endpoint.
    ///
    /// ⚠️ 2.x servers only support this with the delete-by-query plugin installed.
    pub fn delete_all(&self, index: &str, doc_type: &str) -> Result<bool> {
        const OP: &str = "delete_all";
        if self.refuse_write(OP) {
            return Ok(false);
        }
        let request = TransportRequest::json(
            HttpMethod::Delete,
            format!("{}/_query", self.type_url(index, doc_type)),
            Some(json!({"query": {"match_all": {}}}).to_string()),
        );
        let Some(exchange) = self.call(OP, request) else {
            return Ok(false);
        };
        let value = self.parse(OP, &exchange)?;

        if value.get("found").and_then(Value::as_bool) == Some(true) {
            return Ok(true);
        }
        Err(self.missing(OP, &value, "\"found\": true", &exchange))
    }

    // ===================== partial updates =====================

    fn post_update(&self, operation: &str, url: String, body: &Value) -> Option<Exchange> {
        self.call(
            operation,
            TransportRequest::json(HttpMethod::Post, format!("{}/_update", url), Some(body.to_string())),
        )
    }

    /// 🔧 Set one field. `true` when the response carries `_version`.
    pub fn update_field(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        field: &str,
        value: &Value,
    ) -> Result<bool> {
        const OP: &str = "update_field";
        if self.refuse_write(OP) {
            return Ok(false);
        }
        let mut fields = Map::new();
        fields.insert(field.to_owned(), value.clone());
        let body = json!({ "doc": fields });

        let Some(exchange) = self.post_update(OP, self.doc_url(index, doc_type, id), &body) else {
            return Ok(false);
        };
        let response = self.parse(OP, &exchange)?;

        if response.get("_version").is_some() {
            return Ok(true);
        }
        Err(self.missing(OP, &response, "\"_version\"", &exchange))
    }

    fn merge(&self, operation: &str, index: &str, doc_type: &str, id: &str, body: &Value) -> Result<bool> {
        if self.refuse_write(operation) {
            return Ok(false);
        }
        let Some(exchange) = self.post_update(operation, self.doc_url(index, doc_type, id), body)
        else {
            return Ok(false);
        };
        let response = self.parse(operation, &exchange)?;

        match server_error(&response) {
            Some(reason) => Err(self.fail(operation, ErrorKind::Application, reason, &exchange)),
            None => Ok(true),
        }
    }

    /// 🔧 Merge `doc`'s fields into an existing document.
    pub fn update(&self, index: &str, doc_type: &str, id: &str, doc: &Value) -> Result<bool> {
        self.merge("update", index, doc_type, id, &json!({ "doc": doc }))
    }

    /// 🔧 Merge `doc` into the document, creating it from `doc` when it does not exist yet.
    pub fn upsert(&self, index: &str, doc_type: &str, id: &str, doc: &Value) -> Result<bool> {
        self.merge(
            "upsert",
            index,
            doc_type,
            id,
            &json!({ "doc": doc, "doc_as_upsert": true }),
        )
    }

    // ===================== search & count =====================

    /// 🔍 Run an opaque query. An empty outcome comes back when the transport failed.
    ///
    /// 💀 Application error when the search timed out; Protocol error when `timed_out` or
    /// `hits.hits` is missing.
    pub fn search(&self, index: &str, doc_type: &str, query: &str) -> Result<SearchOutcome> {
        const OP: &str = "search";
        let request = TransportRequest::json(
            HttpMethod::Post,
            format!("{}/_search", self.type_url(index, doc_type)),
            Some(query.to_owned()),
        );
        let Some(exchange) = self.call(OP, request) else {
            return Ok(SearchOutcome::default());
        };
        let value = self.parse(OP, &exchange)?;

        match value.get("timed_out").and_then(Value::as_bool) {
            None => return Err(self.missing(OP, &value, "\"timed_out\"", &exchange)),
            Some(true) => {
                return Err(self.fail(OP, ErrorKind::Application, "search timed out", &exchange));
            }
            Some(false) => {}
        }

        let Some(hits) = value.pointer("/hits/hits").and_then(Value::as_array).cloned() else {
            return Err(self.missing(OP, &value, "\"hits.hits\"", &exchange));
        };
        // 🔢 2.x reports a bare number, newer servers an object with `value`
        let total = value
            .pointer("/hits/total")
            .and_then(|total| total.as_u64().or_else(|| total.get("value")?.as_u64()))
            .unwrap_or(hits.len() as u64);

        trace!("🔍 search on {}/{} returned {} of {} hits", index, doc_type, hits.len(), total);
        Ok(SearchOutcome {
            hits,
            total,
            raw: value,
        })
    }

    /// 🔢 `GET /{index}/{type}/_count`. `0` on transport failure or when `count` is missing.
    pub fn get_document_count(&self, index: &str, doc_type: &str) -> Result<u64> {
        const OP: &str = "get_document_count";
        let request = TransportRequest::json(
            HttpMethod::Get,
            format!("{}/_count", self.type_url(index, doc_type)),
            None,
        );
        let Some(exchange) = self.call(OP, request) else {
            return Ok(0);
        };
        let value = self.parse(OP, &exchange)?;

        match value.get("count").and_then(Value::as_u64) {
            Some(count) => Ok(count),
            None => {
                self.notify(OP, &exchange, "response has no integer \"count\"");
                Ok(0)
            }
        }
    }

    // ===================== index admin =====================

    fn admin(&self, operation: &str, request: TransportRequest) -> Result<bool> {
        let Some(exchange) = self.call(operation, request) else {
            return Ok(false);
        };
        let value = self.parse(operation, &exchange)?;
        if exchange.response.is_ok() {
            return Ok(true);
        }

        let reason = server_error(&value).unwrap_or_else(|| {
            format!("{} answered HTTP {}", operation, exchange.response.status)
        });
        Err(self.fail(operation, ErrorKind::Application, reason, &exchange))
    }

    /// ❓ `GET /{index}`. `true` on 200, `false` on transport failure.
    ///
    /// 💀 Any other status is an Application error, 404 included.
    pub fn exist_index(&self, index: &str) -> Result<bool> {
        self.admin(
            "exist_index",
            TransportRequest::json(HttpMethod::Get, self.index_url(index), None),
        )
    }

    /// 🏗️ `PUT /{index}` with optional raw settings/mappings text, passed through untouched.
    pub fn create_index(&self, index: &str, settings: Option<&str>) -> Result<bool> {
        const OP: &str = "create_index";
        if self.refuse_write(OP) {
            return Ok(false);
        }
        self.admin(
            OP,
            TransportRequest::json(
                HttpMethod::Put,
                self.index_url(index),
                settings.map(str::to_owned),
            ),
        )
    }

    /// 💣 `DELETE /{index}`: every type, document and mapping in it.
    pub fn delete_index(&self, index: &str) -> Result<bool> {
        const OP: &str = "delete_index";
        if self.refuse_write(OP) {
            return Ok(false);
        }
        self.admin(
            OP,
            TransportRequest::json(HttpMethod::Delete, self.index_url(index), None),
        )
    }

    /// 🔄 Fire-and-forget `GET /{index}/_refresh`.
    pub fn refresh(&self, index: &str) {
        let request = TransportRequest::json(
            HttpMethod::Get,
            format!("{}/_refresh", self.index_url(index)),
            None,
        );
        let _ = self.call("refresh", request);
    }

    // ===================== bulk =====================

    /// 📦 Send a pre-rendered NDJSON batch to `/_bulk`.
    ///
    /// `Ok(None)` when read-only or the transport failed. A 200 with a JSON body yields the
    /// per-item [`BulkResponse`]; check [`BulkResponse::errors`], the batch can partially fail.
    pub fn bulk(&self, ndjson: &str) -> Result<Option<BulkResponse>> {
        const OP: &str = "bulk";
        if self.refuse_write(OP) {
            return Ok(None);
        }
        let lines = memchr::memchr_iter(b'\n', ndjson.as_bytes()).count();
        debug!("📦 Shipping bulk body: {} lines, {} bytes", lines, ndjson.len());

        let request = TransportRequest::ndjson(self.root_url("_bulk"), ndjson.to_owned());
        let Some(exchange) = self.call(OP, request) else {
            return Ok(None);
        };

        let value: Value = serde_json::from_str(&exchange.response.body).map_err(|e| {
            self.fail(
                OP,
                ErrorKind::Protocol,
                format!("bulk response is not JSON: {}", e),
                &exchange,
            )
        })?;

        if !exchange.response.is_ok() {
            let reason = server_error(&value)
                .unwrap_or_else(|| format!("bulk answered HTTP {}", exchange.response.status));
            return Err(self.fail(OP, ErrorKind::Application, reason, &exchange));
        }

        let response: BulkResponse = serde_json::from_value(value).map_err(|e| {
            self.fail(
                OP,
                ErrorKind::Protocol,
                format!("bulk response does not have the expected shape: {}", e),
                &exchange,
            )
        })?;
        if response.errors {
            self.notify(OP, &exchange, "bulk accepted, some items failed");
        }
        Ok(Some(response))
    }

    /// 📦 Render `batch` and send it. An empty batch sends nothing and returns `Ok(None)`.
    pub fn bulk_batch(&self, batch: &BulkBuilder) -> Result<Option<BulkResponse>> {
        if batch.is_empty() {
            debug!("📦 Empty bulk batch, nothing to send");
            return Ok(None);
        }
        self.bulk(&batch.to_ndjson())
    }
}
