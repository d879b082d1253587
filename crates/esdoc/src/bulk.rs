//! 📦 Bulk: many writes, one request, zero network calls until you say so.
//!
//! 🎬 *[a thousand documents wait in line. one at a time, they'd take all day. together,
//! they take one POST.]*
//!
//! [`BulkBuilder`] collects [`BulkOperation`]s in insertion order and renders them in the
//! `/_bulk` wire format: one compact JSON value per line, and a newline after **every** line,
//! the last one included. The server reads the body as a strict line stream, so a missing
//! final newline loses the last document.
//!
//! ```text
//! {"index":{"_id":"1","_index":"logs","_type":"line"}}
//! {"msg":"hi"}
//! {"delete":{"_id":"2","_index":"logs","_type":"line"}}
//! ```
//!
//! Non-delete operations take two lines (action + payload). Delete takes one. The builder
//! never talks to the server; hand it to
//! [`ElasticClient::bulk_batch`](crate::client::ElasticClient::bulk_batch) for that. 🦆

use std::fmt;

use serde_json::{Map, Value, json};

use crate::common::DocumentRef;

/// 🎯 One write intent.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// Create or replace the whole document.
    Index { target: DocumentRef, doc: Value },
    /// Create the document, fail the item if it already exists.
    Create { target: DocumentRef, doc: Value },
    /// Partial update. `body` is the full update payload, `{"doc": ...}` or anything else the
    /// update API accepts.
    Update { target: DocumentRef, body: Value },
    Delete { target: DocumentRef },
}

impl BulkOperation {
    /// The action key on the metadata line.
    pub fn action(&self) -> &'static str {
        match self {
            BulkOperation::Index { .. } => "index",
            BulkOperation::Create { .. } => "create",
            BulkOperation::Update { .. } => "update",
            BulkOperation::Delete { .. } => "delete",
        }
    }

    pub fn target(&self) -> &DocumentRef {
        match self {
            BulkOperation::Index { target, .. }
            | BulkOperation::Create { target, .. }
            | BulkOperation::Update { target, .. }
            | BulkOperation::Delete { target } => target,
        }
    }

    /// The line after the action line, if this operation has one.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            BulkOperation::Index { doc, .. } | BulkOperation::Create { doc, .. } => Some(doc),
            BulkOperation::Update { body, .. } => Some(body),
            BulkOperation::Delete { .. } => None,
        }
    }

    /// 📋 `{action: {_id?, _index, _type}}`
    pub fn action_line(&self) -> Value {
        let target = self.target();
        let mut metadata = Map::new();
        if let Some(id) = &target.id {
            metadata.insert("_id".to_owned(), Value::String(id.clone()));
        }
        metadata.insert("_index".to_owned(), Value::String(target.index.clone()));
        metadata.insert("_type".to_owned(), Value::String(target.doc_type.clone()));

        let mut line = Map::new();
        line.insert(self.action().to_owned(), Value::Object(metadata));
        Value::Object(line)
    }

    pub fn line_count(&self) -> usize {
        if self.payload().is_some() { 2 } else { 1 }
    }
}

/// 🏗️ Ordered accumulator of bulk operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkBuilder {
    operations: Vec<BulkOperation>,
}

impl BulkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any operation as-is.
    pub fn push(&mut self, operation: BulkOperation) -> &mut Self {
        self.operations.push(operation);
        self
    }

    pub fn index(&mut self, index: &str, doc_type: &str, id: &str, doc: &Value) -> &mut Self {
        self.push(BulkOperation::Index {
            target: DocumentRef::new(index, doc_type, id),
            doc: doc.clone(),
        })
    }

    pub fn index_auto_id(&mut self, index: &str, doc_type: &str, doc: &Value) -> &mut Self {
        self.push(BulkOperation::Index {
            target: DocumentRef::auto_id(index, doc_type),
            doc: doc.clone(),
        })
    }

    pub fn create(&mut self, index: &str, doc_type: &str, id: &str, doc: &Value) -> &mut Self {
        self.push(BulkOperation::Create {
            target: DocumentRef::new(index, doc_type, id),
            doc: doc.clone(),
        })
    }

    pub fn create_auto_id(&mut self, index: &str, doc_type: &str, doc: &Value) -> &mut Self {
        self.push(BulkOperation::Create {
            target: DocumentRef::auto_id(index, doc_type),
            doc: doc.clone(),
        })
    }

    /// 🔧 Partial update: sends `{"doc": doc}`.
    pub fn update(&mut self, index: &str, doc_type: &str, id: &str, doc: &Value) -> &mut Self {
        self.push(BulkOperation::Update {
            target: DocumentRef::new(index, doc_type, id),
            body: json!({ "doc": doc }),
        })
    }

    /// 🔧 Partial update with an explicit `doc_as_upsert` flag.
    pub fn upsert(
        &mut self,
        index: &str,
        doc_type: &str,
        id: &str,
        doc: &Value,
        doc_as_upsert: bool,
    ) -> &mut Self {
        self.push(BulkOperation::Update {
            target: DocumentRef::new(index, doc_type, id),
            body: json!({ "doc": doc, "doc_as_upsert": doc_as_upsert }),
        })
    }

    /// 🔧 Partial update with a caller-built body (scripts, `upsert` documents, ...), sent verbatim.
    pub fn update_with_body(
        &mut self,
        index: &str,
        doc_type: &str,
        id: &str,
        body: &Value,
    ) -> &mut Self {
        self.push(BulkOperation::Update {
            target: DocumentRef::new(index, doc_type, id),
            body: body.clone(),
        })
    }

    pub fn delete(&mut self, index: &str, doc_type: &str, id: &str) -> &mut Self {
        self.push(BulkOperation::Delete {
            target: DocumentRef::new(index, doc_type, id),
        })
    }

    /// 🗑️ Forget everything queued so far.
    pub fn clear(&mut self) {
        self.operations.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations (not lines).
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Number of NDJSON lines the rendered body will have.
    pub fn line_count(&self) -> usize {
        self.operations.iter().map(BulkOperation::line_count).sum()
    }

    pub fn operations(&self) -> &[BulkOperation] {
        &self.operations
    }

    /// 📡 The request body for `/_bulk`.
    pub fn to_ndjson(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BulkBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for operation in &self.operations {
            writeln!(f, "{}", operation.action_line())?;
            if let Some(payload) = operation.payload() {
                writeln!(f, "{}", payload)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(body: &str) -> Vec<Value> {
        body.lines()
            .map(|line| serde_json::from_str(line).expect("💀 every bulk line is standalone JSON"))
            .collect()
    }

    #[test]
    fn the_one_where_indexes_and_upserts_take_two_lines_each() {
        let mut batch = BulkBuilder::new();
        for n in 0..3 {
            batch.index("logs", "line", &n.to_string(), &json!({"n": n}));
        }
        for n in 0..2 {
            batch.upsert("logs", "line", &format!("u{}", n), &json!({"n": n}), true);
        }

        let body = batch.to_ndjson();
        assert_eq!(body.lines().count(), 2 * (3 + 2));
        assert_eq!(batch.line_count(), 10);
        assert_eq!(batch.len(), 5);

        batch.delete("logs", "line", "0").delete("logs", "line", "1");
        assert_eq!(batch.to_ndjson().lines().count(), 10 + 2);
    }

    #[test]
    fn the_one_where_every_line_ends_with_a_newline() {
        let mut batch = BulkBuilder::new();
        batch
            .index("a", "b", "1", &json!({"x": "multi\nline"}))
            .delete("a", "b", "2");

        let body = batch.to_string();
        assert!(body.ends_with('\n'));
        assert_eq!(body.matches('\n').count(), 3);
        assert!(!body.contains("\n\n"));
    }

    #[test]
    fn the_one_where_the_action_lines_have_the_right_shape() {
        let mut batch = BulkBuilder::new();
        batch
            .index("twitter", "tweet", "1", &json!({"user": "kimchy"}))
            .create_auto_id("twitter", "tweet", &json!({"user": "anon"}))
            .update("twitter", "tweet", "1", &json!({"likes": 3}))
            .upsert("twitter", "tweet", "2", &json!({"likes": 0}), false)
            .update_with_body("twitter", "tweet", "3", &json!({"script": "ctx._source.likes += 1"}))
            .delete("twitter", "tweet", "4");

        let rendered = lines(&batch.to_ndjson());
        assert_eq!(rendered.len(), 11);

        assert_eq!(
            rendered[0],
            json!({"index": {"_id": "1", "_index": "twitter", "_type": "tweet"}})
        );
        assert_eq!(rendered[1], json!({"user": "kimchy"}));
        assert_eq!(rendered[2], json!({"create": {"_index": "twitter", "_type": "tweet"}}));
        assert_eq!(rendered[4]["update"]["_id"], "1");
        assert_eq!(rendered[5], json!({"doc": {"likes": 3}}));
        assert_eq!(rendered[7], json!({"doc": {"likes": 0}, "doc_as_upsert": false}));
        assert_eq!(rendered[9], json!({"script": "ctx._source.likes += 1"}));
        assert_eq!(
            rendered[10],
            json!({"delete": {"_id": "4", "_index": "twitter", "_type": "tweet"}})
        );
    }

    #[test]
    fn the_one_where_action_metadata_keeps_its_key_order() {
        let op = BulkOperation::Delete {
            target: DocumentRef::new("i", "t", "9"),
        };
        assert_eq!(
            op.action_line().to_string(),
            r#"{"delete":{"_id":"9","_index":"i","_type":"t"}}"#
        );
        assert_eq!(op.line_count(), 1);
        assert!(op.payload().is_none());
    }

    #[test]
    fn the_one_where_insertion_order_survives_rendering() {
        let mut batch = BulkBuilder::new();
        batch
            .delete("i", "t", "z")
            .index("i", "t", "a", &json!({}))
            .delete("i", "t", "m");

        let ids: Vec<String> = batch
            .operations()
            .iter()
            .filter_map(|op| op.target().id.clone())
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);

        let rendered = lines(&batch.to_ndjson());
        assert_eq!(rendered[0]["delete"]["_id"], "z");
        assert_eq!(rendered[1]["index"]["_id"], "a");
        assert_eq!(rendered[3]["delete"]["_id"], "m");
    }

    #[test]
    fn the_one_where_clear_wipes_the_slate() {
        let mut batch = BulkBuilder::new();
        assert!(batch.is_empty());
        assert_eq!(batch.to_ndjson(), "");

        batch.index_auto_id("i", "t", &json!({"a": 1}));
        assert!(!batch.is_empty());

        batch.clear();
        assert!(batch.is_empty());
        assert_eq!(batch.line_count(), 0);
        assert_eq!(batch.to_ndjson(), "");
    }
}
