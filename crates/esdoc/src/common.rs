//! 📦 Common data structures: the nouns this client passes around.
//!
//! 🎬 *[INT. SEARCH CLUSTER, a document sits in an index, minding its own business. a
//! `DocumentRef` points at it. a `FoundDocument` comes back. nobody asks how it feels.]*
//!
//! - [`DocumentRef`]: `(index, type, id?)`, the address of one document.
//! - [`FoundDocument`]: what `GET /{index}/{type}/{id}` hands back when the document exists.
//! - [`SearchOutcome`]: the hits of a search plus the total the server claims.
//! - [`BulkResponse`]: the per-item report card of a `/_bulk` call.
//!
//! Document bodies themselves are plain [`serde_json::Value`]s. No schema is enforced.
//! The client is a courier, not a customs officer. 🦆

use serde::Deserialize;
use serde_json::Value;

/// 🎯 Where a document lives. `id` is `None` when the server should pick one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub index: String,
    pub doc_type: String,
    pub id: Option<String>,
}

impl DocumentRef {
    pub fn new(index: impl Into<String>, doc_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
            id: Some(id.into()),
        }
    }

    /// 🎲 A reference with no id. The server names the baby.
    pub fn auto_id(index: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
            id: None,
        }
    }
}

/// 📄 A document that was actually found.
///
/// The envelope fields are optional-ish on the wire across server versions, so everything
/// except `_source` defaults quietly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FoundDocument {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_type", default)]
    pub doc_type: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_version", default)]
    pub version: Option<u64>,
    #[serde(rename = "_source", default)]
    pub source: Value,
}

/// 🔍 The result of a search: hits, the server's total, and the untouched body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// Raw `hits.hits` entries, `_source` and friends included.
    pub hits: Vec<Value>,
    /// `hits.total` as reported. Can exceed `hits.len()` when the query was paged.
    pub total: u64,
    /// The full parsed response, for aggregations and anything else we don't model.
    pub raw: Value,
}

impl SearchOutcome {
    /// 🔢 Number of hits actually returned.
    pub fn count(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// The `_source` of each hit that has one.
    pub fn sources(&self) -> impl Iterator<Item = &Value> {
        self.hits.iter().filter_map(|hit| hit.get("_source"))
    }
}

/// 📬 `/_bulk` answered 200. That does not mean every item made it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    /// `true` when at least one item failed.
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<Value>,
}

impl BulkResponse {
    /// 💀 The items that carry an `error`, whatever their action key.
    pub fn failed_items(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().filter(|item| {
            item.as_object()
                .and_then(|actions| actions.values().next())
                .is_some_and(|result| result.get("error").is_some_and(|e| !e.is_null()))
        })
    }
}
