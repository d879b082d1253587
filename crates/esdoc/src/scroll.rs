//! 📜 Scroll: reading an index one page at a time, without the server forgetting where we were.
//!
//! 🎬 *[a query matches four million documents. a single search returns ten. somebody sighs.]*
//!
//! A scroll opens a server-side cursor, hands out an opaque `_scroll_id`, and serves the result
//! set page by page. Every continuation returns a **new** id and the previous one is stale.
//! The server drops the cursor after one idle minute, but we clear it ourselves as soon as we
//! are done, because being a good neighbor is free.
//!
//! The lifecycle, in Rust terms:
//! - no [`ScrollCursor`] yet: uninitialized.
//! - [`ElasticClient::init_scroll`] returns one in [`ScrollState::Active`].
//! - [`ElasticClient::scroll_next`] advances it, and a page with no hits moves it to
//!   [`ScrollState::Exhausted`].
//! - [`ElasticClient::clear_scroll`] takes the cursor by value. After that it is gone,
//!   and the borrow checker makes sure nobody scrolls a cleared cursor.
//!
//! [`ElasticClient::full_scan`] runs the whole dance and returns every hit. 🦆

use serde_json::Value;
use tracing::{debug, trace};

use crate::client::{ElasticClient, server_error};
use crate::error::{ErrorKind, Result};
use crate::transport::{HttpMethod, Transport, TransportRequest};

/// 📏 Hits per shard per page when the caller has no opinion.
pub const DEFAULT_SCROLL_SIZE: usize = 1000;

/// ⏱️ How long the server keeps an idle cursor alive.
const KEEP_ALIVE: &str = "1m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    /// More pages may follow.
    Active,
    /// The last page came back empty. Clear it and move on.
    Exhausted,
}

/// 🎯 A live server-side cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollCursor {
    scroll_id: String,
    index: String,
    doc_type: String,
    query: String,
    page_size: usize,
    state: ScrollState,
}

impl ScrollCursor {
    /// The current, and only valid, scroll id.
    pub fn scroll_id(&self) -> &str {
        &self.scroll_id
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn state(&self) -> ScrollState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ScrollState::Active
    }
}

impl<T: Transport> ElasticClient<T> {
    /// 🚀 Open a scan-mode scroll over `query`.
    ///
    /// `Ok(None)` when the transport failed.
    ///
    /// # Errors
    /// 💀 Application when the server reports an `error`; Protocol when the body is not JSON
    /// or carries no `_scroll_id`.
    pub fn init_scroll(
        &self,
        index: &str,
        doc_type: &str,
        query: &str,
        page_size: usize,
    ) -> Result<Option<ScrollCursor>> {
        const OP: &str = "init_scroll";
        let url = format!(
            "{}/_search?scroll={}&search_type=scan&size={}",
            self.type_url(index, doc_type),
            KEEP_ALIVE,
            page_size
        );
        let Some(exchange) =
            self.call(OP, TransportRequest::json(HttpMethod::Post, url, Some(query.to_owned())))
        else {
            return Ok(None);
        };
        let value = self.parse(OP, &exchange)?;

        if let Some(reason) = server_error(&value) {
            return Err(self.fail(OP, ErrorKind::Application, reason, &exchange));
        }
        let Some(scroll_id) = value.get("_scroll_id").and_then(Value::as_str) else {
            return Err(self.missing(OP, &value, "\"_scroll_id\"", &exchange));
        };

        debug!("📜 Scroll opened on {}/{} ({} per page)", index, doc_type, page_size);
        Ok(Some(ScrollCursor {
            scroll_id: scroll_id.to_owned(),
            index: index.to_owned(),
            doc_type: doc_type.to_owned(),
            query: query.to_owned(),
            page_size,
            state: ScrollState::Active,
        }))
    }

    /// 🔄 Fetch the next page into `hits`, replacing the cursor's id.
    ///
    /// Returns `Ok(false)` without a request when the cursor is not active, and `Ok(false)`
    /// when the transport failed. A page with no hits exhausts the cursor.
    ///
    /// # Errors
    /// 💀 Application when the server reports an `error`; Protocol when the body is not JSON,
    /// or `_scroll_id`, `hits` or `hits.hits` is missing.
    pub fn scroll_next(&self, cursor: &mut ScrollCursor, hits: &mut Vec<Value>) -> Result<bool> {
        const OP: &str = "scroll_next";
        if !cursor.is_active() {
            trace!("📜 Cursor is {:?}, not scrolling", cursor.state);
            return Ok(false);
        }

        let request = TransportRequest::json(
            HttpMethod::Post,
            format!("{}?scroll={}", self.root_url("_search/scroll"), KEEP_ALIVE),
            Some(cursor.scroll_id.clone()),
        );
        let Some(exchange) = self.call(OP, request) else {
            return Ok(false);
        };
        let value = self.parse(OP, &exchange)?;

        if let Some(reason) = server_error(&value) {
            return Err(self.fail(OP, ErrorKind::Application, reason, &exchange));
        }
        let Some(next_id) = value.get("_scroll_id").and_then(Value::as_str) else {
            return Err(self.missing(OP, &value, "\"_scroll_id\"", &exchange));
        };
        cursor.scroll_id = next_id.to_owned();

        let Some(page) = value.get("hits") else {
            return Err(self.missing(OP, &value, "\"hits\"", &exchange));
        };
        let Some(page) = page.get("hits").and_then(Value::as_array) else {
            return Err(self.missing(OP, &value, "\"hits\" nested in \"hits\"", &exchange));
        };

        if page.is_empty() {
            cursor.state = ScrollState::Exhausted;
        }
        hits.extend(page.iter().cloned());
        trace!("📜 Page of {} hits, {} so far", page.len(), hits.len());
        Ok(true)
    }

    /// 🧹 Release the cursor on the server. Best effort: nothing is reported back.
    pub fn clear_scroll(&self, cursor: ScrollCursor) {
        let request = TransportRequest::json(
            HttpMethod::Delete,
            self.root_url("_search/scroll"),
            Some(cursor.scroll_id),
        );
        let _ = self.call("clear_scroll", request);
    }

    /// 🔁 Scan everything `query` matches and return every hit.
    ///
    /// Pages are fetched until the accumulated hit count stops growing. The count is
    /// cumulative, not per page. The cursor is cleared on every exit path, including when a
    /// page fails with an error that is then returned.
    pub fn full_scan(
        &self,
        index: &str,
        doc_type: &str,
        query: &str,
        page_size: usize,
    ) -> Result<Vec<Value>> {
        let Some(mut cursor) = self.init_scroll(index, doc_type, query, page_size)? else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        let mut seen = 0;
        let outcome = loop {
            match self.scroll_next(&mut cursor, &mut hits) {
                Ok(true) if hits.len() > seen => seen = hits.len(),
                Ok(_) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.clear_scroll(cursor);
        outcome?;

        debug!("📜 Full scan of {}/{} done: {} hits", index, doc_type, hits.len());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{client_over, config};
    use crate::transport::InMemoryTransport;
    use serde_json::json;

    fn page(scroll_id: &str, ids: &[u32]) -> Value {
        let hits: Vec<Value> = ids
            .iter()
            .map(|id| json!({"_id": id.to_string(), "_source": {"n": id}}))
            .collect();
        json!({"_scroll_id": scroll_id, "timed_out": false, "hits": {"total": 6, "hits": hits}})
    }

    fn clears(transport: &InMemoryTransport) -> usize {
        transport
            .requests()
            .iter()
            .filter(|r| r.method == HttpMethod::Delete && r.url.ends_with("/_search/scroll"))
            .count()
    }

    #[test]
    fn the_one_where_nothing_matches_and_we_still_clean_up() -> Result<()> {
        let transport = InMemoryTransport::new();
        let client = client_over(&transport, config());
        transport
            .respond_json(200, &json!({"_scroll_id": "s0", "hits": {"total": 0, "hits": []}}))
            .respond_json(200, &page("s1", &[]))
            .respond_json(200, &json!({"succeeded": true}));

        let hits = client.full_scan("logs", "line", r#"{"query":{"match_all":{}}}"#, 10)?;

        assert!(hits.is_empty());
        assert_eq!(clears(&transport), 1);
        assert_eq!(transport.request_count(), 3);
        Ok(())
    }

    #[test]
    fn the_one_where_pages_of_every_size_add_up() -> Result<()> {
        let transport = InMemoryTransport::new();
        let client = client_over(&transport, config());
        transport
            .respond_json(200, &json!({"_scroll_id": "s0", "hits": {"total": 6, "hits": []}}))
            .respond_json(200, &page("s1", &[1, 2, 3]))
            .respond_json(200, &page("s2", &[4]))
            .respond_json(200, &page("s3", &[5, 6]))
            .respond_json(200, &page("s4", &[]))
            .respond_json(200, &json!({"succeeded": true}));

        let hits = client.full_scan("logs", "line", "{}", 3)?;

        assert_eq!(hits.len(), 6);
        assert_eq!(hits[5]["_id"], "6");
        assert_eq!(clears(&transport), 1);
        assert_eq!(transport.request_count(), 6);
        assert_eq!(transport.pending(), 0);

        let requests = transport.requests();
        assert_eq!(
            requests[0].url,
            "http://es:9200/logs/line/_search?scroll=1m&search_type=scan&size=3"
        );
        assert_eq!(requests[1].url, "http://es:9200/_search/scroll?scroll=1m");
        // 🔄 each continuation carries the id the previous reply handed out
        let sent_ids: Vec<_> = requests[1..5]
            .iter()
            .map(|r| r.body.clone().unwrap_or_default())
            .collect();
        assert_eq!(sent_ids, vec!["s0", "s1", "s2", "s3"]);
        assert_eq!(requests[5].body.as_deref(), Some("s4"));
        Ok(())
    }

    #[test]
    fn the_one_where_the_cursor_walks_its_states() -> Result<()> {
        let transport = InMemoryTransport::new();
        let client = client_over(&transport, config());
        transport
            .respond_json(200, &json!({"_scroll_id": "a"}))
            .respond_json(200, &page("b", &[1]))
            .respond_json(200, &page("c", &[]));

        let mut cursor = client
            .init_scroll("logs", "line", "{}", DEFAULT_SCROLL_SIZE)?
            .expect("💀 scripted init should open a cursor");
        assert_eq!(cursor.scroll_id(), "a");
        assert_eq!(cursor.page_size(), 1000);
        assert!(cursor.is_active());

        let mut hits = Vec::new();
        assert!(client.scroll_next(&mut cursor, &mut hits)?);
        assert_eq!(cursor.scroll_id(), "b");
        assert!(client.scroll_next(&mut cursor, &mut hits)?);
        assert_eq!(cursor.state(), ScrollState::Exhausted);

        // 🛑 exhausted cursors don't knock on the server's door again
        assert!(!client.scroll_next(&mut cursor, &mut hits)?);
        assert_eq!(transport.request_count(), 3);
        assert_eq!(hits.len(), 1);
        Ok(())
    }

    #[test]
    fn the_one_where_init_gets_no_scroll_id() {
        let transport = InMemoryTransport::new();
        let client = client_over(&transport, config());
        transport
            .respond_json(200, &json!({"took": 1, "hits": {"total": 0}}))
            .respond_json(400, &json!({"error": {"reason": "No search type for [scan]"}}))
            .respond_json(400, &json!({"error": "SearchPhaseExecutionException[...]"}));

        let err = client
            .init_scroll("logs", "line", "{}", 10)
            .expect_err("💀 no _scroll_id");
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let err = client
            .init_scroll("logs", "line", "{}", 10)
            .expect_err("💀 the server complained");
        assert_eq!(err.kind(), ErrorKind::Application);
        assert_eq!(err.message(), "No search type for [scan]");

        let err = client
            .init_scroll("logs", "line", "{}", 10)
            .expect_err("💀 the server complained in 1.x style");
        assert_eq!(err.kind(), ErrorKind::Application);
    }

    #[test]
    fn the_one_where_a_page_blows_up_mid_scan_and_we_still_clear() {
        let transport = InMemoryTransport::new();
        let client = client_over(&transport, config());
        transport
            .respond_json(200, &json!({"_scroll_id": "s0"}))
            .respond_json(200, &page("s1", &[1, 2]))
            .respond_json(200, &json!({"_scroll_id": "s2", "took": 1}))
            .respond_json(200, &json!({"succeeded": true}));

        let err = client
            .full_scan("logs", "line", "{}", 2)
            .expect_err("💀 a page without hits.hits is broken");

        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(clears(&transport), 1);
        // 🔄 the id was replaced before the page was judged, so the clear uses the newest one
        assert_eq!(transport.requests()[3].body.as_deref(), Some("s2"));
    }

    #[test]
    fn the_one_where_a_dead_node_means_an_empty_scan_and_no_cursor() -> Result<()> {
        let transport = InMemoryTransport::new();
        let client = client_over(&transport, config());

        assert!(client.full_scan("logs", "line", "{}", 10)?.is_empty());
        assert_eq!(transport.request_count(), 1);
        assert_eq!(clears(&transport), 0);
        Ok(())
    }

    #[test]
    fn the_one_where_a_dropped_continuation_ends_the_scan_gracefully() -> Result<()> {
        let transport = InMemoryTransport::new();
        let client = client_over(&transport, config());
        transport
            .respond_json(200, &json!({"_scroll_id": "s0"}))
            .respond_json(200, &page("s1", &[1, 2, 3]))
            .fail("connection reset")
            .respond_json(200, &json!({"succeeded": true}));

        let hits = client.full_scan("logs", "line", "{}", 3)?;
        assert_eq!(hits.len(), 3);
        assert_eq!(clears(&transport), 1);
        Ok(())
    }

    #[test]
    fn the_one_where_exhaustion_is_judged_by_the_running_total() -> Result<()> {
        // 📏 the loop compares the accumulated count, not the page size. a non-empty page
        // keeps it going, and the first page that adds nothing stops it, even if the server
        // has not marked anything as done.
        let transport = InMemoryTransport::new();
        let client = client_over(&transport, config());
        transport
            .respond_json(200, &json!({"_scroll_id": "s0"}))
            .respond_json(200, &page("s1", &[1]))
            .respond_json(200, &page("s2", &[]))
            .respond_json(200, &json!({"succeeded": true}))
            .respond_json(200, &page("never-fetched", &[2, 3]));

        let hits = client.full_scan("logs", "line", "{}", 1)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(transport.pending(), 1);
        Ok(())
    }

    #[test]
    fn the_one_where_clear_scroll_swallows_failures() {
        let transport = InMemoryTransport::new();
        let client = client_over(&transport, config());
        transport.respond_json(200, &json!({"_scroll_id": "s0"}));

        let cursor = client
            .init_scroll("logs", "line", "{}", 5)
            .expect("💀 init should work")
            .expect("💀 init should open a cursor");
        // 💤 nothing scripted for the clear: the transport fails and nobody hears about it
        client.clear_scroll(cursor);

        let request = &transport.requests()[1];
        assert_eq!(request.method, HttpMethod::Delete);
        assert_eq!(request.url, "http://es:9200/_search/scroll");
        assert_eq!(request.body.as_deref(), Some("s0"));
    }
}
