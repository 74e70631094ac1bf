//! Intel item search
//!
//! One page per call. The upstream fixes the sort order (descending by item
//! date); resuming a query is the caller's job, using the offset and the
//! scroll state the page carries.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::SixgillClient;
use crate::auth::Token;
use crate::error::HarvestResult;

const INTEL_ITEMS_PATH: &str = "/intel/intel_items";

/// Scroll state sent with a search
///
/// Serialized as-is: a flag on the first request, then the cursor from the
/// previous page to resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Scroll {
    Enabled(bool),
    Cursor(String),
}

impl Default for Scroll {
    fn default() -> Self {
        Scroll::Enabled(false)
    }
}

/// One search request
#[derive(Debug, Clone)]
pub struct IntelQuery {
    /// Query string in the platform's search syntax
    pub query: String,
    /// Offset of the first item to return
    pub from: u64,
    pub scroll: Scroll,
    /// Items per page
    pub results_size: u32,
}

impl IntelQuery {
    pub fn new(query: impl Into<String>, results_size: u32) -> Self {
        Self {
            query: query.into(),
            from: 0,
            scroll: Scroll::default(),
            results_size,
        }
    }

    pub fn starting_at(mut self, from: u64) -> Self {
        self.from = from;
        self
    }

    /// Ask the upstream for scroll-based pagination
    pub fn scroll(mut self, scroll: bool) -> Self {
        self.scroll = Scroll::Enabled(scroll);
        self
    }

    /// Continue from a cursor returned in [`IntelPage::scroll_id`]
    pub fn resume(mut self, scroll_id: impl Into<String>) -> Self {
        self.scroll = Scroll::Cursor(scroll_id.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct IntelSearchBody<'a> {
    query: &'a str,
    partial_content: bool,
    results_size: u32,
    scroll: &'a Scroll,
    from: u64,
    sort: &'static str,
    sort_type: &'static str,
    highlight: bool,
    recent_items: bool,
    safe_content_size: bool,
}

impl<'a> From<&'a IntelQuery> for IntelSearchBody<'a> {
    fn from(query: &'a IntelQuery) -> Self {
        Self {
            query: &query.query,
            partial_content: false,
            results_size: query.results_size,
            scroll: &query.scroll,
            from: query.from,
            sort: "date",
            sort_type: "desc",
            highlight: false,
            recent_items: false,
            safe_content_size: true,
        }
    }
}

/// One page of search results
#[derive(Debug, Clone, Serialize)]
pub struct IntelPage {
    /// Items on this page (empty when the reply has none)
    pub items: Vec<Value>,
    /// Total matches reported upstream, when present
    pub total: Option<u64>,
    /// Scroll cursor embedded in the reply, when present
    pub scroll_id: Option<String>,
    /// The untouched reply
    pub raw: Value,
}

impl IntelPage {
    pub fn from_response(raw: Value) -> Self {
        let items = raw
            .get("intel_items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total = raw.get("total_intel_items").and_then(Value::as_u64);
        let scroll_id = raw
            .get("scroll_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            items,
            total,
            scroll_id,
            raw,
        }
    }

    /// Offset of the next page, or `None` once the reported total is reached
    ///
    /// Without a reported total, an empty page ends the query. An offset
    /// past `u64::MAX` also ends it.
    pub fn next_from(&self, from: u64, page_size: u32) -> Option<u64> {
        let next = from.checked_add(u64::from(page_size))?;
        match self.total {
            Some(total) if next < total => Some(next),
            Some(_) => None,
            None if self.items.is_empty() => None,
            None => Some(next),
        }
    }
}

impl SixgillClient {
    /// Run one page of an intel search
    pub async fn search_intel(&self, token: &Token, query: &IntelQuery) -> HarvestResult<IntelPage> {
        debug!(from = query.from, size = query.results_size, "Searching intel items");

        let body = IntelSearchBody::from(query);
        let raw: Value = self.api.post_json(token, INTEL_ITEMS_PATH, &body).await?;

        Ok(IntelPage::from_response(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_body_fixes_sort_order() {
        let query = IntelQuery::new("site:forum_x", 50).starting_at(100).scroll(true);
        let body = serde_json::to_value(IntelSearchBody::from(&query)).unwrap();

        assert_eq!(body["sort"], "date");
        assert_eq!(body["sort_type"], "desc");
        assert_eq!(body["from"], 100);
        assert_eq!(body["results_size"], 50);
        assert_eq!(body["scroll"], true);
        assert_eq!(body["safe_content_size"], true);
        assert_eq!(body["partial_content"], false);
    }

    #[test]
    fn test_page_defaults_for_missing_fields() {
        let page = IntelPage::from_response(json!({"unexpected": 1}));

        assert!(page.items.is_empty());
        assert_eq!(page.total, None);
        assert_eq!(page.scroll_id, None);
        assert_eq!(page.next_from(0, 10), None);
    }

    #[test]
    fn test_next_from_respects_total() {
        let page = IntelPage::from_response(json!({
            "total_intel_items": 25,
            "intel_items": [{"id": "a"}],
            "scroll_id": "cursor-1"
        }));

        assert_eq!(page.scroll_id.as_deref(), Some("cursor-1"));
        assert_eq!(page.next_from(0, 10), Some(10));
        assert_eq!(page.next_from(10, 10), Some(20));
        assert_eq!(page.next_from(20, 10), None);
    }

    #[test]
    fn test_next_from_stops_at_offset_overflow() {
        let page = IntelPage::from_response(json!({"intel_items": [{"id": "a"}]}));

        assert_eq!(page.next_from(u64::MAX - 5, 50), None);
        assert_eq!(page.next_from(u64::MAX - 50, 50), Some(u64::MAX));
    }

    #[test]
    fn test_resume_sends_cursor_as_scroll() {
        let query = IntelQuery::new("site:forum_x", 50).scroll(true).resume("cursor-7");
        let body = serde_json::to_value(IntelSearchBody::from(&query)).unwrap();

        assert_eq!(body["scroll"], "cursor-7");

        let fresh = serde_json::to_value(IntelSearchBody::from(&IntelQuery::new("x", 1))).unwrap();
        assert_eq!(fresh["scroll"], false);
    }
}
