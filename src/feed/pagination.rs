//! Cursor bookkeeping and busy flags for the accumulated feed.
//!
//! [`FeedState`] never performs I/O itself. A caller asks it whether a load
//! may start (`begin_*`), runs the fetch, then hands the outcome back
//! (`complete_*`). Keeping the state machine free of I/O lets the
//! orchestrator own the single writer and lets tests drive every
//! transition directly.

use super::types::{FeedItem, Page};
use crate::provider::ProviderError;

/// Accumulated items plus the pagination state machine.
///
/// The three busy flags are independent: `refreshing` only distinguishes a
/// user-initiated reload from a plain initial load for presentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    items: Vec<FeedItem>,
    next_cursor: Option<String>,
    loading_initial: bool,
    loading_more: bool,
    refreshing: bool,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Real items accumulated so far, in arrival order.
    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub fn is_loading_initial(&self) -> bool {
        self.loading_initial
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// True when a further page can be requested right now.
    pub fn can_load_more(&self) -> bool {
        !self.loading_more && !self.loading_initial && self.next_cursor.is_some()
    }

    /// Marks an initial (or refresh) load as started.
    ///
    /// Always allowed: a reload supersedes whatever page sequence came before.
    pub fn begin_initial(&mut self, refresh: bool) {
        self.loading_initial = true;
        if refresh {
            self.refreshing = true;
        }
    }

    /// Marks a load-more as started and returns the cursor to request.
    ///
    /// Returns `None`, leaving every flag untouched, when another load is in
    /// flight or the feed is exhausted.
    pub fn begin_load_more(&mut self) -> Option<String> {
        if !self.can_load_more() {
            return None;
        }
        let cursor = self.next_cursor.clone()?;
        self.loading_more = true;
        Some(cursor)
    }

    /// Applies the outcome of an initial or refresh load.
    ///
    /// Success replaces the items and cursor wholesale. Failure resets to an
    /// empty, exhausted feed so no partial state survives.
    pub fn complete_initial(&mut self, result: Result<Page, ProviderError>) {
        match result {
            Ok(page) => {
                self.items = page.items;
                self.next_cursor = page.next_cursor;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Initial load failed, showing empty feed");
                self.items.clear();
                self.next_cursor = None;
            }
        }
        self.loading_initial = false;
        self.refreshing = false;
    }

    /// Applies the outcome of a load-more.
    ///
    /// Success appends in arrival order (no de-duplication) and replaces the
    /// cursor. Failure keeps items and cursor so the same trigger can retry.
    pub fn complete_load_more(&mut self, result: Result<Page, ProviderError>) {
        match result {
            Ok(page) => {
                self.items.extend(page.items);
                self.next_cursor = page.next_cursor;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Load more failed, keeping existing items");
            }
        }
        self.loading_more = false;
    }

    /// Drops the continuation cursor, leaving the items in place.
    ///
    /// Used when the request parameters change without a reload: the old
    /// cursor would continue a page sequence the next fetch no longer
    /// belongs to.
    pub fn invalidate_cursor(&mut self) {
        self.next_cursor = None;
    }

    /// Clears every busy flag after in-flight fetches were abandoned.
    pub fn abandon_in_flight(&mut self) {
        self.loading_initial = false;
        self.loading_more = false;
        self.refreshing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(id: &str) -> FeedItem {
        FeedItem::media(id, format!("https://m/{id}"), 10.0, 10.0)
    }

    fn page(ids: &[&str], cursor: Option<&str>) -> Page {
        Page {
            items: ids.iter().map(|id| item(id)).collect(),
            next_cursor: cursor.map(str::to_string),
        }
    }

    fn loaded(ids: &[&str], cursor: Option<&str>) -> FeedState {
        let mut state = FeedState::new();
        state.begin_initial(false);
        state.complete_initial(Ok(page(ids, cursor)));
        state
    }

    #[test]
    fn test_initial_load_replaces_items() {
        let mut state = loaded(&["a", "b"], Some("c1"));
        assert_eq!(state.items().len(), 2);
        assert_eq!(state.next_cursor(), Some("c1"));
        assert!(!state.is_loading_initial());

        state.begin_initial(false);
        assert!(state.is_loading_initial());
        state.complete_initial(Ok(page(&["z"], None)));
        assert_eq!(state.items(), &[item("z")]);
        assert_eq!(state.next_cursor(), None);
    }

    #[test]
    fn test_initial_failure_resets_to_empty() {
        let mut state = loaded(&["a", "b"], Some("c1"));
        state.begin_initial(false);
        state.complete_initial(Err(ProviderError::HttpStatus(500)));

        assert!(state.items().is_empty());
        assert_eq!(state.next_cursor(), None);
        assert!(!state.is_loading_initial());
    }

    #[test]
    fn test_refresh_sets_and_clears_refreshing() {
        let mut state = loaded(&["a"], Some("c1"));
        state.begin_initial(true);
        assert!(state.is_refreshing());
        assert!(state.is_loading_initial());

        state.complete_initial(Ok(page(&["b"], Some("c2"))));
        assert!(!state.is_refreshing());
        assert_eq!(state.items(), &[item("b")]);
    }

    #[test]
    fn test_load_more_appends_in_order() {
        let mut state = loaded(&["a", "b"], Some("c1"));

        assert_eq!(state.begin_load_more().as_deref(), Some("c1"));
        assert!(state.is_loading_more());
        state.complete_load_more(Ok(page(&["c", "a"], Some("c2"))));

        let ids: Vec<&str> = state.items().iter().map(|i| i.id.as_str()).collect();
        // Duplicates are kept; the feed is never de-duplicated
        assert_eq!(ids, vec!["a", "b", "c", "a"]);
        assert_eq!(state.next_cursor(), Some("c2"));
        assert!(!state.is_loading_more());
    }

    #[test]
    fn test_load_more_failure_keeps_items_and_cursor() {
        let mut state = loaded(&["a"], Some("c1"));
        state.begin_load_more();
        state.complete_load_more(Err(ProviderError::Timeout));

        assert_eq!(state.items(), &[item("a")]);
        assert_eq!(state.next_cursor(), Some("c1"));
        assert!(!state.is_loading_more());
        // Retry uses the same cursor
        assert_eq!(state.begin_load_more().as_deref(), Some("c1"));
    }

    #[test]
    fn test_load_more_noop_without_cursor() {
        let mut state = loaded(&["a"], None);
        let before = state.clone();

        assert!(state.begin_load_more().is_none());
        assert_eq!(state, before);
        assert!(!state.is_loading_more());
    }

    #[test]
    fn test_load_more_noop_while_busy() {
        let mut state = loaded(&["a"], Some("c1"));
        state.begin_initial(false);
        assert!(state.begin_load_more().is_none());
        assert!(!state.is_loading_more());

        let mut state = loaded(&["a"], Some("c1"));
        assert!(state.begin_load_more().is_some());
        assert!(state.begin_load_more().is_none());
    }

    #[test]
    fn test_invalidated_cursor_blocks_load_more() {
        let mut state = loaded(&["a", "b"], Some("c1"));
        state.invalidate_cursor();

        assert_eq!(state.items().len(), 2);
        assert_eq!(state.next_cursor(), None);
        assert!(state.begin_load_more().is_none());

        // A fresh first page restores pagination
        state.begin_initial(false);
        state.complete_initial(Ok(page(&["z"], Some("c9"))));
        assert_eq!(state.begin_load_more().as_deref(), Some("c9"));
    }

    #[test]
    fn test_abandon_clears_flags_only() {
        let mut state = loaded(&["a"], Some("c1"));
        state.begin_load_more();
        state.begin_initial(true);

        state.abandon_in_flight();
        assert!(!state.is_loading_initial());
        assert!(!state.is_loading_more());
        assert!(!state.is_refreshing());
        assert_eq!(state.items(), &[item("a")]);
    }
}
