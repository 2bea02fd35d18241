// Backward paging over the remote history.
//
// The remote recency window is contiguous from the newest message, so "the next
// `limit` not yet loaded" is the page at offset = history_len.

use super::store::MessageStore;
use crate::backend::HistoryQuery;
use crate::state::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageKind {
    /// Most recent page. Used on open, on explicit refresh and after a send.
    Initial,
    Older,
}

impl PageKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Older => "older",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PaginationController {
    initial_in_flight: bool,
    older_in_flight: bool,
}

/// What merging a page did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageOutcome {
    pub(crate) returned: usize,
    pub(crate) inserted: usize,
}

impl PaginationController {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.initial_in_flight || self.older_in_flight
    }

    pub(crate) fn is_loading_initial(&self) -> bool {
        self.initial_in_flight
    }

    pub(crate) fn is_loading_older(&self) -> bool {
        self.older_in_flight
    }

    pub(crate) fn begin_initial(&mut self, page_size: u32) -> Option<HistoryQuery> {
        if self.initial_in_flight {
            return None;
        }
        self.initial_in_flight = true;
        Some(HistoryQuery {
            limit: page_size,
            offset: 0,
        })
    }

    pub(crate) fn begin_older(
        &mut self,
        page_size: u32,
        store: &MessageStore,
    ) -> Option<HistoryQuery> {
        if self.is_loading() || !store.has_more_history() {
            return None;
        }
        self.older_in_flight = true;
        Some(HistoryQuery {
            limit: page_size,
            offset: store.history_len() as u32,
        })
    }

    /// Scroll trigger: viewport at the very top, more to fetch, nothing already loading.
    pub(crate) fn should_load_on_scroll(&self, store: &MessageStore) -> bool {
        store.has_more_history() && !self.is_loading()
    }

    /// Releases the in-flight flag without touching the store (failed or discarded fetch).
    pub(crate) fn abandon(&mut self, kind: PageKind) {
        match kind {
            PageKind::Initial => self.initial_in_flight = false,
            PageKind::Older => self.older_in_flight = false,
        }
    }

    /// Forget in-flight loads, e.g. after the thread was cleared. Their results will be
    /// dropped by the epoch check.
    pub(crate) fn reset(&mut self) {
        self.initial_in_flight = false;
        self.older_in_flight = false;
    }

    /// Merge a successful page. The first page never decides exhaustion; an older page
    /// shorter than requested does. When exactly `limit` items remained this costs one
    /// extra empty fetch before exhaustion is detected.
    pub(crate) fn finish(
        &mut self,
        kind: PageKind,
        limit: u32,
        page: Vec<ChatMessage>,
        store: &mut MessageStore,
    ) -> PageOutcome {
        self.abandon(kind);
        let returned = page.len();
        let inserted = store.upsert_history_page(page);
        match kind {
            PageKind::Initial => store.set_has_more_history(true),
            PageKind::Older => store.set_has_more_history(returned as u32 >= limit),
        }
        PageOutcome { returned, inserted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MessageDeliveryState, MessageRole};

    fn page(prefix: &str, n: usize, base: i64) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| ChatMessage {
                id: format!("{prefix}-{i}"),
                content: format!("{prefix} {i}"),
                role: if i % 2 == 0 {
                    MessageRole::User
                } else {
                    MessageRole::Assistant
                },
                order: i as i64,
                session_id: String::new(),
                created_at_ms: base + i as i64,
                delivery: MessageDeliveryState::Sent,
            })
            .collect()
    }

    #[test]
    fn initial_load_always_keeps_more_history() {
        let mut store = MessageStore::new();
        let mut pager = PaginationController::new();
        let q = pager.begin_initial(20).unwrap();
        assert_eq!(q, HistoryQuery { limit: 20, offset: 0 });
        let outcome = pager.finish(PageKind::Initial, 20, page("a", 3, 0), &mut store);
        assert_eq!(outcome.returned, 3);
        assert!(store.has_more_history());
        assert!(!pager.is_loading());
    }

    #[test]
    fn short_older_page_exhausts_history() {
        let mut store = MessageStore::new();
        let mut pager = PaginationController::new();
        pager.begin_initial(20).unwrap();
        pager.finish(PageKind::Initial, 20, page("new", 20, 1_000), &mut store);

        let q = pager.begin_older(20, &store).unwrap();
        assert_eq!(q, HistoryQuery { limit: 20, offset: 20 });
        pager.finish(PageKind::Older, 20, page("old", 5, 0), &mut store);

        assert_eq!(store.history_len(), 25);
        assert!(!store.has_more_history());
        assert!(pager.begin_older(20, &store).is_none());
        assert!(!pager.should_load_on_scroll(&store));
    }

    #[test]
    fn exact_full_page_needs_one_extra_fetch() {
        let mut store = MessageStore::new();
        let mut pager = PaginationController::new();
        pager.begin_older(10, &store).unwrap();
        pager.finish(PageKind::Older, 10, page("a", 10, 0), &mut store);
        assert!(store.has_more_history());

        let q = pager.begin_older(10, &store).unwrap();
        assert_eq!(q.offset, 10);
        pager.finish(PageKind::Older, 10, vec![], &mut store);
        assert!(!store.has_more_history());
        assert_eq!(store.history_len(), 10);
    }

    #[test]
    fn older_is_guarded_while_any_load_in_flight() {
        let mut store = MessageStore::new();
        let mut pager = PaginationController::new();
        pager.begin_initial(20).unwrap();
        assert!(pager.begin_older(20, &store).is_none());
        assert!(!pager.should_load_on_scroll(&store));
        pager.finish(PageKind::Initial, 20, vec![], &mut store);

        pager.begin_older(20, &store).unwrap();
        assert!(pager.begin_older(20, &store).is_none());
    }

    #[test]
    fn duplicate_initial_load_is_coalesced() {
        let mut pager = PaginationController::new();
        assert!(pager.begin_initial(20).is_some());
        assert!(pager.begin_initial(20).is_none());
        pager.abandon(PageKind::Initial);
        assert!(pager.begin_initial(20).is_some());
    }

    #[test]
    fn failed_fetch_leaves_store_untouched() {
        let mut store = MessageStore::new();
        let mut pager = PaginationController::new();
        store.upsert_history_page(page("a", 20, 0));
        store.set_has_more_history(true);

        pager.begin_older(20, &store).unwrap();
        pager.abandon(PageKind::Older);

        assert_eq!(store.history_len(), 20);
        assert!(store.has_more_history());
        assert!(pager.should_load_on_scroll(&store));
    }

    #[test]
    fn refetching_overlapping_page_does_not_grow_history() {
        let mut store = MessageStore::new();
        let mut pager = PaginationController::new();
        pager.begin_initial(5).unwrap();
        pager.finish(PageKind::Initial, 5, page("a", 5, 0), &mut store);
        pager.begin_initial(5).unwrap();
        let outcome = pager.finish(PageKind::Initial, 5, page("a", 5, 0), &mut store);
        assert_eq!(outcome.inserted, 0);
        assert_eq!(store.history_len(), 5);
    }
}
