// Thread state: canonical history plus at most one optimistic pending message.
//
// All mutation of history/pending/has_more goes through this type so the id
// uniqueness and single-pending invariants hold at one choke point.

use std::collections::HashSet;

use crate::reconcile;
use crate::state::{ChatMessage, MessageDeliveryState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingRejected {
    AlreadyPending,
    StaleEpoch,
}

#[derive(Debug)]
pub(crate) struct MessageStore {
    // Insertion order, not display order: older pages land after newer ones.
    history: Vec<ChatMessage>,
    ids: HashSet<String>,
    pending: Option<ChatMessage>,
    has_more_history: bool,
    // Bumped by clear_all(); async results tagged with an older epoch are discarded.
    epoch: u64,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub(crate) fn new() -> Self {
        Self {
            history: Vec::new(),
            ids: HashSet::new(),
            pending: None,
            has_more_history: true,
            epoch: 0,
        }
    }

    /// Merge a fetched page by id. Already-present ids are left untouched. Returns how many
    /// entries were new.
    pub(crate) fn upsert_history_page(&mut self, messages: Vec<ChatMessage>) -> usize {
        let mut inserted = 0;
        for mut m in messages {
            if self.ids.contains(&m.id) {
                continue;
            }
            m.delivery = MessageDeliveryState::Sent;
            self.ids.insert(m.id.clone());
            self.history.push(m);
            inserted += 1;
        }
        inserted
    }

    pub(crate) fn set_pending(&mut self, message: ChatMessage) -> Result<(), PendingRejected> {
        if self.pending.is_some() {
            return Err(PendingRejected::AlreadyPending);
        }
        self.pending = Some(message);
        Ok(())
    }

    /// Like `set_pending`, but refuses when the thread was cleared after `epoch` was read.
    pub(crate) fn set_pending_in_epoch(
        &mut self,
        message: ChatMessage,
        epoch: u64,
    ) -> Result<(), PendingRejected> {
        if epoch != self.epoch {
            return Err(PendingRejected::StaleEpoch);
        }
        self.set_pending(message)
    }

    pub(crate) fn clear_pending(&mut self) -> Option<ChatMessage> {
        self.pending.take()
    }

    pub(crate) fn clear_all(&mut self) {
        self.history.clear();
        self.ids.clear();
        self.pending = None;
        self.has_more_history = true;
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub(crate) fn set_has_more_history(&mut self, has_more: bool) {
        self.has_more_history = has_more;
    }

    pub(crate) fn has_more_history(&self) -> bool {
        self.has_more_history
    }

    pub(crate) fn history_len(&self) -> usize {
        self.history.len()
    }

    pub(crate) fn pending(&self) -> Option<&ChatMessage> {
        self.pending.as_ref()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn supersedes_pending(&self) -> bool {
        reconcile::supersedes(&self.history, self.pending.as_ref())
    }

    pub(crate) fn superseding_id(&self) -> Option<String> {
        let pending = self.pending.as_ref()?;
        reconcile::find_superseding(&self.history, pending).map(|m| m.id.clone())
    }

    /// Display projection: history sorted by creation time, pending as a provisional tail
    /// after every entry created at or before it. An untouched empty thread shows a single
    /// welcome message instead of nothing.
    pub(crate) fn view(&self, fetch_in_flight: bool, now_ms: i64) -> Vec<ChatMessage> {
        if self.history.is_empty() && self.pending.is_none() {
            if fetch_in_flight {
                return vec![];
            }
            return vec![ChatMessage::welcome(now_ms)];
        }

        let mut out: Vec<ChatMessage> = self.history.clone();
        out.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.order.cmp(&b.order))
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(p) = &self.pending {
            let at = out.partition_point(|m| m.created_at_ms <= p.created_at_ms);
            out.insert(at, p.clone());
        }
        out
    }
}
