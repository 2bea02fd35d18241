//! Pending-vs-history matching.
//!
//! The send endpoint does not return the stored record, so a pending message can only be
//! correlated with canonical history by content and time: a history entry supersedes the
//! pending copy when it is a user message with identical content created no earlier than
//! the pending message.
//!
//! Two identical submissions made before the first one is confirmed will both match the
//! first confirmed copy. Callers only ever hold one pending message, so this only shows up
//! as the second bubble disappearing one refresh early.

use crate::state::{ChatMessage, MessageRole};

/// Returns the first history entry that confirms `pending`, if any.
pub fn find_superseding<'a>(
    history: &'a [ChatMessage],
    pending: &ChatMessage,
) -> Option<&'a ChatMessage> {
    history.iter().find(|candidate| {
        candidate.role == MessageRole::User
            && candidate.content == pending.content
            && candidate.created_at_ms >= pending.created_at_ms
    })
}

pub fn supersedes(history: &[ChatMessage], pending: Option<&ChatMessage>) -> bool {
    match pending {
        Some(p) => find_superseding(history, p).is_some(),
        None => false,
    }
}
