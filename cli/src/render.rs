use std::collections::HashSet;

use advisor_core::{AppState, ChatMessage, MessageDeliveryState, MessageRole, WELCOME_MESSAGE_ID};

/// Turns successive full-state snapshots into terminal lines, printing each message once.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    seen: HashSet<String>,
    was_sending: bool,
    had_more: Option<bool>,
    last_toast: Option<String>,
}

impl TranscriptPrinter {
    pub fn render(&mut self, state: &AppState) -> Vec<String> {
        let mut out = Vec::new();
        let messages = &state.thread.messages;

        let only_welcome = messages.len() == 1 && messages[0].id == WELCOME_MESSAGE_ID;
        if only_welcome && self.seen.iter().any(|id| id != WELCOME_MESSAGE_ID) {
            out.push("-- conversation cleared --".to_string());
            self.seen.clear();
        }

        // Anything new that sorts before an already-printed message came from an older page.
        let first_seen = messages.iter().position(|m| self.seen.contains(&m.id));
        for (idx, m) in messages.iter().enumerate() {
            if m.delivery == MessageDeliveryState::Pending || self.seen.contains(&m.id) {
                continue;
            }
            let earlier = first_seen.is_some_and(|f| idx < f);
            out.push(format_message(m, earlier));
            self.seen.insert(m.id.clone());
        }

        if state.thread.is_sending && !self.was_sending {
            out.push("   ... sending".to_string());
        }
        self.was_sending = state.thread.is_sending;

        if self.had_more == Some(true) && !state.thread.has_more_history {
            out.push("-- start of conversation --".to_string());
        }
        self.had_more = Some(state.thread.has_more_history);

        if state.toast != self.last_toast {
            if let Some(toast) = &state.toast {
                out.push(format!("!! {toast}"));
            }
            self.last_toast = state.toast.clone();
        }
        out
    }
}

fn format_message(m: &ChatMessage, earlier: bool) -> String {
    let who = match m.role {
        MessageRole::User => "you",
        MessageRole::Assistant => "advisor",
    };
    let prefix = if earlier { "(earlier) " } else { "" };
    format!("{prefix}{who}: {}", m.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, role: MessageRole, content: &str, at: i64) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            content: content.to_string(),
            role,
            order: 0,
            session_id: String::new(),
            created_at_ms: at,
            delivery: MessageDeliveryState::Sent,
        }
    }

    fn state_with(messages: Vec<ChatMessage>) -> AppState {
        let mut s = AppState::empty();
        s.thread.messages = messages;
        s.thread.has_more_history = true;
        s
    }

    #[test]
    fn prints_each_message_once_and_skips_pending() {
        let mut p = TranscriptPrinter::default();
        let mut s = state_with(vec![msg("a", MessageRole::Assistant, "Welcome", 1)]);
        assert_eq!(p.render(&s), vec!["advisor: Welcome"]);

        s.thread.messages.push(ChatMessage::pending("Hello", 2));
        s.thread.is_sending = true;
        assert_eq!(p.render(&s), vec!["   ... sending"]);

        s.thread.messages.pop();
        s.thread.is_sending = false;
        s.thread.messages.push(msg("b", MessageRole::User, "Hello", 2));
        s.thread.messages.push(msg("c", MessageRole::Assistant, "Hi!", 3));
        assert_eq!(p.render(&s), vec!["you: Hello", "advisor: Hi!"]);
        assert!(p.render(&s).is_empty());
    }

    #[test]
    fn older_pages_are_marked_and_exhaustion_announced() {
        let mut p = TranscriptPrinter::default();
        let mut s = state_with(vec![msg("b", MessageRole::User, "recent", 2)]);
        p.render(&s);

        s.thread.messages.insert(0, msg("a", MessageRole::Assistant, "old", 1));
        s.thread.has_more_history = false;
        assert_eq!(
            p.render(&s),
            vec!["(earlier) advisor: old", "-- start of conversation --"]
        );
    }

    #[test]
    fn clear_and_toast_are_reported() {
        let mut p = TranscriptPrinter::default();
        let s = state_with(vec![msg("b", MessageRole::User, "hi", 2)]);
        p.render(&s);

        let mut cleared = state_with(vec![ChatMessage::welcome(5)]);
        cleared.toast = Some("Server error (500)".into());
        let lines = p.render(&cleared);
        assert_eq!(lines[0], "-- conversation cleared --");
        assert!(lines[1].starts_with("advisor: "));
        assert_eq!(lines.last().unwrap(), "!! Server error (500)");
        assert!(p.render(&cleared).is_empty());
    }
}
