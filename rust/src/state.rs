#[derive(uniffi::Record, Clone, Debug)]
pub struct AppState {
    pub rev: u64,
    pub thread: ThreadViewState,
    pub busy: BusyState,
    pub last_error: Option<ThreadError>,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            thread: ThreadViewState::empty(),
            busy: BusyState::idle(),
            last_error: None,
            toast: None,
        }
    }
}

/// Render-ready projection of the conversation thread.
///
/// `messages` is already in display order (by `created_at_ms`), with the
/// optimistic pending message (if any) placed as a provisional tail.
#[derive(uniffi::Record, Clone, Debug)]
pub struct ThreadViewState {
    pub messages: Vec<ChatMessage>,
    pub has_more_history: bool,
    pub is_sending: bool,
    /// Set when the last mutation appended to the tail (send, refresh); cleared when
    /// an older page was prepended and the viewport should keep its position.
    pub stick_to_bottom: bool,
}

impl ThreadViewState {
    pub fn empty() -> Self {
        Self {
            messages: vec![],
            has_more_history: true,
            is_sending: false,
            stick_to_bottom: true,
        }
    }
}

/// "In flight" flags for history operations that the UI should reflect.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct BusyState {
    pub loading_initial: bool,
    pub loading_older: bool,
    pub clearing: bool,
}

impl BusyState {
    pub fn idle() -> Self {
        Self {
            loading_initial: false,
            loading_older: false,
            clearing: false,
        }
    }

    pub fn fetch_in_flight(&self) -> bool {
        self.loading_initial || self.loading_older
    }
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadErrorKind {
    HistoryFetch,
    Send,
    Clear,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ThreadError {
    pub kind: ThreadErrorKind,
    pub message: String,
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" | "bot" => Some(Self::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum MessageDeliveryState {
    Pending,
    Sent,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub role: MessageRole,
    /// Server display hint. Only used to break `created_at_ms` ties.
    pub order: i64,
    pub session_id: String,
    pub created_at_ms: i64,
    pub delivery: MessageDeliveryState,
}

pub const WELCOME_MESSAGE_ID: &str = "welcome";
pub const WELCOME_MESSAGE_TEXT: &str =
    "Hi! I'm your market assistant. Ask me about stocks, lessons, or your trading rules.";
pub const LOCAL_ID_PREFIX: &str = "local-";

impl ChatMessage {
    /// Optimistic local copy of an outgoing user message. The id never collides with
    /// server ids because of the `local-` prefix.
    pub fn pending(content: impl Into<String>, created_at_ms: i64) -> Self {
        Self {
            id: format!(
                "{LOCAL_ID_PREFIX}{created_at_ms}-{}",
                uuid::Uuid::new_v4().simple()
            ),
            content: content.into(),
            role: MessageRole::User,
            order: 0,
            session_id: String::new(),
            created_at_ms,
            delivery: MessageDeliveryState::Pending,
        }
    }

    pub fn welcome(now_ms: i64) -> Self {
        Self {
            id: WELCOME_MESSAGE_ID.to_string(),
            content: WELCOME_MESSAGE_TEXT.to_string(),
            role: MessageRole::Assistant,
            order: 0,
            session_id: String::new(),
            created_at_ms: now_ms,
            delivery: MessageDeliveryState::Sent,
        }
    }

    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }
}

pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::{BusyState, ChatMessage, MessageDeliveryState, MessageRole};

    #[test]
    fn pending_message_shape() {
        let m = ChatMessage::pending("Hello", 1_700_000_000_000);
        assert!(m.is_local());
        assert!(m.id.starts_with("local-1700000000000-"));
        assert_eq!(m.role, MessageRole::User);
        assert_eq!(m.delivery, MessageDeliveryState::Pending);
        assert_eq!(m.created_at_ms, 1_700_000_000_000);
    }

    #[test]
    fn pending_ids_are_unique_within_same_millisecond() {
        let a = ChatMessage::pending("x", 5);
        let b = ChatMessage::pending("x", 5);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn role_parsing_is_lenient_about_case() {
        assert_eq!(MessageRole::parse("USER"), Some(MessageRole::User));
        assert_eq!(MessageRole::parse(" assistant "), Some(MessageRole::Assistant));
        assert_eq!(MessageRole::parse("system"), None);
    }

    #[test]
    fn busy_fetch_in_flight_ignores_clearing() {
        let mut busy = BusyState::idle();
        assert!(!busy.fetch_in_flight());
        busy.clearing = true;
        assert!(!busy.fetch_in_flight());
        busy.loading_older = true;
        assert!(busy.fetch_in_flight());
    }
}
