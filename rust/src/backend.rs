use std::sync::{Arc, RwLock};

use crate::state::ChatMessage;

/// Which slice of the remote history to fetch, counted back from the newest message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("network disabled")]
    NetworkDisabled,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Short text suitable for a toast.
    pub fn user_visible_message(&self) -> String {
        match self {
            Self::NetworkDisabled => "You're offline".to_string(),
            Self::Transport(_) => "Couldn't reach the server".to_string(),
            Self::Status { status, .. } if *status == 401 || *status == 403 => {
                "Your session has expired, please sign in again".to_string()
            }
            Self::Status { status, .. } => format!("Server error ({status})"),
            Self::Decode(_) => "Unexpected response from server".to_string(),
            Self::Other(msg) => msg.clone(),
        }
    }
}

/// Remote side of the conversation: history, send and clear.
///
/// `send_message` is fire-and-confirm: it does not return the stored record, which is why
/// the core re-fetches history after a successful send.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    async fn fetch_history(&self, query: HistoryQuery) -> Result<Vec<ChatMessage>, ServiceError>;

    async fn send_message(&self, content: &str) -> Result<(), ServiceError>;

    async fn clear_history(&self) -> Result<(), ServiceError>;
}

pub type SharedChatBackend = Arc<RwLock<Arc<dyn ChatBackend>>>;

/// Backend used when the network is disabled or no API endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct OfflineChatBackend;

#[async_trait::async_trait]
impl ChatBackend for OfflineChatBackend {
    async fn fetch_history(&self, _query: HistoryQuery) -> Result<Vec<ChatMessage>, ServiceError> {
        Err(ServiceError::NetworkDisabled)
    }

    async fn send_message(&self, _content: &str) -> Result<(), ServiceError> {
        Err(ServiceError::NetworkDisabled)
    }

    async fn clear_history(&self) -> Result<(), ServiceError> {
        Err(ServiceError::NetworkDisabled)
    }
}
