use crate::backend::{HistoryQuery, ServiceError};
use crate::state::{AppState, ChatMessage};
use crate::AppAction;

#[derive(uniffi::Enum, Clone, Debug)]
pub enum AppUpdate {
    FullState(AppState),
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
}

/// Results of async work, routed back into the actor. Each carries the thread `epoch` it
/// was started in so results that straddle a "clear conversation" are dropped.
#[derive(Debug)]
pub enum InternalEvent {
    HistoryFetched {
        epoch: u64,
        older: bool,
        query: HistoryQuery,
        result: Result<Vec<ChatMessage>, ServiceError>,
    },
    SendCompleted {
        epoch: u64,
        token: u64,
        result: Result<(), ServiceError>,
    },
    SendTimedOut {
        token: u64,
    },
    // Debounced post-send refresh.
    RefreshDue {
        epoch: u64,
    },
    ConversationCleared {
        result: Result<(), ServiceError>,
    },
}
