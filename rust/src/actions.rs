#[derive(uniffi::Enum, Debug, Clone)]
pub enum AppAction {
    // Thread lifecycle
    OpenThread,
    RefreshHistory,
    ClearConversation,

    // Chat
    SendMessage {
        content: String,
    },
    LoadOlderMessages {
        limit: u32,
    },

    // Viewport
    ScrolledToTop,

    // UI
    ClearToast,
}

impl AppAction {
    /// Log-safe action tag (never includes message content).
    pub fn tag(&self) -> &'static str {
        match self {
            // Thread lifecycle
            AppAction::OpenThread => "OpenThread",
            AppAction::RefreshHistory => "RefreshHistory",
            AppAction::ClearConversation => "ClearConversation",

            // Chat
            AppAction::SendMessage { .. } => "SendMessage",
            AppAction::LoadOlderMessages { .. } => "LoadOlderMessages",

            // Viewport
            AppAction::ScrolledToTop => "ScrolledToTop",

            // UI
            AppAction::ClearToast => "ClearToast",
        }
    }
}
