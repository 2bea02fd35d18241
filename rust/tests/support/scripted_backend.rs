#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use advisor_core::{
    now_millis, ChatBackend, ChatMessage, HistoryQuery, MessageDeliveryState, MessageRole,
    ServiceError,
};

/// How the fake server treats `send_message`.
#[derive(Debug, Clone)]
pub enum SendBehavior {
    /// Store the user message plus an assistant reply after `delay`, then succeed.
    Succeed { delay: Duration, reply: String },
    /// Fail after `delay` without storing anything.
    Fail { delay: Duration },
    /// Never resolve.
    Hang,
    /// Store the message right away but never answer the call.
    CommitThenHang,
    /// Store the message right away, then report a failure after `delay`.
    CommitThenFail { delay: Duration },
}

/// In-memory stand-in for the chat API. History is served newest-first, paged by
/// `offset`/`limit`, like the real endpoint.
pub struct ScriptedBackend {
    history: Mutex<Vec<ChatMessage>>,
    send_behavior: Mutex<SendBehavior>,
    fail_fetches: AtomicBool,
    fail_clears: AtomicBool,
    fetch_delay: Mutex<Duration>,
    fetches: Mutex<Vec<HistoryQuery>>,
    sends: Mutex<Vec<String>>,
    clears: AtomicUsize,
    next_id: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            send_behavior: Mutex::new(SendBehavior::Succeed {
                delay: Duration::ZERO,
                reply: "Hi!".to_string(),
            }),
            fail_fetches: AtomicBool::new(false),
            fail_clears: AtomicBool::new(false),
            fetch_delay: Mutex::new(Duration::ZERO),
            fetches: Mutex::new(Vec::new()),
            sends: Mutex::new(Vec::new()),
            clears: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    /// `n` alternating user/assistant messages, oldest first, one second apart.
    pub fn with_history(n: usize) -> Self {
        let b = Self::new();
        let base = now_millis() - 1_000_000;
        for i in 0..n {
            let role = if i % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            b.push(role, &format!("seed {i}"), base + (i as i64) * 1_000);
        }
        b
    }

    pub fn push(&self, role: MessageRole, content: &str, created_at_ms: i64) -> String {
        let id = format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.history.lock().unwrap().push(ChatMessage {
            id: id.clone(),
            content: content.to_string(),
            role,
            order: 0,
            session_id: "session-1".to_string(),
            created_at_ms,
            delivery: MessageDeliveryState::Sent,
        });
        id
    }

    pub fn set_send_behavior(&self, behavior: SendBehavior) {
        *self.send_behavior.lock().unwrap() = behavior;
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_clears(&self, fail: bool) {
        self.fail_clears.store(fail, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub fn fetches(&self) -> Vec<HistoryQuery> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<String> {
        self.sends.lock().unwrap().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn stored_len(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    fn commit_user_message(&self, content: &str) {
        self.push(MessageRole::User, content, now_millis());
    }
}

#[async_trait::async_trait]
impl ChatBackend for ScriptedBackend {
    async fn fetch_history(&self, query: HistoryQuery) -> Result<Vec<ChatMessage>, ServiceError> {
        self.fetches.lock().unwrap().push(query);
        // The page is read when the request arrives; the delay models a slow response.
        let mut all = self.history.lock().unwrap().clone();
        all.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        let page: Vec<ChatMessage> = all
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(ServiceError::Status {
                status: 503,
                body: "history unavailable".to_string(),
            });
        }
        Ok(page)
    }

    async fn send_message(&self, content: &str) -> Result<(), ServiceError> {
        self.sends.lock().unwrap().push(content.to_string());
        let behavior = self.send_behavior.lock().unwrap().clone();
        match behavior {
            SendBehavior::Succeed { delay, reply } => {
                tokio::time::sleep(delay).await;
                self.commit_user_message(content);
                self.push(MessageRole::Assistant, &reply, now_millis() + 1);
                Ok(())
            }
            SendBehavior::Fail { delay } => {
                tokio::time::sleep(delay).await;
                Err(ServiceError::Status {
                    status: 500,
                    body: "model overloaded".to_string(),
                })
            }
            SendBehavior::Hang => std::future::pending().await,
            SendBehavior::CommitThenHang => {
                self.commit_user_message(content);
                std::future::pending().await
            }
            SendBehavior::CommitThenFail { delay } => {
                self.commit_user_message(content);
                tokio::time::sleep(delay).await;
                Err(ServiceError::Transport("connection reset".to_string()))
            }
        }
    }

    async fn clear_history(&self) -> Result<(), ServiceError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        if self.fail_clears.load(Ordering::SeqCst) {
            return Err(ServiceError::Status {
                status: 500,
                body: "clear failed".to_string(),
            });
        }
        self.history.lock().unwrap().clear();
        Ok(())
    }
}
