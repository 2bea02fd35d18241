mod config;
mod paging;
mod send;
mod store;

use std::sync::{Arc, RwLock};

use flume::Sender;

use crate::actions::AppAction;
use crate::backend::{
    ChatBackend, HistoryQuery, OfflineChatBackend, ServiceError, SharedChatBackend,
};
use crate::http::HttpChatBackend;
use crate::state::{now_millis, AppState, BusyState, ThreadError, ThreadErrorKind};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};

use paging::{PageKind, PaginationController};
use send::{BeginRejected, SendCoordinator, SendPhase, SendResolution};
use store::MessageStore;

pub(crate) use config::default_app_config_json;

/// Pick the backend for a data dir: HTTP when the network is enabled and an endpoint is
/// configured, otherwise the offline stub.
pub(crate) fn backend_from_config(data_dir: &str) -> Arc<dyn ChatBackend> {
    let cfg = config::load_app_config(data_dir);
    if !cfg.network_enabled() {
        tracing::info!("network disabled; using offline backend");
        return Arc::new(OfflineChatBackend);
    }
    let Some(base_url) = cfg.api_base_url() else {
        tracing::warn!("no api_base_url configured; using offline backend");
        return Arc::new(OfflineChatBackend);
    };
    match HttpChatBackend::new(&base_url, cfg.auth_token(), cfg.request_timeout()) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            tracing::error!(%e, "http backend init failed; using offline backend");
            Arc::new(OfflineChatBackend)
        }
    }
}

pub struct AppCore {
    pub state: AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,

    config: config::AppConfig,
    runtime: tokio::runtime::Runtime,
    backend: SharedChatBackend,

    // Thread bookkeeping. Only the actor thread touches these.
    store: MessageStore,
    pager: PaginationController,
    send: SendCoordinator,
    // A refresh was requested while an initial load was already in flight.
    initial_reload_queued: bool,
    clearing: bool,
    stick_to_bottom: bool,
}

impl AppCore {
    pub fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: String,
        shared_state: Arc<RwLock<AppState>>,
        backend: SharedChatBackend,
    ) -> Self {
        let config = config::load_app_config(&data_dir);
        let state = AppState::empty();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .enable_io()
            .build()
            .expect("tokio runtime");

        tracing::info!(
            page_size = config.page_size(),
            send_timeout_ms = config.send_timeout().as_millis() as u64,
            refresh_delay_ms = config.refresh_delay().as_millis() as u64,
            "core config loaded"
        );

        let mut this = Self {
            state,
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            config,
            runtime,
            backend,
            store: MessageStore::new(),
            pager: PaginationController::new(),
            send: SendCoordinator::new(),
            initial_reload_queued: false,
            clearing: false,
            stick_to_bottom: true,
        };

        // Ensure FfiApp.state() has an immediately-available snapshot (welcome message).
        this.project_thread();
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        this
    }

    fn backend(&self) -> Arc<dyn ChatBackend> {
        match self.backend.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn project_thread(&mut self) {
        let fetch_in_flight = self.pager.is_loading();
        self.state.thread.messages = self.store.view(fetch_in_flight, now_millis());
        self.state.thread.has_more_history = self.store.has_more_history();
        self.state.thread.is_sending = self.send.phase() == SendPhase::Sending;
        self.state.thread.stick_to_bottom = self.stick_to_bottom;
        self.state.busy = BusyState {
            loading_initial: self.pager.is_loading_initial(),
            loading_older: self.pager.is_loading_older(),
            clearing: self.clearing,
        };
    }

    /// Thread data and busy flags are both part of AppState; emit a full snapshot like
    /// everything else.
    fn emit_thread(&mut self) {
        self.project_thread();
        self.emit_state();
    }

    fn record_error(&mut self, kind: ThreadErrorKind, err: &ServiceError) {
        // Keep toast in state until the UI explicitly clears it.
        self.state.toast = Some(err.user_visible_message());
        self.state.last_error = Some(ThreadError {
            kind,
            message: err.to_string(),
        });
    }

    fn clear_error(&mut self, kind: ThreadErrorKind) {
        if self.state.last_error.as_ref().map(|e| e.kind) == Some(kind) {
            self.state.last_error = None;
        }
    }

    pub fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(action) => {
                // Never log `?action` directly: it carries message content.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action);
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            AppAction::OpenThread | AppAction::RefreshHistory => {
                self.load_initial();
            }
            AppAction::SendMessage { content } => {
                self.submit(&content);
            }
            AppAction::LoadOlderMessages { limit } => {
                let limit = if limit == 0 { self.page_size() } else { limit };
                self.load_older(limit);
            }
            AppAction::ScrolledToTop => {
                if self.pager.should_load_on_scroll(&self.store) {
                    let limit = self.page_size();
                    self.load_older(limit);
                }
            }
            AppAction::ClearConversation => {
                self.begin_clear();
            }
            AppAction::ClearToast => {
                if self.state.toast.is_some() || self.state.last_error.is_some() {
                    self.state.toast = None;
                    self.state.last_error = None;
                    self.emit_state();
                }
            }
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::HistoryFetched {
                epoch,
                older,
                query,
                result,
            } => {
                let kind = if older {
                    PageKind::Older
                } else {
                    PageKind::Initial
                };
                self.on_history_fetched(epoch, kind, query, result);
            }
            InternalEvent::SendCompleted {
                epoch,
                token,
                result,
            } => {
                self.on_send_completed(epoch, token, result);
            }
            InternalEvent::SendTimedOut { token } => {
                if self.send.on_timeout(token, &mut self.store).is_some() {
                    // Liveness guard only: the message may still land server-side and will
                    // show up on the next refresh.
                    tracing::info!(token, "send timed out; pending message cleared");
                    self.emit_thread();
                }
            }
            InternalEvent::RefreshDue { epoch } => {
                if epoch == self.store.epoch() {
                    self.load_initial();
                }
            }
            InternalEvent::ConversationCleared { result } => {
                self.on_conversation_cleared(result);
            }
        }
    }

    fn spawn_history_fetch(&self, kind: PageKind, query: HistoryQuery) {
        let backend = self.backend();
        let tx = self.core_sender.clone();
        let epoch = self.store.epoch();
        let older = kind == PageKind::Older;
        tracing::debug!(
            kind = kind.as_str(),
            limit = query.limit,
            offset = query.offset,
            epoch,
            "history fetch"
        );
        self.runtime.spawn(async move {
            let result = backend.fetch_history(query).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::HistoryFetched {
                epoch,
                older,
                query,
                result,
            })));
        });
    }

    fn load_initial(&mut self) {
        let Some(query) = self.pager.begin_initial(self.page_size()) else {
            // Whatever is in flight may predate the change we want to see.
            self.initial_reload_queued = true;
            return;
        };
        self.initial_reload_queued = false;
        self.spawn_history_fetch(PageKind::Initial, query);
        self.emit_thread();
    }

    fn load_older(&mut self, limit: u32) {
        let Some(query) = self.pager.begin_older(limit, &self.store) else {
            tracing::debug!(
                has_more = self.store.has_more_history(),
                loading = self.pager.is_loading(),
                "load older ignored"
            );
            return;
        };
        self.spawn_history_fetch(PageKind::Older, query);
        self.emit_thread();
    }

    fn on_history_fetched(
        &mut self,
        epoch: u64,
        kind: PageKind,
        query: HistoryQuery,
        result: Result<Vec<crate::state::ChatMessage>, ServiceError>,
    ) {
        if epoch != self.store.epoch() {
            tracing::debug!(
                kind = kind.as_str(),
                epoch,
                current = self.store.epoch(),
                "dropping history page fetched before clear"
            );
            return;
        }
        match result {
            Ok(page) => {
                let outcome = self
                    .pager
                    .finish(kind, query.limit, page, &mut self.store);
                tracing::info!(
                    kind = kind.as_str(),
                    returned = outcome.returned,
                    inserted = outcome.inserted,
                    has_more = self.store.has_more_history(),
                    "history merged"
                );
                // New tail content scrolls to the bottom; an older page keeps the viewport.
                self.stick_to_bottom = kind == PageKind::Initial;
                self.clear_error(ThreadErrorKind::HistoryFetch);
                self.reconcile_pending();
            }
            Err(e) => {
                self.pager.abandon(kind);
                tracing::warn!(kind = kind.as_str(), %e, "history fetch failed");
                self.record_error(ThreadErrorKind::HistoryFetch, &e);
            }
        }

        if kind == PageKind::Initial && self.initial_reload_queued {
            self.load_initial();
            return;
        }
        self.emit_thread();
    }

    fn reconcile_pending(&mut self) {
        let matched = self.store.superseding_id();
        if let Some(resolution) = self.send.reconcile(&mut self.store) {
            tracing::info!(
                resolution = resolution.as_str(),
                matched_id = matched.as_deref().unwrap_or(""),
                "pending message confirmed by history"
            );
        }
    }

    fn submit(&mut self, content: &str) {
        let ticket = match self.send.begin(content, now_millis(), &mut self.store) {
            Ok(t) => t,
            Err(BeginRejected::Blank) => return,
            Err(BeginRejected::AlreadySending) => {
                tracing::debug!("send ignored: previous message still pending");
                return;
            }
        };
        let token = ticket.token;
        let epoch = ticket.epoch;
        tracing::info!(token, epoch, "send started");

        self.stick_to_bottom = true;
        self.clear_error(ThreadErrorKind::Send);

        let timeout = self.config.send_timeout();
        let tx = self.core_sender.clone();
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::SendTimedOut {
                token,
            })));
        });
        self.send.arm_timer(token, timer.abort_handle());

        let backend = self.backend();
        let tx = self.core_sender.clone();
        let content = ticket.content;
        self.runtime.spawn(async move {
            let result = backend.send_message(&content).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::SendCompleted {
                epoch,
                token,
                result,
            })));
        });

        self.emit_thread();
    }

    fn on_send_completed(&mut self, epoch: u64, token: u64, result: Result<(), ServiceError>) {
        if epoch != self.store.epoch() {
            tracing::debug!(token, "discarding send result from cleared thread");
            return;
        }
        let resolution = self
            .send
            .on_send_result(token, result.is_ok(), &mut self.store);
        match result {
            Ok(()) => {
                tracing::info!(
                    token,
                    resolution = resolution.map(|r| r.as_str()).unwrap_or("stale"),
                    "send confirmed"
                );
                self.schedule_refresh();
            }
            Err(e) => {
                if self.send.last_resolution_for(token) == Some(SendResolution::Superseded) {
                    tracing::warn!(token, %e, "send reported failure after history confirmed it");
                } else {
                    tracing::warn!(token, %e, "send failed");
                    self.record_error(ThreadErrorKind::Send, &e);
                }
            }
        }
        self.emit_thread();
    }

    fn schedule_refresh(&self) {
        let delay = self.config.refresh_delay();
        let epoch = self.store.epoch();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::RefreshDue { epoch })));
        });
    }

    fn begin_clear(&mut self) {
        if self.clearing {
            return;
        }
        self.clearing = true;
        let backend = self.backend();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = backend.clear_history().await;
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::ConversationCleared { result },
            )));
        });
        self.emit_thread();
    }

    fn on_conversation_cleared(&mut self, result: Result<(), ServiceError>) {
        self.clearing = false;
        match result {
            Ok(()) => {
                self.store.clear_all();
                let resolution = self.send.reset(&mut self.store);
                self.pager.reset();
                self.initial_reload_queued = false;
                self.stick_to_bottom = true;
                self.state.last_error = None;
                tracing::info!(
                    epoch = self.store.epoch(),
                    cancelled_send = resolution.is_some(),
                    "conversation cleared"
                );
            }
            Err(e) => {
                tracing::warn!(%e, "clear conversation failed");
                self.record_error(ThreadErrorKind::Clear, &e);
            }
        }
        self.emit_thread();
    }
}
