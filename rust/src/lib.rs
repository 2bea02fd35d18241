mod actions;
mod backend;
mod core;
mod http;
mod logging;
mod reconcile;
mod state;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

pub use actions::AppAction;
pub use backend::{ChatBackend, HistoryQuery, OfflineChatBackend, ServiceError, SharedChatBackend};
pub use http::HttpChatBackend;
pub use reconcile::{find_superseding, supersedes};
pub use state::*;
pub use updates::*;

/// Return the default `advisor_config.json` payload used when no config file exists.
pub fn default_config_json() -> String {
    core::default_app_config_json()
}

uniffi::setup_scaffolding!();

#[uniffi::export(callback_interface)]
pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

#[derive(uniffi::Object)]
pub struct FfiApp {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
    chat_backend: SharedChatBackend,
}

#[uniffi::export]
impl FfiApp {
    #[uniffi::constructor]
    pub fn new(data_dir: String) -> Arc<Self> {
        logging::init_logging(&data_dir);
        let backend = core::backend_from_config(&data_dir);
        Self::start(data_dir, backend)
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }
}

impl FfiApp {
    /// Start the core against an explicit backend (CLI hosts, tests).
    pub fn with_backend(data_dir: String, backend: Arc<dyn ChatBackend>) -> Arc<Self> {
        logging::init_logging(&data_dir);
        Self::start(data_dir, backend)
    }

    /// Swap the backend used for subsequent calls. Calls already in flight finish against
    /// the old one.
    pub fn set_chat_backend(&self, backend: Arc<dyn ChatBackend>) {
        match self.chat_backend.write() {
            Ok(mut slot) => {
                *slot = backend;
            }
            Err(poison) => {
                *poison.into_inner() = backend;
            }
        }
    }

    /// Blocking update stream for hosts that prefer polling to a reconciler callback.
    /// Shares the queue with `listen_for_updates`, so use one or the other.
    pub fn updates(&self) -> Receiver<AppUpdate> {
        self.update_rx.clone()
    }

    fn start(data_dir: String, backend: Arc<dyn ChatBackend>) -> Arc<Self> {
        tracing::info!(data_dir = %data_dir, "FfiApp starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty()));
        let chat_backend: SharedChatBackend = Arc::new(RwLock::new(backend));

        // Actor loop thread (single threaded "app actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        let backend_for_core = chat_backend.clone();
        thread::spawn(move || {
            let mut core = crate::core::AppCore::new(
                update_tx,
                core_tx_for_core,
                data_dir,
                shared_for_core,
                backend_for_core,
            );
            while let Ok(msg) = core_rx.recv() {
                core.handle_message(msg);
            }
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
            chat_backend,
        })
    }
}
