#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use advisor_core::{AppReconciler, AppState, AppUpdate, ChatMessage, MessageDeliveryState};

pub fn wait_until(what: &str, timeout: Duration, f: impl FnMut() -> bool) {
    wait_until_with_poll(what, timeout, Duration::from_millis(10), f);
}

pub fn wait_until_with_poll(
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut f: impl FnMut() -> bool,
) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(poll);
    }
    panic!("{what}: condition not met within {timeout:?}");
}

pub struct TestTimings {
    pub page_size: u32,
    pub send_timeout_ms: u64,
    pub refresh_delay_ms: u64,
}

impl Default for TestTimings {
    fn default() -> Self {
        Self {
            page_size: 20,
            send_timeout_ms: 400,
            refresh_delay_ms: 30,
        }
    }
}

pub fn write_config(data_dir: &str, timings: &TestTimings) {
    let path = std::path::Path::new(data_dir).join("advisor_config.json");
    let v = serde_json::json!({
        "disable_network": true,
        "page_size": timings.page_size,
        "send_timeout_ms": timings.send_timeout_ms,
        "refresh_delay_ms": timings.refresh_delay_ms,
    });
    std::fs::write(path, serde_json::to_vec(&v).unwrap()).unwrap();
}

pub fn contents(state: &AppState) -> Vec<String> {
    state
        .thread
        .messages
        .iter()
        .map(|m| m.content.clone())
        .collect()
}

pub fn pending_messages(state: &AppState) -> Vec<ChatMessage> {
    state
        .thread
        .messages
        .iter()
        .filter(|m| m.delivery == MessageDeliveryState::Pending)
        .cloned()
        .collect()
}

#[derive(Clone)]
pub struct Collector(pub Arc<Mutex<Vec<AppUpdate>>>);

impl Collector {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn states(&self) -> Vec<AppState> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|u| match u {
                AppUpdate::FullState(s) => s.clone(),
            })
            .collect()
    }

    pub fn last_toast(&self) -> Option<String> {
        self.states().into_iter().rev().find_map(|s| s.toast)
    }
}

impl AppReconciler for Collector {
    fn reconcile(&self, update: AppUpdate) {
        self.0.lock().unwrap().push(update);
    }
}
