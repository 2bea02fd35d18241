use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppCore;

pub(crate) const CONFIG_FILE_NAME: &str = "advisor_config.json";

pub(crate) const DEFAULT_PAGE_SIZE: u32 = 20;
pub(crate) const DEFAULT_SEND_TIMEOUT_MS: u64 = 10_000;
// Gives the server time to commit both the user message and the assistant reply before
// the post-send refresh.
pub(crate) const DEFAULT_REFRESH_DELAY_MS: u64 = 600;
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) disable_network: Option<bool>,
    pub(crate) api_base_url: Option<String>,
    pub(crate) auth_token: Option<String>,
    pub(crate) page_size: Option<u32>,
    pub(crate) send_timeout_ms: Option<u64>,
    pub(crate) refresh_delay_ms: Option<u64>,
    pub(crate) request_timeout_ms: Option<u64>,
}

pub(crate) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    match serde_json::from_slice::<AppConfig>(&bytes) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(path = %path.display(), %e, "ignoring unreadable config");
            AppConfig::default()
        }
    }
}

pub(crate) fn default_app_config_json() -> String {
    let cfg = AppConfig {
        disable_network: Some(false),
        api_base_url: None,
        auth_token: None,
        page_size: Some(DEFAULT_PAGE_SIZE),
        send_timeout_ms: Some(DEFAULT_SEND_TIMEOUT_MS),
        refresh_delay_ms: Some(DEFAULT_REFRESH_DELAY_MS),
        request_timeout_ms: Some(DEFAULT_REQUEST_TIMEOUT_MS),
    };
    serde_json::to_string_pretty(&cfg).unwrap_or_else(|_| "{}".to_string())
}

fn env_flag(name: &str) -> Option<bool> {
    let v = std::env::var(name).ok()?;
    let t = v.trim();
    Some(!t.is_empty() && t != "0" && !t.eq_ignore_ascii_case("false"))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    pub(crate) fn network_enabled(&self) -> bool {
        // Used to keep Rust tests deterministic and offline.
        if let Some(disable) = self.disable_network {
            return !disable;
        }
        env_flag("ADVISOR_DISABLE_NETWORK") != Some(true)
    }

    pub(crate) fn api_base_url(&self) -> Option<String> {
        env_string("ADVISOR_API_BASE_URL").or_else(|| {
            self.api_base_url
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
    }

    pub(crate) fn auth_token(&self) -> Option<String> {
        env_string("ADVISOR_AUTH_TOKEN").or_else(|| self.auth_token.clone())
    }

    pub(crate) fn page_size(&self) -> u32 {
        self.page_size
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub(crate) fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms.unwrap_or(DEFAULT_SEND_TIMEOUT_MS))
    }

    pub(crate) fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms.unwrap_or(DEFAULT_REFRESH_DELAY_MS))
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(
            self.request_timeout_ms
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        )
    }
}

impl AppCore {
    pub(super) fn page_size(&self) -> u32 {
        self.config.page_size()
    }
}
