use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_HEARTBEAT_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_WS_URL,
};

/// Configuration for the orchestrator connection.
///
/// Deserializes from the camelCase options object the page passes in, with
/// every field optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WsConfig {
    /// WebSocket endpoint of the orchestrator
    pub url: String,
    /// Liveness ping period in milliseconds (0 disables the heartbeat)
    pub heartbeat_interval_ms: u32,
    /// First reconnect delay; doubled per failed attempt
    pub backoff_base_ms: u32,
    /// Upper bound for any reconnect delay
    pub backoff_max_ms: u32,
    /// Maximum number of reconnect attempts (None for unbounded)
    pub max_retries: Option<u32>,
    /// Reconnect automatically after an unexpected close
    pub auto_reconnect: bool,
    /// Default timeout for correlated requests
    pub request_timeout_ms: u32,
    /// Log open/close/retry transitions
    pub debug: bool,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: resolve_ws_url(None),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            max_retries: None,
            auto_reconnect: true,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            debug: true,
        }
    }
}

impl WsConfig {
    pub fn with_url(url: &str) -> Self {
        Self {
            url: resolve_ws_url(Some(url)),
            ..Self::default()
        }
    }

    /// Delay before reconnect attempt number `retry` (0-based).
    pub fn backoff_delay_ms(&self, retry: u32) -> u32 {
        backoff_delay_ms(self.backoff_base_ms, self.backoff_max_ms, retry)
    }

    pub fn retries_exhausted(&self, retry: u32) -> bool {
        self.max_retries.map_or(false, |max| retry >= max)
    }
}

/// `min(base * 2^retry, max)` without overflowing for large retry counts.
pub fn backoff_delay_ms(base_ms: u32, max_ms: u32, retry: u32) -> u32 {
    let factor = 1u64 << retry.min(32);
    let delay = (base_ms as u64).saturating_mul(factor);
    delay.min(max_ms as u64) as u32
}

/// Work out the WebSocket URL.
///
/// Order: explicit value, build-time `WS_URL`, the current page location,
/// then a localhost fallback for tests.  HTTP(S) bases are rewritten to
/// WS(S).
pub fn resolve_ws_url(explicit: Option<&str>) -> String {
    if let Some(url) = explicit.map(str::trim).filter(|u| !u.is_empty()) {
        return to_ws_scheme(url);
    }
    if let Some(url) = option_env!("WS_URL") {
        return to_ws_scheme(url);
    }
    if let Some(url) = page_ws_url() {
        return url;
    }
    DEFAULT_WS_URL.to_string()
}

fn to_ws_scheme(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}

#[cfg(target_arch = "wasm32")]
fn page_ws_url() -> Option<String> {
    use crate::constants::WS_PATH;

    let location = web_sys::window()?.location();
    let host = location.host().ok().filter(|h| !h.is_empty())?;
    let proto = location.protocol().unwrap_or_else(|_| "http:".into());
    let scheme = if proto == "https:" { "wss" } else { "ws" };
    Some(format!("{}://{}{}", scheme, host, WS_PATH))
}

#[cfg(not(target_arch = "wasm32"))]
fn page_ws_url() -> Option<String> {
    None
}
