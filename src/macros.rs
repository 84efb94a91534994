//! Small crate-wide convenience macros.
//!
//! The logging macros write straight to the browser console when compiled to
//! WASM.  Native builds (unit tests, tooling) forward to the `log` facade so
//! nothing touches a JS import outside the browser.

/// Debug-level log line.
///
/// ```rust,ignore
/// debug_log!("Reconnecting in {} ms", delay);
/// ```
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        #[cfg(target_arch = "wasm32")]
        {
            web_sys::console::debug_1(&format!($($arg)*).into());
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            log::debug!($($arg)*);
        }
    }};
}

/// Warning-level log line.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {{
        #[cfg(target_arch = "wasm32")]
        {
            web_sys::console::warn_1(&format!($($arg)*).into());
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            log::warn!($($arg)*);
        }
    }};
}

/// Error-level log line.
#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {{
        #[cfg(target_arch = "wasm32")]
        {
            web_sys::console::error_1(&format!($($arg)*).into());
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            log::error!($($arg)*);
        }
    }};
}
