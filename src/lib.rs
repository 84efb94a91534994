//! Session core of the flow-graph editor frontend.
//!
//! Owns the single orchestrator WebSocket (heartbeat, backoff reconnect,
//! correlated requests), the node catalog pushed by the orchestrator, and the
//! canonical node/edge graph with variadic port normalization.  Rendering is
//! left to JavaScript, which talks to this crate through `EditorHandle`.

#[macro_use]
mod macros;

pub mod catalog;
pub mod constants;
pub mod error;
pub mod graph;
pub mod network;
pub mod session;

#[cfg(target_arch = "wasm32")]
mod bindings;

#[cfg(test)]
mod tests;

pub use catalog::{NodeCatalog, NodePaletteItem};
pub use error::{GraphError, RouterError, TransportError};
pub use session::{Change, EditorSession};

#[cfg(target_arch = "wasm32")]
pub use bindings::EditorHandle;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

// Main entry point for the WASM module
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    // Initialize better panic messages
    console_error_panic_hook::set_once();
    debug_log!("flowgraph-frontend {} loaded", env!("CARGO_PKG_VERSION"));
    Ok(())
}
