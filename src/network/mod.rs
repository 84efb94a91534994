// Re-export network modules
pub mod config;
pub mod event_types;
pub mod messages;
pub mod orchestrator_api;
pub mod router;
pub mod timer;
pub mod transport;
pub mod ws_client;

#[cfg(target_arch = "wasm32")]
pub mod web_socket;

// Re-export commonly used items
pub use config::WsConfig;
pub use event_types::MessageType;
pub use messages::{builders as message_builders, DirectoryEntry, DirectoryListing};
pub use orchestrator_api::OrchestratorApi;
pub use router::{MessageRouter, SubscriptionId};
pub use timer::{TimerHandle, TimerHost};
pub use transport::{CloseInfo, Connector, InboundFrame, Socket};
pub use ws_client::{ConnectionManager, ConnectionState, ConnectionStatus, SessionEvents};

#[cfg(target_arch = "wasm32")]
pub use timer::BrowserTimers;
#[cfg(target_arch = "wasm32")]
pub use web_socket::WebSocketConnector;

#[cfg(any(test, feature = "test-support"))]
pub use timer::ManualTimers;
#[cfg(any(test, feature = "test-support"))]
pub use transport::{ScriptedConnector, ScriptedSocket};
