//! Transport seam between the connection manager and a concrete socket.

use serde_json::Value;

use super::ws_client::SessionEvents;
use crate::error::TransportError;

/// Opens sockets.  Each call produces a fresh socket that reports back
/// through the supplied `SessionEvents`.
pub trait Connector {
    fn open(&self, url: &str, events: SessionEvents) -> Result<Box<dyn Socket>, TransportError>;
}

/// A single live socket.  Dropping it must detach its event handlers.
pub trait Socket {
    fn send_text(&self, text: &str) -> Result<(), TransportError>;
    fn close(&self, code: u16, reason: &str);
    fn is_open(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    pub was_clean: bool,
}

impl CloseInfo {
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: crate::constants::CLOSE_ABNORMAL,
            reason: reason.into(),
            was_clean: false,
        }
    }
}

/// An inbound text frame, kept raw alongside its JSON parse (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub raw: String,
    pub json: Option<Value>,
}

impl InboundFrame {
    pub fn parse(raw: String) -> Self {
        let json = serde_json::from_str::<Value>(&raw).ok();
        Self { raw, json }
    }

    pub fn message_type(&self) -> Option<&str> {
        self.json.as_ref()?.get("type")?.as_str()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use scripted::{ScriptedConnector, ScriptedSocket};

#[cfg(any(test, feature = "test-support"))]
mod scripted {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::{CloseInfo, Connector, Socket};
    use crate::error::TransportError;
    use crate::network::ws_client::SessionEvents;

    struct SocketState {
        url: String,
        events: SessionEvents,
        open: Cell<bool>,
        sent: RefCell<Vec<String>>,
        client_close: RefCell<Option<(u16, String)>>,
    }

    /// Test-side handle on one socket produced by `ScriptedConnector`.
    #[derive(Clone)]
    pub struct ScriptedSocket {
        state: Rc<SocketState>,
    }

    impl ScriptedSocket {
        pub fn url(&self) -> String {
            self.state.url.clone()
        }

        /// Server accepted the handshake.
        pub fn accept(&self) {
            self.state.open.set(true);
            self.state.events.opened();
        }

        /// Server pushed a text frame.
        pub fn push(&self, text: &str) {
            self.state.events.message(text.to_string());
        }

        pub fn push_json(&self, value: &serde_json::Value) {
            self.push(&value.to_string());
        }

        /// Connection dropped by the network or the server.
        pub fn drop_connection(&self) {
            self.state.open.set(false);
            self.state.events.closed(CloseInfo::abnormal("connection lost"));
        }

        /// Deliver the close event that follows a client-initiated close.
        pub fn finish_close(&self) {
            let (code, reason) = self
                .state
                .client_close
                .borrow()
                .clone()
                .unwrap_or((crate::constants::CLOSE_NORMAL, String::new()));
            self.state.open.set(false);
            self.state.events.closed(CloseInfo { code, reason, was_clean: true });
        }

        pub fn sent(&self) -> Vec<String> {
            self.state.sent.borrow().clone()
        }

        pub fn sent_json(&self) -> Vec<serde_json::Value> {
            self.sent()
                .iter()
                .filter_map(|s| serde_json::from_str(s).ok())
                .collect()
        }

        pub fn client_close(&self) -> Option<(u16, String)> {
            self.state.client_close.borrow().clone()
        }
    }

    struct BoxedSocket(Rc<SocketState>);

    impl Socket for BoxedSocket {
        fn send_text(&self, text: &str) -> Result<(), TransportError> {
            if !self.0.open.get() {
                return Err(TransportError::Send("socket closed".into()));
            }
            self.0.sent.borrow_mut().push(text.to_string());
            Ok(())
        }

        fn close(&self, code: u16, reason: &str) {
            self.0.open.set(false);
            *self.0.client_close.borrow_mut() = Some((code, reason.to_string()));
        }

        fn is_open(&self) -> bool {
            self.0.open.get()
        }
    }

    /// Connector that hands out scripted sockets and records every attempt.
    #[derive(Default)]
    pub struct ScriptedConnector {
        sockets: RefCell<Vec<ScriptedSocket>>,
        refuse: Cell<bool>,
    }

    impl ScriptedConnector {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every following `open` fail synchronously.
        pub fn refuse_connections(&self, refuse: bool) {
            self.refuse.set(refuse);
        }

        pub fn attempts(&self) -> usize {
            self.sockets.borrow().len()
        }

        pub fn socket(&self, index: usize) -> ScriptedSocket {
            self.sockets.borrow()[index].clone()
        }

        pub fn latest(&self) -> ScriptedSocket {
            self.sockets
                .borrow()
                .last()
                .cloned()
                .expect("no socket opened yet")
        }
    }

    impl Connector for ScriptedConnector {
        fn open(
            &self,
            url: &str,
            events: SessionEvents,
        ) -> Result<Box<dyn Socket>, TransportError> {
            if self.refuse.get() {
                return Err(TransportError::Connect {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                });
            }
            let state = Rc::new(SocketState {
                url: url.to_string(),
                events,
                open: Cell::new(false),
                sent: RefCell::new(Vec::new()),
                client_close: RefCell::new(None),
            });
            self.sockets
                .borrow_mut()
                .push(ScriptedSocket { state: state.clone() });
            Ok(Box::new(BoxedSocket(state)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_json_frames_keep_their_raw_text() {
        let frame = InboundFrame::parse("pong".to_string());
        assert_eq!(frame.raw, "pong");
        assert!(frame.json.is_none());
        assert_eq!(frame.message_type(), None);

        let frame = InboundFrame::parse(r#"{"type":"NODE_CONFIG","payload":[]}"#.to_string());
        assert_eq!(frame.message_type(), Some("NODE_CONFIG"));
    }
}
