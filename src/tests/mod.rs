//! Session-level tests: the whole stack on a virtual clock and a scripted
//! socket.

use std::rc::Rc;

use crate::network::{ManualTimers, ScriptedConnector, ScriptedSocket, WsConfig};
use crate::session::EditorSession;


pub(crate) struct TestEnv {
    pub session: EditorSession,
    pub connector: Rc<ScriptedConnector>,
    pub timers: ManualTimers,
}

impl TestEnv {
    pub fn new(config: WsConfig) -> Self {
        let connector = Rc::new(ScriptedConnector::new());
        let timers = ManualTimers::new();
        let session = EditorSession::new(config, connector.clone(), Rc::new(timers.clone()));
        Self {
            session,
            connector,
            timers,
        }
    }

    /// Connected session with heartbeat off.
    pub fn open() -> Self {
        let env = Self::new(config());
        env.session.connect();
        env.socket().accept();
        env
    }

    pub fn socket(&self) -> ScriptedSocket {
        self.connector.latest()
    }

    /// Answer the most recent correlated request.
    pub fn reply(&self, mut body: serde_json::Value) {
        let req_id = self
            .socket()
            .sent_json()
            .last()
            .and_then(|m| m.get("reqId").cloned())
            .expect("no correlated request outstanding");
        body["replyTo"] = req_id;
        self.socket().push_json(&body);
    }
}

pub(crate) fn config() -> WsConfig {
    WsConfig {
        url: "ws://orchestrator.test/ws".into(),
        heartbeat_interval_ms: 0,
        debug: false,
        ..WsConfig::default()
    }
}
