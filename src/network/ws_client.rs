use std::cell::RefCell;
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::WsConfig;
use super::timer::{TimerHandle, TimerHost};
use super::transport::{CloseInfo, Connector, InboundFrame, Socket};
use crate::constants::{CLOSE_NORMAL, HEARTBEAT_FRAME};
use crate::{debug_log, error_log, warn_log};

/// Represents the current state of the orchestrator connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// Snapshot handed to status listeners (connection indicator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub retry_count: u32,
    pub reconnect_scheduled: bool,
    pub retries_exhausted: bool,
}

/// Receives every inbound frame (router entry point)
pub type FrameHandler = Rc<dyn Fn(InboundFrame)>;
/// Receives every status change
pub type StatusListener = Rc<dyn Fn(&ConnectionStatus)>;

/// One connect attempt.  Replaced, never reused, on reconnect.
struct Session {
    generation: u64,
    socket: Box<dyn Socket>,
    heartbeat: Option<TimerHandle>,
    opened_at: Option<DateTime<Utc>>,
}

struct ManagerState {
    config: WsConfig,
    state: ConnectionState,
    retry_count: u32,
    manual_close: bool,
    retries_exhausted: bool,
    /// Generation of the attempt whose events we still accept.
    active_generation: u64,
    session: Option<Session>,
    reconnect_timer: Option<TimerHandle>,
    frame_handler: Option<FrameHandler>,
    status_listeners: Vec<StatusListener>,
}

impl ManagerState {
    fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            retry_count: self.retry_count,
            reconnect_scheduled: self.reconnect_timer.is_some(),
            retries_exhausted: self.retries_exhausted,
        }
    }

    fn stop_heartbeat(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.heartbeat = None;
        }
    }
}

struct Shared {
    connector: Rc<dyn Connector>,
    timers: Rc<dyn TimerHost>,
    state: RefCell<ManagerState>,
}

/// Owns the single orchestrator socket: connect, heartbeat, exponential
/// backoff reconnect, manual close, outbound send and inbound dispatch.
///
/// Cloning is cheap and shares the same session.  Transport and timer
/// callbacks hold only weak references, so dropping every clone tears the
/// session down.
///
/// **Borrowing caveat** – listeners and the frame handler are always invoked
/// after the internal `RefCell` borrow is released, so they may call back
/// into `send`, `close` or `connect` freely.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Rc<Shared>,
}

impl ConnectionManager {
    pub fn new(config: WsConfig, connector: Rc<dyn Connector>, timers: Rc<dyn TimerHost>) -> Self {
        Self {
            shared: Rc::new(Shared {
                connector,
                timers,
                state: RefCell::new(ManagerState {
                    config,
                    state: ConnectionState::Idle,
                    retry_count: 0,
                    manual_close: false,
                    retries_exhausted: false,
                    active_generation: 0,
                    session: None,
                    reconnect_timer: None,
                    frame_handler: None,
                    status_listeners: Vec::new(),
                }),
            }),
        }
    }

    pub fn config(&self) -> WsConfig {
        self.shared.state.borrow().config.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.borrow().state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.borrow().status()
    }

    /// When the current session finished its handshake, if it has.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.shared
            .state
            .borrow()
            .session
            .as_ref()
            .and_then(|s| s.opened_at)
    }

    /// Set the single consumer of inbound frames.
    pub fn set_frame_handler(&self, handler: FrameHandler) {
        self.shared.state.borrow_mut().frame_handler = Some(handler);
    }

    pub fn add_status_listener(&self, listener: StatusListener) {
        self.shared.state.borrow_mut().status_listeners.push(listener);
    }

    /// Start a fresh session.  Resets the retry budget and re-enables
    /// auto-reconnect after a previous manual close.
    pub fn connect(&self) {
        let previous = {
            let mut st = self.shared.state.borrow_mut();
            st.manual_close = false;
            st.retries_exhausted = false;
            st.retry_count = 0;
            st.reconnect_timer = None;
            st.session.take()
        };
        if let Some(session) = previous {
            debug_log!("Replacing session {} with a fresh connection", session.generation);
            session.socket.close(CLOSE_NORMAL, "reconnecting");
        }
        self.open_session();
    }

    /// Best-effort write.  Returns whether the socket accepted the frame.
    pub fn send(&self, text: &str) -> bool {
        let st = self.shared.state.borrow();
        let Some(session) = st.session.as_ref().filter(|_| st.state == ConnectionState::Open) else {
            if st.config.debug {
                warn_log!("send(): socket not open ({})", st.state);
            }
            return false;
        };
        match session.socket.send_text(text) {
            Ok(()) => true,
            Err(e) => {
                error_log!("send() failed: {}", e);
                false
            }
        }
    }

    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        match serde_json::to_string(value) {
            Ok(text) => self.send(&text),
            Err(e) => {
                error_log!("Failed to serialize outbound frame: {}", e);
                false
            }
        }
    }

    /// User-initiated shutdown.  Disables auto-reconnect; the state passes
    /// through `closing` when a socket was open.
    pub fn close(&self) {
        let closing_socket = {
            let mut st = self.shared.state.borrow_mut();
            st.manual_close = true;
            st.reconnect_timer = None;
            st.stop_heartbeat();
            if st.state == ConnectionState::Open && st.session.is_some() {
                true
            } else {
                if let Some(session) = st.session.take() {
                    session.socket.close(CLOSE_NORMAL, "client closed");
                }
                false
            }
        };

        if closing_socket {
            self.transition(ConnectionState::Closing);
            if let Some(session) = self.shared.state.borrow().session.as_ref() {
                session.socket.close(CLOSE_NORMAL, "client closed");
            }
        } else {
            self.transition(ConnectionState::Closed);
        }
    }

    /// Synchronous teardown for when the owner goes away: no timers, no
    /// socket, no reconnects survive this call.
    pub fn shutdown(&self) {
        self.close();
        let session = self.shared.state.borrow_mut().session.take();
        drop(session);
        self.transition(ConnectionState::Closed);
    }

    fn open_session(&self) {
        let (url, generation) = {
            let mut st = self.shared.state.borrow_mut();
            st.active_generation += 1;
            (st.config.url.clone(), st.active_generation)
        };
        self.transition(ConnectionState::Connecting);

        let events = SessionEvents {
            manager: Rc::downgrade(&self.shared),
            generation,
        };
        match self.shared.connector.open(&url, events) {
            Ok(socket) => {
                self.shared.state.borrow_mut().session = Some(Session {
                    generation,
                    socket,
                    heartbeat: None,
                    opened_at: None,
                });
            }
            Err(e) => {
                error_log!("Failed to open socket: {}", e);
                self.handle_closed(generation, CloseInfo::abnormal(e.to_string()));
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.shared.state.borrow().active_generation == generation
    }

    fn handle_opened(&self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }
        let heartbeat_ms = {
            let mut st = self.shared.state.borrow_mut();
            st.retry_count = 0;
            st.retries_exhausted = false;
            if st.config.debug {
                debug_log!("[WS] open: {}", st.config.url);
            }
            st.config.heartbeat_interval_ms
        };

        let heartbeat = (heartbeat_ms > 0).then(|| {
            let weak = Rc::downgrade(&self.shared);
            self.shared.timers.set_interval(
                heartbeat_ms,
                Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        ConnectionManager { shared }.send_heartbeat();
                    }
                }),
            )
        });

        {
            let mut st = self.shared.state.borrow_mut();
            if let Some(session) = st.session.as_mut().filter(|s| s.generation == generation) {
                session.heartbeat = heartbeat;
                session.opened_at = Some(Utc::now());
            }
        }
        self.transition(ConnectionState::Open);
    }

    fn send_heartbeat(&self) {
        let st = self.shared.state.borrow();
        if st.state != ConnectionState::Open {
            return;
        }
        if let Some(session) = st.session.as_ref() {
            if let Err(e) = session.socket.send_text(HEARTBEAT_FRAME) {
                warn_log!("Failed to send heartbeat: {}", e);
            }
        }
    }

    fn handle_message(&self, generation: u64, text: String) {
        if !self.is_current(generation) {
            return;
        }
        let handler = self.shared.state.borrow().frame_handler.clone();
        let frame = InboundFrame::parse(text);
        if frame.json.is_none() {
            debug_log!("[WS message RAW] {}", frame.raw);
        }
        match handler {
            Some(handler) => handler(frame),
            None => debug_log!("No frame handler registered; dropping frame"),
        }
    }

    fn handle_error(&self, generation: u64, detail: &str) {
        if self.is_current(generation) && self.shared.state.borrow().config.debug {
            warn_log!("[WS] error: {}", detail);
        }
    }

    fn handle_closed(&self, generation: u64, info: CloseInfo) {
        if !self.is_current(generation) {
            return;
        }
        let should_retry = {
            let mut st = self.shared.state.borrow_mut();
            // Heartbeat first so nothing writes to a dead channel.
            st.stop_heartbeat();
            st.session = None;
            if st.config.debug {
                debug_log!(
                    "[WS] closed: code={} reason={} wasClean={}",
                    info.code,
                    if info.reason.is_empty() { "-" } else { info.reason.as_str() },
                    info.was_clean
                );
            }
            st.config.auto_reconnect && !st.manual_close
        };
        self.transition(ConnectionState::Closed);

        if should_retry {
            self.schedule_reconnect();
        }
    }

    /// Schedule the next attempt with exponential backoff, or give up once
    /// `max_retries` is spent.
    fn schedule_reconnect(&self) {
        let delay = {
            let mut st = self.shared.state.borrow_mut();
            let retry = st.retry_count;
            if st.config.retries_exhausted(retry) {
                st.retries_exhausted = true;
                error_log!("[WS] max retries reached, giving up.");
                None
            } else {
                st.retry_count = retry + 1;
                let delay = st.config.backoff_delay_ms(retry);
                if st.config.debug {
                    debug_log!("[WS] reconnect in {}ms (attempt {})", delay, retry + 1);
                }
                Some(delay)
            }
        };

        let Some(delay) = delay else {
            self.notify_status();
            return;
        };

        let weak = Rc::downgrade(&self.shared);
        let timer = self.shared.timers.set_timeout(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    ConnectionManager { shared }.reconnect_now();
                }
            }),
        );
        self.shared.state.borrow_mut().reconnect_timer = Some(timer);
        self.notify_status();
    }

    fn reconnect_now(&self) {
        let proceed = {
            let mut st = self.shared.state.borrow_mut();
            st.reconnect_timer = None;
            !st.manual_close && st.state == ConnectionState::Closed
        };
        if proceed {
            self.open_session();
        }
    }

    fn transition(&self, next: ConnectionState) {
        {
            let mut st = self.shared.state.borrow_mut();
            if st.state == next {
                return;
            }
            st.state = next;
        }
        self.notify_status();
    }

    fn notify_status(&self) {
        let (listeners, status) = {
            let st = self.shared.state.borrow();
            (st.status_listeners.clone(), st.status())
        };
        for listener in listeners {
            listener(&status);
        }
    }
}

/// Event sink handed to a `Connector` for one connect attempt.  Events from
/// an attempt that has since been replaced are ignored.
#[derive(Clone)]
pub struct SessionEvents {
    manager: Weak<Shared>,
    generation: u64,
}

impl SessionEvents {
    fn manager(&self) -> Option<ConnectionManager> {
        self.manager.upgrade().map(|shared| ConnectionManager { shared })
    }

    pub fn opened(&self) {
        if let Some(manager) = self.manager() {
            manager.handle_opened(self.generation);
        }
    }

    pub fn message(&self, text: String) {
        if let Some(manager) = self.manager() {
            manager.handle_message(self.generation, text);
        }
    }

    pub fn errored(&self, detail: &str) {
        if let Some(manager) = self.manager() {
            manager.handle_error(self.generation, detail);
        }
    }

    pub fn closed(&self, info: CloseInfo) {
        if let Some(manager) = self.manager() {
            manager.handle_closed(self.generation, info);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::network::timer::ManualTimers;
    use crate::network::transport::ScriptedConnector;

    fn manager_with(config: WsConfig) -> (ConnectionManager, Rc<ScriptedConnector>, ManualTimers) {
        let connector = Rc::new(ScriptedConnector::new());
        let timers = ManualTimers::new();
        let manager = ConnectionManager::new(config, connector.clone(), Rc::new(timers.clone()));
        (manager, connector, timers)
    }

    fn test_config() -> WsConfig {
        WsConfig {
            url: "ws://orchestrator.test/ws".into(),
            debug: false,
            ..WsConfig::default()
        }
    }

    #[test]
    fn starts_idle_and_opens() {
        let (manager, connector, _timers) = manager_with(test_config());
        assert_eq!(manager.connection_state(), ConnectionState::Idle);

        manager.connect();
        assert_eq!(manager.connection_state(), ConnectionState::Connecting);
        assert_eq!(connector.latest().url(), "ws://orchestrator.test/ws");

        connector.latest().accept();
        assert_eq!(manager.connection_state(), ConnectionState::Open);
        assert!(manager.opened_at().is_some());
    }

    #[test]
    fn send_reports_failure_instead_of_panicking() {
        let (manager, connector, _timers) = manager_with(test_config());
        assert!(!manager.send("before connect"));

        manager.connect();
        assert!(!manager.send("while connecting"));

        connector.latest().accept();
        assert!(manager.send("hello"));
        assert_eq!(connector.latest().sent(), vec!["hello".to_string()]);
    }

    #[test]
    fn reconnect_delays_follow_capped_backoff() {
        let (manager, connector, timers) = manager_with(WsConfig {
            heartbeat_interval_ms: 0,
            ..test_config()
        });
        manager.connect();

        // Every attempt fails before the handshake completes.
        for _ in 0..6 {
            connector.latest().drop_connection();
            assert_eq!(manager.connection_state(), ConnectionState::Closed);
            assert!(manager.status().reconnect_scheduled);
            timers.advance(10_000);
        }
        assert_eq!(timers.timeout_delays(), vec![750, 1500, 3000, 6000, 10_000, 10_000]);
        assert_eq!(connector.attempts(), 7);
    }

    #[test]
    fn successful_open_resets_the_retry_counter() {
        let (manager, connector, timers) = manager_with(test_config());
        manager.connect();
        connector.latest().drop_connection();
        timers.advance(750);
        connector.latest().drop_connection();
        timers.advance(1500);
        assert_eq!(manager.status().retry_count, 2);

        connector.latest().accept();
        assert_eq!(manager.status().retry_count, 0);

        connector.latest().drop_connection();
        assert_eq!(timers.timeout_delays().last(), Some(&750));
    }

    #[test]
    fn exhausting_max_retries_is_terminal() {
        let (manager, connector, timers) = manager_with(WsConfig {
            max_retries: Some(2),
            ..test_config()
        });
        manager.connect();
        connector.latest().drop_connection();
        timers.advance(750);
        connector.latest().drop_connection();
        timers.advance(1500);
        connector.latest().drop_connection();
        timers.advance(60_000);

        let status = manager.status();
        assert_eq!(status.state, ConnectionState::Closed);
        assert!(status.retries_exhausted);
        assert!(!status.reconnect_scheduled);
        assert_eq!(connector.attempts(), 3);
    }

    #[test]
    fn manual_close_never_schedules_a_reconnect() {
        let (manager, connector, timers) = manager_with(test_config());
        manager.connect();
        connector.latest().accept();

        manager.close();
        assert_eq!(manager.connection_state(), ConnectionState::Closing);
        assert_eq!(connector.latest().client_close().map(|c| c.0), Some(CLOSE_NORMAL));

        connector.latest().finish_close();
        assert_eq!(manager.connection_state(), ConnectionState::Closed);

        timers.advance(120_000);
        assert_eq!(connector.attempts(), 1);
        assert!(!manager.status().reconnect_scheduled);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn close_cancels_an_already_scheduled_reconnect() {
        let (manager, connector, timers) = manager_with(test_config());
        manager.connect();
        connector.latest().drop_connection();
        assert!(manager.status().reconnect_scheduled);

        manager.close();
        timers.advance(60_000);
        assert_eq!(connector.attempts(), 1);
        assert_eq!(manager.connection_state(), ConnectionState::Closed);
    }

    #[test]
    fn heartbeat_pings_while_open_and_stops_on_disconnect() {
        let (manager, connector, timers) = manager_with(WsConfig {
            heartbeat_interval_ms: 1000,
            ..test_config()
        });
        manager.connect();
        let socket = connector.latest();
        socket.accept();

        timers.advance(3500);
        assert_eq!(socket.sent(), vec!["ping", "ping", "ping"]);

        socket.drop_connection();
        // Only the reconnect timer is left armed.
        assert_eq!(timers.pending(), 1);
        assert_eq!(socket.sent().len(), 3);
    }

    #[test]
    fn zero_interval_disables_heartbeat() {
        let (manager, connector, timers) = manager_with(WsConfig {
            heartbeat_interval_ms: 0,
            ..test_config()
        });
        manager.connect();
        connector.latest().accept();
        timers.advance(100_000);
        assert!(connector.latest().sent().is_empty());
    }

    #[test]
    fn refused_connections_go_through_backoff() {
        let (manager, connector, timers) = manager_with(test_config());
        connector.refuse_connections(true);
        manager.connect();
        assert_eq!(manager.connection_state(), ConnectionState::Closed);
        assert!(manager.status().reconnect_scheduled);

        connector.refuse_connections(false);
        timers.advance(750);
        connector.latest().accept();
        assert_eq!(manager.connection_state(), ConnectionState::Open);
    }

    #[test]
    fn events_from_replaced_sessions_are_ignored() {
        let (manager, connector, _timers) = manager_with(test_config());
        manager.connect();
        let stale = connector.latest();
        manager.connect();
        let fresh = connector.latest();

        stale.accept();
        assert_eq!(manager.connection_state(), ConnectionState::Connecting);
        fresh.accept();
        assert_eq!(manager.connection_state(), ConnectionState::Open);
        stale.drop_connection();
        assert_eq!(manager.connection_state(), ConnectionState::Open);
    }

    #[test]
    fn frames_reach_the_handler_parsed_and_raw() {
        let (manager, connector, _timers) = manager_with(test_config());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        manager.set_frame_handler(Rc::new(move |frame: InboundFrame| {
            sink.borrow_mut().push((frame.raw.clone(), frame.json.is_some()));
        }));
        manager.connect();
        connector.latest().accept();
        connector.latest().push(r#"{"type":"hello"}"#);
        connector.latest().push("pong");

        assert_eq!(
            *seen.borrow(),
            vec![(r#"{"type":"hello"}"#.to_string(), true), ("pong".to_string(), false)]
        );
    }

    #[test]
    fn status_listeners_see_every_transition() {
        let (manager, connector, _timers) = manager_with(test_config());
        let states = Rc::new(RefCell::new(Vec::new()));
        let sink = states.clone();
        manager.add_status_listener(Rc::new(move |s: &ConnectionStatus| sink.borrow_mut().push(s.state)));

        manager.connect();
        connector.latest().accept();
        manager.close();
        connector.latest().finish_close();

        assert_eq!(
            *states.borrow(),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Open,
                ConnectionState::Closing,
                ConnectionState::Closed,
            ]
        );
    }

    #[test]
    fn shutdown_leaves_no_timers_behind() {
        let (manager, connector, timers) = manager_with(WsConfig {
            heartbeat_interval_ms: 1000,
            ..test_config()
        });
        manager.connect();
        connector.latest().accept();
        manager.shutdown();

        assert_eq!(manager.connection_state(), ConnectionState::Closed);
        assert_eq!(timers.pending(), 0);
        // A late close event from the dropped socket changes nothing.
        connector.latest().finish_close();
        timers.advance(60_000);
        assert_eq!(connector.attempts(), 1);
    }
}
