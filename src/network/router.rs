//! Correlated request/reply and pub/sub routing on top of the connection
//! manager.
//!
//! Every inbound frame takes exactly one path: a frame whose `replyTo`
//! matches an outstanding request resolves that request and nothing else
//! sees it; everything else is broadcast to matching subscribers.
//!
//! **Borrowing caveat** – handlers are cloned out of the router state and
//! invoked after the borrow is dropped, so a handler may subscribe,
//! unsubscribe or send without tripping a `BorrowMutError`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use futures::channel::oneshot;
use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use serde_json::Value;
use uuid::Uuid;

use super::timer::{TimerHandle, TimerHost};
use super::transport::InboundFrame;
use super::ws_client::ConnectionManager;
use crate::constants::{
    REPLY_TO_FIELD, REPLY_TO_FIELD_ALT, REQUEST_ID_ECHO_FIELD, REQUEST_ID_FIELD,
    REQUEST_ID_PREFIX, STATUS_FIELD, STATUS_OK,
};
use crate::error::RouterError;
use crate::{debug_log, warn_log};

/// Handler for uncorrelated JSON frames
pub type MessageHandler = Rc<RefCell<dyn FnMut(Value)>>;
/// Selects which uncorrelated frames a subscriber receives
pub type MessagePredicate = Rc<dyn Fn(&Value) -> bool>;
/// Handler for frames that are not JSON (e.g. `pong`)
pub type RawHandler = Rc<RefCell<dyn FnMut(String)>>;

pub type Reply = Result<Value, RouterError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// One outstanding correlated request.
struct PendingRequest {
    created_at: DateTime<Utc>,
    responder: oneshot::Sender<Reply>,
    // Dropping the handle clears the timeout.
    _timeout: TimerHandle,
}

struct Subscriber {
    id: SubscriptionId,
    predicate: MessagePredicate,
    handler: MessageHandler,
}

#[derive(Default)]
struct RouterState {
    pending: HashMap<String, PendingRequest>,
    subscribers: Vec<Subscriber>,
    raw_subscribers: Vec<(SubscriptionId, RawHandler)>,
    next_subscription: u64,
}

impl RouterState {
    fn next_id(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        SubscriptionId(self.next_subscription)
    }
}

struct RouterShared {
    connection: ConnectionManager,
    timers: Rc<dyn TimerHost>,
    state: RefCell<RouterState>,
}

#[derive(Clone)]
pub struct MessageRouter {
    shared: Rc<RouterShared>,
}

impl MessageRouter {
    /// Create a router and install it as the connection's frame handler.
    pub fn attach(connection: ConnectionManager, timers: Rc<dyn TimerHost>) -> Self {
        let shared = Rc::new(RouterShared {
            connection: connection.clone(),
            timers,
            state: RefCell::new(RouterState::default()),
        });
        let weak: Weak<RouterShared> = Rc::downgrade(&shared);
        connection.set_frame_handler(Rc::new(move |frame: InboundFrame| {
            if let Some(shared) = weak.upgrade() {
                MessageRouter { shared }.route(frame);
            }
        }));
        Self { shared }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.shared.connection
    }

    /// Fire-and-forget JSON send.
    pub fn send(&self, payload: &Value) -> bool {
        self.shared.connection.send_json(payload)
    }

    /// Send `payload` with a fresh `reqId` and wait for the reply echoing it.
    ///
    /// Resolves with the whole reply frame when its `status` is `ok` (or
    /// absent), rejects with `Remote` for any other status, `Timeout` when
    /// nothing arrives within `timeout_ms` (the connection default when
    /// `None`), and `NotConnected` when the socket refused the write.
    pub fn send_correlated(
        &self,
        payload: Value,
        timeout_ms: Option<u32>,
    ) -> LocalBoxFuture<'static, Reply> {
        let mut fields = match payload {
            Value::Object(fields) => fields,
            other => {
                let kind = json_kind(&other);
                return future::ready(Err(RouterError::InvalidPayload(kind.into()))).boxed_local();
            }
        };

        let request_id = format!("{}{}", REQUEST_ID_PREFIX, Uuid::new_v4());
        fields.insert(REQUEST_ID_FIELD.into(), Value::String(request_id.clone()));
        let timeout_ms =
            timeout_ms.unwrap_or_else(|| self.shared.connection.config().request_timeout_ms);

        let (tx, rx) = oneshot::channel();
        let weak = Rc::downgrade(&self.shared);
        let timer_id = request_id.clone();
        let timeout = self.shared.timers.set_timeout(
            timeout_ms,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    MessageRouter { shared }.expire(&timer_id, timeout_ms);
                }
            }),
        );

        self.shared.state.borrow_mut().pending.insert(
            request_id.clone(),
            PendingRequest {
                created_at: Utc::now(),
                responder: tx,
                _timeout: timeout,
            },
        );

        if !self.shared.connection.send_json(&Value::Object(fields)) {
            let entry = self.shared.state.borrow_mut().pending.remove(&request_id);
            drop(entry);
            return future::ready(Err(RouterError::NotConnected)).boxed_local();
        }

        rx.map(|reply| reply.unwrap_or(Err(RouterError::Cancelled)))
            .boxed_local()
    }

    /// Register a durable listener for uncorrelated frames.
    pub fn subscribe(&self, predicate: MessagePredicate, handler: MessageHandler) -> SubscriptionId {
        let mut st = self.shared.state.borrow_mut();
        let id = st.next_id();
        st.subscribers.push(Subscriber {
            id,
            predicate,
            handler,
        });
        id
    }

    /// Subscribe to every frame whose `type` equals `message_type`.
    pub fn subscribe_type(&self, message_type: &str, handler: MessageHandler) -> SubscriptionId {
        let wanted = message_type.to_string();
        self.subscribe(
            Rc::new(move |msg: &Value| msg.get("type").and_then(Value::as_str) == Some(wanted.as_str())),
            handler,
        )
    }

    /// Receive frames that failed to parse as JSON.
    pub fn subscribe_raw(&self, handler: RawHandler) -> SubscriptionId {
        let mut st = self.shared.state.borrow_mut();
        let id = st.next_id();
        st.raw_subscribers.push((id, handler));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut st = self.shared.state.borrow_mut();
        let before = st.subscribers.len() + st.raw_subscribers.len();
        st.subscribers.retain(|s| s.id != id);
        st.raw_subscribers.retain(|(sid, _)| *sid != id);
        before != st.subscribers.len() + st.raw_subscribers.len()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.state.borrow().pending.len()
    }

    /// Reject every outstanding request with `Cancelled` and clear their
    /// timers.
    pub fn cancel_all(&self) {
        let drained: Vec<PendingRequest> = {
            let mut st = self.shared.state.borrow_mut();
            st.pending.drain().map(|(_, p)| p).collect()
        };
        if !drained.is_empty() {
            debug_log!("Cancelling {} pending request(s)", drained.len());
        }
        for pending in drained {
            let _ = pending.responder.send(Err(RouterError::Cancelled));
        }
    }

    fn expire(&self, request_id: &str, timeout_ms: u32) {
        let entry = self.shared.state.borrow_mut().pending.remove(request_id);
        if let Some(pending) = entry {
            warn_log!("Request {} timed out after {} ms", request_id, timeout_ms);
            let _ = pending.responder.send(Err(RouterError::Timeout {
                request_id: request_id.to_string(),
                timeout_ms,
            }));
        }
    }

    fn route(&self, frame: InboundFrame) {
        let Some(msg) = frame.json else {
            self.dispatch_raw(frame.raw);
            return;
        };

        if let Some(request_id) = correlation_id(&msg).map(str::to_string) {
            let entry = self.shared.state.borrow_mut().pending.remove(&request_id);
            if let Some(pending) = entry {
                let elapsed = (Utc::now() - pending.created_at).num_milliseconds();
                debug_log!("Reply for {} after {} ms", request_id, elapsed);
                let _ = pending.responder.send(reply_outcome(&request_id, msg));
                return;
            }
            debug_log!("Reply for unknown or expired request {}", request_id);
        }

        self.dispatch(msg);
    }

    fn dispatch(&self, msg: Value) {
        let handlers: Vec<MessageHandler> = {
            let st = self.shared.state.borrow();
            st.subscribers
                .iter()
                .filter(|s| (s.predicate)(&msg))
                .map(|s| s.handler.clone())
                .collect()
        };

        if handlers.is_empty() {
            debug_log!(
                "Dropping unmatched frame of type {}",
                msg.get("type").and_then(Value::as_str).unwrap_or("<none>")
            );
            return;
        }

        for handler in handlers {
            match handler.try_borrow_mut() {
                Ok(mut h) => h(msg.clone()),
                Err(_) => warn_log!("Subscriber is already running; skipping re-entrant frame"),
            }
        }
    }

    fn dispatch_raw(&self, raw: String) {
        let handlers: Vec<RawHandler> = self
            .shared
            .state
            .borrow()
            .raw_subscribers
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        if handlers.is_empty() {
            debug_log!("Dropping non-JSON frame: {}", raw);
            return;
        }
        for handler in handlers {
            if let Ok(mut h) = handler.try_borrow_mut() {
                h(raw.clone());
            }
        }
    }
}

fn correlation_id(msg: &Value) -> Option<&str> {
    [REPLY_TO_FIELD, REPLY_TO_FIELD_ALT, REQUEST_ID_ECHO_FIELD]
        .iter()
        .find_map(|field| msg.get(*field).and_then(Value::as_str))
}

fn reply_outcome(request_id: &str, msg: Value) -> Reply {
    match msg.get(STATUS_FIELD).and_then(Value::as_str) {
        None | Some(STATUS_OK) => Ok(msg),
        Some(status) => Err(RouterError::Remote {
            request_id: request_id.to_string(),
            status: status.to_string(),
            message: msg
                .get("message")
                .or_else(|| msg.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
