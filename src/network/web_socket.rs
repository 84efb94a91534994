//! Browser transport: `web_sys::WebSocket` behind the `Connector` seam.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

use super::transport::{CloseInfo, Connector, Socket};
use super::ws_client::SessionEvents;
use crate::error::TransportError;
use crate::warn_log;

#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

/// Keeps the JS handlers alive for exactly as long as the socket is owned.
struct BrowserSocket {
    ws: WebSocket,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(Event)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

impl Connector for WebSocketConnector {
    fn open(&self, url: &str, events: SessionEvents) -> Result<Box<dyn Socket>, TransportError> {
        let ws = WebSocket::new(url).map_err(|e| TransportError::Connect {
            url: url.to_string(),
            reason: format!("{:?}", e),
        })?;

        let ev = events.clone();
        let on_open = Closure::wrap(Box::new(move |_: Event| ev.opened()) as Box<dyn FnMut(Event)>);
        ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

        let ev = events.clone();
        let on_message = Closure::wrap(Box::new(move |event: MessageEvent| {
            match event.data().as_string() {
                Some(text) => ev.message(text),
                None => warn_log!("Received non-text WebSocket message"),
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        let ev = events.clone();
        let on_error = Closure::wrap(Box::new(move |e: Event| {
            ev.errored(&e.type_());
        }) as Box<dyn FnMut(Event)>);
        ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        let ev = events;
        let on_close = Closure::wrap(Box::new(move |e: CloseEvent| {
            ev.closed(CloseInfo {
                code: e.code(),
                reason: e.reason(),
                was_clean: e.was_clean(),
            });
        }) as Box<dyn FnMut(CloseEvent)>);
        ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        Ok(Box::new(BrowserSocket {
            ws,
            _on_open: on_open,
            _on_message: on_message,
            _on_error: on_error,
            _on_close: on_close,
        }))
    }
}

impl Socket for BrowserSocket {
    fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.ws
            .send_with_str(text)
            .map_err(|e| TransportError::Send(format!("{:?}", e)))
    }

    fn close(&self, code: u16, reason: &str) {
        if let Err(e) = self.ws.close_with_code_and_reason(code, reason) {
            warn_log!("WebSocket close failed: {:?}", e);
        }
    }

    fn is_open(&self) -> bool {
        self.ws.ready_state() == WebSocket::OPEN
    }
}

impl Drop for BrowserSocket {
    fn drop(&mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
        let state = self.ws.ready_state();
        if state == WebSocket::CONNECTING || state == WebSocket::OPEN {
            let _ = self.ws.close();
        }
    }
}
