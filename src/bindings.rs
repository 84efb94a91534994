//! JavaScript façade.  The rendering layer holds one `EditorHandle` and
//! calls into it for every gesture; snapshots come back as plain JS objects.

use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::graph::{DragOutcome, HandleKind, Position, Viewport};
use crate::network::config::resolve_ws_url;
use crate::network::{ConnectionStatus, WsConfig};
use crate::session::{Change, EditorSession};
use crate::error_log;

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid argument: {}", e)))
}

fn err_to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct EditorHandle {
    session: Rc<EditorSession>,
}

#[wasm_bindgen]
impl EditorHandle {
    /// `options` is an optional camelCase `WsConfig` object.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<EditorHandle, JsValue> {
        let mut config: WsConfig = if options.is_undefined() || options.is_null() {
            WsConfig::default()
        } else {
            from_js(options)?
        };
        config.url = resolve_ws_url(Some(&config.url));
        Ok(EditorHandle {
            session: Rc::new(EditorSession::browser(config)),
        })
    }

    pub fn connect(&self) {
        self.session.connect();
    }

    pub fn close(&self) {
        self.session.close();
    }

    /// Tear everything down; the handle stays usable for reads only.
    pub fn shutdown(&self) {
        self.session.shutdown();
    }

    pub fn status(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.status())
    }

    #[wasm_bindgen(js_name = onStatus)]
    pub fn on_status(&self, callback: js_sys::Function) {
        self.session
            .connection()
            .add_status_listener(Rc::new(move |status: &ConnectionStatus| {
                let Ok(arg) = to_js(status) else { return };
                if let Err(e) = callback.call1(&JsValue::NULL, &arg) {
                    error_log!("status callback threw: {:?}", e);
                }
            }));
    }

    /// `callback("graph" | "catalog")` after every change.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: js_sys::Function) {
        self.session.add_change_listener(Rc::new(move |change: Change| {
            let kind = match change {
                Change::Graph => "graph",
                Change::Catalog => "catalog",
            };
            if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(kind)) {
                error_log!("change callback threw: {:?}", e);
            }
        }));
    }

    pub fn graph(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.graph().snapshot())
    }

    pub fn palette(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.catalog().items())
    }

    #[wasm_bindgen(js_name = beginConnection)]
    pub fn begin_connection(&self, node_id: &str, handle_id: Option<String>, from_source: bool) {
        let kind = if from_source { HandleKind::Source } else { HandleKind::Target };
        self.session.begin_connection(node_id, handle_id.as_deref(), kind);
    }

    /// Returns the pending connection when the type prompt should open,
    /// otherwise `null`.  `viewport` is `{x, y, zoom}`.
    #[wasm_bindgen(js_name = endConnection)]
    pub fn end_connection(&self, screen_x: f64, screen_y: f64, over_port: bool, viewport: JsValue) -> Result<JsValue, JsValue> {
        let view: Viewport = if viewport.is_undefined() || viewport.is_null() {
            Viewport::default()
        } else {
            from_js(viewport)?
        };
        match self.session.end_connection(Position::new(screen_x, screen_y), over_port, &view) {
            DragOutcome::PromptForType(pending) => to_js(&pending),
            DragOutcome::Discarded => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = chooseNodeType)]
    pub fn choose_node_type(&self, node_type: &str) -> Result<JsValue, JsValue> {
        let created = self.session.choose_node_type(node_type).map_err(err_to_js)?;
        to_js(&created)
    }

    #[wasm_bindgen(js_name = cancelPending)]
    pub fn cancel_pending(&self) -> bool {
        self.session.cancel_pending()
    }

    #[wasm_bindgen(js_name = addNodeAt)]
    pub fn add_node_at(&self, node_type: &str, x: f64, y: f64) -> Result<String, JsValue> {
        self.session
            .add_node_at(node_type, Position::new(x, y))
            .map_err(err_to_js)
    }

    #[wasm_bindgen(js_name = connectPorts)]
    pub fn connect_ports(
        &self,
        source: &str,
        source_handle: Option<String>,
        target: &str,
        target_handle: Option<String>,
    ) -> Result<String, JsValue> {
        self.session
            .connect_ports(source, source_handle.as_deref(), target, target_handle.as_deref())
            .map_err(err_to_js)
    }

    /// `ids` is an array of edge ids.
    #[wasm_bindgen(js_name = removeEdges)]
    pub fn remove_edges(&self, ids: JsValue) -> Result<usize, JsValue> {
        let ids: Vec<String> = from_js(ids)?;
        Ok(self.session.remove_edges(&ids))
    }

    /// `ids` is an array of node ids; incident edges go with them.
    #[wasm_bindgen(js_name = removeNodes)]
    pub fn remove_nodes(&self, ids: JsValue) -> Result<JsValue, JsValue> {
        let ids: Vec<String> = from_js(ids)?;
        to_js(&self.session.remove_nodes(&ids))
    }

    #[wasm_bindgen(js_name = moveNode)]
    pub fn move_node(&self, id: &str, x: f64, y: f64) -> Result<(), JsValue> {
        self.session.move_node(id, Position::new(x, y)).map_err(err_to_js)
    }

    #[wasm_bindgen(js_name = setNodeValue)]
    pub fn set_node_value(&self, id: &str, value: JsValue) -> Result<(), JsValue> {
        let value: serde_json::Value = from_js(value)?;
        self.session.set_node_value(id, value).map_err(err_to_js)
    }

    /// Resolves to `true` when loaded, `false` when the workspace is missing.
    #[wasm_bindgen(js_name = loadWorkspace)]
    pub fn load_workspace(&self, name: String) -> js_sys::Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let loaded = session.load_workspace(&name).await.map_err(err_to_js)?;
            Ok(JsValue::from_bool(loaded))
        })
    }

    #[wasm_bindgen(js_name = saveWorkspace)]
    pub fn save_workspace(&self, name: String) -> js_sys::Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            session.save_workspace(&name).await.map_err(err_to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn browse(&self, path: String) -> js_sys::Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let listing = session.browse(&path).await.map_err(err_to_js)?;
            to_js(&listing)
        })
    }

    #[wasm_bindgen(js_name = pingRoundtrip)]
    pub fn ping_roundtrip(&self) -> js_sys::Promise {
        let session = self.session.clone();
        future_to_promise(async move { Ok(JsValue::from_bool(session.ping_roundtrip().await)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn handle_starts_idle_with_empty_graph() {
        let handle = EditorHandle::new(JsValue::UNDEFINED).unwrap();
        let status: serde_json::Value = serde_wasm_bindgen::from_value(handle.status().unwrap()).unwrap();
        assert_eq!(status["state"], "idle");
        let graph: serde_json::Value = serde_wasm_bindgen::from_value(handle.graph().unwrap()).unwrap();
        assert_eq!(graph["nodes"].as_array().map(Vec::len), Some(0));
        handle.shutdown();
    }

    #[wasm_bindgen_test]
    fn unknown_node_type_is_reported_as_error() {
        let handle = EditorHandle::new(JsValue::UNDEFINED).unwrap();
        assert!(handle.add_node_at("nope", 0.0, 0.0).is_err());
        assert!(!handle.cancel_pending());
    }
}
