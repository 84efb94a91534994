//! Node catalog: the palette of instantiable node types pushed by the
//! orchestrator.  Replaced wholesale on every push, never patched.

use std::cmp::Ordering;

use jsonschema::JSONSchema;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{debug_log, warn_log};

lazy_static! {
    static ref PALETTE_ITEM_SCHEMA: JSONSchema = {
        let raw = include_str!("schema/palette_item_schema.json");
        let parsed: Value = serde_json::from_str(raw)
            .expect("Palette item JSON schema must be valid JSON");
        JSONSchema::compile(&parsed).expect("valid palette item schema")
    };
}

/// One entry of the catalog push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawPaletteItem")]
pub struct NodePaletteItem {
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    pub default_data: Value,
}

/// Wire form of a palette item.  Both spellings of the template field are
/// accepted; `defaultData` wins when both are present.
#[derive(Deserialize)]
struct RawPaletteItem {
    #[serde(rename = "type")]
    node_type: String,
    label: String,
    #[serde(rename = "defaultData", default)]
    default_data: Option<Value>,
    #[serde(rename = "default_data", default)]
    default_data_snake: Option<Value>,
}

impl From<RawPaletteItem> for NodePaletteItem {
    fn from(raw: RawPaletteItem) -> Self {
        NodePaletteItem {
            node_type: raw.node_type,
            label: raw.label,
            default_data: raw
                .default_data
                .or(raw.default_data_snake)
                .unwrap_or(Value::Null),
        }
    }
}

/// Validate one raw catalog entry.
pub fn validate_palette_item(value: &Value) -> bool {
    PALETTE_ITEM_SCHEMA.validate(value).is_ok()
}

#[derive(Debug, Default)]
pub struct NodeCatalog {
    items: Vec<NodePaletteItem>,
    revision: u64,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[NodePaletteItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the whole catalog.  Entries failing validation are dropped
    /// silently; the rest are sorted by label.  Returns how many were kept.
    pub fn replace(&mut self, raw_items: &[Value]) -> usize {
        let mut items: Vec<NodePaletteItem> = raw_items
            .iter()
            .filter(|raw| validate_palette_item(raw))
            .filter_map(|raw| serde_json::from_value(raw.clone()).ok())
            .collect();

        let dropped = raw_items.len() - items.len();
        if dropped > 0 {
            warn_log!("Catalog push: ignored {} invalid item(s)", dropped);
        }

        items.sort_by(|a, b| locale_compare(&a.label, &b.label));
        self.items = items;
        self.revision += 1;
        debug_log!("Catalog replaced with {} node type(s)", self.items.len());
        self.items.len()
    }

    /// Apply a `NODE_CONFIG` frame.  Frames without an array `payload` are
    /// ignored and return `None`.
    pub fn apply_push(&mut self, msg: &Value) -> Option<usize> {
        let payload = msg.get("payload")?.as_array()?;
        Some(self.replace(payload))
    }

    pub fn lookup(&self, node_type: &str) -> Option<&NodePaletteItem> {
        self.items.iter().find(|item| item.node_type == node_type)
    }
}

/// Locale-aware label ordering (`String.prototype.localeCompare` in the
/// browser).
#[cfg(target_arch = "wasm32")]
fn locale_compare(a: &str, b: &str) -> Ordering {
    let result = js_sys::JsString::from(a).locale_compare(b, &js_sys::Array::new(), &js_sys::Object::new());
    result.cmp(&0)
}

/// Case-insensitive ordering with a byte-wise tiebreak off the browser.
#[cfg(not(target_arch = "wasm32"))]
fn locale_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalid_items_are_filtered_not_fatal() {
        let mut catalog = NodeCatalog::new();
        let kept = catalog.replace(&[
            json!({"type": "add", "label": "Add", "defaultData": {"inputsMode": "n"}}),
            json!({"type": "", "label": "Empty type"}),
            json!({"type": "sub"}),
            json!({"type": 3, "label": "Numeric"}),
            json!("not an object"),
            json!({"type": "play", "label": "Play", "default_data": {"value": "x"}}),
        ]);
        assert_eq!(kept, 2);
        assert_eq!(catalog.lookup("play").unwrap().default_data, json!({"value": "x"}));
        assert!(catalog.lookup("sub").is_none());
    }

    #[test]
    fn item_with_both_template_spellings_is_kept() {
        let mut catalog = NodeCatalog::new();
        let kept = catalog.replace(&[json!({
            "type": "add",
            "label": "Add",
            "defaultData": {"inputsMode": "n"},
            "default_data": {"inputsMode": 1}
        })]);
        assert_eq!(kept, 1);
        assert_eq!(catalog.lookup("add").unwrap().default_data, json!({"inputsMode": "n"}));

        let out = serde_json::to_value(catalog.lookup("add").unwrap()).unwrap();
        assert_eq!(out["defaultData"], json!({"inputsMode": "n"}));
        assert!(out.get("default_data").is_none());
    }

    #[test]
    fn items_are_sorted_by_label() {
        let mut catalog = NodeCatalog::new();
        catalog.replace(&[
            json!({"type": "t", "label": "text"}),
            json!({"type": "a", "label": "Add"}),
            json!({"type": "s", "label": "Subtract"}),
            json!({"type": "b", "label": "browse"}),
        ]);
        let labels: Vec<&str> = catalog.items().iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Add", "browse", "Subtract", "text"]);
    }

    #[test]
    fn each_push_replaces_the_previous_catalog() {
        let mut catalog = NodeCatalog::new();
        catalog.replace(&[json!({"type": "add", "label": "Add"})]);
        catalog.replace(&[json!({"type": "sub", "label": "Subtract"})]);
        assert!(catalog.lookup("add").is_none());
        assert!(catalog.lookup("sub").is_some());
        assert_eq!(catalog.revision(), 2);
    }

    #[test]
    fn push_frames_need_an_array_payload() {
        let mut catalog = NodeCatalog::new();
        assert_eq!(catalog.apply_push(&json!({"type": "NODE_CONFIG", "payload": {}})), None);
        assert_eq!(
            catalog.apply_push(&json!({"type": "NODE_CONFIG", "payload": [{"type": "x", "label": "X"}]})),
            Some(1)
        );
    }
}
