//! Graph data shapes shared by the store, the normalizer and the wire.
//!
//! Node data is read leniently: whatever the orchestrator or a stored
//! workspace hands us, deserialization never fails because of a malformed
//! mode, count or label.  Unknown fields are preserved in `extra`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::catalog::NodePaletteItem;
use crate::constants::{INPUT_HANDLE_PREFIX, OUTPUT_HANDLE_PREFIX};
use crate::warn_log;

/// Port shape of one side of a node: none, exactly one, or variadic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoMode {
    None,
    #[default]
    Single,
    Variadic,
}

impl IoMode {
    /// `0`, `1` and `"n"` are the only recognised encodings; anything else
    /// (absent, malformed, other numbers) reads as a single port.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) if n.as_f64() == Some(0.0) => IoMode::None,
            Value::String(s) if s == "n" => IoMode::Variadic,
            _ => IoMode::Single,
        }
    }

    pub fn to_value(self) -> Value {
        match self {
            IoMode::None => Value::from(0),
            IoMode::Single => Value::from(1),
            IoMode::Variadic => Value::from("n"),
        }
    }
}

impl Serialize for IoMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            IoMode::None => serializer.serialize_u8(0),
            IoMode::Single => serializer.serialize_u8(1),
            IoMode::Variadic => serializer.serialize_str("n"),
        }
    }
}

impl<'de> Deserialize<'de> for IoMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(IoMode::from_value(&value))
    }
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(count_from_value))
}

/// Finite, non-negative integral numbers only.
fn count_from_value(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64).then_some(f as u32)
}

fn lenient_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        _ => String::new(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Per-node payload.  `value` is edited through the store by node id; no
/// callbacks live in here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default, deserialize_with = "lenient_label")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub inputs_mode: IoMode,
    #[serde(default)]
    pub outputs_mode: IoMode,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub inputs_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub outputs_count: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeData {
    /// Fresh data for a node instantiated from a catalog entry: a deep copy
    /// of `defaultData`, the item label when none is set, and variadic
    /// counts seeded to at least 1.
    pub fn from_template(item: &NodePaletteItem) -> Self {
        let template = match &item.default_data {
            Value::Object(map) => Value::Object(map.clone()),
            _ => Value::Object(Map::new()),
        };
        let mut data: NodeData = serde_json::from_value(template).unwrap_or_else(|e| {
            warn_log!("defaultData for '{}' unreadable ({}); starting empty", item.node_type, e);
            NodeData::default()
        });

        if data.label.is_empty() {
            data.label = item.label.clone();
        }
        if data.inputs_mode == IoMode::Variadic {
            data.inputs_count = Some(data.inputs_count.unwrap_or(1).max(1));
        }
        if data.outputs_mode == IoMode::Variadic {
            data.outputs_count = Some(data.outputs_count.unwrap_or(1).max(1));
        }
        data
    }

    /// Number of ports rendered on the input side.
    pub fn input_port_count(&self) -> u32 {
        port_count(self.inputs_mode, self.inputs_count)
    }

    pub fn output_port_count(&self) -> u32 {
        port_count(self.outputs_mode, self.outputs_count)
    }
}

fn port_count(mode: IoMode, count: Option<u32>) -> u32 {
    match mode {
        IoMode::None => 0,
        IoMode::Single => 1,
        IoMode::Variadic => count.unwrap_or(1).max(1),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: NodeData,
    /// Renderer-owned fields (size, selection, class name) kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, position: Position, data: NodeData) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            position,
            data,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl GraphEdge {
    /// Same endpoints and handles, ignoring the id.
    pub fn same_connection(&self, other: &GraphEdge) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.source_handle == other.source_handle
            && self.target_handle == other.target_handle
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// A persisted graph: what `LOAD_WORKSPACE` returns and `SAVE_WORKSPACE`
/// stores.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Workspace {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

pub fn input_handle(index: u32) -> String {
    format!("{}{}", INPUT_HANDLE_PREFIX, index)
}

pub fn output_handle(index: u32) -> String {
    format!("{}{}", OUTPUT_HANDLE_PREFIX, index)
}

pub fn is_input_handle(handle: &str) -> bool {
    handle.starts_with(INPUT_HANDLE_PREFIX)
}

pub fn is_output_handle(handle: &str) -> bool {
    handle.starts_with(OUTPUT_HANDLE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(default_data: Value) -> NodePaletteItem {
        NodePaletteItem {
            node_type: "add".into(),
            label: "Add".into(),
            default_data,
        }
    }

    #[test]
    fn io_mode_reads_only_known_encodings() {
        assert_eq!(IoMode::from_value(&json!(0)), IoMode::None);
        assert_eq!(IoMode::from_value(&json!(1)), IoMode::Single);
        assert_eq!(IoMode::from_value(&json!("n")), IoMode::Variadic);
        for odd in [json!(2), json!("N"), json!("0"), json!(null), json!([]), json!(-1)] {
            assert_eq!(IoMode::from_value(&odd), IoMode::Single, "{odd}");
        }
    }

    #[test]
    fn malformed_node_data_still_deserializes() {
        let data: NodeData = serde_json::from_value(json!({
            "label": 42,
            "inputsMode": "n",
            "inputsCount": "three",
            "outputsMode": "bogus",
            "outputsCount": -2,
            "input_fields": [{"name": "a", "type": "text"}]
        }))
        .unwrap();
        assert_eq!(data.label, "");
        assert_eq!(data.inputs_mode, IoMode::Variadic);
        assert_eq!(data.inputs_count, None);
        assert_eq!(data.outputs_mode, IoMode::Single);
        assert_eq!(data.outputs_count, None);
        assert!(data.extra.contains_key("input_fields"));
    }

    #[test]
    fn template_copies_default_data_and_seeds_counts() {
        let data = NodeData::from_template(&item(json!({
            "inputsMode": "n",
            "inputsCount": 0,
            "outputsMode": 1,
            "value": "7"
        })));
        assert_eq!(data.label, "Add");
        assert_eq!(data.inputs_count, Some(1));
        assert_eq!(data.outputs_mode, IoMode::Single);
        assert_eq!(data.outputs_count, None);
        assert_eq!(data.value, Some(json!("7")));
    }

    #[test]
    fn template_keeps_its_own_label_and_larger_counts() {
        let data = NodeData::from_template(&item(json!({
            "label": "Sum",
            "outputsMode": "n",
            "outputsCount": 4
        })));
        assert_eq!(data.label, "Sum");
        assert_eq!(data.outputs_count, Some(4));
        assert_eq!(data.inputs_mode, IoMode::Single);
    }

    #[test]
    fn template_without_object_default_data_uses_label_only() {
        let data = NodeData::from_template(&item(Value::Null));
        assert_eq!(data.label, "Add");
        assert_eq!(data.input_port_count(), 1);
    }

    #[test]
    fn node_round_trips_renderer_fields() {
        let raw = json!({
            "id": "n1",
            "type": "add",
            "position": {"x": 1.0, "y": 2.0},
            "data": {"label": "Add", "inputsMode": "n", "inputsCount": 2},
            "className": "hacker-node"
        });
        let node: GraphNode = serde_json::from_value(raw).unwrap();
        assert_eq!(node.extra["className"], "hacker-node");
        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["className"], "hacker-node");
        assert_eq!(back["data"]["inputsMode"], "n");
        assert_eq!(back["data"]["outputsMode"], 1);
    }
}
