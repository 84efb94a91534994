//! Wire shapes for the orchestrator requests and replies that have a fixed
//! structure.  Catalog pushes and generic replies stay `serde_json::Value`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::event_types::MessageType;
use crate::graph::{GraphEdge, GraphNode};

/// Round-trip probe; the orchestrator answers with `status: "ok"`.
#[derive(Debug, Clone, Serialize)]
pub struct TestMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Client clock in epoch milliseconds
    pub at: i64,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrowsePathRequest {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveWorkspaceRequest<'a> {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub name: &'a str,
    pub nodes: &'a [GraphNode],
    pub edges: &'a [GraphEdge],
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadWorkspaceRequest<'a> {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub name: &'a str,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(alias = "isDirectory", default)]
    pub is_dir: bool,
    pub path: String,
    /// ISO 8601 timestamp; unparsable values read as `None`
    #[serde(alias = "modifiedAt", default, deserialize_with = "lenient_timestamp")]
    pub modified: Option<DateTime<Utc>>,
}

/// Reply to `BROWSE_PATH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryListing {
    #[serde(alias = "currentPath")]
    pub current_path: String,
    #[serde(default)]
    pub entries: Vec<DirectoryEntry>,
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(Value::Number(n)) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    })
}

/// Trimmed path; blank means the orchestrator's working directory.
pub fn sanitize_browse_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        ".".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Message builders
pub mod builders {
    use super::*;
    use serde_json::json;

    pub fn create_test_probe() -> TestMessage {
        TestMessage {
            message_type: MessageType::Test,
            at: Utc::now().timestamp_millis(),
            payload: json!({ "hello": "flowgraph", "client": "wasm" }),
        }
    }

    pub fn create_browse_path(path: &str) -> BrowsePathRequest {
        BrowsePathRequest {
            message_type: MessageType::BrowsePath,
            path: sanitize_browse_path(path),
        }
    }

    pub fn create_save_workspace<'a>(
        name: &'a str,
        nodes: &'a [GraphNode],
        edges: &'a [GraphEdge],
    ) -> SaveWorkspaceRequest<'a> {
        SaveWorkspaceRequest {
            message_type: MessageType::SaveWorkspace,
            name,
            nodes,
            edges,
        }
    }

    pub fn create_load_workspace(name: &str) -> LoadWorkspaceRequest<'_> {
        LoadWorkspaceRequest {
            message_type: MessageType::LoadWorkspace,
            name,
        }
    }
}
