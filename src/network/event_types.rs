use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::constants::{
    MSG_BROWSE_PATH, MSG_BROWSE_RESULT, MSG_LOAD_WORKSPACE, MSG_NODE_CONFIG, MSG_SAVE_WORKSPACE,
    MSG_TEST,
};

/// Message discriminators exchanged with the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Catalog push: full list of instantiable node types
    #[serde(rename = "NODE_CONFIG")]
    NodeConfig,
    /// Round-trip self test
    #[serde(rename = "test")]
    Test,
    #[serde(rename = "BROWSE_PATH")]
    BrowsePath,
    #[serde(rename = "FS_BROWSE_RESULT")]
    BrowseResult,
    #[serde(rename = "SAVE_WORKSPACE")]
    SaveWorkspace,
    #[serde(rename = "LOAD_WORKSPACE")]
    LoadWorkspace,
    #[serde(other)]
    Unknown,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::NodeConfig => MSG_NODE_CONFIG,
            MessageType::Test => MSG_TEST,
            MessageType::BrowsePath => MSG_BROWSE_PATH,
            MessageType::BrowseResult => MSG_BROWSE_RESULT,
            MessageType::SaveWorkspace => MSG_SAVE_WORKSPACE,
            MessageType::LoadWorkspace => MSG_LOAD_WORKSPACE,
            MessageType::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            MSG_NODE_CONFIG => MessageType::NodeConfig,
            MSG_TEST => MessageType::Test,
            MSG_BROWSE_PATH => MessageType::BrowsePath,
            MSG_BROWSE_RESULT => MessageType::BrowseResult,
            MSG_SAVE_WORKSPACE => MessageType::SaveWorkspace,
            MSG_LOAD_WORKSPACE => MessageType::LoadWorkspace,
            _ => MessageType::Unknown,
        }
    }

    /// Discriminator of an inbound frame; `Unknown` when `type` is missing.
    pub fn of(msg: &Value) -> Self {
        msg.get("type")
            .and_then(Value::as_str)
            .map(Self::from_str)
            .unwrap_or(MessageType::Unknown)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
