use serde::Serialize;
use serde_json::Value;

use super::messages::{builders, DirectoryListing};
use super::router::MessageRouter;
use crate::constants::{STATUS_FIELD, STATUS_NOT_FOUND, STATUS_OK};
use crate::error::RouterError;
use crate::graph::{GraphEdge, GraphNode, Workspace};
use crate::{debug_log, warn_log};

/// Typed request helpers over the correlated channel.
#[derive(Clone)]
pub struct OrchestratorApi {
    router: MessageRouter,
}

impl OrchestratorApi {
    pub fn new(router: MessageRouter) -> Self {
        Self { router }
    }

    async fn request<T: Serialize>(&self, message: &T) -> Result<Value, RouterError> {
        let payload = serde_json::to_value(message)?;
        self.router.send_correlated(payload, None).await
    }

    /// Send a `test` probe and report whether an `ok` reply came back in
    /// time.  Never fails; errors read as `false`.
    pub async fn ping_roundtrip(&self) -> bool {
        match self.request(&builders::create_test_probe()).await {
            Ok(reply) => {
                let ok = reply.get(STATUS_FIELD).and_then(Value::as_str) == Some(STATUS_OK);
                if !ok {
                    warn_log!("Round-trip test reply carried no ok status");
                }
                ok
            }
            Err(e) => {
                warn_log!("Round-trip test failed: {}", e);
                false
            }
        }
    }

    /// List a directory on the orchestrator host.
    pub async fn browse(&self, path: &str) -> Result<DirectoryListing, RouterError> {
        let reply = self.request(&builders::create_browse_path(path)).await?;
        // Some handlers nest the listing under `payload`.
        let body = match reply.get("payload") {
            Some(inner) if inner.is_object() => inner.clone(),
            _ => reply,
        };
        Ok(serde_json::from_value(body)?)
    }

    pub async fn save_workspace(
        &self,
        name: &str,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
    ) -> Result<(), RouterError> {
        self.request(&builders::create_save_workspace(name, nodes, edges))
            .await?;
        debug_log!("Workspace '{}' saved ({} nodes, {} edges)", name, nodes.len(), edges.len());
        Ok(())
    }

    /// Fetch a stored workspace.  `Ok(None)` when the orchestrator reports
    /// it missing or the reply lacks either list.
    pub async fn load_workspace(&self, name: &str) -> Result<Option<Workspace>, RouterError> {
        let reply = match self.request(&builders::create_load_workspace(name)).await {
            Ok(reply) => reply,
            Err(RouterError::Remote { status, .. }) if status == STATUS_NOT_FOUND => {
                debug_log!("Workspace '{}' not found", name);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        workspace_from_reply(&reply)
    }
}

fn workspace_from_reply(reply: &Value) -> Result<Option<Workspace>, RouterError> {
    let Some(payload) = reply.get("payload").filter(|p| p.is_object()) else {
        return Ok(None);
    };
    let has_lists = payload.get("nodes").map_or(false, Value::is_array)
        && payload.get("edges").map_or(false, Value::is_array);
    if !has_lists {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(payload.clone())?))
}
