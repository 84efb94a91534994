//! One editor session: the single owned connection, its router, the node
//! catalog, the canonical graph and the pending-connection tracker.
//!
//! Everything the UI does goes through here, so there is exactly one socket
//! per editor and no component reaches into another's state.

use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::catalog::NodeCatalog;
use crate::error::{GraphError, RouterError};
use crate::graph::{
    DragOutcome, GraphEdge, GraphNode, GraphStore, HandleKind, NodeData, PendingConnectionTracker,
    Position, ResolvedConnection, ScreenToGraph,
};
use crate::network::{
    ConnectionManager, ConnectionStatus, Connector, DirectoryListing, MessageRouter, MessageType,
    OrchestratorApi, SubscriptionId, TimerHost, WsConfig,
};
use crate::debug_log;

/// What changed, for views that redraw on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Graph,
    Catalog,
}

pub type ChangeListener = Rc<dyn Fn(Change)>;

type Listeners = Rc<RefCell<Vec<ChangeListener>>>;

fn notify(listeners: &Listeners, change: Change) {
    let snapshot: Vec<ChangeListener> = listeners.borrow().clone();
    for listener in snapshot {
        listener(change);
    }
}

pub struct EditorSession {
    connection: ConnectionManager,
    router: MessageRouter,
    api: OrchestratorApi,
    catalog: Rc<RefCell<NodeCatalog>>,
    graph: RefCell<GraphStore>,
    tracker: RefCell<PendingConnectionTracker>,
    listeners: Listeners,
    catalog_subscription: SubscriptionId,
    shut_down: Cell<bool>,
}

impl EditorSession {
    pub fn new(config: WsConfig, connector: Rc<dyn Connector>, timers: Rc<dyn TimerHost>) -> Self {
        let connection = ConnectionManager::new(config, connector, timers.clone());
        let router = MessageRouter::attach(connection.clone(), timers);
        let catalog = Rc::new(RefCell::new(NodeCatalog::new()));
        let listeners: Listeners = Rc::new(RefCell::new(Vec::new()));

        let weak_catalog: Weak<RefCell<NodeCatalog>> = Rc::downgrade(&catalog);
        let weak_listeners = Rc::downgrade(&listeners);
        let catalog_subscription = router.subscribe(
            Rc::new(|msg: &Value| MessageType::of(msg) == MessageType::NodeConfig),
            Rc::new(RefCell::new(move |msg: Value| {
                let Some(catalog) = weak_catalog.upgrade() else {
                    return;
                };
                let applied = catalog.borrow_mut().apply_push(&msg);
                if applied.is_some() {
                    if let Some(listeners) = weak_listeners.upgrade() {
                        notify(&listeners, Change::Catalog);
                    }
                }
            })),
        );

        Self {
            api: OrchestratorApi::new(router.clone()),
            connection,
            router,
            catalog,
            graph: RefCell::new(GraphStore::new()),
            tracker: RefCell::new(PendingConnectionTracker::new()),
            listeners,
            catalog_subscription,
            shut_down: Cell::new(false),
        }
    }

    /// Session wired to the browser's WebSocket and timers.
    #[cfg(target_arch = "wasm32")]
    pub fn browser(config: WsConfig) -> Self {
        Self::new(
            config,
            Rc::new(crate::network::WebSocketConnector),
            Rc::new(crate::network::BrowserTimers),
        )
    }

    // ---------------------------------------------------------------------
    // Connection
    // ---------------------------------------------------------------------

    pub fn connect(&self) {
        self.shut_down.set(false);
        self.connection.connect();
    }

    pub fn close(&self) {
        self.connection.close();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn add_change_listener(&self, listener: ChangeListener) {
        self.listeners.borrow_mut().push(listener);
    }

    /// Stop every timer, close the socket without reconnecting and reject
    /// outstanding requests.  Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shut_down.replace(true) {
            return;
        }
        debug_log!("Editor session shutting down");
        self.connection.shutdown();
        self.router.cancel_all();
        self.tracker.borrow_mut().cancel();
    }

    // ---------------------------------------------------------------------
    // Catalog and graph reads
    // ---------------------------------------------------------------------

    pub fn catalog(&self) -> Ref<'_, NodeCatalog> {
        self.catalog.borrow()
    }

    pub fn graph(&self) -> Ref<'_, GraphStore> {
        self.graph.borrow()
    }

    pub fn tracker(&self) -> Ref<'_, PendingConnectionTracker> {
        self.tracker.borrow()
    }

    // ---------------------------------------------------------------------
    // Gestures
    // ---------------------------------------------------------------------

    pub fn begin_connection(&self, node_id: &str, handle_id: Option<&str>, kind: HandleKind) {
        self.tracker.borrow_mut().begin(node_id, handle_id, kind);
    }

    pub fn end_connection(&self, screen: Position, over_port: bool, view: &dyn ScreenToGraph) -> DragOutcome {
        self.tracker.borrow_mut().end(screen, over_port, view)
    }

    /// Node type picked from the prompt.
    pub fn choose_node_type(&self, node_type: &str) -> Result<ResolvedConnection, GraphError> {
        let result = {
            let catalog = self.catalog.borrow();
            let mut graph = self.graph.borrow_mut();
            self.tracker.borrow_mut().resolve(node_type, &catalog, &mut graph)
        };
        if result.is_ok() {
            self.changed(Change::Graph);
        }
        result
    }

    /// Prompt dismissed without a choice.
    pub fn cancel_pending(&self) -> bool {
        self.tracker.borrow_mut().cancel()
    }

    /// Place a catalog node at `position` without wiring it.
    pub fn add_node_at(&self, node_type: &str, position: Position) -> Result<String, GraphError> {
        let id = {
            let catalog = self.catalog.borrow();
            let item = catalog
                .lookup(node_type)
                .ok_or_else(|| GraphError::UnknownNodeType(node_type.to_string()))?;
            let mut graph = self.graph.borrow_mut();
            let id = graph.allocate_node_id();
            graph.add_node(GraphNode::new(
                id.clone(),
                item.node_type.clone(),
                position,
                NodeData::from_template(item),
            ))?;
            id
        };
        self.changed(Change::Graph);
        Ok(id)
    }

    pub fn connect_ports(
        &self,
        source: &str,
        source_handle: Option<&str>,
        target: &str,
        target_handle: Option<&str>,
    ) -> Result<String, GraphError> {
        let id = self
            .graph
            .borrow_mut()
            .connect(source, source_handle, target, target_handle)?;
        self.changed(Change::Graph);
        Ok(id)
    }

    pub fn add_edge(&self, edge: GraphEdge) -> Result<(), GraphError> {
        self.graph.borrow_mut().add_edge(edge)?;
        self.changed(Change::Graph);
        Ok(())
    }

    pub fn remove_edges(&self, ids: &[String]) -> usize {
        let removed = self.graph.borrow_mut().remove_edges(ids);
        if removed > 0 {
            self.changed(Change::Graph);
        }
        removed
    }

    pub fn remove_nodes(&self, ids: &[String]) -> Vec<String> {
        let removed = self.graph.borrow_mut().remove_nodes(ids);
        if !removed.is_empty() {
            self.changed(Change::Graph);
        }
        removed
    }

    pub fn move_node(&self, id: &str, position: Position) -> Result<(), GraphError> {
        self.graph.borrow_mut().move_node(id, position)?;
        self.changed(Change::Graph);
        Ok(())
    }

    pub fn set_node_value(&self, id: &str, value: Value) -> Result<(), GraphError> {
        self.graph.borrow_mut().set_node_value(id, value)?;
        self.changed(Change::Graph);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Orchestrator requests
    // ---------------------------------------------------------------------

    pub fn api(&self) -> &OrchestratorApi {
        &self.api
    }

    pub async fn ping_roundtrip(&self) -> bool {
        self.api.ping_roundtrip().await
    }

    pub async fn browse(&self, path: &str) -> Result<DirectoryListing, RouterError> {
        self.api.browse(path).await
    }

    pub async fn save_workspace(&self, name: &str) -> Result<(), RouterError> {
        let snapshot = self.graph.borrow().snapshot();
        self.api
            .save_workspace(name, &snapshot.nodes, &snapshot.edges)
            .await
    }

    /// Load `name` into the graph.  Returns `false` (graph untouched) when
    /// the workspace does not exist.
    pub async fn load_workspace(&self, name: &str) -> Result<bool, RouterError> {
        let Some(workspace) = self.api.load_workspace(name).await? else {
            return Ok(false);
        };
        self.tracker.borrow_mut().cancel();
        self.graph
            .borrow_mut()
            .replace_all(workspace.nodes, workspace.edges);
        self.changed(Change::Graph);
        Ok(true)
    }

    fn changed(&self, change: Change) {
        notify(&self.listeners, change);
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.router.unsubscribe(self.catalog_subscription);
        self.shutdown();
    }
}
