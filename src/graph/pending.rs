//! Drag-to-empty-canvas connection tracking.
//!
//! `idle -> capturing -> (resolved | cancelled) -> idle`.  Driven purely by
//! the drag-start and drag-end events; nothing is read back from the
//! rendered view except through an explicit `ScreenToGraph`.

use serde::Serialize;

use super::model::{input_handle, GraphNode, IoMode, NodeData, Position};
use super::store::GraphStore;
use crate::catalog::NodeCatalog;
use crate::error::GraphError;
use crate::{debug_log, warn_log};

/// Translates pointer coordinates into graph coordinates.
pub trait ScreenToGraph {
    fn screen_to_graph(&self, screen: Position) -> Position;
}

/// Pan/zoom state of the canvas.  `x`/`y` is the screen offset of the graph
/// origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, serde::Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, zoom: 1.0 }
    }
}

impl ScreenToGraph for Viewport {
    fn screen_to_graph(&self, screen: Position) -> Position {
        let zoom = if self.zoom.is_finite() && self.zoom > 0.0 { self.zoom } else { 1.0 };
        Position::new((screen.x - self.x) / zoom, (screen.y - self.y) / zoom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleKind {
    Source,
    Target,
}

/// A drag released over empty canvas, waiting for a node type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConnect {
    pub from_node_id: String,
    pub from_handle_id: Option<String>,
    pub drop_position: Position,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TrackerState {
    #[default]
    Idle,
    Capturing {
        node_id: String,
        handle_id: Option<String>,
        kind: HandleKind,
    },
    Holding(PendingConnect),
}

/// What the view should do after a drag ends.
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// Open the node-type prompt for this pending connection.
    PromptForType(PendingConnect),
    /// Nothing to do: released on a port, from a target port, or no drag.
    Discarded,
}

/// Result of a successful `resolve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConnection {
    pub node_id: String,
    pub edge_id: String,
}

#[derive(Debug, Default)]
pub struct PendingConnectionTracker {
    state: TrackerState,
}

impl PendingConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingConnect> {
        match &self.state {
            TrackerState::Holding(p) => Some(p),
            _ => None,
        }
    }

    /// A connection drag started on `node_id`/`handle_id`.  Replaces any
    /// earlier capture or unresolved pending connection.
    pub fn begin(&mut self, node_id: &str, handle_id: Option<&str>, kind: HandleKind) {
        self.state = TrackerState::Capturing {
            node_id: node_id.to_string(),
            handle_id: handle_id.map(str::to_string),
            kind,
        };
    }

    /// The drag ended at `screen`.  Only a source-port drag released over
    /// empty canvas becomes pending.
    pub fn end(&mut self, screen: Position, over_port: bool, view: &dyn ScreenToGraph) -> DragOutcome {
        let captured = std::mem::take(&mut self.state);
        match captured {
            TrackerState::Capturing {
                node_id,
                handle_id,
                kind: HandleKind::Source,
            } if !over_port => {
                let pending = PendingConnect {
                    from_node_id: node_id,
                    from_handle_id: handle_id,
                    drop_position: view.screen_to_graph(screen),
                };
                debug_log!(
                    "Pending connection from {} at ({}, {})",
                    pending.from_node_id,
                    pending.drop_position.x,
                    pending.drop_position.y
                );
                self.state = TrackerState::Holding(pending.clone());
                DragOutcome::PromptForType(pending)
            }
            _ => DragOutcome::Discarded,
        }
    }

    /// Complete the pending connection with a node of `node_type`: one new
    /// node at the drop position and one edge into its `in_0`.  Any failure
    /// leaves the graph untouched and the tracker idle.
    pub fn resolve(
        &mut self,
        node_type: &str,
        catalog: &NodeCatalog,
        store: &mut GraphStore,
    ) -> Result<ResolvedConnection, GraphError> {
        let pending = match std::mem::take(&mut self.state) {
            TrackerState::Holding(pending) => pending,
            _ => return Err(GraphError::NoPendingConnection),
        };

        let item = catalog.lookup(node_type).ok_or_else(|| {
            warn_log!("Node type '{}' is not in the catalog; dropping pending connection", node_type);
            GraphError::UnknownNodeType(node_type.to_string())
        })?;
        if !store.contains_node(&pending.from_node_id) {
            return Err(GraphError::UnknownNode(pending.from_node_id));
        }
        let data = NodeData::from_template(item);
        if data.inputs_mode == IoMode::None {
            return Err(GraphError::TargetHasNoInputs(node_type.to_string()));
        }

        let node_id = store.allocate_node_id();
        store.add_node(GraphNode::new(
            node_id.clone(),
            item.node_type.clone(),
            pending.drop_position,
            data,
        ))?;
        let target_handle = input_handle(0);
        let edge_id = match store.connect(
            &pending.from_node_id,
            pending.from_handle_id.as_deref(),
            &node_id,
            Some(&target_handle),
        ) {
            Ok(id) => id,
            Err(e) => {
                store.remove_nodes(&[node_id]);
                return Err(e);
            }
        };
        Ok(ResolvedConnection { node_id, edge_id })
    }

    /// The type prompt was dismissed.  Returns whether anything was pending.
    pub fn cancel(&mut self) -> bool {
        let was_pending = !matches!(self.state, TrackerState::Idle);
        self.state = TrackerState::Idle;
        was_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> NodeCatalog {
        let mut catalog = NodeCatalog::new();
        catalog.replace(&[
            json!({"type": "add", "label": "Add", "defaultData": {"inputsMode": "n", "outputsMode": 1}}),
            json!({"type": "play", "label": "Play", "defaultData": {"inputsMode": 0, "outputsMode": 1}}),
        ]);
        catalog
    }

    fn store_with_source() -> GraphStore {
        let mut store = GraphStore::new();
        store
            .add_node(GraphNode::new("A", "const", Position::default(), NodeData::default()))
            .unwrap();
        store
    }

    fn drag_to_pane(tracker: &mut PendingConnectionTracker, at: Position) -> DragOutcome {
        tracker.begin("A", Some("out_0"), HandleKind::Source);
        tracker.end(at, false, &Viewport::default())
    }

    #[test]
    fn drop_on_pane_then_pick_type_creates_node_and_edge() {
        let catalog = catalog();
        let mut store = store_with_source();
        let mut tracker = PendingConnectionTracker::new();

        let outcome = drag_to_pane(&mut tracker, Position::new(120.0, 80.0));
        assert!(matches!(outcome, DragOutcome::PromptForType(_)));

        let created = tracker.resolve("add", &catalog, &mut store).unwrap();
        assert_eq!(store.nodes().len(), 2);
        assert_eq!(store.edges().len(), 1);

        let node = store.node(&created.node_id).unwrap();
        assert_eq!(node.node_type, "add");
        assert_eq!(node.position, Position::new(120.0, 80.0));
        // One wire in, one spare.
        assert_eq!(node.data.inputs_count, Some(2));

        let edge = &store.edges()[0];
        assert_eq!(edge.id, created.edge_id);
        assert_eq!((edge.source.as_str(), edge.source_handle.as_deref()), ("A", Some("out_0")));
        assert_eq!((edge.target.as_str(), edge.target_handle.as_deref()), (created.node_id.as_str(), Some("in_0")));
        assert_eq!(tracker.state(), &TrackerState::Idle);
    }

    #[test]
    fn cancelling_the_prompt_leaves_the_graph_alone() {
        let mut store = store_with_source();
        let mut tracker = PendingConnectionTracker::new();
        drag_to_pane(&mut tracker, Position::new(120.0, 80.0));

        assert!(tracker.cancel());
        assert_eq!(store.nodes().len(), 1);
        assert!(store.edges().is_empty());
        assert_eq!(
            tracker.resolve("add", &catalog(), &mut store),
            Err(GraphError::NoPendingConnection)
        );
    }

    #[test]
    fn unknown_type_aborts_without_mutation() {
        let mut store = store_with_source();
        let rev = store.revision();
        let mut tracker = PendingConnectionTracker::new();
        drag_to_pane(&mut tracker, Position::new(1.0, 1.0));

        let err = tracker.resolve("nope", &catalog(), &mut store).unwrap_err();
        assert_eq!(err, GraphError::UnknownNodeType("nope".into()));
        assert_eq!(store.revision(), rev);
        assert_eq!(tracker.state(), &TrackerState::Idle);
    }

    #[test]
    fn types_without_inputs_cannot_be_spliced_in() {
        let mut store = store_with_source();
        let mut tracker = PendingConnectionTracker::new();
        drag_to_pane(&mut tracker, Position::new(1.0, 1.0));

        let err = tracker.resolve("play", &catalog(), &mut store).unwrap_err();
        assert_eq!(err, GraphError::TargetHasNoInputs("play".into()));
        assert_eq!(store.nodes().len(), 1);
    }

    #[test]
    fn origin_deleted_while_prompt_open() {
        let mut store = store_with_source();
        let mut tracker = PendingConnectionTracker::new();
        drag_to_pane(&mut tracker, Position::new(1.0, 1.0));
        store.remove_nodes(&["A".to_string()]);

        let err = tracker.resolve("add", &catalog(), &mut store).unwrap_err();
        assert_eq!(err, GraphError::UnknownNode("A".into()));
        assert!(store.nodes().is_empty());
    }

    #[test]
    fn release_over_a_port_or_from_a_target_is_discarded() {
        let mut tracker = PendingConnectionTracker::new();
        tracker.begin("A", Some("out_0"), HandleKind::Source);
        assert_eq!(tracker.end(Position::default(), true, &Viewport::default()), DragOutcome::Discarded);
        assert_eq!(tracker.state(), &TrackerState::Idle);

        tracker.begin("A", Some("in_0"), HandleKind::Target);
        assert_eq!(tracker.end(Position::default(), false, &Viewport::default()), DragOutcome::Discarded);

        // No drag in progress at all.
        assert_eq!(tracker.end(Position::default(), false, &Viewport::default()), DragOutcome::Discarded);
    }

    #[test]
    fn drop_position_is_translated_through_the_viewport() {
        let mut tracker = PendingConnectionTracker::new();
        tracker.begin("A", Some("out_0"), HandleKind::Source);
        let view = Viewport { x: 100.0, y: 50.0, zoom: 2.0 };
        let DragOutcome::PromptForType(pending) = tracker.end(Position::new(340.0, 210.0), false, &view) else {
            panic!("expected a pending connection");
        };
        assert_eq!(pending.drop_position, Position::new(120.0, 80.0));
        assert_eq!(tracker.pending(), Some(&pending));
    }
}
