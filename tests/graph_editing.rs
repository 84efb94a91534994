//! End-to-end editing through the public graph and catalog API, with no
//! network involved.
//!
//! Run with: cargo test --test graph_editing

use flowgraph_frontend::catalog::NodeCatalog;
use flowgraph_frontend::graph::{
    DragOutcome, GraphNode, GraphStore, HandleKind, IoMode, NodeData, PendingConnectionTracker, Position,
    Viewport, Workspace,
};
use serde_json::json;

fn catalog() -> NodeCatalog {
    let mut catalog = NodeCatalog::new();
    let kept = catalog.replace(&[
        json!({"type": "play", "label": "Play", "defaultData": {"inputsMode": 0, "outputsMode": "n"}}),
        json!({"type": "add", "label": "Add", "defaultData": {"inputsMode": "n", "outputsMode": 1}}),
        json!({"label": "missing type"}),
    ]);
    assert_eq!(kept, 2);
    catalog
}

#[test]
fn chain_built_from_drags_normalizes_both_sides() {
    let catalog = catalog();
    let mut store = GraphStore::new();
    let mut tracker = PendingConnectionTracker::new();
    let view = Viewport { x: 0.0, y: 0.0, zoom: 1.0 };

    // Seed a source node the way the palette does.
    let play = store.allocate_node_id();
    let play_item = catalog.lookup("play").unwrap();
    store
        .add_node(GraphNode::new(
            play.clone(),
            "play",
            Position::default(),
            NodeData::from_template(play_item),
        ))
        .unwrap();

    // Two drags off the variadic output, each to empty canvas.
    for (i, handle) in ["out_0", "out_1"].iter().enumerate() {
        tracker.begin(&play, Some(*handle), HandleKind::Source);
        let outcome = tracker.end(Position::new(200.0, 100.0 * i as f64), false, &view);
        assert!(matches!(outcome, DragOutcome::PromptForType(_)));
        tracker.resolve("add", &catalog, &mut store).unwrap();
    }

    let source = store.node(&play).unwrap();
    assert_eq!(source.data.outputs_mode, IoMode::Variadic);
    assert_eq!(source.data.outputs_count, Some(3));
    assert_eq!(store.edges().len(), 2);
    for node in store.nodes().iter().filter(|n| n.node_type == "add") {
        assert_eq!(node.data.inputs_count, Some(2));
    }
}

#[test]
fn workspace_json_round_trips_through_the_store() {
    let raw = json!({
        "nodes": [
            {"id": "n1", "type": "play", "position": {"x": 0.0, "y": 0.0},
             "data": {"label": "Play", "inputsMode": 0, "outputsMode": "n", "outputsCount": 5}},
            {"id": "n2", "type": "add", "position": {"x": 10.0, "y": 0.0},
             "data": {"label": "Add", "inputsMode": "n", "value": "3"}}
        ],
        "edges": [
            {"id": "e-n1-n2-1", "source": "n1", "target": "n2", "sourceHandle": "out_0", "targetHandle": "in_0"}
        ]
    });
    let workspace: Workspace = serde_json::from_value(raw).unwrap();

    let mut store = GraphStore::new();
    store.replace_all(workspace.nodes, workspace.edges);

    let saved = serde_json::to_value(store.snapshot()).unwrap();
    assert_eq!(saved["nodes"][0]["data"]["outputsCount"], 2);
    assert_eq!(saved["nodes"][1]["data"]["inputsCount"], 2);
    assert_eq!(saved["nodes"][1]["data"]["value"], "3");
    assert_eq!(saved["edges"][0]["targetHandle"], "in_0");
}

#[test]
fn deleting_a_selection_takes_its_edges_along() {
    let catalog = catalog();
    let mut store = GraphStore::new();
    let mut ids = Vec::new();
    for ty in ["play", "add", "add"] {
        let id = store.allocate_node_id();
        let item = catalog.lookup(ty).unwrap();
        store
            .add_node(GraphNode::new(
                id.clone(),
                ty,
                Position::default(),
                NodeData::from_template(item),
            ))
            .unwrap();
        ids.push(id);
    }
    store.connect(&ids[0], Some("out_0"), &ids[1], Some("in_0")).unwrap();
    store.connect(&ids[0], Some("out_1"), &ids[2], Some("in_0")).unwrap();
    assert_eq!(store.node(&ids[0]).unwrap().data.outputs_count, Some(3));

    store.remove_nodes(&[ids[1].clone()]);
    assert_eq!(store.edges().len(), 1);
    assert_eq!(store.node(&ids[0]).unwrap().data.outputs_count, Some(2));
}
