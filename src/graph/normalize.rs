//! Variadic port normalization.
//!
//! A variadic side always offers exactly one free port beyond the distinct
//! handles currently wired: `count = used + 1`.  Normalization only rewrites
//! declared counts.  It never touches edges, and nodes whose counts already
//! hold are returned as the same `Rc` so renderers can skip them.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::model::{is_input_handle, is_output_handle, GraphEdge, GraphNode, IoMode};

/// Distinct variadic handles in use, per node id.
#[derive(Debug, Default)]
struct HandleUsage<'a> {
    inputs: HashMap<&'a str, HashSet<&'a str>>,
    outputs: HashMap<&'a str, HashSet<&'a str>>,
}

impl<'a> HandleUsage<'a> {
    fn collect(edges: &'a [GraphEdge]) -> Self {
        let mut usage = HandleUsage::default();
        for edge in edges {
            if let Some(handle) = edge.target_handle.as_deref().filter(|h| is_input_handle(h)) {
                usage.inputs.entry(edge.target.as_str()).or_default().insert(handle);
            }
            if let Some(handle) = edge.source_handle.as_deref().filter(|h| is_output_handle(h)) {
                usage.outputs.entry(edge.source.as_str()).or_default().insert(handle);
            }
        }
        usage
    }

    fn used_inputs(&self, node_id: &str) -> u32 {
        self.inputs.get(node_id).map_or(0, |s| s.len() as u32)
    }

    fn used_outputs(&self, node_id: &str) -> u32 {
        self.outputs.get(node_id).map_or(0, |s| s.len() as u32)
    }
}

/// Count a variadic side should declare, or `None` when the node already
/// matches (or the side is not variadic).
fn required_count(mode: IoMode, current: Option<u32>, used: u32) -> Option<u32> {
    if mode != IoMode::Variadic {
        return None;
    }
    let required = used.saturating_add(1).max(1);
    (current != Some(required)).then_some(required)
}

fn normalize_with(node: &Rc<GraphNode>, usage: &HandleUsage<'_>) -> Rc<GraphNode> {
    let data = &node.data;
    let inputs = required_count(data.inputs_mode, data.inputs_count, usage.used_inputs(&node.id));
    let outputs = required_count(data.outputs_mode, data.outputs_count, usage.used_outputs(&node.id));
    if inputs.is_none() && outputs.is_none() {
        return Rc::clone(node);
    }

    let mut updated = GraphNode::clone(node);
    if let Some(count) = inputs {
        updated.data.inputs_count = Some(count);
    }
    if let Some(count) = outputs {
        updated.data.outputs_count = Some(count);
    }
    Rc::new(updated)
}

/// Normalize a single node against the full edge list.
pub fn normalize_node(node: &Rc<GraphNode>, edges: &[GraphEdge]) -> Rc<GraphNode> {
    normalize_with(node, &HandleUsage::collect(edges))
}

/// Normalize every node.  Output order matches input order.
pub fn normalize_all(nodes: &[Rc<GraphNode>], edges: &[GraphEdge]) -> Vec<Rc<GraphNode>> {
    let usage = HandleUsage::collect(edges);
    nodes.iter().map(|n| normalize_with(n, &usage)).collect()
}
