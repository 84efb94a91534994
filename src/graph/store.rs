//! Canonical node/edge state.
//!
//! Every mutation that changes the edge set runs the normalizer over all
//! nodes before returning, so callers never observe a graph whose variadic
//! counts disagree with its wiring.

use std::collections::HashSet;
use std::rc::Rc;

use serde_json::Value;

use super::model::{GraphEdge, GraphNode, Position, Workspace};
use super::normalize::{normalize_all, normalize_node};
use crate::constants::NODE_ID_PREFIX;
use crate::debug_log;
use crate::error::GraphError;

#[derive(Debug)]
pub struct GraphStore {
    nodes: Vec<Rc<GraphNode>>,
    edges: Vec<GraphEdge>,
    next_node_seq: u64,
    next_edge_seq: u64,
    /// Bumped on every mutation; lets the view skip redundant redraws.
    revision: u64,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            next_node_seq: 1,
            next_edge_seq: 1,
            revision: 0,
        }
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Rc<GraphNode>] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Rc<GraphNode>> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Owned copy of the current graph, e.g. for saving.
    pub fn snapshot(&self) -> Workspace {
        Workspace {
            nodes: self.nodes.iter().map(|n| GraphNode::clone(n)).collect(),
            edges: self.edges.clone(),
        }
    }

    /// Next unused `n<seq>` id.
    pub fn allocate_node_id(&mut self) -> String {
        loop {
            let id = format!("{}{}", NODE_ID_PREFIX, self.next_node_seq);
            self.next_node_seq += 1;
            if !self.contains_node(&id) {
                return id;
            }
        }
    }

    fn allocate_edge_id(&mut self, source: &str, target: &str) -> String {
        loop {
            let id = format!("e-{}-{}-{}", source, target, self.next_edge_seq);
            self.next_edge_seq += 1;
            if !self.edges.iter().any(|e| e.id == id) {
                return id;
            }
        }
    }

    pub fn add_node(&mut self, node: GraphNode) -> Result<(), GraphError> {
        if self.contains_node(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let node = normalize_node(&Rc::new(node), &self.edges);
        self.nodes.push(node);
        self.revision += 1;
        Ok(())
    }

    /// Remove nodes and every edge touching them.  Returns the ids actually
    /// removed; unknown ids are ignored.
    pub fn remove_nodes(&mut self, ids: &[String]) -> Vec<String> {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut removed = Vec::new();
        self.nodes.retain(|n| {
            if doomed.contains(n.id.as_str()) {
                removed.push(n.id.clone());
                false
            } else {
                true
            }
        });
        if removed.is_empty() {
            return removed;
        }

        let before = self.edges.len();
        self.edges
            .retain(|e| !doomed.contains(e.source.as_str()) && !doomed.contains(e.target.as_str()));
        debug_log!(
            "Removed {} node(s) and {} incident edge(s)",
            removed.len(),
            before - self.edges.len()
        );
        self.renormalize();
        removed
    }

    /// Insert an edge between existing nodes.  A second edge with the same
    /// endpoints and handles is refused.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<(), GraphError> {
        self.check_edge(&edge)?;
        self.edges.push(edge);
        self.renormalize();
        Ok(())
    }

    /// Connect two ports, allocating an `e-<source>-<target>-<seq>` id.
    pub fn connect(
        &mut self,
        source: &str,
        source_handle: Option<&str>,
        target: &str,
        target_handle: Option<&str>,
    ) -> Result<String, GraphError> {
        let mut edge = GraphEdge {
            id: String::new(),
            source: source.to_string(),
            target: target.to_string(),
            source_handle: source_handle.map(str::to_string),
            target_handle: target_handle.map(str::to_string),
        };
        self.check_edge(&edge)?;
        edge.id = self.allocate_edge_id(source, target);
        let id = edge.id.clone();
        self.edges.push(edge);
        self.renormalize();
        Ok(id)
    }

    fn check_edge(&self, edge: &GraphEdge) -> Result<(), GraphError> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::UnknownNode(endpoint.clone()));
            }
        }
        if let Some(existing) = self
            .edges
            .iter()
            .find(|e| (!edge.id.is_empty() && e.id == edge.id) || e.same_connection(edge))
        {
            return Err(GraphError::DuplicateEdge(existing.id.clone()));
        }
        Ok(())
    }

    /// Returns how many edges were removed.
    pub fn remove_edges(&mut self, ids: &[String]) -> usize {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = self.edges.len();
        self.edges.retain(|e| !doomed.contains(e.id.as_str()));
        let removed = before - self.edges.len();
        if removed > 0 {
            self.renormalize();
        }
        removed
    }

    /// Swap in a whole graph (workspace load).  Node id allocation restarts
    /// above the highest `n<k>` already present.
    pub fn replace_all(&mut self, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) {
        self.next_node_seq = nodes
            .iter()
            .filter_map(|n| n.id.strip_prefix(NODE_ID_PREFIX)?.parse::<u64>().ok())
            .max()
            .map_or(1, |k| k + 1);
        self.next_edge_seq = 1;
        self.nodes = nodes.into_iter().map(Rc::new).collect();
        self.edges = edges;
        self.renormalize();
    }

    /// Single entry point for editing a node's value.
    pub fn set_node_value(&mut self, id: &str, value: Value) -> Result<(), GraphError> {
        self.update_node(id, |node| node.data.value = Some(value))
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> Result<(), GraphError> {
        self.update_node(id, |node| node.position = position)
    }

    fn update_node<F>(&mut self, id: &str, apply: F) -> Result<(), GraphError>
    where
        F: FnOnce(&mut GraphNode),
    {
        let slot = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        apply(Rc::make_mut(slot));
        self.revision += 1;
        Ok(())
    }

    fn renormalize(&mut self) {
        self.nodes = normalize_all(&self.nodes, &self.edges);
        self.revision += 1;
    }
}
