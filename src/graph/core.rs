//! The directed graph abstraction: nodes, edges, and predecessor queries.
//!
//! A node's identity is an interned [`NodeId`] assigned in insertion order,
//! so a `BTreeSet<NodeId>`/`BTreeMap<NodeId, _>` iterates in insertion order
//! for free. That's what gives `predecessors` its "stable order derived from
//! node insertion order" without a dedicated ordered-map dependency.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("graph has no root set")]
    NoRoot,
}

/// A directed graph with an optional distinguished root.
///
/// Dominance results are recomputed on demand rather than cached: passes
/// build a graph, run one analysis over it, and discard it, so there's
/// never a window in which a cached result could go stale under mutation.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    names: Vec<String>,
    index: HashMap<String, NodeId>,
    successors: BTreeMap<NodeId, BTreeSet<NodeId>>,
    predecessors: BTreeMap<NodeId, BTreeSet<NodeId>>,
    root: Option<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node if it isn't already present. Idempotent.
    pub fn add_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = NodeId(self.names.len());
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.successors.entry(id).or_default();
        self.predecessors.entry(id).or_default();
        id
    }

    pub fn add_nodes<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for n in names {
            self.add_node(n.as_ref());
        }
    }

    fn require(&self, name: &str) -> Result<NodeId, GraphError> {
        self.node_id(name)
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))
    }

    /// Edges to or from an unknown node fail. Self-edges are silently dropped.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let f = self.require(from)?;
        let t = self.require(to)?;
        if f == t {
            return Ok(());
        }
        self.successors.entry(f).or_default().insert(t);
        self.predecessors.entry(t).or_default().insert(f);
        Ok(())
    }

    pub fn add_edges<I>(&mut self, edges: I) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (a, b) in edges {
            self.add_edge(&a, &b)?;
        }
        Ok(())
    }

    pub fn set_root(&mut self, name: &str) -> Result<(), GraphError> {
        self.root = Some(self.require(name)?);
        Ok(())
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.names[id.0]
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.names.len()).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Successors of `n`, in a stable order derived from node insertion order.
    pub fn successors(&self, n: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.successors.get(&n).into_iter().flatten().copied()
    }

    /// Predecessors of `n`, in a stable order derived from node insertion order.
    pub fn predecessors(&self, n: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.predecessors.get(&n).into_iter().flatten().copied()
    }

    /// A graph with every edge flipped, optionally with a new root.
    pub fn reverse(&self, new_root: Option<&str>) -> Result<Graph, GraphError> {
        let mut g = Graph::new();
        g.add_nodes(self.names());
        for (&from, tos) in &self.successors {
            for &to in tos {
                g.add_edge(self.name(to), self.name(from))?;
            }
        }
        if let Some(r) = new_root {
            g.set_root(r)?;
        }
        Ok(g)
    }

    pub fn has_path(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        let mut visited = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(n) = stack.pop() {
            if !visited.insert(n) {
                continue;
            }
            if n == to {
                return true;
            }
            for s in self.successors(n) {
                if !visited.contains(&s) {
                    stack.push(s);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Graph {
        let mut g = Graph::new();
        g.add_nodes(["a", "b", "c", "d"]);
        g.add_edges([
            ("a".to_string(), "b".to_string()),
            ("a".to_string(), "c".to_string()),
            ("b".to_string(), "d".to_string()),
            ("c".to_string(), "d".to_string()),
        ])
        .unwrap();
        g.set_root("a").unwrap();
        g
    }

    #[test]
    fn self_edges_are_dropped() {
        let mut g = Graph::new();
        g.add_node("a");
        g.add_edge("a", "a").unwrap();
        assert_eq!(g.successors(g.node_id("a").unwrap()).count(), 0);
    }

    #[test]
    fn unknown_endpoint_errors() {
        let mut g = Graph::new();
        g.add_node("a");
        assert_eq!(
            g.add_edge("a", "ghost"),
            Err(GraphError::UnknownNode("ghost".to_string()))
        );
    }

    #[test]
    fn predecessors_follow_insertion_order() {
        let mut g = Graph::new();
        g.add_nodes(["z", "y", "x"]);
        g.add_edges([
            ("z".to_string(), "x".to_string()),
            ("y".to_string(), "x".to_string()),
        ])
        .unwrap();
        let x = g.node_id("x").unwrap();
        let preds: Vec<_> = g.predecessors(x).map(|n| g.name(n).to_string()).collect();
        assert_eq!(preds, vec!["z", "y"]);
    }

    #[test]
    fn has_path_finds_diamond_join() {
        let g = diamond();
        let a = g.node_id("a").unwrap();
        let d = g.node_id("d").unwrap();
        assert!(g.has_path(a, d));
    }

    #[test]
    fn reverse_flips_every_edge() {
        let g = diamond();
        let rev = g.reverse(Some("d")).unwrap();
        let d = rev.node_id("d").unwrap();
        let a = rev.node_id("a").unwrap();
        assert!(rev.successors(d).any(|n| n == rev.node_id("b").unwrap()));
        assert_eq!(rev.predecessors(a).count(), 0);
    }
}
