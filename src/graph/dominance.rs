//! Dominance theory over [`Graph`]: the naive fixed-point dominator
//! computation, immediate dominators, the dominator tree, and dominance
//! frontiers — all exactly as the naive source algorithm describes it.

use std::collections::{BTreeMap, BTreeSet};

use super::core::{Graph, GraphError, NodeId};

impl Graph {
    /// `dom[root] = {root}`, `dom[n] = all nodes` otherwise; iterate
    /// `dom[n] = {n} ∪ ⋂_{p∈pred(n)} dom[p]` to a fixed point.
    pub fn dominators(&self) -> Result<BTreeMap<NodeId, BTreeSet<NodeId>>, GraphError> {
        let root = self.root().ok_or(GraphError::NoRoot)?;
        let all: BTreeSet<NodeId> = self.node_ids().collect();

        let mut dom: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for n in self.node_ids() {
            if n == root {
                dom.insert(n, BTreeSet::from([root]));
            } else {
                dom.insert(n, all.clone());
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for n in self.node_ids() {
                if n == root {
                    continue;
                }
                let preds: Vec<NodeId> = self.predecessors(n).collect();
                let mut new_set = match preds.split_first() {
                    None => BTreeSet::new(),
                    Some((first, rest)) => {
                        let mut acc = dom[first].clone();
                        for p in rest {
                            acc = acc.intersection(&dom[p]).copied().collect();
                        }
                        acc
                    }
                };
                new_set.insert(n);
                if new_set != dom[&n] {
                    dom.insert(n, new_set);
                    changed = true;
                }
            }
        }
        Ok(dom)
    }

    pub fn dom(&self, a: NodeId, b: NodeId) -> Result<bool, GraphError> {
        Ok(self.dominators()?.get(&b).is_some_and(|s| s.contains(&a)))
    }

    pub fn strict_dom(&self, a: NodeId, b: NodeId) -> Result<bool, GraphError> {
        Ok(a != b && self.dom(a, b)?)
    }

    pub fn idom(&self, n: NodeId) -> Result<Option<NodeId>, GraphError> {
        let doms = self.dominators()?;
        Ok(self.idom_from(n, &doms))
    }

    /// The unique strict dominator of `n` that strictly dominates no other
    /// strict dominator of `n`.
    fn idom_from(&self, n: NodeId, doms: &BTreeMap<NodeId, BTreeSet<NodeId>>) -> Option<NodeId> {
        if Some(n) == self.root() {
            return None;
        }
        let strict: Vec<NodeId> = doms
            .get(&n)
            .map(|s| s.iter().copied().filter(|&d| d != n).collect())
            .unwrap_or_default();
        strict.iter().copied().find(|&cand| {
            !strict
                .iter()
                .any(|&other| other != cand && doms[&other].contains(&cand))
        })
    }

    /// Edges `(idom(n), n)`, represented as parent → children.
    pub fn dominator_tree(&self) -> Result<BTreeMap<NodeId, Vec<NodeId>>, GraphError> {
        let doms = self.dominators()?;
        let mut tree: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for n in self.node_ids() {
            tree.entry(n).or_default();
        }
        for n in self.node_ids() {
            if let Some(parent) = self.idom_from(n, &doms) {
                tree.entry(parent).or_default().push(n);
            }
        }
        Ok(tree)
    }

    /// `{ y | some predecessor of y is dominated by n, and n does not
    /// strictly dominate y }`.
    pub fn dominance_frontier(&self, n: NodeId) -> Result<BTreeSet<NodeId>, GraphError> {
        Ok(self.dominance_frontiers()?.remove(&n).unwrap_or_default())
    }

    /// Dominance frontiers for every node at once, from a single dominator
    /// computation.
    pub fn dominance_frontiers(&self) -> Result<BTreeMap<NodeId, BTreeSet<NodeId>>, GraphError> {
        let doms = self.dominators()?;
        let mut frontiers: BTreeMap<NodeId, BTreeSet<NodeId>> =
            self.node_ids().map(|n| (n, BTreeSet::new())).collect();

        for y in self.node_ids() {
            let preds: Vec<NodeId> = self.predecessors(y).collect();
            for n in self.node_ids() {
                let dominates_some_pred = preds.iter().any(|p| doms[p].contains(&n));
                let strictly_dominates_y = n != y && doms[&y].contains(&n);
                if dominates_some_pred && !strictly_dominates_y {
                    frontiers.get_mut(&n).unwrap().insert(y);
                }
            }
        }
        Ok(frontiers)
    }
}
