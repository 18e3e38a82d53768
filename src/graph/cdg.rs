//! Control-dependence graph construction, used by aggressive DCE to decide
//! which conditional branches must be kept alive.

use super::core::{Graph, GraphError};

const START: &str = "$start";

impl Graph {
    /// Augment with a virtual `START` node pointing at every in-degree-zero
    /// node, reverse the result, and take reverse dominance frontiers: node
    /// `n`'s control dependencies are `rdf(n)` in that reversed graph.
    pub fn control_dependence_graph(&self) -> Result<Graph, GraphError> {
        let entries: Vec<String> = self
            .node_ids()
            .filter(|&n| self.predecessors(n).next().is_none())
            .map(|n| self.name(n).to_string())
            .collect();

        let mut augmented = self.clone();
        augmented.add_node(START);
        for e in &entries {
            augmented.add_edge(START, e)?;
        }

        let mut reversed = augmented.reverse(Some(START))?;
        for e in &entries {
            reversed.add_edge(e, START)?;
        }

        let rdf = reversed.dominance_frontiers()?;

        let mut cdg = Graph::new();
        cdg.add_nodes(self.names());
        cdg.add_node(START);
        for n in self.node_ids() {
            let n_name = self.name(n).to_string();
            let Some(rn) = reversed.node_id(&n_name) else {
                continue;
            };
            if let Some(frontier) = rdf.get(&rn) {
                for &e in frontier {
                    cdg.add_edge(reversed.name(e), &n_name)?;
                }
            }
        }
        Ok(cdg)
    }
}
