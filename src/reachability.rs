use crate::types::{ChainDag, ChainNodeId, HashMap, HashSet};
use petgraph::{Direction, graph::NodeIndex};
use rustc_hash::FxBuildHasher;

/// Whole-graph forward reachability oracle.
///
/// Built once over a frozen topology. Stores, for every node, the full set of
/// nodes reachable from it through at least one edge. The index is never
/// updated: a changed topology needs a new index.
#[derive(Debug, Clone)]
pub struct ReachabilityIndex {
    descendants: HashMap<ChainNodeId, HashSet<ChainNodeId>>,
}

impl ReachabilityIndex {
    /// Computes the transitive closure of `dag`.
    ///
    /// `topo_order` must list every node of `dag` in topological order. Nodes
    /// are processed in reverse order, so when a node is visited the
    /// descendant sets of all its successors are already complete:
    ///
    /// ```text
    /// descendants(n) = U { {s} + descendants(s) | s in successors(n) }
    /// ```
    ///
    /// # Panics
    /// If `topo_order` is not a topological order of `dag`.
    #[must_use]
    pub fn new(dag: &ChainDag, topo_order: &[NodeIndex]) -> Self {
        assert_eq!(
            dag.node_count(),
            topo_order.len(),
            "ReachabilityIndex::new: [1]"
        );
        let mut descendants: HashMap<ChainNodeId, HashSet<ChainNodeId>> =
            HashMap::with_capacity_and_hasher(topo_order.len(), FxBuildHasher);
        for &node_idx in topo_order.iter().rev() {
            let mut node_descendants = HashSet::default();
            for succ_idx in dag.neighbors_directed(node_idx, Direction::Outgoing) {
                let succ_id = dag[succ_idx].chain_node_id();
                let succ_descendants = descendants
                    .get(&succ_id)
                    .expect("ReachabilityIndex::new: [2]");
                node_descendants.insert(succ_id);
                node_descendants.extend(succ_descendants.iter().copied());
            }
            let inserted_new = descendants
                .insert(dag[node_idx].chain_node_id(), node_descendants)
                .is_none();
            assert!(inserted_new, "ReachabilityIndex::new: [3]");
        }
        Self { descendants }
    }

    /// Whether `dst` can be reached from `src` by following edges forward.
    ///
    /// Every known node reaches itself. Unknown ids reach nothing.
    #[must_use]
    pub fn is_reachable(&self, src: ChainNodeId, dst: ChainNodeId) -> bool {
        self.descendants
            .get(&src)
            .is_some_and(|descendants| src == dst || descendants.contains(&dst))
    }

    /// Nodes reachable from `node` through a non-trivial path.
    #[must_use]
    pub fn descendants(&self, node: ChainNodeId) -> Option<&HashSet<ChainNodeId>> {
        self.descendants.get(&node)
    }

    /// Number of indexed nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descendants.len()
    }

    /// Whether no node is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descendants.is_empty()
    }
}
