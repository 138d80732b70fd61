use crate::{
    error::ChainGraphError,
    reachability::ReachabilityIndex,
    types::{ChainDag, ChainNodeId, HashMap, HashSet, IndexMap, IndexSet},
};
use log::trace;
use petgraph::{Direction, graph::NodeIndex};
use rustc_hash::FxBuildHasher;
use std::sync::Arc;

/// The part of the chain graph relevant to one producer -> consumers
/// relationship.
///
/// A node is a member iff it is reachable from the start node and can reach
/// at least one end node. The start node and every end node reachable from
/// it are members themselves. Edges are restricted to member endpoints, which
/// yields a sub-DAG on exactly the member set.
#[derive(Debug, Clone)]
pub struct BoundedSubgraph {
    start_node: ChainNodeId,
    end_nodes: IndexSet<ChainNodeId>,
    /// Members in topological order.
    members: IndexMap<ChainNodeId, MemberLinks>,
    is_reachable: Arc<ReachabilityIndex>,
}

#[derive(Debug, Clone, Default)]
struct MemberLinks {
    /// Member predecessors, ascending by id.
    in_nodes: Vec<ChainNodeId>,
    /// Member successors, ascending by id.
    out_nodes: Vec<ChainNodeId>,
}

impl BoundedSubgraph {
    /// Extracts the subgraph bounded by `start_node` and `end_nodes`.
    ///
    /// `topo_order` must be a topological order of `dag`, and `is_reachable`
    /// must have been built from the same topology.
    ///
    /// # Errors
    /// `UnknownNode` if the start node is not in the index, and
    /// `NoPathToEndNode` if the start node reaches none of the end nodes.
    pub fn new(
        dag: &ChainDag,
        topo_order: &[NodeIndex],
        start_node: ChainNodeId,
        end_nodes: impl IntoIterator<Item = ChainNodeId>,
        is_reachable: Arc<ReachabilityIndex>,
    ) -> Result<Self, ChainGraphError> {
        let end_nodes: IndexSet<ChainNodeId> = end_nodes.into_iter().collect();
        if is_reachable.descendants(start_node).is_none() {
            return Err(ChainGraphError::UnknownNode(start_node));
        }
        let mut subgraph = Self {
            start_node,
            end_nodes,
            members: IndexMap::default(),
            is_reachable,
        };

        let member_idxs: Vec<NodeIndex> = topo_order
            .iter()
            .copied()
            .filter(|&idx| subgraph.is_member(dag[idx].chain_node_id()))
            .collect();
        let member_set: HashSet<NodeIndex> = member_idxs.iter().copied().collect();
        let linked = |idx: NodeIndex, dir: Direction| {
            let mut ids: Vec<ChainNodeId> = dag
                .neighbors_directed(idx, dir)
                .filter(|neighbor| member_set.contains(neighbor))
                .map(|neighbor| dag[neighbor].chain_node_id())
                .collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };
        subgraph.members = member_idxs
            .iter()
            .map(|&idx| {
                let links = MemberLinks {
                    in_nodes: linked(idx, Direction::Incoming),
                    out_nodes: linked(idx, Direction::Outgoing),
                };
                (dag[idx].chain_node_id(), links)
            })
            .collect();

        if !subgraph
            .end_nodes
            .iter()
            .any(|end_node| subgraph.members.contains_key(end_node))
        {
            return Err(ChainGraphError::NoPathToEndNode(start_node));
        }
        trace!(
            "bounded subgraph from {start_node}: {} member(s), {} end node(s)",
            subgraph.members.len(),
            subgraph.end_nodes.len()
        );
        Ok(subgraph)
    }

    /// The producer this subgraph starts from.
    #[must_use]
    pub fn start_node(&self) -> ChainNodeId {
        self.start_node
    }

    /// The consumers bounding this subgraph, in insertion order.
    #[must_use]
    pub fn end_nodes(&self) -> &IndexSet<ChainNodeId> {
        &self.end_nodes
    }

    /// Member nodes in topological order.
    pub fn member_nodes(&self) -> impl ExactSizeIterator<Item = ChainNodeId> + '_ {
        self.members.keys().copied()
    }

    /// Whether `node` is a member.
    #[must_use]
    pub fn contains(&self, node: ChainNodeId) -> bool {
        self.members.contains_key(&node)
    }

    /// Member predecessors of a member node, ascending by id. Empty for
    /// non-members.
    #[must_use]
    pub fn in_nodes(&self, node: ChainNodeId) -> &[ChainNodeId] {
        self.members
            .get(&node)
            .map_or(&[], |links| links.in_nodes.as_slice())
    }

    /// Member successors of a member node, ascending by id. Empty for
    /// non-members.
    #[must_use]
    pub fn out_nodes(&self, node: ChainNodeId) -> &[ChainNodeId] {
        self.members
            .get(&node)
            .map_or(&[], |links| links.out_nodes.as_slice())
    }

    /// Whether `node` can be reached from the start node.
    #[must_use]
    pub fn is_reachable_from_start_node(&self, node: ChainNodeId) -> bool {
        self.is_reachable.is_reachable(self.start_node, node)
    }

    /// Whether `node` reaches at least one end node.
    #[must_use]
    pub fn is_reachable_to_end_node(&self, node: ChainNodeId) -> bool {
        self.end_nodes
            .iter()
            .any(|&end_node| self.is_reachable.is_reachable(node, end_node))
    }

    fn is_member(&self, node: ChainNodeId) -> bool {
        self.is_reachable_from_start_node(node) && self.is_reachable_to_end_node(node)
    }

    /// Computes the maximum-total-time path from the start node to one of
    /// the end nodes.
    ///
    /// Members are visited in topological order. The distance of a node is
    /// its own time plus the largest distance among its member predecessors
    /// (just its own time for the start node). Ties between predecessors, and
    /// between end nodes, go to the lowest chain node id.
    ///
    /// Returns the chain node ids on the path, from the start node to the
    /// chosen end node.
    ///
    /// # Errors
    /// `InvalidNodeTime` if `time4chain_node_id` yields a negative or
    /// non-finite value for a member, or if the total time up to a member
    /// overflows to infinity (`time` then holds that total). `NoPathToEndNode`
    /// if the walk back
    /// from the chosen end node does not arrive at the start node.
    pub fn calc_longest_path(
        &self,
        time4chain_node_id: impl Fn(ChainNodeId) -> f64,
    ) -> Result<Vec<ChainNodeId>, ChainGraphError> {
        let mut dist: HashMap<ChainNodeId, f64> =
            HashMap::with_capacity_and_hasher(self.members.len(), FxBuildHasher);
        let mut prev: HashMap<ChainNodeId, ChainNodeId> =
            HashMap::with_capacity_and_hasher(self.members.len(), FxBuildHasher);

        for (&node, links) in &self.members {
            let time = time4chain_node_id(node);
            if !time.is_finite() || time < 0.0 {
                return Err(ChainGraphError::InvalidNodeTime { node, time });
            }
            let mut best: Option<(f64, ChainNodeId)> = None;
            for &in_node in &links.in_nodes {
                let in_dist = *dist.get(&in_node).expect("BoundedSubgraph::calc_longest_path: [1]");
                if best.is_none_or(|(best_dist, _)| in_dist > best_dist) {
                    best = Some((in_dist, in_node));
                }
            }
            let node_dist = match best {
                Some((in_dist, in_node)) => {
                    prev.insert(node, in_node);
                    in_dist + time
                }
                None => time,
            };
            if !node_dist.is_finite() {
                return Err(ChainGraphError::InvalidNodeTime { node, time: node_dist });
            }
            dist.insert(node, node_dist);
        }

        let mut end_nodes: Vec<ChainNodeId> = self
            .end_nodes
            .iter()
            .copied()
            .filter(|end_node| dist.contains_key(end_node))
            .collect();
        end_nodes.sort_unstable();
        let mut best_end: Option<(f64, ChainNodeId)> = None;
        for end_node in end_nodes {
            let end_dist = dist[&end_node];
            if best_end.is_none_or(|(best_dist, _)| end_dist > best_dist) {
                best_end = Some((end_dist, end_node));
            }
        }
        let Some((_, end_node)) = best_end else {
            return Err(ChainGraphError::NoPathToEndNode(self.start_node));
        };

        let mut path = vec![end_node];
        let mut cursor = end_node;
        while let Some(&in_node) = prev.get(&cursor) {
            path.push(in_node);
            cursor = in_node;
        }
        if cursor != self.start_node {
            return Err(ChainGraphError::NoPathToEndNode(self.start_node));
        }
        path.reverse();
        Ok(path)
    }
}
