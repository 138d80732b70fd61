/// The building phase and its transition to the frozen graph.
pub mod build;
mod query;

use crate::{
    config::Config,
    error::ChainGraphError,
    graph::build::ChainGraphBuilder,
    logical::LogicalModel,
    reachability::ReachabilityIndex,
    register::ChainRegister,
    subgraph::BoundedSubgraph,
    types::{ChainDag, ChainNodeId, ChainRegisterId, HashMap, IndexMap},
};
use petgraph::graph::NodeIndex;
use std::sync::Arc;

/// Frozen chain graph.
///
/// Obtained from `ChainGraphBuilder::freeze` (or `ChainGraph::build`), which
/// is the only transition out of the building phase. By then:
/// - every register has at least one consumer reachable from its producer,
/// - the node/edge graph is acyclic and its topological order is fixed,
/// - the reachability index and one bounded subgraph per register exist.
///
/// A `ChainGraph` has no mutating methods; all queries are read-only and may
/// be called any number of times.
#[must_use]
#[derive(Debug)]
pub struct ChainGraph {
    config: Config,
    dag: ChainDag,
    node_id_to_index: HashMap<ChainNodeId, NodeIndex>,
    registers: IndexMap<ChainRegisterId, ChainRegister>,
    topo_order: Vec<NodeIndex>,
    is_reachable: Arc<ReachabilityIndex>,
    subgraphs: IndexMap<ChainRegisterId, BoundedSubgraph>,
}

impl ChainGraph {
    /// Replays `model` through a fresh builder with the default `Config` and
    /// freezes the result.
    ///
    /// # Errors
    /// Any error raised by the description or by `ChainGraphBuilder::freeze`.
    pub fn build(model: &impl LogicalModel) -> Result<Self, ChainGraphError> {
        Self::build_with_config(model, Config::default())
    }

    /// Same as `build`, with an explicit `Config`.
    ///
    /// # Errors
    /// Any error raised by the description or by `ChainGraphBuilder::freeze`.
    pub fn build_with_config(
        model: &impl LogicalModel,
        config: Config,
    ) -> Result<Self, ChainGraphError> {
        let mut builder = ChainGraphBuilder::with_config(config);
        model.describe(&mut builder)?;
        builder.freeze()
    }

    /// The configuration the graph was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying node/edge container.
    #[must_use]
    pub fn dag(&self) -> &ChainDag {
        &self.dag
    }

    /// The whole-graph reachability oracle.
    #[must_use]
    pub fn reachability(&self) -> &ReachabilityIndex {
        &self.is_reachable
    }

    fn node_index(&self, node: ChainNodeId) -> Result<NodeIndex, ChainGraphError> {
        self.node_id_to_index
            .get(&node)
            .copied()
            .ok_or(ChainGraphError::UnknownNode(node))
    }
}
