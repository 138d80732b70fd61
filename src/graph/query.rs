use crate::{
    error::ChainGraphError,
    graph::ChainGraph,
    node::{ChainNode, TaskKind},
    register::ChainRegister,
    subgraph::BoundedSubgraph,
    types::{ChainNodeId, ChainRegisterId, IndexMap},
};
use log::debug;
use petgraph::Direction;
use rayon::prelude::*;

impl ChainGraph {
    /// Number of forward chain nodes.
    #[must_use]
    pub fn fw_chain_node_num(&self) -> usize {
        self.nodes()
            .filter(|node| node.task_kind() == TaskKind::Forward)
            .count()
    }

    /// Number of chain nodes of every kind.
    #[must_use]
    pub fn chain_node_num(&self) -> usize {
        self.dag.node_count()
    }

    /// Number of chain registers.
    #[must_use]
    pub fn chain_register_num(&self) -> usize {
        self.registers.len()
    }

    /// Chain nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &ChainNode> {
        self.dag.node_weights()
    }

    /// The chain node with id `node`.
    #[must_use]
    pub fn node(&self, node: ChainNodeId) -> Option<&ChainNode> {
        let idx = self.node_id_to_index.get(&node)?;
        Some(&self.dag[*idx])
    }

    /// Chain registers in creation order.
    pub fn registers(&self) -> impl ExactSizeIterator<Item = &ChainRegister> {
        self.registers.values()
    }

    /// The chain register with id `register`.
    #[must_use]
    pub fn register(&self, register: ChainRegisterId) -> Option<&ChainRegister> {
        self.registers.get(&register)
    }

    /// Chain node ids in the topological order fixed at freeze time.
    pub fn topological_order(&self) -> impl ExactSizeIterator<Item = ChainNodeId> {
        self.topo_order
            .iter()
            .map(|&idx| self.dag[idx].chain_node_id())
    }

    /// Direct predecessors of `node`, ascending by id.
    ///
    /// # Errors
    /// `UnknownNode` for a foreign id.
    pub fn in_nodes(&self, node: ChainNodeId) -> Result<Vec<ChainNodeId>, ChainGraphError> {
        self.neighbors(node, Direction::Incoming)
    }

    /// Direct successors of `node`, ascending by id.
    ///
    /// # Errors
    /// `UnknownNode` for a foreign id.
    pub fn out_nodes(&self, node: ChainNodeId) -> Result<Vec<ChainNodeId>, ChainGraphError> {
        self.neighbors(node, Direction::Outgoing)
    }

    /// Whether `dst` can be reached from `src`. A node reaches itself.
    #[must_use]
    pub fn is_reachable(&self, src: ChainNodeId, dst: ChainNodeId) -> bool {
        self.is_reachable.is_reachable(src, dst)
    }

    /// The bounded subgraph between the producer and the consumers of
    /// `register`.
    #[must_use]
    pub fn subgraph(&self, register: ChainRegisterId) -> Option<&BoundedSubgraph> {
        self.subgraphs.get(&register)
    }

    /// Maps every chain node id to the id of its forward counterpart.
    ///
    /// Forward nodes map to themselves and backward nodes to the forward
    /// node they differentiate. Model-update and diff-accumulation nodes map
    /// to the counterpart recorded when the builder created them: the
    /// model-update node owning the parameter, or the forward node producing
    /// the loss. Nodes without a recorded counterpart map to themselves.
    #[must_use]
    pub fn chain_node_id_to_fw_chain_node_id(&self) -> IndexMap<ChainNodeId, ChainNodeId> {
        self.nodes()
            .map(|node| {
                let id = node.chain_node_id();
                (id, node.fw_chain_node_id().unwrap_or(id))
            })
            .collect()
    }

    /// Maps every chain register id to the id of its producer.
    #[must_use]
    pub fn chain_register_id_to_producer_chain_node_id(&self) -> IndexMap<ChainRegisterId, ChainNodeId> {
        self.registers
            .values()
            .map(|register| (register.chain_register_id(), register.producer()))
            .collect()
    }

    /// Critical path of a single register under `time4chain_node_id`.
    ///
    /// # Errors
    /// `UnknownRegister` for a foreign id, plus the errors of
    /// `BoundedSubgraph::calc_longest_path`.
    pub fn longest_path(
        &self,
        register: ChainRegisterId,
        time4chain_node_id: impl Fn(ChainNodeId) -> f64,
    ) -> Result<Vec<ChainNodeId>, ChainGraphError> {
        self.subgraph(register)
            .ok_or(ChainGraphError::UnknownRegister(register))?
            .calc_longest_path(time4chain_node_id)
    }

    /// Maps every chain register id to its critical path: the chain node ids
    /// from its producer to one of its consumers along the path of maximum
    /// total time.
    ///
    /// Registers are independent of each other, so their paths are computed
    /// in parallel. The result is in register creation order.
    ///
    /// # Errors
    /// The first error of `BoundedSubgraph::calc_longest_path`, in register
    /// order.
    pub fn chain_register_id_to_path_chain_node_ids<F>(
        &self,
        time4chain_node_id: F,
    ) -> Result<IndexMap<ChainRegisterId, Vec<ChainNodeId>>, ChainGraphError>
    where
        F: Fn(ChainNodeId) -> f64 + Sync,
    {
        let paths: Vec<Result<_, _>> = self
            .subgraphs
            .par_iter()
            .map(|(&register, subgraph)| -> Result<_, ChainGraphError> {
                let path = subgraph.calc_longest_path(&time4chain_node_id)?;
                debug!("chain register {register}: critical path of {} node(s)", path.len());
                Ok((register, path))
            })
            .collect();
        paths.into_iter().collect()
    }

    /// `chain_register_id_to_path_chain_node_ids` with every node timed at
    /// `Config::default_node_time`, i.e. the longest path by hop count under
    /// the default configuration.
    ///
    /// # Errors
    /// `InvalidNodeTime` if the configured default time is negative or not
    /// finite.
    pub fn chain_register_id_to_default_path_chain_node_ids(
        &self,
    ) -> Result<IndexMap<ChainRegisterId, Vec<ChainNodeId>>, ChainGraphError> {
        let default_node_time = self.config.default_node_time;
        self.chain_register_id_to_path_chain_node_ids(|_| default_node_time)
    }

    fn neighbors(&self, node: ChainNodeId, dir: Direction) -> Result<Vec<ChainNodeId>, ChainGraphError> {
        let idx = self.node_index(node)?;
        let mut ids: Vec<ChainNodeId> = self
            .dag
            .neighbors_directed(idx, dir)
            .map(|neighbor| self.dag[neighbor].chain_node_id())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
