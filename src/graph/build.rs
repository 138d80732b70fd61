use crate::{
    config::Config,
    error::ChainGraphError,
    graph::ChainGraph,
    logical::BuildApi,
    node::{ChainEdge, ChainNode, TaskKind},
    reachability::ReachabilityIndex,
    register::ChainRegister,
    subgraph::BoundedSubgraph,
    types::{ChainDag, ChainNodeId, ChainRegisterId, HashMap, IndexMap},
};
use core::num::NonZeroI64;
use log::{debug, trace};
use petgraph::{algo::toposort, graph::NodeIndex};
use std::sync::Arc;

/// Single counter shared by chain nodes and chain registers.
#[derive(Debug, Clone)]
struct IdAllocator {
    last: i64,
    limit: i64,
}

impl IdAllocator {
    fn allocate(&mut self) -> Result<NonZeroI64, ChainGraphError> {
        let next = self
            .last
            .checked_add(1)
            .filter(|&id| id <= self.limit)
            .ok_or(ChainGraphError::IdExhausted { limit: self.limit })?;
        self.last = next;
        Ok(NonZeroI64::new(next).expect("IdAllocator::allocate: [1]"))
    }
}

/// Chain graph in its building phase.
///
/// Exposes two layers:
/// - the logical surface of `BuildApi` (`op`, `model`, `loss`), which wires
///   forward, backward, diff-accumulation and model-update nodes for a
///   training step;
/// - the raw primitives it is built on (`add_node`, `add_register`,
///   `consume`, diff handlers), for callers that describe a topology
///   directly.
///
/// Queries live on `ChainGraph`, which only `freeze` produces.
#[must_use]
#[derive(Debug)]
pub struct ChainGraphBuilder {
    config: Config,
    ids: IdAllocator,
    dag: ChainDag,
    node_id_to_index: HashMap<ChainNodeId, NodeIndex>,
    registers: IndexMap<ChainRegisterId, ChainRegister>,
    /// Parameter register -> the diff-accumulation node collecting its
    /// gradients.
    diff_accumulators: HashMap<ChainRegisterId, ChainNodeId>,
}

impl Default for ChainGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainGraphBuilder {
    /// Empty builder with the default `Config`.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Empty builder with an explicit `Config`.
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ids: IdAllocator {
                last: 0,
                limit: config.max_chain_id,
            },
            dag: ChainDag::default(),
            node_id_to_index: HashMap::default(),
            registers: IndexMap::default(),
            diff_accumulators: HashMap::default(),
        }
    }

    /// The chain node with id `node`, if it was created by this builder.
    #[must_use]
    pub fn node(&self, node: ChainNodeId) -> Option<&ChainNode> {
        let idx = self.node_id_to_index.get(&node)?;
        Some(&self.dag[*idx])
    }

    /// The chain register with id `register`.
    #[must_use]
    pub fn register(&self, register: ChainRegisterId) -> Option<&ChainRegister> {
        self.registers.get(&register)
    }

    /// Number of chain nodes created so far.
    #[must_use]
    pub fn chain_node_num(&self) -> usize {
        self.dag.node_count()
    }

    /// Number of chain registers created so far.
    #[must_use]
    pub fn chain_register_num(&self) -> usize {
        self.registers.len()
    }

    /// Creates a chain node. Forward nodes record themselves as their own
    /// forward counterpart.
    ///
    /// # Errors
    /// `IdExhausted` if the id counter is used up.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        task_kind: TaskKind,
    ) -> Result<ChainNodeId, ChainGraphError> {
        let id = ChainNodeId::new(self.ids.allocate()?);
        let node = ChainNode::new(name.into(), task_kind, id);
        trace!("chain node {id}: {task_kind} `{}`", node.name());
        let idx = self.dag.add_node(node);
        self.node_id_to_index.insert(id, idx);
        Ok(id)
    }

    /// Creates a register produced by `producer`, with no consumers yet.
    ///
    /// # Errors
    /// `UnknownNode` for a foreign producer, `IdExhausted` if the id counter
    /// is used up.
    pub fn add_register(&mut self, producer: ChainNodeId) -> Result<ChainRegisterId, ChainGraphError> {
        let producer_idx = self.node_index(producer)?;
        let id = ChainRegisterId::new(self.ids.allocate()?);
        self.dag[producer_idx].add_produced_register(id);
        self.registers.insert(id, ChainRegister::new(id, producer));
        trace!("chain register {id}: produced by {producer}");
        Ok(id)
    }

    /// Makes `node` consume `register`, adding the edge from the register's
    /// producer to `node`. Consuming the same register twice has no further
    /// effect.
    ///
    /// # Errors
    /// `UnknownNode`/`UnknownRegister` for foreign ids, `SelfConsumption` if
    /// `node` produces `register`.
    pub fn consume(&mut self, node: ChainNodeId, register: ChainRegisterId) -> Result<(), ChainGraphError> {
        let node_idx = self.node_index(node)?;
        let producer = self.register_ref(register)?.producer();
        if producer == node {
            return Err(ChainGraphError::SelfConsumption { node, register });
        }
        let producer_idx = self.node_index(producer)?;
        let added = self
            .registers
            .get_mut(&register)
            .expect("ChainGraphBuilder::consume: [1]")
            .add_consumer(node);
        if added {
            self.dag[node_idx].add_consumed_register(register);
            self.dag.update_edge(producer_idx, node_idx, ChainEdge);
            trace!("chain register {register}: {producer} -> {node}");
        }
        Ok(())
    }

    /// Records `fw_node` as the forward counterpart of `node`.
    ///
    /// # Errors
    /// `UnknownNode` if either id is foreign.
    pub fn set_fw_chain_node_id(
        &mut self,
        node: ChainNodeId,
        fw_node: ChainNodeId,
    ) -> Result<(), ChainGraphError> {
        self.node_index(fw_node)?;
        let node_idx = self.node_index(node)?;
        self.dag[node_idx].set_fw_chain_node_id(fw_node);
        Ok(())
    }

    /// Moves `register` to a new producer. Only allowed while the register
    /// has no consumers.
    ///
    /// # Errors
    /// `UnknownNode`/`UnknownRegister` for foreign ids, `ProducerLocked` once
    /// a consumer is attached.
    pub fn reassign_producer(
        &mut self,
        register: ChainRegisterId,
        producer: ChainNodeId,
    ) -> Result<(), ChainGraphError> {
        let new_idx = self.node_index(producer)?;
        let register_ref = self
            .registers
            .get_mut(&register)
            .ok_or(ChainGraphError::UnknownRegister(register))?;
        let old_producer = register_ref.producer();
        register_ref.set_producer(producer)?;
        let old_idx = self.node_index(old_producer)?;
        self.dag[old_idx].remove_produced_register(register);
        self.dag[new_idx].add_produced_register(register);
        Ok(())
    }

    /// Installs the callback run by `handle_diff` for `register`, replacing
    /// any previous one.
    ///
    /// # Errors
    /// `UnknownRegister` for a foreign id.
    pub fn set_diff_handler(
        &mut self,
        register: ChainRegisterId,
        diff_handler: impl Fn(&mut Self, ChainRegisterId) -> Result<(), ChainGraphError> + Send + Sync + 'static,
    ) -> Result<(), ChainGraphError> {
        self.registers
            .get_mut(&register)
            .ok_or(ChainGraphError::UnknownRegister(register))?
            .set_diff_handler(Arc::new(diff_handler));
        Ok(())
    }

    /// Hands the gradient register `diff` to the diff handler of `register`.
    ///
    /// # Errors
    /// `MissingDiffHandler` if `register` has no handler; an unset handler
    /// is never skipped silently. Otherwise whatever the handler returns.
    pub fn handle_diff(&mut self, register: ChainRegisterId, diff: ChainRegisterId) -> Result<(), ChainGraphError> {
        self.register_ref(diff)?;
        let diff_handler = self
            .register_ref(register)?
            .diff_handler()
            .cloned()
            .ok_or(ChainGraphError::MissingDiffHandler(register))?;
        diff_handler(self, diff)
    }

    /// Validates the topology and freezes it into a `ChainGraph`.
    ///
    /// Steps:
    /// 1. Every register must have at least one consumer.
    /// 2. The node/edge graph must be acyclic; its topological order is
    ///    fixed here.
    /// 3. The reachability index is built.
    /// 4. Every consumer must be reachable from its register's producer, and
    ///    one bounded subgraph per register is extracted.
    ///
    /// # Errors
    /// `UnconsumedRegister`, `Cycle`, `UnreachableConsumer`, or
    /// `NoPathToEndNode`, in that order of checking.
    pub fn freeze(self) -> Result<ChainGraph, ChainGraphError> {
        let Self {
            config,
            ids: _,
            dag,
            node_id_to_index,
            registers,
            diff_accumulators: _,
        } = self;

        for register in registers.values() {
            if register.consumers().is_empty() {
                let producer_idx = node_id_to_index[&register.producer()];
                return Err(ChainGraphError::UnconsumedRegister {
                    register: register.chain_register_id(),
                    producer: dag[producer_idx].name().to_owned(),
                });
            }
        }

        let topo_order = toposort(&dag, None)
            .map_err(|cycle| ChainGraphError::Cycle(dag[cycle.node_id()].chain_node_id()))?;
        let is_reachable = Arc::new(ReachabilityIndex::new(&dag, &topo_order));

        let subgraphs = registers
            .values()
            .map(|register| {
                let producer = register.producer();
                // `consume` always adds the producer -> consumer edge, so this
                // only fires if that edge is ever lost between wiring and here.
                for &consumer in register.consumers() {
                    if !is_reachable.is_reachable(producer, consumer) {
                        return Err(ChainGraphError::UnreachableConsumer {
                            register: register.chain_register_id(),
                            producer,
                            consumer,
                        });
                    }
                }
                let subgraph = BoundedSubgraph::new(
                    &dag,
                    &topo_order,
                    producer,
                    register.consumers().iter().copied(),
                    Arc::clone(&is_reachable),
                )?;
                Ok((register.chain_register_id(), subgraph))
            })
            .collect::<Result<IndexMap<_, _>, _>>()?;

        debug!(
            "froze chain graph: {} chain node(s), {} chain register(s)",
            dag.node_count(),
            registers.len()
        );
        Ok(ChainGraph {
            config,
            dag,
            node_id_to_index,
            registers,
            topo_order,
            is_reachable,
            subgraphs,
        })
    }

    /// Routes a gradient of the parameter `model` into its diff-accumulation
    /// node, creating the accumulator and the applying model-update node on
    /// the first gradient.
    fn accumulate_model_diff(
        &mut self,
        model: ChainRegisterId,
        md_updt_node: ChainNodeId,
        model_diff: ChainRegisterId,
    ) -> Result<(), ChainGraphError> {
        let diff_acc_node = match self.diff_accumulators.get(&model) {
            Some(&diff_acc_node) => diff_acc_node,
            None => {
                let name = self.node_ref(md_updt_node)?.name().to_owned();
                let diff_acc_node = self.add_node(name.clone(), TaskKind::DiffAccumulation)?;
                self.set_fw_chain_node_id(diff_acc_node, md_updt_node)?;
                let acc_diff = self.add_register(diff_acc_node)?;
                let md_apply_node = self.add_node(name, TaskKind::ModelUpdate)?;
                self.set_fw_chain_node_id(md_apply_node, md_updt_node)?;
                self.consume(md_apply_node, model)?;
                self.consume(md_apply_node, acc_diff)?;
                self.diff_accumulators.insert(model, diff_acc_node);
                diff_acc_node
            }
        };
        self.consume(diff_acc_node, model_diff)
    }

    fn node_index(&self, node: ChainNodeId) -> Result<NodeIndex, ChainGraphError> {
        self.node_id_to_index
            .get(&node)
            .copied()
            .ok_or(ChainGraphError::UnknownNode(node))
    }

    fn node_ref(&self, node: ChainNodeId) -> Result<&ChainNode, ChainGraphError> {
        self.node(node).ok_or(ChainGraphError::UnknownNode(node))
    }

    fn register_ref(&self, register: ChainRegisterId) -> Result<&ChainRegister, ChainGraphError> {
        self.registers
            .get(&register)
            .ok_or(ChainGraphError::UnknownRegister(register))
    }

    fn ensure_diff_handler(&self, register: ChainRegisterId) -> Result<(), ChainGraphError> {
        match self.register_ref(register)?.diff_handler() {
            Some(_) => Ok(()),
            None => Err(ChainGraphError::MissingDiffHandler(register)),
        }
    }
}

impl BuildApi for ChainGraphBuilder {
    fn op(&mut self, name: &str, inputs: &[ChainRegisterId]) -> Result<ChainRegisterId, ChainGraphError> {
        for &input in inputs {
            self.ensure_diff_handler(input)?;
        }
        let fw_node = self.add_node(name, TaskKind::Forward)?;
        for &input in inputs {
            self.consume(fw_node, input)?;
        }
        let out = self.add_register(fw_node)?;

        let bw_node = self.add_node(name, TaskKind::Backward)?;
        self.set_fw_chain_node_id(bw_node, fw_node)?;
        self.consume(bw_node, out)?;
        for &input in inputs {
            self.consume(bw_node, input)?;
            let in_diff = self.add_register(bw_node)?;
            self.handle_diff(input, in_diff)?;
        }
        self.set_diff_handler(out, move |builder, out_diff| builder.consume(bw_node, out_diff))?;
        Ok(out)
    }

    fn model(&mut self, name: &str) -> Result<ChainRegisterId, ChainGraphError> {
        let md_updt_node = self.add_node(name, TaskKind::ModelUpdate)?;
        self.set_fw_chain_node_id(md_updt_node, md_updt_node)?;
        let model = self.add_register(md_updt_node)?;
        self.set_diff_handler(model, move |builder, model_diff| {
            builder.accumulate_model_diff(model, md_updt_node, model_diff)
        })?;
        Ok(model)
    }

    fn loss(&mut self, register: ChainRegisterId) -> Result<(), ChainGraphError> {
        self.ensure_diff_handler(register)?;
        let producer = self.register_ref(register)?.producer();
        let producer_node = self.node_ref(producer)?;
        let name = producer_node.name().to_owned();
        let fw_node = producer_node.fw_chain_node_id().unwrap_or(producer);

        let loss_node = self.add_node(name, TaskKind::DiffAccumulation)?;
        self.set_fw_chain_node_id(loss_node, fw_node)?;
        self.consume(loss_node, register)?;
        let loss_diff = self.add_register(loss_node)?;
        self.handle_diff(register, loss_diff)
    }
}
