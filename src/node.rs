use crate::types::{ChainNodeId, ChainRegisterId};
use derive_more::Display;

/// Kind of work a chain node schedules.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Forward computation of an operator.
    Forward,
    /// Gradient computation paired with a forward node.
    Backward,
    /// Aggregation of gradient contributions.
    DiffAccumulation,
    /// Application of gradients to a trainable parameter.
    ModelUpdate,
}

/// One scheduled execution unit.
///
/// Identity is the chain node id; two nodes compare equal iff their ids do.
/// Registers the node touches are recorded by id and resolved through the
/// owning graph.
#[derive(Debug, Clone)]
pub struct ChainNode {
    name: String,
    task_kind: TaskKind,
    chain_node_id: ChainNodeId,
    fw_chain_node_id: Option<ChainNodeId>,
    produced_registers: Vec<ChainRegisterId>,
    consumed_registers: Vec<ChainRegisterId>,
}

impl ChainNode {
    pub(crate) fn new(name: String, task_kind: TaskKind, chain_node_id: ChainNodeId) -> Self {
        let fw_chain_node_id = (task_kind == TaskKind::Forward).then_some(chain_node_id);
        Self {
            name,
            task_kind,
            chain_node_id,
            fw_chain_node_id,
            produced_registers: vec![],
            consumed_registers: vec![],
        }
    }

    /// Human-readable name; not required to be unique.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role of the node in the training step.
    #[must_use]
    pub fn task_kind(&self) -> TaskKind {
        self.task_kind
    }

    /// Unique id, drawn from the counter shared with registers.
    #[must_use]
    pub fn chain_node_id(&self) -> ChainNodeId {
        self.chain_node_id
    }

    /// Forward counterpart of this node, if one was recorded.
    ///
    /// Forward nodes point at themselves. Backward nodes point at the forward
    /// node they differentiate. Model-update and diff-accumulation nodes
    /// created by the builder point at the model-update node owning the
    /// parameter, or at the forward counterpart of a loss register's
    /// producer.
    #[must_use]
    pub fn fw_chain_node_id(&self) -> Option<ChainNodeId> {
        self.fw_chain_node_id
    }

    /// Registers produced by this node, in creation order.
    #[must_use]
    pub fn produced_registers(&self) -> &[ChainRegisterId] {
        &self.produced_registers
    }

    /// Registers consumed by this node, in wiring order.
    #[must_use]
    pub fn consumed_registers(&self) -> &[ChainRegisterId] {
        &self.consumed_registers
    }

    pub(crate) fn set_fw_chain_node_id(&mut self, fw_chain_node_id: ChainNodeId) {
        self.fw_chain_node_id = Some(fw_chain_node_id);
    }

    pub(crate) fn add_produced_register(&mut self, register: ChainRegisterId) {
        self.produced_registers.push(register);
    }

    pub(crate) fn remove_produced_register(&mut self, register: ChainRegisterId) {
        self.produced_registers.retain(|&r| r != register);
    }

    pub(crate) fn add_consumed_register(&mut self, register: ChainRegisterId) {
        if !self.consumed_registers.contains(&register) {
            self.consumed_registers.push(register);
        }
    }
}

impl PartialEq for ChainNode {
    fn eq(&self, other: &Self) -> bool {
        self.chain_node_id == other.chain_node_id
    }
}

impl Eq for ChainNode {}

/// A directed arc between two chain nodes: data or control flows from the
/// source to the destination.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ChainEdge;
