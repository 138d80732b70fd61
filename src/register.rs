use crate::{
    error::ChainGraphError,
    graph::build::ChainGraphBuilder,
    types::{ChainNodeId, ChainRegisterId, IndexSet},
};
use derive_more::Debug;
use std::sync::Arc;

/// Callback run when a gradient diff for a register becomes available.
///
/// Receives the builder and the id of the register carrying the diff. It is
/// a wiring hook: it decides which nodes consume the diff.
pub type DiffHandler =
    Arc<dyn Fn(&mut ChainGraphBuilder, ChainRegisterId) -> Result<(), ChainGraphError> + Send + Sync>;

/// A data handoff with exactly one producer and a set of consumers.
#[derive(Debug, Clone)]
pub struct ChainRegister {
    chain_register_id: ChainRegisterId,
    producer: ChainNodeId,
    consumers: IndexSet<ChainNodeId>,
    #[debug(skip)]
    diff_handler: Option<DiffHandler>,
}

impl ChainRegister {
    pub(crate) fn new(chain_register_id: ChainRegisterId, producer: ChainNodeId) -> Self {
        Self {
            chain_register_id,
            producer,
            consumers: IndexSet::default(),
            diff_handler: None,
        }
    }

    /// Unique id, drawn from the counter shared with nodes.
    #[must_use]
    pub fn chain_register_id(&self) -> ChainRegisterId {
        self.chain_register_id
    }

    /// The single node producing this register.
    #[must_use]
    pub fn producer(&self) -> ChainNodeId {
        self.producer
    }

    /// Consumers in the order they were first attached.
    #[must_use]
    pub fn consumers(&self) -> &IndexSet<ChainNodeId> {
        &self.consumers
    }

    /// Callback run by `ChainGraphBuilder::handle_diff`, if installed.
    #[must_use]
    pub fn diff_handler(&self) -> Option<&DiffHandler> {
        self.diff_handler.as_ref()
    }

    /// Adds a consumer. Returns `false` if it was already attached.
    pub(crate) fn add_consumer(&mut self, consumer: ChainNodeId) -> bool {
        self.consumers.insert(consumer)
    }

    pub(crate) fn set_producer(&mut self, producer: ChainNodeId) -> Result<(), ChainGraphError> {
        if !self.consumers.is_empty() {
            return Err(ChainGraphError::ProducerLocked(self.chain_register_id));
        }
        self.producer = producer;
        Ok(())
    }

    pub(crate) fn set_diff_handler(&mut self, diff_handler: DiffHandler) {
        self.diff_handler = Some(diff_handler);
    }
}
