use crate::types::{ChainNodeId, ChainRegisterId};
use thiserror::Error;

/// Error kind for chain graph construction and analysis failures.
///
/// None of these are recoverable: each one means the graph description is
/// malformed and no analysis result built from it can be trusted.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ChainGraphError {
    /// The shared node/register id counter would exceed its limit.
    #[error("chain id counter exhausted: limit is {limit}")]
    IdExhausted {
        /// Configured maximum id.
        limit: i64,
    },
    /// A chain node id that does not belong to this graph.
    #[error("unknown chain node {0}")]
    UnknownNode(ChainNodeId),
    /// A chain register id that does not belong to this graph.
    #[error("unknown chain register {0}")]
    UnknownRegister(ChainRegisterId),
    /// A node was wired to consume a register it produces itself.
    #[error("chain node {node} cannot consume its own register {register}")]
    SelfConsumption {
        /// The offending node.
        node: ChainNodeId,
        /// The register it both produces and consumes.
        register: ChainRegisterId,
    },
    /// The producer of a register was reassigned after consumers were
    /// attached.
    #[error("producer of chain register {0} is locked: consumers are already attached")]
    ProducerLocked(ChainRegisterId),
    /// A diff was dispatched through a register that has no diff handler.
    #[error("chain register {0} has no diff handler")]
    MissingDiffHandler(ChainRegisterId),
    /// A register is never consumed once construction completes.
    #[error("chain register {register} produced by `{producer}` has no consumers")]
    UnconsumedRegister {
        /// The unused register.
        register: ChainRegisterId,
        /// Name of its producer node.
        producer: String,
    },
    /// The node/edge graph contains cycle(s).
    #[error("chain graph contains cycle(s) through chain node {0}")]
    Cycle(ChainNodeId),
    /// A consumer of a register cannot be reached from the register's
    /// producer.
    #[error("consumer {consumer} of chain register {register} is unreachable from producer {producer}")]
    UnreachableConsumer {
        /// The register.
        register: ChainRegisterId,
        /// Its producer.
        producer: ChainNodeId,
        /// The unreachable consumer.
        consumer: ChainNodeId,
    },
    /// A bounded subgraph whose start node reaches none of its end nodes.
    #[error("no path from chain node {0} to any end node")]
    NoPathToEndNode(ChainNodeId),
    /// The time function returned a negative, infinite or NaN value.
    #[error("invalid time {time} for chain node {node}")]
    InvalidNodeTime {
        /// The node being timed.
        node: ChainNodeId,
        /// The rejected time.
        time: f64,
    },
}
