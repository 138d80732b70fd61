use crate::{error::ChainGraphError, types::ChainRegisterId};

/// A logical model description: the ordered declaration of operators,
/// trainable parameters and losses of one training step.
///
/// `describe` may be replayed any number of times; each replay must issue the
/// same sequence of `BuildApi` calls so that every replay yields an identical
/// topology with identical ids.
pub trait LogicalModel {
    /// Declares the model through `api`.
    ///
    /// # Errors
    /// Whatever the builder reports; the description must stop and
    /// propagate it.
    fn describe(&self, api: &mut impl BuildApi) -> Result<(), ChainGraphError>;
}

/// Builder surface exposed to a `LogicalModel` while the chain graph is
/// being built.
pub trait BuildApi {
    /// Declares operator `name` reading `inputs`, and returns its output
    /// register.
    ///
    /// Creates the forward node and its paired backward node. The backward
    /// node consumes the output and every input, and produces one gradient
    /// register per input, which is handed to that input's diff handler.
    ///
    /// # Errors
    /// `UnknownRegister` or `MissingDiffHandler` for an input not produced by
    /// `op`/`model`, and `IdExhausted`.
    fn op(&mut self, name: &str, inputs: &[ChainRegisterId]) -> Result<ChainRegisterId, ChainGraphError>;

    /// Declares operator `name` without inputs.
    ///
    /// # Errors
    /// `IdExhausted`.
    fn source_op(&mut self, name: &str) -> Result<ChainRegisterId, ChainGraphError> {
        self.op(name, &[])
    }

    /// Declares trainable parameter `name` and returns its register.
    ///
    /// The register is produced by a model-update node. Gradients reaching
    /// it are collected by a single diff-accumulation node whose output feeds
    /// a model-update node applying them.
    ///
    /// # Errors
    /// `IdExhausted`.
    fn model(&mut self, name: &str) -> Result<ChainRegisterId, ChainGraphError>;

    /// Marks `register` as a training objective, seeding the backward
    /// chain: a diff-accumulation node consumes the loss and produces its
    /// gradient, which is dispatched through the register's diff handler.
    ///
    /// # Errors
    /// `UnknownRegister` or `MissingDiffHandler` for a register not produced
    /// by `op`/`model`, and `IdExhausted`.
    fn loss(&mut self, register: ChainRegisterId) -> Result<(), ChainGraphError>;
}
