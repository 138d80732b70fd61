//! Static dependency analysis of a pipelined training step.
//!
//! This crate models one step of training (forward pass, backward pass,
//! gradient accumulation, parameter update) as a Directed Acyclic Graph of
//! chain nodes connected through chain registers, and derives scheduling
//! annotations from its topology. It:
//! - Wires forward/backward/diff-accumulation/model-update nodes from a
//!   logical model description (operators, parameters, losses).
//! - Freezes the topology once, rejecting unused registers and cycles.
//! - Precomputes whole-graph forward reachability.
//! - Restricts the graph, per register, to the nodes lying on some path from
//!   its producer to one of its consumers, and finds the critical (longest
//!   weighted) path through that restriction. This bounds how long the
//!   register's buffer must stay live.
//!
//! Key modules:
//! - `graph`: the builder (`graph::build::ChainGraphBuilder`) and the frozen
//!   `graph::ChainGraph` with its queries.
//! - `logical`: the `LogicalModel`/`BuildApi` seam through which a model
//!   description drives the builder.
//! - `reachability`: the transitive-closure oracle.
//! - `subgraph`: per-register bounded subgraphs and the longest-path pass.
//! - `node`, `register`, `types`: the data model and ids.
//!
//! Quick start:
//! 1. Implement `LogicalModel::describe`, declaring operators with
//!    `BuildApi::op`, parameters with `BuildApi::model` and objectives with
//!    `BuildApi::loss`.
//! 2. Call `ChainGraph::build` to replay the description and freeze the
//!    graph.
//! 3. Query `chain_register_id_to_path_chain_node_ids` with a per-node time
//!    function (or the default-time variant for hop counts).
//!
//! Building and querying are separate types: a `ChainGraphBuilder` has no
//! queries and a `ChainGraph` has no builder operations, so nothing can be
//! asked of a graph that is not frozen yet. The analysis is deterministic:
//! ids come from a single counter, maps preserve creation order and every
//! tie in the longest-path pass is broken by the lowest chain node id.

/// Analysis knobs (default node time, id limit).
pub mod config;
/// Error type shared by construction and analysis.
pub mod error;
/// The chain graph, in its building and frozen phases.
///
/// Contains node/register wiring for operators, parameters and losses,
/// freeze-time validation (unused registers, cycles, unreachable
/// consumers), and the read-only queries of the frozen graph.
pub mod graph;
/// Logical model description interface.
///
/// Defines the `LogicalModel` trait (`describe`) and the `BuildApi` used by
/// descriptions to declare operators, parameters and losses.
pub mod logical;
/// Chain nodes, their task kinds and the edges between them.
pub mod node;
/// Whole-graph forward reachability.
pub mod reachability;
/// Chain registers and diff handlers.
pub mod register;
/// Per-register bounded subgraphs and critical paths.
pub mod subgraph;
/// Ids, the graph container alias and hashed collections.
pub mod types;
