use crate::node::{ChainEdge, ChainNode};
use core::num::NonZeroI64;
use derive_more::{Display, Into};
use indexmap::{IndexMap as _IndexMap, IndexSet as _IndexSet};
use petgraph::graph::DiGraph;
use rustc_hash::FxBuildHasher;
use std::collections::{HashMap as _HashMap, HashSet as _HashSet};

/// Unique identifier of a chain node.
///
/// Node and register ids are drawn from one shared counter of a single
/// builder, so a `ChainNodeId` never equals any `ChainRegisterId` of the
/// same graph.
#[derive(Debug, Display, Into, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ChainNodeId(NonZeroI64);

/// Unique identifier of a chain register.
#[derive(Debug, Display, Into, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ChainRegisterId(NonZeroI64);

impl ChainNodeId {
    pub(crate) fn new(raw: NonZeroI64) -> Self {
        Self(raw)
    }

    /// Raw `i64` value of the id.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0.get()
    }
}

impl ChainRegisterId {
    pub(crate) fn new(raw: NonZeroI64) -> Self {
        Self(raw)
    }

    /// Raw `i64` value of the id.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0.get()
    }
}

/// The directed graph container holding chain nodes and the edges between
/// them. Node indices follow creation order.
pub type ChainDag = DiGraph<ChainNode, ChainEdge>;

pub(crate) type HashMap<K, V> = _HashMap<K, V, FxBuildHasher>;
/// `HashSet` type with fast hasher.
pub type HashSet<T> = _HashSet<T, FxBuildHasher>;
/// `IndexMap` type with fast hasher.
pub type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
/// `IndexSet` type with fast hasher.
pub type IndexSet<T> = _IndexSet<T, FxBuildHasher>;
