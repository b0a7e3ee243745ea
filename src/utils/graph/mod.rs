//! Minimal directed-graph abstraction and the algorithms built on it.
//!
//! Graph algorithms in this module are written against small traits instead of
//! a concrete graph type, so they run directly on a [`Function`](crate::ir::Function)
//! CFG without copying it into an intermediate structure.
//!
//! - [`GraphBase`] - node count
//! - [`Successors`] / [`Predecessors`] - adjacency queries
//! - [`RootedGraph`] - a distinguished entry node
//!
//! Nodes are identified by [`NodeId`], a dense index. Graphs may contain
//! "holes" (indices that no longer refer to a live node); such nodes simply
//! have no edges and are never reached from the entry.

mod dominators;
mod traversal;

use std::fmt;

pub use dominators::{compute_dominators, DominatorTree};
pub use traversal::{postorder, reachable, reverse_postorder};

/// A strongly-typed identifier for nodes within a directed graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index value of this node identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Basic information about a graph.
pub trait GraphBase {
    /// Returns the number of node slots; valid node ids are `0..node_count()`.
    fn node_count(&self) -> usize;
}

/// Forward adjacency.
pub trait Successors: GraphBase {
    /// Returns the successors of `node`, in edge order.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;
}

/// Backward adjacency.
pub trait Predecessors: GraphBase {
    /// Returns the predecessors of `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;
}

/// A graph with a distinguished entry node.
pub trait RootedGraph: GraphBase {
    /// Returns the entry node.
    fn entry(&self) -> NodeId;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Adjacency-list graph for exercising the algorithms; node 0 is the entry.
    pub(crate) struct AdjacencyGraph {
        succs: Vec<Vec<NodeId>>,
        preds: Vec<Vec<NodeId>>,
    }

    impl AdjacencyGraph {
        pub(crate) fn new(nodes: usize, edges: &[(usize, usize)]) -> Self {
            let mut succs = vec![Vec::new(); nodes];
            let mut preds = vec![Vec::new(); nodes];
            for &(from, to) in edges {
                succs[from].push(NodeId(to));
                preds[to].push(NodeId(from));
            }
            Self { succs, preds }
        }
    }

    impl GraphBase for AdjacencyGraph {
        fn node_count(&self) -> usize {
            self.succs.len()
        }
    }

    impl Successors for AdjacencyGraph {
        fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
            self.succs[node.index()].iter().copied()
        }
    }

    impl Predecessors for AdjacencyGraph {
        fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
            self.preds[node.index()].iter().copied()
        }
    }

    impl RootedGraph for AdjacencyGraph {
        fn entry(&self) -> NodeId {
            NodeId(0)
        }
    }
}
