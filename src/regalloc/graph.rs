//! The interference graph.
//!
//! One vertex per virtual register with a non-empty interval, in register
//! order, and an edge between every pair of vertices whose intervals overlap.
//! Adjacency rows and the presence flags are [`BitSet`]s; removing a vertex
//! only clears its presence flag, so degrees always count present neighbors.

use std::collections::HashMap;

use crate::{
    regalloc::{LiveIntervals, VirtReg},
    utils::BitSet,
};

/// Interference between the virtual registers of one function.
#[derive(Debug, Clone)]
pub struct InterferenceGraph {
    vregs: Vec<VirtReg>,
    index: HashMap<VirtReg, usize>,
    adjacency: Vec<BitSet>,
    present: BitSet,
}

impl InterferenceGraph {
    /// Builds the graph from the current intervals. All vertices start out
    /// present.
    #[must_use]
    pub fn build(intervals: &LiveIntervals) -> Self {
        let vregs: Vec<VirtReg> = intervals
            .iter()
            .filter(|li| !li.is_empty())
            .map(|li| li.reg())
            .collect();
        let n = vregs.len();
        let index = vregs.iter().enumerate().map(|(i, &r)| (r, i)).collect();

        let mut adjacency = vec![BitSet::new(n); n];
        for i in 0..n {
            let Some(a) = intervals.interval(vregs[i]) else {
                continue;
            };
            for j in (i + 1)..n {
                if intervals.interval(vregs[j]).is_some_and(|b| a.overlaps(b)) {
                    adjacency[i].insert(j);
                    adjacency[j].insert(i);
                }
            }
        }

        Self {
            vregs,
            index,
            adjacency,
            present: BitSet::full(n),
        }
    }

    /// Returns the number of vertices, removed ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vregs.len()
    }

    /// Returns `true` if the graph has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vregs.is_empty()
    }

    /// Returns the virtual register of a vertex.
    #[must_use]
    pub fn vreg(&self, vertex: usize) -> Option<VirtReg> {
        self.vregs.get(vertex).copied()
    }

    /// Returns the vertex of a virtual register.
    #[must_use]
    pub fn vertex(&self, reg: VirtReg) -> Option<usize> {
        self.index.get(&reg).copied()
    }

    /// Returns `true` if the vertex has not been removed.
    #[must_use]
    pub fn is_present(&self, vertex: usize) -> bool {
        self.present.contains(vertex)
    }

    /// Iterates over the present vertices in index order.
    pub fn present(&self) -> impl Iterator<Item = usize> + '_ {
        self.present.iter()
    }

    /// Returns the number of present vertices.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.present.count()
    }

    /// Returns the number of present neighbors of a vertex.
    #[must_use]
    pub fn degree(&self, vertex: usize) -> usize {
        self.adjacency
            .get(vertex)
            .map_or(0, |row| row.intersection_count(&self.present))
    }

    /// Returns `true` if the two vertices interfere, whether present or not.
    #[must_use]
    pub fn interferes(&self, a: usize, b: usize) -> bool {
        self.adjacency.get(a).is_some_and(|row| row.contains(b))
    }

    /// Iterates over all neighbors of a vertex, whether present or not.
    pub fn neighbors(&self, vertex: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency.get(vertex).into_iter().flat_map(BitSet::iter)
    }

    /// Removes a vertex. Returns `false` if it was already removed.
    pub fn remove(&mut self, vertex: usize) -> bool {
        self.present.remove(vertex)
    }
}
