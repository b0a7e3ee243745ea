//! Graph simplification and allocation priorities.
//!
//! Vertices are removed from the interference graph one at a time. A vertex
//! with fewer than `K` present neighbors can always be colored once its
//! neighbors are, so the lowest-indexed such vertex is removed first. When no
//! such vertex is left the present vertex with the lowest spill weight is
//! removed instead and becomes a potential spill. A vertex removed later gets a
//! higher priority and is assigned earlier.

use std::collections::HashMap;

use crate::regalloc::{InterferenceGraph, LiveIntervals, VirtReg};

/// The outcome of simplifying an interference graph.
#[derive(Debug, Clone, Default)]
pub struct Simplification {
    order: Vec<VirtReg>,
    priorities: HashMap<VirtReg, u32>,
    potential_spills: Vec<VirtReg>,
}

impl Simplification {
    /// Returns the virtual registers in removal order.
    #[must_use]
    pub fn order(&self) -> &[VirtReg] {
        &self.order
    }

    /// Returns the priority of `reg`: its removal index plus one. Registers
    /// that took no part in simplification have priority 0.
    #[must_use]
    pub fn priority(&self, reg: VirtReg) -> u32 {
        self.priorities.get(&reg).copied().unwrap_or(0)
    }

    /// Returns the registers that were removed with `K` or more neighbors.
    #[must_use]
    pub fn potential_spills(&self) -> &[VirtReg] {
        &self.potential_spills
    }
}

/// Removes every vertex of `graph`, recording the removal order.
///
/// Ties between potential spills of equal weight go to the lowest index.
#[allow(clippy::cast_possible_truncation)]
pub fn simplify(
    graph: &mut InterferenceGraph,
    intervals: &LiveIntervals,
    num_colors: usize,
) -> Simplification {
    let mut result = Simplification::default();
    let weight = |reg: Option<VirtReg>| {
        reg.and_then(|r| intervals.interval(r))
            .map_or(f32::INFINITY, |li| li.weight())
    };

    while graph.present_count() > 0 {
        let trivial = graph.present().find(|&v| graph.degree(v) < num_colors);
        let (vertex, is_spill) = match trivial {
            Some(v) => (v, false),
            None => {
                let mut best: Option<(usize, f32)> = None;
                for v in graph.present() {
                    let w = weight(graph.vreg(v));
                    match best {
                        Some((_, bw)) if w >= bw => {}
                        _ => best = Some((v, w)),
                    }
                }
                match best {
                    Some((v, _)) => (v, true),
                    None => break,
                }
            }
        };

        let Some(reg) = graph.vreg(vertex) else {
            break;
        };
        let index = result.order.len() as u32;
        log::debug!(
            "simplify #{}: {} {} (degree {}, weight {:.4})",
            index,
            if is_spill { "spill candidate" } else { "trivial" },
            reg,
            graph.degree(vertex),
            weight(Some(reg))
        );

        graph.remove(vertex);
        result.order.push(reg);
        result.priorities.insert(reg, index + 1);
        if is_spill {
            result.potential_spills.push(reg);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A clique over `[0, 100)` with one register per weight.
    fn clique(weights: &[f32]) -> LiveIntervals {
        let mut intervals = LiveIntervals::new();
        for &w in weights {
            let reg = intervals.create_virt_reg(None);
            let li = intervals.interval_mut(reg).unwrap();
            li.add_segment(0, 100);
            li.set_weight(w);
        }
        intervals
    }

    #[test]
    fn test_colorable_graph_has_no_spills() {
        let intervals = clique(&[1.0, 2.0, 3.0]);
        let mut graph = InterferenceGraph::build(&intervals);
        let result = simplify(&mut graph, &intervals, 4);

        assert!(result.potential_spills().is_empty());
        assert_eq!(result.order(), &[VirtReg(0), VirtReg(1), VirtReg(2)]);
        assert_eq!(result.priority(VirtReg(2)), 3);
        assert_eq!(result.priority(VirtReg(9)), 0);
    }

    #[test]
    fn test_lowest_weight_becomes_spill_candidate() {
        let intervals = clique(&[3.0, 0.5, 2.0, 4.0, 1.0]);
        let mut graph = InterferenceGraph::build(&intervals);
        let result = simplify(&mut graph, &intervals, 4);

        assert_eq!(result.potential_spills(), &[VirtReg(1)]);
        assert_eq!(result.order()[0], VirtReg(1));
        assert_eq!(result.priority(VirtReg(1)), 1);
        assert_eq!(
            &result.order()[1..],
            &[VirtReg(0), VirtReg(2), VirtReg(3), VirtReg(4)]
        );
    }

    #[test]
    fn test_weight_ties_take_lowest_index() {
        let intervals = clique(&[1.0, 1.0, 1.0]);
        let mut graph = InterferenceGraph::build(&intervals);
        let result = simplify(&mut graph, &intervals, 1);

        assert_eq!(result.potential_spills(), &[VirtReg(0), VirtReg(1)]);
    }
}
