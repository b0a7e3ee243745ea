//! Depth-first traversal orders.
//!
//! - [`postorder`] - every reachable node after all nodes reachable from it
//!   along tree edges
//! - [`reverse_postorder`] - the preferred order for forward data flow and for
//!   numbering blocks so that definitions precede uses along forward edges
//! - [`reachable`] - the set of nodes reachable from a start node
//!
//! All traversals are iterative, so arbitrarily deep CFGs do not exhaust the
//! native stack.

use crate::utils::{
    graph::{NodeId, Successors},
    BitSet,
};

/// Computes the postorder traversal of nodes reachable from `start`.
///
/// Successors are explored in edge order. Returns an empty vector if `start`
/// is out of range.
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return Vec::new();
    }

    #[derive(Clone, Copy)]
    enum State {
        Enter,
        Exit,
    }

    let mut visited = BitSet::new(node_count);
    let mut result = Vec::with_capacity(node_count);
    let mut stack = vec![(start, State::Enter)];

    while let Some((node, state)) = stack.pop() {
        match state {
            State::Enter => {
                if !visited.insert(node.index()) {
                    continue;
                }
                stack.push((node, State::Exit));

                // Reverse so that the first successor is explored first
                let successors: Vec<NodeId> = graph.successors(node).collect();
                for &succ in successors.iter().rev() {
                    if !visited.contains(succ.index()) {
                        stack.push((succ, State::Enter));
                    }
                }
            }
            State::Exit => result.push(node),
        }
    }

    result
}

/// Computes the reverse postorder traversal of nodes reachable from `start`.
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut order = postorder(graph, start);
    order.reverse();
    order
}

/// Returns the set of nodes reachable from `start`, `start` included.
pub fn reachable<G: Successors>(graph: &G, start: NodeId) -> BitSet {
    let node_count = graph.node_count();
    let mut visited = BitSet::new(node_count);
    if start.index() >= node_count {
        return visited;
    }

    let mut stack = vec![start];
    visited.insert(start.index());
    while let Some(node) = stack.pop() {
        for succ in graph.successors(node) {
            if visited.insert(succ.index()) {
                stack.push(succ);
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::tests::AdjacencyGraph;

    #[test]
    fn test_postorder_diamond() {
        let graph = AdjacencyGraph::new(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let order = postorder(&graph, NodeId::new(0));

        assert_eq!(
            order,
            vec![NodeId::new(3), NodeId::new(1), NodeId::new(2), NodeId::new(0)]
        );
    }

    #[test]
    fn test_reverse_postorder_loop() {
        let graph = AdjacencyGraph::new(4, &[(0, 1), (1, 2), (2, 1), (1, 3)]);
        let order = reverse_postorder(&graph, NodeId::new(0));

        assert_eq!(order[0], NodeId::new(0));
        assert_eq!(order[1], NodeId::new(1));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_reachable_skips_orphans() {
        let graph = AdjacencyGraph::new(4, &[(0, 1), (2, 3)]);
        let set = reachable(&graph, NodeId::new(0));

        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 1]);
        assert!(reachable(&graph, NodeId::new(9)).is_empty());
    }
}
