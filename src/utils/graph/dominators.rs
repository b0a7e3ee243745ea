//! Dominator tree computation using the Lengauer-Tarjan algorithm.
//!
//! A node `d` **dominates** a node `n` if every path from the entry node to `n`
//! must pass through `d`. The **immediate dominator** of `n` is the unique node
//! that strictly dominates `n` but does not strictly dominate any other
//! dominator of `n`. Making each node's immediate dominator its parent yields
//! the dominator tree, rooted at the entry.
//!
//! LICM walks this tree in pre-order so that an instruction's operands are
//! always considered before the instruction itself; loop analysis uses the
//! dominance query to identify back edges.

use crate::utils::graph::{NodeId, Predecessors, RootedGraph, Successors};

const UNDEFINED: NodeId = NodeId(usize::MAX);

/// Result of dominator tree computation.
///
/// Nodes that are unreachable from the entry have no immediate dominator and
/// are neither dominated by nor dominate any other node.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// The entry (root) node of the dominator tree
    entry: NodeId,
    /// Immediate dominator for each node; `UNDEFINED` for unreachable nodes,
    /// the entry maps to itself.
    idom: Vec<NodeId>,
    /// Dominator tree children of each node, in DFS discovery order
    children: Vec<Vec<NodeId>>,
}

impl DominatorTree {
    /// Returns the entry (root) node of the dominator tree.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns `true` if `node` was reached from the entry.
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.idom.get(node.index()).is_some_and(|&d| d != UNDEFINED)
    }

    /// Returns the immediate dominator of a node, or `None` for the entry and
    /// for unreachable nodes.
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        if node == self.entry || !self.is_reachable(node) {
            None
        } else {
            Some(self.idom[node.index()])
        }
    }

    /// Checks if node `a` dominates node `b`. A node dominates itself.
    ///
    /// # Complexity
    ///
    /// O(depth) where depth is the depth of `b` in the dominator tree.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }

        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            if current == self.entry {
                return false;
            }
            current = self.idom[current.index()];
        }
    }

    /// Checks if node `a` strictly dominates node `b`.
    #[inline]
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns the children of a node in the dominator tree.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.children.get(node.index()).map_or(&[], Vec::as_slice)
    }

    /// Returns the dominator subtree rooted at `root` in pre-order.
    ///
    /// `descend` is consulted for every child before it is visited; returning
    /// `false` prunes that child together with its whole subtree.
    pub fn preorder_from<F>(&self, root: NodeId, mut descend: F) -> Vec<NodeId>
    where
        F: FnMut(NodeId) -> bool,
    {
        let mut order = Vec::new();
        if !self.is_reachable(root) {
            return order;
        }

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            order.push(node);
            // Reverse so that children are visited in their stored order
            for &child in self.children(node).iter().rev() {
                if descend(child) {
                    stack.push(child);
                }
            }
        }
        order
    }
}

/// Computes the dominator tree for a rooted graph.
///
/// # Complexity
///
/// - Time: O(E α(V)) where α is the inverse Ackermann function
/// - Space: O(V)
pub fn compute_dominators<G>(graph: &G) -> DominatorTree
where
    G: RootedGraph + Successors + Predecessors,
{
    let node_count = graph.node_count();
    let entry = graph.entry();

    if node_count == 0 {
        return DominatorTree {
            entry,
            idom: Vec::new(),
            children: Vec::new(),
        };
    }

    let mut lt = LengauerTarjan::new(node_count, entry);
    lt.compute(graph);

    let mut children = vec![Vec::new(); node_count];
    for &node in &lt.vertex[..lt.dfs_counter] {
        if node != entry {
            children[lt.idom[node.index()].index()].push(node);
        }
    }

    DominatorTree {
        entry,
        idom: lt.idom,
        children,
    }
}

/// Internal state for the Lengauer-Tarjan algorithm.
struct LengauerTarjan {
    entry: NodeId,
    /// DFS number for each node (0 = not visited)
    dfnum: Vec<usize>,
    /// Node with each DFS number (inverse of dfnum)
    vertex: Vec<NodeId>,
    /// Parent in DFS tree
    parent: Vec<NodeId>,
    /// Semidominator (stored as node ID)
    semi: Vec<NodeId>,
    idom: Vec<NodeId>,
    /// Ancestor in the forest for link-eval
    ancestor: Vec<NodeId>,
    /// Best node on path to ancestor (for path compression)
    best: Vec<NodeId>,
    /// Nodes whose semidominator is this node
    bucket: Vec<Vec<NodeId>>,
    dfs_counter: usize,
}

impl LengauerTarjan {
    fn new(n: usize, entry: NodeId) -> Self {
        Self {
            entry,
            dfnum: vec![0; n],
            vertex: vec![UNDEFINED; n],
            parent: vec![UNDEFINED; n],
            semi: (0..n).map(NodeId::new).collect(),
            idom: vec![UNDEFINED; n],
            ancestor: vec![UNDEFINED; n],
            best: (0..n).map(NodeId::new).collect(),
            bucket: vec![Vec::new(); n],
            dfs_counter: 0,
        }
    }

    fn compute<G: Successors + Predecessors>(&mut self, graph: &G) {
        self.dfs(graph, self.entry);

        for i in (1..self.dfs_counter).rev() {
            let w = self.vertex[i];
            let parent_w = self.parent[w.index()];

            for v in graph.predecessors(w) {
                if self.dfnum.get(v.index()).is_none_or(|&n| n == 0) {
                    // Unreachable predecessor
                    continue;
                }
                let u = self.eval(v);
                if self.dfnum[self.semi[u.index()].index()]
                    < self.dfnum[self.semi[w.index()].index()]
                {
                    self.semi[w.index()] = self.semi[u.index()];
                }
            }

            let semi_w = self.semi[w.index()];
            self.bucket[semi_w.index()].push(w);
            self.ancestor[w.index()] = parent_w;

            let bucket = std::mem::take(&mut self.bucket[parent_w.index()]);
            for v in bucket {
                let u = self.eval(v);
                self.idom[v.index()] = if self.semi[u.index()] == self.semi[v.index()] {
                    parent_w
                } else {
                    u
                };
            }
        }

        for i in 1..self.dfs_counter {
            let w = self.vertex[i];
            if self.idom[w.index()] != self.semi[w.index()] {
                self.idom[w.index()] = self.idom[self.idom[w.index()].index()];
            }
        }

        self.idom[self.entry.index()] = self.entry;
    }

    /// Iterative DFS assigning DFS numbers and building the spanning tree.
    fn dfs<G: Successors>(&mut self, graph: &G, start: NodeId) {
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            if self.dfnum[node.index()] != 0 {
                continue;
            }

            self.dfs_counter += 1;
            self.dfnum[node.index()] = self.dfs_counter;
            self.vertex[self.dfs_counter - 1] = node;

            let successors: Vec<NodeId> = graph.successors(node).collect();
            for &succ in successors.iter().rev() {
                if self.dfnum[succ.index()] == 0 {
                    self.parent[succ.index()] = node;
                    stack.push(succ);
                }
            }
        }
    }

    /// Finds the node with minimum semidominator on the path to the root.
    fn eval(&mut self, v: NodeId) -> NodeId {
        if self.ancestor[v.index()] == UNDEFINED {
            return v;
        }
        self.compress(v);
        self.best[v.index()]
    }

    /// Path compression, iterative to keep stack depth bounded on long chains.
    fn compress(&mut self, v: NodeId) {
        let mut path = Vec::new();
        let mut current = v;
        while self.ancestor[self.ancestor[current.index()].index()] != UNDEFINED {
            path.push(current);
            current = self.ancestor[current.index()];
        }

        while let Some(node) = path.pop() {
            let ancestor = self.ancestor[node.index()];
            let best_ancestor = self.best[ancestor.index()];
            let best_node = self.best[node.index()];
            if self.dfnum[self.semi[best_ancestor.index()].index()]
                < self.dfnum[self.semi[best_node.index()].index()]
            {
                self.best[node.index()] = best_ancestor;
            }
            self.ancestor[node.index()] = self.ancestor[ancestor.index()];
        }
    }
}
