//! The pass interface and the analyses passes share.

use bitflags::bitflags;

use crate::{
    analysis::{detect_loops, LoopForest},
    ir::Function,
    utils::graph::{compute_dominators, DominatorTree},
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Function-level analyses that can be cached between passes.
    pub struct Analyses: u8 {
        /// The dominator tree of the CFG
        const DOMINATORS = 0x01;
        /// The natural loop forest (needs the dominator tree)
        const LOOPS = 0x02;
    }
}

/// Cached analysis results for one function.
///
/// Results are computed on first request and kept until a pass that changed
/// the function does not declare them as preserved.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    dominators: Option<DominatorTree>,
    loops: Option<LoopForest>,
}

impl AnalysisCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the analyses that are currently cached.
    #[must_use]
    pub fn cached(&self) -> Analyses {
        let mut cached = Analyses::empty();
        cached.set(Analyses::DOMINATORS, self.dominators.is_some());
        cached.set(Analyses::LOOPS, self.loops.is_some());
        cached
    }

    /// Computes every analysis in `which` that is not cached yet.
    pub fn compute(&mut self, func: &Function, which: Analyses) {
        if which.intersects(Analyses::DOMINATORS | Analyses::LOOPS) && self.dominators.is_none() {
            self.dominators = Some(compute_dominators(func));
        }
        if which.contains(Analyses::LOOPS) && self.loops.is_none() {
            if let Some(dominators) = &self.dominators {
                self.loops = Some(detect_loops(func, dominators));
            }
        }
    }

    /// Returns the dominator tree, computing it if needed.
    pub fn dominators(&mut self, func: &Function) -> &DominatorTree {
        let tree = match self.dominators.take() {
            Some(tree) => tree,
            None => compute_dominators(func),
        };
        self.dominators.insert(tree)
    }

    /// Returns the loop forest, computing it (and the dominator tree) if
    /// needed.
    pub fn loops(&mut self, func: &Function) -> &LoopForest {
        let forest = match self.loops.take() {
            Some(forest) => forest,
            None => detect_loops(func, self.dominators(func)),
        };
        self.loops.insert(forest)
    }

    /// Returns the cached dominator tree without computing it.
    #[must_use]
    pub fn dominator_tree(&self) -> Option<&DominatorTree> {
        self.dominators.as_ref()
    }

    /// Returns the cached loop forest without computing it.
    #[must_use]
    pub fn loop_forest(&self) -> Option<&LoopForest> {
        self.loops.as_ref()
    }

    /// Drops every cached analysis not contained in `preserved`.
    pub fn invalidate(&mut self, preserved: Analyses) {
        if !preserved.contains(Analyses::DOMINATORS) {
            self.dominators = None;
        }
        if !preserved.contains(Analyses::LOOPS) {
            self.loops = None;
        }
    }
}

/// A transformation over one function.
///
/// Passes are stateless; everything they need is either in the function or in
/// the analysis cache handed to [`Pass::run`].
pub trait Pass {
    /// Unique name of the pass.
    fn name(&self) -> &'static str;

    /// Human-readable description of the pass.
    fn description(&self) -> &'static str;

    /// Names of the passes that must have been scheduled before this one.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    /// Analyses computed before the pass runs.
    fn required_analyses(&self) -> Analyses {
        Analyses::empty()
    }

    /// Analyses that stay valid when the pass changes the function.
    fn preserved_analyses(&self) -> Analyses {
        Analyses::empty()
    }

    /// Runs the pass, returning `true` if the function changed.
    ///
    /// # Errors
    ///
    /// Returns an error if a precondition of the pass is violated.
    fn run(&self, func: &mut Function, analyses: &mut AnalysisCache) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Terminator, Value};

    #[test]
    fn test_cache_computes_and_invalidates() -> Result<()> {
        let mut func = Function::new("f", 1);
        let header = func.add_block();
        let exit = func.add_block();
        func.set_terminator(func.entry(), Terminator::Branch(header))?;
        func.set_terminator(
            header,
            Terminator::CondBranch {
                cond: Value::Arg(0),
                then_block: header,
                else_block: exit,
            },
        )?;
        func.set_terminator(exit, Terminator::Return(None))?;

        let mut cache = AnalysisCache::new();
        assert!(cache.cached().is_empty());

        assert_eq!(cache.loops(&func).len(), 1);
        assert_eq!(cache.cached(), Analyses::all());

        cache.invalidate(Analyses::DOMINATORS);
        assert_eq!(cache.cached(), Analyses::DOMINATORS);
        assert!(cache.loop_forest().is_none());

        cache.compute(&func, Analyses::LOOPS);
        assert!(cache.loop_forest().is_some());

        cache.invalidate(Analyses::empty());
        assert!(cache.dominator_tree().is_none());
        Ok(())
    }
}
