//! Pass scheduler for orchestrating pass execution.
//!
//! The `PassScheduler` runs an ordered list of passes over one function. Before
//! anything runs it checks that every pass is preceded by the passes it
//! requires; while running it prepares the analyses each pass asks for and
//! drops the ones a changing pass does not preserve.
//!
//! A pass can expose work for an earlier one: dead block elimination may
//! collapse a phi into the constant condition of a branch that branch
//! folding already looked at. [`PassScheduler::run_to_fixpoint`] repeats the
//! whole list until an iteration changes nothing.

use crate::{
    compiler::pass::{AnalysisCache, Pass},
    ir::Function,
    Error, Result,
};

/// Runs passes in a fixed order.
pub struct PassScheduler {
    /// The passes, in execution order.
    passes: Vec<Box<dyn Pass>>,
    /// Verify the CFG after every pass that changed it.
    verify: bool,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PassScheduler {
    /// Creates an empty scheduler that verifies after each change.
    #[must_use]
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            verify: true,
        }
    }

    /// Enables or disables verification between passes.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Appends a pass.
    pub fn add(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Returns the names of the scheduled passes in order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Checks that every pass comes after the passes it requires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PassOrder`] naming the first unmet requirement.
    pub fn validate(&self) -> Result<()> {
        for (i, pass) in self.passes.iter().enumerate() {
            for &required in pass.requires() {
                if !self.passes[..i].iter().any(|p| p.name() == required) {
                    return Err(Error::PassOrder {
                        pass: pass.name(),
                        requires: required,
                    });
                }
            }
        }
        Ok(())
    }

    /// Runs all passes once with a fresh analysis cache.
    ///
    /// Returns `true` if any pass changed the function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PassOrder`] if the schedule is invalid, or the first
    /// error of a pass or of verification.
    pub fn run(&self, func: &mut Function) -> Result<bool> {
        self.run_with(func, &mut AnalysisCache::new())
    }

    /// Runs all passes once, reusing and updating `analyses`.
    ///
    /// # Errors
    ///
    /// See [`PassScheduler::run`].
    pub fn run_with(&self, func: &mut Function, analyses: &mut AnalysisCache) -> Result<bool> {
        self.validate()?;

        let mut any_changed = false;
        for pass in &self.passes {
            analyses.compute(func, pass.required_analyses());

            let changed = pass.run(func, analyses)?;
            log::debug!(
                "{}: {} {}",
                func.name(),
                pass.name(),
                if changed { "changed" } else { "unchanged" }
            );
            if !changed {
                continue;
            }

            any_changed = true;
            analyses.invalidate(pass.preserved_analyses());
            if self.verify {
                func.verify()?;
            }
        }
        Ok(any_changed)
    }

    /// Repeats all passes until an iteration leaves the function unchanged,
    /// running at most `max_iterations` iterations.
    ///
    /// Returns `true` if any iteration changed the function.
    ///
    /// # Errors
    ///
    /// See [`PassScheduler::run`].
    pub fn run_to_fixpoint(
        &self,
        func: &mut Function,
        analyses: &mut AnalysisCache,
        max_iterations: usize,
    ) -> Result<bool> {
        let mut any_changed = false;
        for iteration in 1..=max_iterations {
            if !self.run_with(func, analyses)? {
                log::debug!("{}: fixpoint after {} iterations", func.name(), iteration);
                return Ok(any_changed);
            }
            any_changed = true;
        }
        log::debug!(
            "{}: still changing after {} iterations",
            func.name(),
            max_iterations
        );
        Ok(any_changed)
    }
}
