//! The standard compilation pipeline for a single function.

use crate::{
    analysis::compute_live_intervals,
    compiler::{
        AnalysisCache, CompilerConfig, ConstantBranchFoldingPass, ConstantOpsPass,
        DeadBlockEliminationPass, LicmPass, LoopPreheaderPass, PassScheduler,
    },
    ir::{Function, Value},
    regalloc::{Allocation, InlineSpiller, LiveIntervals, PhysReg, RegisterAllocator},
    Result,
};

/// A function after optimization and register allocation.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    /// The optimized function.
    pub function: Function,
    /// Live intervals after allocation, spill products included.
    pub intervals: LiveIntervals,
    /// The register assignment and the spills performed.
    pub allocation: Allocation,
}

impl CompiledFunction {
    /// Returns the register holding `value` over its whole lifetime, or `None`
    /// if the value was spilled or has no register.
    #[must_use]
    pub fn register_of(&self, value: Value) -> Option<PhysReg> {
        let reg = self.intervals.vreg_for(value)?;
        self.allocation.assignment(reg)
    }

    /// Returns `true` if `value` lives in a stack slot.
    #[must_use]
    pub fn is_spilled(&self, value: Value) -> bool {
        self.intervals
            .vreg_for(value)
            .is_some_and(|reg| self.allocation.is_spilled(reg))
    }
}

/// Builds the pass schedule for `config`.
fn build_scheduler(config: &CompilerConfig) -> PassScheduler {
    let mut scheduler = PassScheduler::new().with_verify(config.verify);
    scheduler.add(Box::new(ConstantOpsPass::new()));
    scheduler.add(Box::new(ConstantBranchFoldingPass::new()));
    scheduler.add(Box::new(DeadBlockEliminationPass::new()));
    if config.licm {
        scheduler.add(Box::new(LoopPreheaderPass::new()));
        scheduler.add(Box::new(LicmPass::new()));
    }
    scheduler
}

/// Optimizes `func` and allocates registers for it.
///
/// Runs constant folding, branch folding and dead block elimination, then
/// (if enabled) preheader insertion and LICM. The pass list is repeated until
/// it changes nothing or `config.max_iterations` is reached. Live intervals
/// are computed on the result and handed to the register allocator with an
/// [`InlineSpiller`].
///
/// # Errors
///
/// Returns the first error of a pass, of verification or of the allocator,
/// e.g. [`crate::Error::AllocationFailed`].
///
/// # Examples
///
/// ```rust
/// use ssaopt::{compile_function, ir::BinaryOp, CompilerConfig, FunctionBuilder};
///
/// let mut b = FunctionBuilder::new("add", 2);
/// let sum = b.binary(BinaryOp::Add, b.arg(0), b.arg(1))?;
/// b.ret(Some(sum))?;
///
/// let compiled = compile_function(b.finish()?, &CompilerConfig::default())?;
/// assert!(compiled.register_of(sum).is_some());
/// # Ok::<(), ssaopt::Error>(())
/// ```
pub fn compile_function(mut func: Function, config: &CompilerConfig) -> Result<CompiledFunction> {
    let mut analyses = AnalysisCache::new();
    let changed = build_scheduler(config).run_to_fixpoint(
        &mut func,
        &mut analyses,
        config.max_iterations,
    )?;
    log::debug!(
        "{}: optimized ({}), {} blocks, {} instructions",
        func.name(),
        if changed { "changed" } else { "unchanged" },
        func.block_count(),
        func.inst_count()
    );

    let mut intervals = compute_live_intervals(&func, analyses.loops(&func));
    let allocator = RegisterAllocator::new(config.registers.clone(), config.num_colors);
    let mut spiller = InlineSpiller::new();
    let allocation = allocator.run(&mut intervals, &mut spiller)?;

    if config.verify {
        allocation.verify(&intervals, &config.registers)?;
    }
    Ok(CompiledFunction {
        function: func,
        intervals,
        allocation,
    })
}
