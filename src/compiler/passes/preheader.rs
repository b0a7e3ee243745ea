//! Loop preheader insertion.
//!
//! Gives every loop a dedicated preheader, a block outside the loop whose only
//! successor is the header and through which every entering edge passes:
//!
//! ```text
//!   [a]   [b]             [a]   [b]
//!     \   /                 \   /
//!      v v        →          v v
//!   [header] <-+          [preheader]
//!      |       |               |
//!     ...  ----+               v
//!                          [header] <-+
//!                              |      |
//!                             ...  ---+
//! ```
//!
//! Header phis are split: the operands from outside the loop move into a phi in
//! the preheader (or collapse into the single value they agree on), and the
//! header phi receives that value from the preheader instead.
//!
//! A loop whose header is the entry block has no entering edge and is left as
//! it is.

use crate::{
    compiler::pass::{Analyses, AnalysisCache, Pass},
    ir::{BlockId, Function, InstId, Terminator, Value},
    Result,
};

/// Inserts a preheader in front of every loop lacking one.
pub struct LoopPreheaderPass;

impl Default for LoopPreheaderPass {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopPreheaderPass {
    /// Creates a new preheader insertion pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the header and entering predecessors of the first loop that
    /// needs a preheader.
    fn next_candidate(func: &Function, analyses: &mut AnalysisCache) -> Option<(BlockId, Vec<BlockId>)> {
        analyses.loops(func).iter().find_map(|l| {
            let outside = l.outside_predecessors(func);
            (l.preheader.is_none() && !outside.is_empty()).then_some((l.header, outside))
        })
    }
}

/// Routes every edge from `outside` into `header` through a new block.
fn insert_preheader(func: &mut Function, header: BlockId, outside: &[BlockId]) -> Result<BlockId> {
    let preheader = func.add_block();

    for &pred in outside {
        if let Some(term) = func.block_mut(pred)?.terminator.as_mut() {
            term.retarget(header, preheader);
        }
        func.add_predecessor(preheader, pred)?;
    }
    func.block_mut(header)?
        .preds
        .retain(|pred| !outside.contains(pred));

    let phis: Vec<InstId> = func.block_mut(header)?.phis.clone();
    for phi in phis {
        let mut entering = Vec::with_capacity(outside.len());
        if let Some(node) = func.inst_mut(phi)?.kind.as_phi_mut() {
            for &pred in outside {
                if let Some(value) = node.remove_incoming(pred) {
                    entering.push((pred, value));
                }
            }
        }

        let value = match entering.as_slice() {
            [] => continue,
            [(_, first), rest @ ..] if rest.iter().all(|(_, v)| v == first) => *first,
            _ => {
                let split = func.create_phi(preheader)?;
                for &(pred, value) in &entering {
                    func.set_phi_incoming(split, pred, value)?;
                }
                Value::Inst(split)
            }
        };
        func.set_phi_incoming(phi, preheader, value)?;
    }

    func.set_terminator(preheader, Terminator::Branch(header))?;
    Ok(preheader)
}

impl Pass for LoopPreheaderPass {
    fn name(&self) -> &'static str {
        "loop-preheaders"
    }

    fn description(&self) -> &'static str {
        "Inserts a dedicated preheader block in front of every loop"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["dead-block-elimination"]
    }

    fn run(&self, func: &mut Function, analyses: &mut AnalysisCache) -> Result<bool> {
        let mut inserted = 0usize;

        while let Some((header, outside)) = Self::next_candidate(func, analyses) {
            let preheader = insert_preheader(func, header, &outside)?;
            analyses.invalidate(Analyses::empty());
            inserted += 1;
            log::debug!(
                "{}: inserted preheader {} for loop {} ({} entering edges)",
                func.name(),
                preheader,
                header,
                outside.len()
            );
        }
        Ok(inserted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// a, b -> header -> header | exit, with a phi merging 1 / 2 / itself.
    fn two_entries(same: bool) -> Result<(Function, [BlockId; 4], InstId)> {
        let mut func = Function::new("f", 1);
        let entry = func.entry();
        let a = func.add_block();
        let b = func.add_block();
        let header = func.add_block();
        let exit = func.add_block();

        func.set_terminator(
            entry,
            Terminator::CondBranch {
                cond: Value::Arg(0),
                then_block: a,
                else_block: b,
            },
        )?;
        func.set_terminator(a, Terminator::Branch(header))?;
        func.set_terminator(b, Terminator::Branch(header))?;
        func.set_terminator(
            header,
            Terminator::CondBranch {
                cond: Value::Arg(0),
                then_block: header,
                else_block: exit,
            },
        )?;
        let phi = func.create_phi(header)?;
        func.set_phi_incoming(phi, a, Value::int(1))?;
        func.set_phi_incoming(phi, b, Value::int(if same { 1 } else { 2 }))?;
        func.set_phi_incoming(phi, header, Value::Inst(phi))?;
        func.set_terminator(exit, Terminator::Return(Some(Value::Inst(phi))))?;
        func.verify()?;
        Ok((func, [a, b, header, exit], phi))
    }

    #[test]
    fn test_preheader_splits_phi() -> Result<()> {
        let (mut func, [a, b, header, _], phi) = two_entries(false)?;
        let mut analyses = AnalysisCache::new();
        assert!(LoopPreheaderPass::new().run(&mut func, &mut analyses)?);
        func.verify()?;

        let forest = analyses.loops(&func);
        let preheader = forest
            .loop_for_header(header)
            .and_then(|l| l.preheader)
            .unwrap();
        assert_eq!(func.predecessors(preheader), &[a, b]);
        assert_eq!(func.predecessors(header), &[header, preheader]);

        let split = func.block(preheader).unwrap().phis()[0];
        let node = func.phi(phi).unwrap();
        assert_eq!(node.incoming(preheader), Some(Value::Inst(split)));
        assert_eq!(node.incoming(header), Some(Value::Inst(phi)));
        assert_eq!(func.phi(split).unwrap().incoming(b), Some(Value::int(2)));
        Ok(())
    }

    #[test]
    fn test_agreeing_values_need_no_phi() -> Result<()> {
        let (mut func, [_, _, header, _], phi) = two_entries(true)?;
        let mut analyses = AnalysisCache::new();
        LoopPreheaderPass::new().run(&mut func, &mut analyses)?;
        func.verify()?;

        let preheader = analyses
            .loops(&func)
            .loop_for_header(header)
            .and_then(|l| l.preheader)
            .unwrap();
        assert!(func.block(preheader).unwrap().phis().is_empty());
        assert_eq!(func.phi(phi).unwrap().incoming(preheader), Some(Value::int(1)));
        Ok(())
    }

    #[test]
    fn test_existing_preheader_is_kept() -> Result<()> {
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

        assert!(!LoopPreheaderPass::new().run(&mut func, &mut AnalysisCache::new())?);
        assert_eq!(func.block_count(), 3);
        Ok(())
    }
}
