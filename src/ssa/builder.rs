use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    ir::{BlockId, Function, InstId, Value},
    ssa::Variable,
    Result,
};

/// Per-function SSA construction state.
///
/// Holds, for every block, the current SSA value of each variable written in
/// or resolved for that block, the pending placeholder phis of unsealed
/// blocks, and the set of sealed blocks. All of it is function-scoped; call
/// [`SsaBuilder::reset`] before starting the next function.
///
/// Read operations only fail on handles that do not belong to the function.
#[derive(Debug, Default)]
pub struct SsaBuilder {
    current_defs: HashMap<BlockId, BTreeMap<Variable, Value>>,
    incomplete_phis: HashMap<BlockId, BTreeMap<Variable, InstId>>,
    sealed: HashSet<BlockId>,
    /// Phis that must not be folded: placeholders of unsealed blocks and phis
    /// whose operands are currently being collected.
    protected: HashSet<InstId>,
}

impl SsaBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all per-function state.
    pub fn reset(&mut self) {
        self.current_defs.clear();
        self.incomplete_phis.clear();
        self.sealed.clear();
        self.protected.clear();
    }

    /// Registers a block. A block created sealed never gains predecessors,
    /// which is the case for the entry block.
    pub fn add_block(&mut self, block: BlockId, sealed: bool) {
        self.current_defs.entry(block).or_default();
        if sealed {
            self.sealed.insert(block);
        }
    }

    /// Returns `true` if `block` has been sealed.
    #[must_use]
    pub fn is_sealed(&self, block: BlockId) -> bool {
        self.sealed.contains(&block)
    }

    /// Binds `var` to `value` in `block`, replacing any earlier binding there.
    pub fn write_variable(&mut self, var: Variable, block: BlockId, value: Value) {
        self.current_defs
            .entry(block)
            .or_default()
            .insert(var, value);
    }

    fn lookup(&self, var: Variable, block: BlockId) -> Option<Value> {
        self.current_defs.get(&block)?.get(&var).copied()
    }

    /// Returns the SSA value of `var` at the end of `block`.
    ///
    /// Reads that no definition reaches resolve to [`Value::Undef`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a block handle is not part of
    /// `func`.
    pub fn read_variable(
        &mut self,
        func: &mut Function,
        var: Variable,
        block: BlockId,
    ) -> Result<Value> {
        if let Some(value) = self.lookup(var, block) {
            return Ok(value);
        }
        self.read_variable_recursive(func, var, block)
    }

    fn read_variable_recursive(
        &mut self,
        func: &mut Function,
        var: Variable,
        block: BlockId,
    ) -> Result<Value> {
        // Chains of sealed single-predecessor blocks are walked iteratively;
        // every block on the way gets the resolved value bound as well.
        let mut chain = Vec::new();
        let mut current = block;

        let value = loop {
            if current != block {
                if let Some(value) = self.lookup(var, current) {
                    break value;
                }
            }

            if !self.is_sealed(current) {
                let phi = func.create_phi(current)?;
                self.incomplete_phis
                    .entry(current)
                    .or_default()
                    .insert(var, phi);
                self.protected.insert(phi);
                break Value::Inst(phi);
            }

            let preds = func.predecessors(current);
            match (preds.len(), preds.first().copied()) {
                (0, _) => break Value::Undef,
                (1, Some(pred)) => {
                    chain.push(current);
                    current = pred;
                }
                _ => {
                    let phi = func.create_phi(current)?;
                    // Bind before recursing so that cycles terminate at the phi
                    self.write_variable(var, current, Value::Inst(phi));
                    break self.add_phi_operands(func, var, current, phi)?;
                }
            }
        };

        self.write_variable(var, current, value);
        for b in chain {
            self.write_variable(var, b, value);
        }
        Ok(value)
    }

    fn add_phi_operands(
        &mut self,
        func: &mut Function,
        var: Variable,
        block: BlockId,
        phi: InstId,
    ) -> Result<Value> {
        self.protected.insert(phi);
        let preds = func.predecessors(block).to_vec();
        for pred in preds {
            let value = self.read_variable(func, var, pred)?;
            func.set_phi_incoming(phi, pred, value)?;
        }
        self.protected.remove(&phi);

        let replaced = self.try_remove_trivial_phis(func, vec![phi]);
        Ok(resolve(&replaced, Value::Inst(phi)))
    }

    /// Folds the trivial phis among `candidates`, cascading to their users, and
    /// rewrites every binding that referred to a removed phi.
    fn try_remove_trivial_phis(
        &mut self,
        func: &mut Function,
        candidates: Vec<InstId>,
    ) -> HashMap<InstId, Value> {
        let protected = &self.protected;
        let replaced: HashMap<InstId, Value> = func
            .fold_trivial_phis(candidates, |phi| !protected.contains(&phi))
            .into_iter()
            .collect();

        if !replaced.is_empty() {
            for defs in self.current_defs.values_mut() {
                for value in defs.values_mut() {
                    *value = resolve(&replaced, *value);
                }
            }
        }
        replaced
    }

    /// Seals `block`: completes its placeholder phis, marks it sealed, and
    /// removes phis bound in the block that turned out to be trivial.
    ///
    /// Sealing an already sealed block does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a block handle is not part of
    /// `func`.
    pub fn seal_block(&mut self, func: &mut Function, block: BlockId) -> Result<()> {
        if self.is_sealed(block) {
            return Ok(());
        }

        if let Some(pending) = self.incomplete_phis.remove(&block) {
            for (var, phi) in pending {
                self.add_phi_operands(func, var, block, phi)?;
            }
        }
        self.sealed.insert(block);

        let bound: Vec<InstId> = self
            .current_defs
            .get(&block)
            .map(|defs| {
                defs.values()
                    .filter_map(|v| v.as_inst())
                    .filter(|&id| func.phi(id).is_some())
                    .collect()
            })
            .unwrap_or_default();
        if !bound.is_empty() {
            self.try_remove_trivial_phis(func, bound);
        }
        Ok(())
    }
}

/// Follows replacement chains until reaching a value that was not replaced.
fn resolve(replaced: &HashMap<InstId, Value>, mut value: Value) -> Value {
    while let Value::Inst(id) = value {
        match replaced.get(&id) {
            Some(&next) => value = next,
            None => break,
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, InstKind, Terminator};

    const X: Variable = Variable(0);
    const Y: Variable = Variable(1);

    fn add(func: &mut Function, block: BlockId, lhs: Value, rhs: Value) -> Result<Value> {
        let id = func.append_inst(
            block,
            InstKind::Binary {
                op: BinaryOp::Add,
                lhs,
                rhs,
            },
        )?;
        Ok(Value::Inst(id))
    }

    fn phi_count(func: &Function) -> usize {
        func.blocks().map(|(_, bb)| bb.phis().len()).sum()
    }

    #[test]
    fn test_write_then_read_same_block() -> Result<()> {
        let mut func = Function::new("f", 0);
        let mut ssa = SsaBuilder::new();
        let entry = func.entry();
        ssa.add_block(entry, true);

        ssa.write_variable(X, entry, Value::int(5));
        assert_eq!(ssa.read_variable(&mut func, X, entry)?, Value::int(5));
        assert_eq!(phi_count(&func), 0);
        Ok(())
    }

    #[test]
    fn test_read_unwritten_is_undef() -> Result<()> {
        let mut func = Function::new("f", 0);
        let mut ssa = SsaBuilder::new();
        let entry = func.entry();
        ssa.add_block(entry, true);

        assert_eq!(ssa.read_variable(&mut func, X, entry)?, Value::Undef);
        Ok(())
    }

    #[test]
    fn test_single_predecessor_chain() -> Result<()> {
        let mut func = Function::new("f", 0);
        let mut ssa = SsaBuilder::new();
        let entry = func.entry();
        ssa.add_block(entry, true);
        ssa.write_variable(X, entry, Value::int(3));

        let mut prev = entry;
        for _ in 0..4 {
            let next = func.add_block();
            ssa.add_block(next, false);
            func.set_terminator(prev, Terminator::Branch(next))?;
            ssa.seal_block(&mut func, next)?;
            prev = next;
        }

        assert_eq!(ssa.read_variable(&mut func, X, prev)?, Value::int(3));
        assert_eq!(phi_count(&func), 0);
        Ok(())
    }

    #[test]
    fn test_if_else_merge() -> Result<()> {
        // entry: br a0, then, else; then: x = 1; else: x = 2; join: use x
        let mut func = Function::new("f", 1);
        let mut ssa = SsaBuilder::new();
        let entry = func.entry();
        ssa.add_block(entry, true);

        let then_bb = func.add_block();
        let else_bb = func.add_block();
        let join = func.add_block();
        for bb in [then_bb, else_bb, join] {
            ssa.add_block(bb, false);
        }

        func.set_terminator(
            entry,
            Terminator::CondBranch {
                cond: Value::Arg(0),
                then_block: then_bb,
                else_block: else_bb,
            },
        )?;
        ssa.seal_block(&mut func, then_bb)?;
        ssa.seal_block(&mut func, else_bb)?;

        ssa.write_variable(X, then_bb, Value::int(1));
        ssa.write_variable(X, else_bb, Value::int(2));
        func.set_terminator(then_bb, Terminator::Branch(join))?;
        func.set_terminator(else_bb, Terminator::Branch(join))?;
        ssa.seal_block(&mut func, join)?;

        let x = ssa.read_variable(&mut func, X, join)?;
        let phi = x.as_inst().and_then(|id| func.phi(id)).unwrap();
        assert_eq!(phi.incoming(then_bb), Some(Value::int(1)));
        assert_eq!(phi.incoming(else_bb), Some(Value::int(2)));

        // A second read reuses the binding
        assert_eq!(ssa.read_variable(&mut func, X, join)?, x);
        assert_eq!(phi_count(&func), 1);
        Ok(())
    }

    #[test]
    fn test_same_value_on_both_paths_needs_no_phi() -> Result<()> {
        let mut func = Function::new("f", 1);
        let mut ssa = SsaBuilder::new();
        let entry = func.entry();
        ssa.add_block(entry, true);
        ssa.write_variable(X, entry, Value::int(9));

        let then_bb = func.add_block();
        let join = func.add_block();
        ssa.add_block(then_bb, false);
        ssa.add_block(join, false);

        func.set_terminator(
            entry,
            Terminator::CondBranch {
                cond: Value::Arg(0),
                then_block: then_bb,
                else_block: join,
            },
        )?;
        ssa.seal_block(&mut func, then_bb)?;
        func.set_terminator(then_bb, Terminator::Branch(join))?;
        ssa.seal_block(&mut func, join)?;

        assert_eq!(ssa.read_variable(&mut func, X, join)?, Value::int(9));
        assert_eq!(phi_count(&func), 0);
        Ok(())
    }

    /// `x = 0; while (c) { x = x + 1; } use(x)`: exactly one header phi.
    #[test]
    fn test_loop_header_phi() -> Result<()> {
        let mut func = Function::new("f", 1);
        let mut ssa = SsaBuilder::new();
        let entry = func.entry();
        ssa.add_block(entry, true);
        ssa.write_variable(X, entry, Value::int(0));

        let header = func.add_block();
        let body = func.add_block();
        let exit = func.add_block();
        ssa.add_block(header, false);
        func.set_terminator(entry, Terminator::Branch(header))?;

        ssa.add_block(body, false);
        ssa.add_block(exit, false);
        func.set_terminator(
            header,
            Terminator::CondBranch {
                cond: Value::Arg(0),
                then_block: body,
                else_block: exit,
            },
        )?;
        ssa.seal_block(&mut func, exit)?;

        // Body is emitted before the header is sealed
        ssa.seal_block(&mut func, body)?;
        let x = ssa.read_variable(&mut func, X, body)?;
        let x1 = add(&mut func, body, x, Value::int(1))?;
        ssa.write_variable(X, body, x1);
        func.set_terminator(body, Terminator::Branch(header))?;
        ssa.seal_block(&mut func, header)?;

        let after = ssa.read_variable(&mut func, X, exit)?;
        func.set_terminator(exit, Terminator::Return(Some(after)))?;

        assert_eq!(phi_count(&func), 1);
        let phi_id = after.as_inst().unwrap();
        let phi = func.phi(phi_id).unwrap();
        assert_eq!(func.inst(phi_id).unwrap().block(), header);
        assert_eq!(phi.incoming(entry), Some(Value::int(0)));
        assert_eq!(phi.incoming(body), Some(x1));
        assert_eq!(x, after);
        func.verify()
    }

    #[test]
    fn test_loop_invariant_variable_has_no_phi() -> Result<()> {
        // y is written before the loop and only read inside it
        let mut func = Function::new("f", 1);
        let mut ssa = SsaBuilder::new();
        let entry = func.entry();
        ssa.add_block(entry, true);
        ssa.write_variable(Y, entry, Value::Arg(0));

        let header = func.add_block();
        let body = func.add_block();
        let exit = func.add_block();
        for bb in [header, body, exit] {
            ssa.add_block(bb, false);
        }
        func.set_terminator(entry, Terminator::Branch(header))?;
        let cond = ssa.read_variable(&mut func, Y, header)?;
        func.set_terminator(
            header,
            Terminator::CondBranch {
                cond,
                then_block: body,
                else_block: exit,
            },
        )?;
        ssa.seal_block(&mut func, body)?;
        ssa.seal_block(&mut func, exit)?;
        func.set_terminator(body, Terminator::Branch(header))?;
        ssa.seal_block(&mut func, header)?;
        func.set_terminator(exit, Terminator::Return(None))?;

        assert_eq!(phi_count(&func), 0);
        assert_eq!(
            func.terminator(header),
            Some(&Terminator::CondBranch {
                cond: Value::Arg(0),
                then_block: body,
                else_block: exit,
            })
        );
        assert_eq!(ssa.read_variable(&mut func, Y, exit)?, Value::Arg(0));
        func.verify()
    }

    #[test]
    fn test_nested_loops_cascade() -> Result<()> {
        // x = a0; outer { inner { } } with x never reassigned: every phi
        // created along the way must disappear once all blocks are sealed.
        let mut func = Function::new("f", 1);
        let mut ssa = SsaBuilder::new();
        let entry = func.entry();
        ssa.add_block(entry, true);
        ssa.write_variable(X, entry, Value::Arg(0));

        let outer = func.add_block();
        let inner = func.add_block();
        let latch = func.add_block();
        let exit = func.add_block();
        for bb in [outer, inner, latch, exit] {
            ssa.add_block(bb, false);
        }

        func.set_terminator(entry, Terminator::Branch(outer))?;
        let c0 = ssa.read_variable(&mut func, X, outer)?;
        func.set_terminator(
            outer,
            Terminator::CondBranch {
                cond: c0,
                then_block: inner,
                else_block: exit,
            },
        )?;
        let c1 = ssa.read_variable(&mut func, X, inner)?;
        func.set_terminator(
            inner,
            Terminator::CondBranch {
                cond: c1,
                then_block: inner,
                else_block: latch,
            },
        )?;
        ssa.seal_block(&mut func, latch)?;
        func.set_terminator(latch, Terminator::Branch(outer))?;
        ssa.seal_block(&mut func, inner)?;
        ssa.seal_block(&mut func, outer)?;
        ssa.seal_block(&mut func, exit)?;
        let out = ssa.read_variable(&mut func, X, exit)?;
        func.set_terminator(exit, Terminator::Return(Some(out)))?;

        assert_eq!(phi_count(&func), 0);
        assert_eq!(out, Value::Arg(0));
        func.verify()
    }

    #[test]
    fn test_reset_clears_state() {
        let mut ssa = SsaBuilder::new();
        ssa.add_block(BlockId::new(0), true);
        ssa.write_variable(X, BlockId::new(0), Value::int(1));
        ssa.reset();

        assert!(!ssa.is_sealed(BlockId::new(0)));
        assert_eq!(ssa.lookup(X, BlockId::new(0)), None);
    }
}
