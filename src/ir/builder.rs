//! Front-end facing construction of functions in SSA form.

use crate::{
    ir::{
        BinaryOp, BlockId, CastOp, Function, IcmpPred, InstKind, Terminator, Value,
    },
    ssa::{SsaBuilder, Variable},
    Error, Result,
};

/// Builds a [`Function`] directly in SSA form.
///
/// The builder keeps an insertion point (the current block) and translates
/// variable definitions and uses into SSA values through an internal
/// [`SsaBuilder`]. The front end is responsible for sealing each block once all
/// of its predecessors exist; [`FunctionBuilder::finish`] seals whatever is
/// left and verifies the result.
///
/// # Examples
///
/// ```rust
/// use ssaopt::{ir::{BinaryOp, IcmpPred, Value}, ssa::Variable, FunctionBuilder};
///
/// // i = 0; while (i < 10) { i = i + 1; } return i;
/// let i = Variable(0);
/// let mut b = FunctionBuilder::new("count", 0);
/// b.def_var(i, Value::int(0));
///
/// let cond = b.create_block();
/// let body = b.create_block();
/// let exit = b.create_block();
/// b.br(cond)?;
///
/// b.switch_to(cond)?;
/// let iv = b.use_var(i)?;
/// let lt = b.icmp(IcmpPred::Slt, iv, Value::int(10))?;
/// b.cond_br(lt, body, exit)?;
/// b.seal(exit)?;
///
/// b.switch_to(body)?;
/// b.seal(body)?;
/// let iv = b.use_var(i)?;
/// let next = b.binary(BinaryOp::Add, iv, Value::int(1))?;
/// b.def_var(i, next);
/// b.br(cond)?;
/// b.seal(cond)?;
///
/// b.switch_to(exit)?;
/// let result = b.use_var(i)?;
/// b.ret(Some(result))?;
///
/// let func = b.finish()?;
/// assert_eq!(func.block_count(), 4);
/// # Ok::<(), ssaopt::Error>(())
/// ```
#[derive(Debug)]
pub struct FunctionBuilder {
    func: Function,
    ssa: SsaBuilder,
    current: BlockId,
}

impl FunctionBuilder {
    /// Starts a new function. The insertion point is the sealed entry block.
    #[must_use]
    pub fn new(name: impl Into<String>, num_args: u32) -> Self {
        let func = Function::new(name, num_args);
        let mut ssa = SsaBuilder::new();
        let entry = func.entry();
        ssa.add_block(entry, true);

        Self {
            func,
            ssa,
            current: entry,
        }
    }

    /// Creates a new unsealed block without changing the insertion point.
    pub fn create_block(&mut self) -> BlockId {
        let block = self.func.add_block();
        self.ssa.add_block(block, false);
        block
    }

    /// Returns the block instructions are currently appended to.
    #[must_use]
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Moves the insertion point to the end of `block`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the block does not exist.
    pub fn switch_to(&mut self, block: BlockId) -> Result<()> {
        if !self.func.contains_block(block) {
            return Err(malformed_error!("Block {} does not exist", block));
        }
        self.current = block;
        Ok(())
    }

    /// Declares that `block` will not gain further predecessors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the block does not exist.
    pub fn seal(&mut self, block: BlockId) -> Result<()> {
        self.ssa.seal_block(&mut self.func, block)
    }

    /// Returns `true` if `block` has been sealed.
    #[must_use]
    pub fn is_sealed(&self, block: BlockId) -> bool {
        self.ssa.is_sealed(block)
    }

    /// Returns `true` if the current block already ends in a terminator.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.func.terminator(self.current).is_some()
    }

    /// Returns the `n`-th function argument.
    #[must_use]
    pub fn arg(&self, n: u32) -> Value {
        Value::Arg(n)
    }

    /// Assigns `value` to `var` at the insertion point.
    pub fn def_var(&mut self, var: Variable, value: Value) {
        self.ssa.write_variable(var, self.current, value);
    }

    /// Returns the value of `var` reaching the insertion point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] on an invalid insertion point.
    pub fn use_var(&mut self, var: Variable) -> Result<Value> {
        self.ssa.read_variable(&mut self.func, var, self.current)
    }

    fn emit(&mut self, kind: InstKind) -> Result<Value> {
        if self.is_terminated() {
            return Err(malformed_error!(
                "Block {} is already terminated, can not append {}",
                self.current,
                kind.opcode()
            ));
        }
        let id = self.func.append_inst(self.current, kind)?;
        Ok(Value::Inst(id))
    }

    /// Appends a binary operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the current block is terminated.
    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
        self.emit(InstKind::Binary { op, lhs, rhs })
    }

    /// Appends an integer comparison.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the current block is terminated.
    pub fn icmp(&mut self, pred: IcmpPred, lhs: Value, rhs: Value) -> Result<Value> {
        self.emit(InstKind::Icmp { pred, lhs, rhs })
    }

    /// Appends a width conversion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the current block is terminated or
    /// `bits` is not in `1..=64`.
    pub fn cast(&mut self, op: CastOp, value: Value, bits: u8) -> Result<Value> {
        if !(1..=64).contains(&bits) {
            return Err(malformed_error!("Invalid cast width {}", bits));
        }
        self.emit(InstKind::Cast { op, value, bits })
    }

    /// Appends a select.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the current block is terminated.
    pub fn select(&mut self, cond: Value, then_value: Value, else_value: Value) -> Result<Value> {
        self.emit(InstKind::Select {
            cond,
            then_value,
            else_value,
        })
    }

    /// Appends an address computation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the current block is terminated.
    pub fn gep(&mut self, base: Value, index: Value) -> Result<Value> {
        self.emit(InstKind::Gep { base, index })
    }

    /// Appends a load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the current block is terminated.
    pub fn load(&mut self, addr: Value) -> Result<Value> {
        self.emit(InstKind::Load { addr })
    }

    /// Appends a store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the current block is terminated.
    pub fn store(&mut self, addr: Value, value: Value) -> Result<()> {
        self.emit(InstKind::Store { addr, value }).map(|_| ())
    }

    /// Appends a call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the current block is terminated.
    pub fn call(&mut self, callee: impl Into<String>, args: Vec<Value>) -> Result<Value> {
        self.emit(InstKind::Call {
            callee: callee.into(),
            args,
        })
    }

    /// Appends a stack slot allocation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the current block is terminated.
    pub fn alloca(&mut self) -> Result<Value> {
        self.emit(InstKind::Alloca)
    }

    fn terminate(&mut self, term: Terminator) -> Result<()> {
        for succ in term.successors() {
            if self.ssa.is_sealed(succ) {
                return Err(Error::SealedBlock(succ));
            }
        }
        self.func.set_terminator(self.current, term)
    }

    /// Ends the current block with a jump to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SealedBlock`] if `target` is sealed, or
    /// [`Error::Malformed`] if the current block is already terminated.
    pub fn br(&mut self, target: BlockId) -> Result<()> {
        self.terminate(Terminator::Branch(target))
    }

    /// Ends the current block with a conditional jump.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SealedBlock`] if a target is sealed, or
    /// [`Error::Malformed`] if the current block is already terminated.
    pub fn cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) -> Result<()> {
        self.terminate(Terminator::CondBranch {
            cond,
            then_block,
            else_block,
        })
    }

    /// Ends the current block with a return.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the current block is already terminated.
    pub fn ret(&mut self, value: Option<Value>) -> Result<()> {
        self.terminate(Terminator::Return(value))
    }

    /// Returns the function built so far.
    #[must_use]
    pub fn function(&self) -> &Function {
        &self.func
    }

    /// Seals every remaining block, verifies the function and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the function is structurally invalid,
    /// for instance because a block was never terminated.
    pub fn finish(mut self) -> Result<Function> {
        for block in self.func.block_ids() {
            if !self.ssa.is_sealed(block) {
                log::debug!("{}: sealing {} at finish", self.func.name(), block);
                self.ssa.seal_block(&mut self.func, block)?;
            }
        }
        self.func.verify()?;
        Ok(self.func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: Variable = Variable(0);

    #[test]
    fn test_straight_line() -> Result<()> {
        let mut b = FunctionBuilder::new("f", 2);
        let sum = b.binary(BinaryOp::Add, b.arg(0), b.arg(1))?;
        b.def_var(X, sum);
        let x = b.use_var(X)?;
        b.ret(Some(x))?;

        let func = b.finish()?;
        assert_eq!(func.inst_count(), 1);
        assert_eq!(x, sum);
        Ok(())
    }

    #[test]
    fn test_branch_into_sealed_block_fails() -> Result<()> {
        let mut b = FunctionBuilder::new("f", 0);
        let target = b.create_block();
        b.seal(target)?;

        assert!(matches!(b.br(target), Err(Error::SealedBlock(t)) if t == target));
        assert!(matches!(b.br(b.function().entry()), Err(Error::SealedBlock(_))));
        Ok(())
    }

    #[test]
    fn test_emit_after_terminator_fails() -> Result<()> {
        let mut b = FunctionBuilder::new("f", 0);
        b.ret(None)?;

        assert!(b.is_terminated());
        assert!(b.alloca().is_err());
        assert!(b.ret(None).is_err());
        Ok(())
    }

    #[test]
    fn test_finish_requires_terminators() {
        let mut b = FunctionBuilder::new("f", 0);
        let _dangling = b.create_block();
        assert!(b.ret(None).is_ok());
        assert!(b.finish().is_err());
    }

    #[test]
    fn test_finish_seals_remaining_blocks() -> Result<()> {
        let mut b = FunctionBuilder::new("f", 1);
        b.def_var(X, b.arg(0));
        let next = b.create_block();
        b.br(next)?;
        b.switch_to(next)?;
        let x = b.use_var(X)?;
        b.ret(Some(x))?;

        // `next` was never sealed explicitly; its placeholder phi folds away
        let func = b.finish()?;
        assert_eq!(func.inst_count(), 0);
        assert_eq!(
            func.terminator(next),
            Some(&Terminator::Return(Some(Value::Arg(0))))
        );
        Ok(())
    }
}
