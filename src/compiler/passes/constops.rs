//! Constant folding pass.
//!
//! Evaluates instructions whose result is known at compile time and replaces
//! every use by the constant:
//!
//! - arithmetic and bitwise operations on two constants (`2 + 3` → `5`)
//! - comparisons of two constants (`1 == 1` → `true`)
//! - width conversions of a constant
//! - selects on a constant condition (`select true, %a, %b` → `%a`)
//!
//! Phis left merging a single value are removed afterwards. Division and
//! remainder by zero, `i64::MIN / -1` and shifts by 64 or more are left alone
//! so that the trap or undefined result stays where the program put it.
//!
//! Folding runs until nothing changes, so conditions like `1 == 1` become the
//! literal booleans [`ConstantBranchFoldingPass`](super::ConstantBranchFoldingPass)
//! looks for.

use crate::{
    compiler::pass::{AnalysisCache, Analyses, Pass},
    ir::{BinaryOp, CastOp, Constant, Function, IcmpPred, InstId, InstKind, Value},
    Result,
};

/// Folds instructions with constant operands.
pub struct ConstantOpsPass;

impl Default for ConstantOpsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantOpsPass {
    /// Creates a new constant folding pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Finds every instruction that evaluates to a known value.
    fn find_candidates(func: &Function) -> Vec<(InstId, Value)> {
        func.blocks()
            .flat_map(|(_, bb)| bb.insts().iter().copied())
            .filter_map(|id| {
                let inst = func.inst(id)?;
                fold(inst.kind()).map(|value| (id, value))
            })
            .collect()
    }
}

/// Evaluates `kind` if its result is known.
fn fold(kind: &InstKind) -> Option<Value> {
    match kind {
        InstKind::Binary { op, lhs, rhs } => {
            let result = fold_binary(*op, lhs.as_const()?, rhs.as_const()?)?;
            Some(Value::Const(result))
        }
        InstKind::Icmp { pred, lhs, rhs } => {
            let result = fold_icmp(*pred, lhs.as_const()?.as_int(), rhs.as_const()?.as_int());
            Some(Value::bool(result))
        }
        InstKind::Cast { op, value, bits } => {
            Some(Value::int(fold_cast(*op, value.as_const()?.as_int(), *bits)))
        }
        InstKind::Select {
            cond,
            then_value,
            else_value,
        } => {
            if then_value == else_value {
                return Some(*then_value);
            }
            let taken = if cond.as_const()?.as_bool() {
                then_value
            } else {
                else_value
            };
            Some(*taken)
        }
        InstKind::Gep { .. }
        | InstKind::Load { .. }
        | InstKind::Store { .. }
        | InstKind::Call { .. }
        | InstKind::Alloca
        | InstKind::Phi(_) => None,
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
fn fold_binary(op: BinaryOp, lhs: Constant, rhs: Constant) -> Option<Constant> {
    // Logic on two booleans stays boolean
    if let (Constant::Bool(a), Constant::Bool(b)) = (lhs, rhs) {
        match op {
            BinaryOp::And => return Some(Constant::Bool(a & b)),
            BinaryOp::Or => return Some(Constant::Bool(a | b)),
            BinaryOp::Xor => return Some(Constant::Bool(a ^ b)),
            _ => {}
        }
    }

    let (a, b) = (lhs.as_int(), rhs.as_int());
    let shift = || u32::try_from(b).ok().filter(|&s| s < 64);
    let value = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::SDiv => a.checked_div(b)?,
        BinaryOp::SRem => a.checked_rem(b)?,
        BinaryOp::UDiv => (a as u64).checked_div(b as u64)? as i64,
        BinaryOp::URem => (a as u64).checked_rem(b as u64)? as i64,
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl => a << shift()?,
        BinaryOp::LShr => ((a as u64) >> shift()?) as i64,
        BinaryOp::AShr => a >> shift()?,
    };
    Some(Constant::Int(value))
}

#[allow(clippy::cast_sign_loss)]
fn fold_icmp(pred: IcmpPred, a: i64, b: i64) -> bool {
    let (ua, ub) = (a as u64, b as u64);
    match pred {
        IcmpPred::Eq => a == b,
        IcmpPred::Ne => a != b,
        IcmpPred::Slt => a < b,
        IcmpPred::Sle => a <= b,
        IcmpPred::Sgt => a > b,
        IcmpPred::Sge => a >= b,
        IcmpPred::Ult => ua < ub,
        IcmpPred::Ule => ua <= ub,
        IcmpPred::Ugt => ua > ub,
        IcmpPred::Uge => ua >= ub,
    }
}

/// Narrow values are kept sign-extended, except for the result of a zero
/// extension.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn fold_cast(op: CastOp, value: i64, bits: u8) -> i64 {
    if bits >= 64 {
        return value;
    }
    let unused = 64 - u32::from(bits);
    match op {
        CastOp::Trunc | CastOp::SExt => (value << unused) >> unused,
        CastOp::ZExt => (((value as u64) << unused) >> unused) as i64,
    }
}

impl Pass for ConstantOpsPass {
    fn name(&self) -> &'static str {
        "constant-ops"
    }

    fn description(&self) -> &'static str {
        "Folds arithmetic, comparisons, casts and selects with constant operands"
    }

    fn preserved_analyses(&self) -> Analyses {
        Analyses::all()
    }

    fn run(&self, func: &mut Function, _analyses: &mut AnalysisCache) -> Result<bool> {
        let mut folded = 0usize;

        loop {
            let candidates = Self::find_candidates(func);
            if candidates.is_empty() {
                break;
            }
            for (id, value) in candidates {
                // Picked operand was folded earlier in this round
                if value.as_inst().is_some_and(|v| func.inst(v).is_none()) {
                    continue;
                }
                func.replace_all_uses(id, value);
                func.remove_inst(id);
                folded += 1;
            }
        }

        let phis: Vec<InstId> = func
            .blocks()
            .flat_map(|(_, bb)| bb.phis().iter().copied())
            .collect();
        let removed = func.fold_trivial_phis(phis, |_| true).len();

        if folded + removed > 0 {
            log::debug!(
                "{}: folded {} instructions and {} phis",
                func.name(),
                folded,
                removed
            );
        }
        Ok(folded + removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{FunctionBuilder, Terminator},
        ssa::Variable,
    };

    fn run(func: &mut Function) -> Result<bool> {
        ConstantOpsPass::new().run(func, &mut AnalysisCache::new())
    }

    #[test]
    fn test_folds_chains() -> Result<()> {
        let mut b = FunctionBuilder::new("f", 0);
        let sum = b.binary(BinaryOp::Add, Value::int(2), Value::int(3))?;
        let prod = b.binary(BinaryOp::Mul, sum, Value::int(4))?;
        let cmp = b.icmp(IcmpPred::Eq, prod, Value::int(20))?;
        let then_block = b.create_block();
        let else_block = b.create_block();
        b.cond_br(cmp, then_block, else_block)?;
        for block in [then_block, else_block] {
            b.switch_to(block)?;
            b.ret(None)?;
        }
        let mut func = b.finish()?;

        assert!(run(&mut func)?);
        assert_eq!(func.inst_count(), 0);
        assert_eq!(
            func.terminator(func.entry()),
            Some(&Terminator::CondBranch {
                cond: Value::bool(true),
                then_block,
                else_block
            })
        );
        assert!(!run(&mut func)?);
        Ok(())
    }

    #[test]
    fn test_division_by_zero_is_kept() -> Result<()> {
        let mut b = FunctionBuilder::new("f", 0);
        let div = b.binary(BinaryOp::SDiv, Value::int(1), Value::int(0))?;
        let overflow = b.binary(BinaryOp::SDiv, Value::int(i64::MIN), Value::int(-1))?;
        let shift = b.binary(BinaryOp::Shl, Value::int(1), Value::int(64))?;
        let sum = b.binary(BinaryOp::Add, div, overflow)?;
        let sum = b.binary(BinaryOp::Add, sum, shift)?;
        b.ret(Some(sum))?;
        let mut func = b.finish()?;

        assert!(!run(&mut func)?);
        assert_eq!(func.inst_count(), 5);
        Ok(())
    }

    #[test]
    fn test_evaluation() {
        let int = Constant::Int;
        assert_eq!(fold_binary(BinaryOp::Sub, int(3), int(5)), Some(int(-2)));
        assert_eq!(fold_binary(BinaryOp::UDiv, int(-1), int(2)), Some(int(i64::MAX)));
        assert_eq!(fold_binary(BinaryOp::LShr, int(-1), int(60)), Some(int(15)));
        assert_eq!(fold_binary(BinaryOp::AShr, int(-16), int(2)), Some(int(-4)));
        assert_eq!(
            fold_binary(BinaryOp::Xor, Constant::Bool(true), Constant::Bool(true)),
            Some(Constant::Bool(false))
        );
        assert!(fold_icmp(IcmpPred::Ult, 1, -1));
        assert!(!fold_icmp(IcmpPred::Slt, 1, -1));
        assert_eq!(fold_cast(CastOp::Trunc, 0x1ff, 8), -1);
        assert_eq!(fold_cast(CastOp::ZExt, -1, 8), 255);
        assert_eq!(fold_cast(CastOp::SExt, 0x80, 8), -128);
    }

    #[test]
    fn test_select_and_phi_folding() -> Result<()> {
        // bb0: br %arg0, bb1, bb2 / bb1, bb2: br bb3 / bb3: phi [1, 1]
        let mut b = FunctionBuilder::new("f", 1);
        let v = Variable(0);
        let left = b.create_block();
        let right = b.create_block();
        let join = b.create_block();
        b.cond_br(b.arg(0), left, right)?;
        b.seal(left)?;
        b.seal(right)?;
        for block in [left, right] {
            b.switch_to(block)?;
            let one = b.select(Value::bool(true), Value::int(1), Value::int(2))?;
            b.def_var(v, one);
            b.br(join)?;
        }
        b.seal(join)?;
        b.switch_to(join)?;
        let merged = b.use_var(v)?;
        b.ret(Some(merged))?;
        let mut func = b.finish()?;
        assert_eq!(func.phi(merged.as_inst().unwrap()).map(|p| p.operand_count()), Some(2));

        assert!(run(&mut func)?);
        assert_eq!(func.inst_count(), 0);
        assert_eq!(func.terminator(join), Some(&Terminator::Return(Some(Value::int(1)))));
        Ok(())
    }
}
