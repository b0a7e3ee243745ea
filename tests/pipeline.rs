//! End-to-end tests of the compilation pipeline.
//!
//! Every test builds a function with the public builder, runs
//! [`compile_function`] and inspects the optimized CFG and the allocation.

use ssaopt::{
    compile_function,
    ir::{BinaryOp, BlockId, Function, IcmpPred, InstId, InstKind, Terminator, Value},
    regalloc::{PhysReg, TargetRegisters},
    ssa::Variable,
    CompilerConfig, Error, FunctionBuilder, Result,
};

const X: Variable = Variable(0);
const I: Variable = Variable(1);

fn insts_matching(func: &Function, pred: impl Fn(&InstKind) -> bool) -> Vec<InstId> {
    func.blocks()
        .flat_map(|(_, bb)| bb.insts().iter().copied())
        .filter(|&id| func.inst(id).is_some_and(|inst| pred(inst.kind())))
        .collect()
}

fn is_arg_sum(kind: &InstKind) -> bool {
    matches!(
        kind,
        InstKind::Binary {
            op: BinaryOp::Add,
            lhs: Value::Arg(0),
            rhs: Value::Arg(1)
        }
    )
}

/// `if (1) { x = a + 1 } else { x = a + 2 }; return x`
#[test]
fn test_constant_condition_removes_dead_arm() -> Result<()> {
    let mut b = FunctionBuilder::new("if_one", 1);
    let then_block = b.create_block();
    let else_block = b.create_block();
    let join = b.create_block();
    b.cond_br(Value::int(1), then_block, else_block)?;
    b.seal(then_block)?;
    b.seal(else_block)?;

    let mut arms = Vec::new();
    for (block, addend) in [(then_block, 1), (else_block, 2)] {
        b.switch_to(block)?;
        let value = b.binary(BinaryOp::Add, b.arg(0), Value::int(addend))?;
        b.def_var(X, value);
        b.br(join)?;
        arms.push(value);
    }
    b.seal(join)?;
    b.switch_to(join)?;
    let x = b.use_var(X)?;
    b.ret(Some(x))?;
    let func = b.finish()?;
    let entry = func.entry();

    let compiled = compile_function(func, &CompilerConfig::default())?;
    let func = &compiled.function;

    assert_eq!(func.terminator(entry), Some(&Terminator::Branch(then_block)));
    assert!(!func.contains_block(else_block));
    assert_eq!(func.predecessors(join), &[then_block]);
    // The join phi collapsed into the value of the taken arm
    assert_eq!(func.terminator(join), Some(&Terminator::Return(Some(arms[0]))));
    assert!(func.block(join).is_some_and(|bb| bb.phis().is_empty()));
    func.verify()
}

#[test]
fn test_folded_comparison_feeds_branch_folding() -> Result<()> {
    // if (2 * 3 == 6) return 1 else return 2
    let mut b = FunctionBuilder::new("cmp", 0);
    let product = b.binary(BinaryOp::Mul, Value::int(2), Value::int(3))?;
    let cond = b.icmp(IcmpPred::Eq, product, Value::int(6))?;
    let yes = b.create_block();
    let no = b.create_block();
    b.cond_br(cond, yes, no)?;
    for (block, value) in [(yes, 1), (no, 2)] {
        b.switch_to(block)?;
        b.ret(Some(Value::int(value)))?;
    }

    let compiled = compile_function(b.finish()?, &CompilerConfig::default())?;
    let func = &compiled.function;
    assert_eq!(func.block_count(), 2);
    assert_eq!(func.inst_count(), 0);
    assert!(!func.contains_block(no));
    assert!(compiled.intervals.is_empty());
    Ok(())
}

/// `for (i = 0; i < n; i++) { t = a + b; use(t) }`
///
/// With `guarded` the entry branches either into the loop or past it, so the
/// loop has no preheader until one is inserted.
fn invariant_loop(guarded: bool) -> Result<(Function, BlockId, InstId)> {
    let mut b = FunctionBuilder::new("loop", 3);
    b.def_var(I, Value::int(0));
    let header = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();
    if guarded {
        b.cond_br(b.arg(2), header, exit)?;
    } else {
        b.br(header)?;
    }

    b.switch_to(header)?;
    let i = b.use_var(I)?;
    let cond = b.icmp(IcmpPred::Slt, i, b.arg(2))?;
    b.cond_br(cond, body, exit)?;
    b.seal(body)?;
    b.seal(exit)?;

    b.switch_to(body)?;
    let t = b.binary(BinaryOp::Add, b.arg(0), b.arg(1))?;
    b.call("use", vec![t])?;
    let i = b.use_var(I)?;
    let next = b.binary(BinaryOp::Add, i, Value::int(1))?;
    b.def_var(I, next);
    b.br(header)?;
    b.seal(header)?;

    b.switch_to(exit)?;
    b.ret(None)?;
    Ok((b.finish()?, header, t.as_inst().unwrap()))
}

#[test]
fn test_invariant_add_is_hoisted_once() -> Result<()> {
    let (func, header, t) = invariant_loop(false)?;
    let entry = func.entry();

    let compiled = compile_function(func, &CompilerConfig::default())?;
    let func = &compiled.function;

    assert_eq!(insts_matching(func, is_arg_sum), vec![t]);
    assert_eq!(func.inst(t).map(|i| i.block()), Some(entry));
    assert_eq!(func.predecessors(header)[0], entry);
    assert!(compiled.register_of(Value::Inst(t)).is_some() || compiled.is_spilled(Value::Inst(t)));
    Ok(())
}

#[test]
fn test_preheader_is_inserted_before_hoisting() -> Result<()> {
    let (func, header, t) = invariant_loop(true)?;
    let entry = func.entry();
    let blocks_before = func.block_count();

    let compiled = compile_function(func, &CompilerConfig::default())?;
    let func = &compiled.function;

    assert_eq!(func.block_count(), blocks_before + 1);
    let preheader = func.inst(t).map(|i| i.block()).unwrap();
    assert_ne!(preheader, entry);
    assert_eq!(func.successors(preheader), vec![header]);
    assert_eq!(func.predecessors(preheader), &[entry]);
    assert!(func.predecessors(header).contains(&preheader));
    assert!(!func.predecessors(header).contains(&entry));
    assert_eq!(insts_matching(func, is_arg_sum).len(), 1);
    func.verify()
}

#[test]
fn test_licm_can_be_disabled() -> Result<()> {
    let (func, _, t) = invariant_loop(true)?;
    let body = func.inst(t).map(|i| i.block()).unwrap();
    let blocks_before = func.block_count();

    let config = CompilerConfig::default().with_licm(false);
    let compiled = compile_function(func, &config)?;

    assert_eq!(compiled.function.block_count(), blocks_before);
    assert_eq!(compiled.function.inst(t).map(|i| i.block()), Some(body));
    Ok(())
}

/// Five loads that are all live at once, then stored in reverse order.
fn five_clique() -> Result<(Function, Vec<Value>)> {
    let mut b = FunctionBuilder::new("clique", 0);
    let mut values = Vec::new();
    for n in 0..5 {
        values.push(b.load(Value::int(0x100 + 8 * n))?);
    }
    for (n, &value) in values.iter().enumerate().rev() {
        b.store(Value::int(0x200 + 8 * n as i64), value)?;
    }
    b.ret(None)?;
    Ok((b.finish()?, values))
}

#[test]
fn test_five_clique_spills_lowest_weight() -> Result<()> {
    let (func, values) = five_clique()?;
    let compiled = compile_function(func, &CompilerConfig::default())?;

    // The first load lives longest and so has the lowest weight
    let weights: Vec<f32> = values
        .iter()
        .filter_map(|&v| compiled.intervals.vreg_for(v))
        .filter_map(|r| compiled.intervals.interval(r))
        .map(|li| li.weight())
        .collect();
    assert_eq!(weights.len(), 5);
    assert!(weights[1..].iter().all(|&w| w > weights[0]));

    assert_eq!(compiled.allocation.spills().len(), 1);
    assert!(compiled.is_spilled(values[0]));
    let expected: Vec<Option<PhysReg>> = (0..4).rev().map(|n| Some(PhysReg::new(n))).collect();
    let actual: Vec<Option<PhysReg>> = values[1..].iter().map(|&v| compiled.register_of(v)).collect();
    assert_eq!(actual, expected);

    // Store after the load and reload before the use
    let record = &compiled.allocation.spills()[0];
    assert_eq!(record.products.len(), 2);
    for &product in &record.products {
        assert_eq!(compiled.allocation.assignment(product), Some(PhysReg::new(0)));
    }
    Ok(())
}

#[test]
fn test_enough_registers_means_no_spills() -> Result<()> {
    let (func, values) = five_clique()?;
    let compiled = compile_function(func, &CompilerConfig::uniform(5))?;

    assert!(compiled.allocation.spills().is_empty());
    let mut regs: Vec<PhysReg> = values.iter().filter_map(|&v| compiled.register_of(v)).collect();
    regs.sort();
    regs.dedup();
    assert_eq!(regs.len(), 5);
    compiled
        .allocation
        .verify(&compiled.intervals, &CompilerConfig::uniform(5).registers)
}

#[test]
fn test_reserved_register_is_never_assigned() -> Result<()> {
    let (func, _) = five_clique()?;
    let registers = TargetRegisters::uniform(6).with_reserved(PhysReg::new(0));
    let config = CompilerConfig::default()
        .with_num_colors(5)
        .with_registers(registers);

    let compiled = compile_function(func, &config)?;
    assert!(compiled.allocation.spills().is_empty());
    assert!(compiled
        .allocation
        .assignments()
        .all(|(_, phys)| phys != PhysReg::new(0)));
    Ok(())
}

#[test]
fn test_empty_register_file_is_rejected() -> Result<()> {
    let (func, _) = five_clique()?;
    let config = CompilerConfig::default().with_registers(TargetRegisters::new(Vec::new()));

    let result = compile_function(func, &config);
    assert!(matches!(result, Err(Error::NotSupported)));
    Ok(())
}

/// `for (i = 0; i < n; i++) { x_k = x_k + k + 1 }` over `count`
/// accumulators, returning them xor-ed together.
fn carried_loop(count: u32) -> Result<Function> {
    let accs: Vec<Variable> = (0..count).map(|k| Variable(k + 2)).collect();
    let mut b = FunctionBuilder::new("carried", 1);
    b.def_var(I, Value::int(0));
    for &acc in &accs {
        b.def_var(acc, Value::int(0));
    }
    let header = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();
    b.br(header)?;

    b.switch_to(header)?;
    let i = b.use_var(I)?;
    let cond = b.icmp(IcmpPred::Slt, i, b.arg(0))?;
    b.cond_br(cond, body, exit)?;
    b.seal(body)?;
    b.seal(exit)?;

    b.switch_to(body)?;
    for (k, &acc) in accs.iter().enumerate() {
        let value = b.use_var(acc)?;
        let value = b.binary(BinaryOp::Add, value, Value::int(k as i64 + 1))?;
        b.def_var(acc, value);
    }
    let i = b.use_var(I)?;
    let next = b.binary(BinaryOp::Add, i, Value::int(1))?;
    b.def_var(I, next);
    b.br(header)?;
    b.seal(header)?;

    b.switch_to(exit)?;
    let mut sum = Value::int(0);
    for &acc in &accs {
        let value = b.use_var(acc)?;
        sum = b.binary(BinaryOp::Xor, sum, value)?;
    }
    b.ret(Some(sum))?;
    b.finish()
}

#[test]
fn test_loop_carrying_more_values_than_registers() -> Result<()> {
    for count in [5, 8, 12] {
        for regs in 2..=4u16 {
            let config = CompilerConfig::uniform(regs);
            let compiled = compile_function(carried_loop(count)?, &config)?;

            let header_phis = compiled
                .function
                .blocks()
                .map(|(_, bb)| bb.phis().len())
                .max()
                .unwrap_or(0);
            assert_eq!(header_phis, count as usize + 1);
            assert!(
                !compiled.allocation.spills().is_empty(),
                "{count} accumulators fit in {regs} registers"
            );
            compiled
                .allocation
                .verify(&compiled.intervals, &config.registers)?;
        }
    }
    Ok(())
}

/// `flag = 1 ? true : false; if (flag) return 1 else return 2`
#[test]
fn test_branch_exposed_by_dead_arm_is_folded() -> Result<()> {
    let mut b = FunctionBuilder::new("exposed", 0);
    let left = b.create_block();
    let right = b.create_block();
    let join = b.create_block();
    let yes = b.create_block();
    let no = b.create_block();
    b.cond_br(Value::int(1), left, right)?;
    b.seal(left)?;
    b.seal(right)?;
    for (block, value) in [(left, 1), (right, 0)] {
        b.switch_to(block)?;
        b.def_var(X, Value::int(value));
        b.br(join)?;
    }
    b.seal(join)?;
    b.switch_to(join)?;
    let flag = b.use_var(X)?;
    b.cond_br(flag, yes, no)?;
    b.seal(yes)?;
    b.seal(no)?;
    for (block, value) in [(yes, 1), (no, 2)] {
        b.switch_to(block)?;
        b.ret(Some(Value::int(value)))?;
    }

    let compiled = compile_function(b.finish()?, &CompilerConfig::default())?;
    let func = &compiled.function;
    assert_eq!(func.terminator(join), Some(&Terminator::Branch(yes)));
    assert!(!func.contains_block(right));
    assert!(!func.contains_block(no));
    func.verify()
}

#[test]
fn test_arguments_get_registers() -> Result<()> {
    let mut b = FunctionBuilder::new("args", 2);
    let diff = b.binary(BinaryOp::Sub, b.arg(0), b.arg(1))?;
    b.ret(Some(diff))?;

    let compiled = compile_function(b.finish()?, &CompilerConfig::default())?;
    let a0 = compiled.register_of(Value::Arg(0));
    let a1 = compiled.register_of(Value::Arg(1));
    assert!(a0.is_some() && a1.is_some());
    assert_ne!(a0, a1);
    // Both operands die where the result is defined
    assert!(compiled.register_of(diff).is_some());
    Ok(())
}
