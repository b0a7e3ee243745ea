//! Live interval construction.
//!
//! Reachable blocks are laid out in reverse postorder and every program point
//! is given a slot number (see [`crate::regalloc`] for the slot layout). A
//! block is numbered as:
//!
//! ```text
//!   one position per phi (and, in the entry block, per argument)
//!   one position per instruction
//!   one position per distinct value passed to a successor's phis
//!   one position for the terminator
//! ```
//!
//! A block with neither phis nor arguments still gets one leading position.
//! Because no two phis share a def slot and no two phi inputs share a use
//! slot, the spill products of loop-carried values never pile up on a single
//! position, and spilling always makes progress.
//!
//! Liveness is a backward data flow problem over bit sets of virtual
//! registers:
//!
//! - `OUT[B]` = ∪{IN[S] | S is a successor of B}
//! - `IN[B]`  = USE[B] ∪ (OUT[B] - DEF[B])
//!
//! Phi operands are uses at the end of the predecessor they flow in from, so
//! they belong to that predecessor's `USE` set and are read at one of its
//! copy positions. With `IN`/`OUT` known, every block is scanned backwards once to
//! turn liveness into interval segments.

use crate::{
    analysis::LoopForest,
    ir::{BlockId, Function, Value},
    regalloc::{def_slot, use_slot, LiveIntervals, VirtReg},
    utils::{graph::reverse_postorder, BitSet},
};

/// Cost contributed by one def or use at loop depth 0.
const BASE_COST: f32 = 1.0;
/// Added to an interval's size before normalizing its weight, so that very
/// short intervals do not get unbounded weights.
const SIZE_BIAS: f32 = 100.0;
/// Deeper nesting no longer changes the weight noticeably.
const MAX_WEIGHT_DEPTH: usize = 20;

/// Per-block layout and operand summary.
struct BlockInfo {
    block: BlockId,
    /// First position of the block.
    start: u32,
    /// Position of the terminator.
    term: u32,
    /// Definitions in order: phis (and arguments), then instructions, each
    /// with their position.
    defs: Vec<(VirtReg, u32)>,
    /// Operands of each instruction position, terminator included.
    uses: Vec<(u32, Vec<VirtReg>)>,
    loop_depth: usize,
}

/// Computes the live interval and spill weight of every SSA value of `func`.
///
/// Arguments become virtual registers first, then phis and instruction
/// results in layout order. Values that are defined but never used get a
/// one-slot interval at their definition. Spill weights are
/// `Σ 10^depth / (size + 100)` over all defs and uses, where `depth` is the
/// loop depth of the block containing the def or use and `size` the number of
/// slots covered.
#[must_use]
pub fn compute_live_intervals(func: &Function, loops: &LoopForest) -> LiveIntervals {
    let mut intervals = LiveIntervals::new();
    let order: Vec<BlockId> = reverse_postorder(func, func.entry().into())
        .into_iter()
        .map(BlockId::from)
        .collect();

    for n in 0..func.num_args() {
        intervals.create_virt_reg(Some(Value::Arg(n)));
    }
    for &block in &order {
        if let Some(bb) = func.block(block) {
            for id in bb.all_insts() {
                if func.inst(id).is_some_and(|inst| inst.kind().has_result()) {
                    intervals.create_virt_reg(Some(Value::Inst(id)));
                }
            }
        }
    }

    let infos = layout(func, &order, &intervals, loops);
    let count = intervals.len();
    let (live_in, live_out) = solve(&infos, func, count);

    let mut cost = vec![0.0f32; count];
    let mut end = vec![0u32; count];

    for (idx, info) in infos.iter().enumerate() {
        let block_start = info.start * 4;
        let block_end = (info.term + 1) * 4;
        let freq = 10f32.powi(info.loop_depth.min(MAX_WEIGHT_DEPTH) as i32);

        let mut live = live_out[idx].clone();
        for reg in live.iter() {
            end[reg] = block_end;
        }

        // Walk positions backwards; a position defines its result after
        // reading its operands
        let mut uses = info.uses.iter().rev().peekable();
        let mut defs = info.defs.iter().rev().peekable();
        let mut pos = info.term;
        loop {
            while let Some(&(reg, _)) = defs.next_if(|(_, p)| *p == pos) {
                let def = def_slot(pos);
                cost[reg.index()] += BASE_COST * freq;
                if let Some(li) = intervals.interval_mut(reg) {
                    li.set_def(def);
                    if live.remove(reg.index()) {
                        li.add_segment(def, end[reg.index()]);
                    } else {
                        li.add_segment(def, def + 1);
                    }
                }
            }
            while let Some((_, regs)) = uses.next_if(|(p, _)| *p == pos) {
                for &reg in regs {
                    if let Some(li) = intervals.interval_mut(reg) {
                        li.add_use(use_slot(pos));
                    }
                    cost[reg.index()] += BASE_COST * freq;
                    if live.insert(reg.index()) {
                        end[reg.index()] = def_slot(pos);
                    }
                }
            }
            if pos == info.start {
                break;
            }
            pos -= 1;
        }

        debug_assert_eq!(live, live_in[idx]);
        for reg in live.iter() {
            #[allow(clippy::cast_possible_truncation)]
            if let Some(li) = intervals.interval_mut(VirtReg(reg as u32)) {
                li.add_segment(block_start, end[reg]);
            }
        }
    }

    for (reg, cost) in cost.into_iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        if let Some(li) = intervals.interval_mut(VirtReg(reg as u32)) {
            #[allow(clippy::cast_precision_loss)]
            let size = li.size() as f32;
            li.set_weight(cost / (size + SIZE_BIAS));
            log::trace!("{}: {}", func.name(), li);
        }
    }
    intervals
}

/// Numbers the positions of every block and collects its defs and uses as
/// virtual registers.
#[allow(clippy::cast_possible_truncation)]
fn layout(
    func: &Function,
    order: &[BlockId],
    intervals: &LiveIntervals,
    loops: &LoopForest,
) -> Vec<BlockInfo> {
    let reg_of = |value: Value| intervals.vreg_for(value);
    let mut infos = Vec::with_capacity(order.len());
    let mut pos = 0u32;

    for &block in order {
        let Some(bb) = func.block(block) else {
            continue;
        };
        let start = pos;
        let mut defs = Vec::new();
        let mut uses = Vec::new();

        let args = if block == func.entry() { func.num_args() } else { 0 };
        let leading = (0..args)
            .map(Value::Arg)
            .chain(bb.phis().iter().map(|&phi| Value::Inst(phi)));
        for value in leading {
            if let Some(reg) = reg_of(value) {
                defs.push((reg, pos));
                pos += 1;
            }
        }
        if pos == start {
            pos += 1;
        }

        for &id in bb.insts() {
            let Some(inst) = func.inst(id) else {
                continue;
            };
            let mut regs: Vec<VirtReg> = inst.kind().operands().into_iter().filter_map(reg_of).collect();
            regs.sort_unstable();
            regs.dedup();
            if !regs.is_empty() {
                uses.push((pos, regs));
            }
            if let Some(reg) = reg_of(Value::Inst(id)) {
                defs.push((reg, pos));
            }
            pos += 1;
        }

        let mut copies: Vec<VirtReg> = phi_inputs(func, block).into_iter().filter_map(reg_of).collect();
        copies.sort_unstable();
        copies.dedup();
        for reg in copies {
            uses.push((pos, vec![reg]));
            pos += 1;
        }

        let term = pos;
        pos += 1;
        let mut regs: Vec<VirtReg> = bb
            .terminator()
            .map(|t| t.operands())
            .unwrap_or_default()
            .into_iter()
            .filter_map(reg_of)
            .collect();
        regs.sort_unstable();
        regs.dedup();
        if !regs.is_empty() {
            uses.push((term, regs));
        }

        infos.push(BlockInfo {
            block,
            start,
            term,
            defs,
            uses,
            loop_depth: loops.loop_depth(block),
        });
    }
    infos
}

/// Returns the values `block` passes to the phis of its successors.
fn phi_inputs(func: &Function, block: BlockId) -> Vec<Value> {
    func.successors(block)
        .into_iter()
        .filter_map(|succ| func.block(succ))
        .flat_map(|bb| bb.phis().iter().copied())
        .filter_map(|phi| func.phi(phi).and_then(|node| node.incoming(block)))
        .collect()
}

/// Solves the backward liveness equations, returning `IN` and `OUT` per block
/// in layout order.
fn solve(infos: &[BlockInfo], func: &Function, count: usize) -> (Vec<BitSet>, Vec<BitSet>) {
    let mut index = vec![None; func.block_capacity()];
    for (i, info) in infos.iter().enumerate() {
        index[info.block.index()] = Some(i);
    }

    let mut use_sets = Vec::with_capacity(infos.len());
    let mut def_sets = Vec::with_capacity(infos.len());
    for info in infos {
        let mut defs = BitSet::new(count);
        for &(reg, _) in &info.defs {
            defs.insert(reg.index());
        }
        let mut uses = BitSet::new(count);
        for (_, regs) in &info.uses {
            for reg in regs {
                uses.insert(reg.index());
            }
        }
        uses.difference_with(&defs);
        use_sets.push(uses);
        def_sets.push(defs);
    }

    let mut live_in = vec![BitSet::new(count); infos.len()];
    let mut live_out = vec![BitSet::new(count); infos.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for (i, info) in infos.iter().enumerate().rev() {
            let mut out = BitSet::new(count);
            for succ in func.successors(info.block) {
                if let Some(s) = index.get(succ.index()).copied().flatten() {
                    out.union_with(&live_in[s]);
                }
            }

            let mut inn = out.clone();
            inn.difference_with(&def_sets[i]);
            inn.union_with(&use_sets[i]);

            if inn != live_in[i] {
                live_in[i] = inn;
                changed = true;
            }
            live_out[i] = out;
        }
    }
    (live_in, live_out)
}
