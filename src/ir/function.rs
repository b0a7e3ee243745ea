//! The arena-backed function representation.
//!
//! A [`Function`] owns all of its blocks and instructions in two arenas indexed
//! by [`BlockId`] and [`InstId`]. Deleting a block or instruction leaves an empty
//! slot behind, so handles held elsewhere never silently change meaning.

use std::{
    collections::{HashSet, VecDeque},
    fmt,
};

use crate::{
    ir::{BasicBlock, BlockId, InstId, InstKind, Instruction, PhiNode, Terminator, Value},
    utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
    Result,
};

/// A function in SSA form: a CFG of basic blocks with a distinguished entry.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    num_args: u32,
    entry: BlockId,
    pub(crate) blocks: Vec<Option<BasicBlock>>,
    pub(crate) insts: Vec<Option<Instruction>>,
}

impl Function {
    /// Creates a function with an empty entry block.
    #[must_use]
    pub fn new(name: impl Into<String>, num_args: u32) -> Self {
        Self {
            name: name.into(),
            num_args,
            entry: BlockId(0),
            blocks: vec![Some(BasicBlock::default())],
            insts: Vec::new(),
        }
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn num_args(&self) -> u32 {
        self.num_args
    }

    /// Returns the entry block.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// Appends a new empty block and returns its handle.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Some(BasicBlock::default()));
        id
    }

    /// Returns the block, or `None` if the handle was deleted or never existed.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Result<&mut BasicBlock> {
        self.blocks
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| malformed_error!("Block {} does not exist", id))
    }

    /// Returns `true` if `id` refers to a live block.
    #[must_use]
    pub fn contains_block(&self, id: BlockId) -> bool {
        self.block(id).is_some()
    }

    /// Iterates over the live blocks in handle order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks.iter().enumerate().filter_map(|(i, b)| {
            #[allow(clippy::cast_possible_truncation)]
            b.as_ref().map(|b| (BlockId(i as u32), b))
        })
    }

    /// Returns the handles of all live blocks in handle order.
    #[must_use]
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks().map(|(id, _)| id).collect()
    }

    /// Returns the number of live blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.iter().flatten().count()
    }

    /// Returns the number of block slots, deleted ones included.
    #[must_use]
    pub fn block_capacity(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the instruction, or `None` if it was removed.
    #[must_use]
    pub fn inst(&self, id: InstId) -> Option<&Instruction> {
        self.insts.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn inst_mut(&mut self, id: InstId) -> Result<&mut Instruction> {
        self.insts
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| malformed_error!("Instruction {} does not exist", id))
    }

    /// Returns the number of live instructions.
    #[must_use]
    pub fn inst_count(&self) -> usize {
        self.insts.iter().flatten().count()
    }

    /// Returns the number of instruction slots, removed ones included.
    #[must_use]
    pub fn inst_capacity(&self) -> usize {
        self.insts.len()
    }

    /// Appends an instruction to `block`. Phis are appended to the phi list,
    /// everything else after the existing instructions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block does not exist.
    #[allow(clippy::cast_possible_truncation)]
    pub fn append_inst(&mut self, block: BlockId, kind: InstKind) -> Result<InstId> {
        let id = InstId(self.insts.len() as u32);
        let is_phi = kind.is_phi();

        let bb = self.block_mut(block)?;
        if is_phi {
            bb.phis.push(id);
        } else {
            bb.insts.push(id);
        }
        self.insts.push(Some(Instruction { kind, block }));
        Ok(id)
    }

    /// Creates an operand-less phi at the start of `block`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block does not exist.
    pub fn create_phi(&mut self, block: BlockId) -> Result<InstId> {
        self.append_inst(block, InstKind::Phi(PhiNode::new()))
    }

    /// Returns the phi node defined by `id`, if it is a live phi.
    #[must_use]
    pub fn phi(&self, id: InstId) -> Option<&PhiNode> {
        self.inst(id).and_then(|inst| inst.kind.as_phi())
    }

    /// Sets the value a phi receives from `pred`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `phi` is not a live phi.
    pub fn set_phi_incoming(&mut self, phi: InstId, pred: BlockId, value: Value) -> Result<()> {
        self.inst_mut(phi)?
            .kind
            .as_phi_mut()
            .ok_or_else(|| malformed_error!("Instruction {} is not a phi", phi))?
            .set_incoming(pred, value);
        Ok(())
    }

    /// Detaches an instruction from its block and frees its slot.
    ///
    /// Uses of the instruction are left untouched; callers replace them first.
    pub fn remove_inst(&mut self, id: InstId) -> Option<Instruction> {
        let inst = self.insts.get_mut(id.index())?.take()?;
        if let Some(Some(bb)) = self.blocks.get_mut(inst.block.index()) {
            bb.phis.retain(|&p| p != id);
            bb.insts.retain(|&i| i != id);
        }
        Some(inst)
    }

    /// Moves a non-phi instruction to the end of `block`, just before its
    /// terminator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if either handle is invalid or the
    /// instruction is a phi.
    pub fn move_inst(&mut self, id: InstId, block: BlockId) -> Result<()> {
        let inst = self.inst_mut(id)?;
        if inst.kind.is_phi() {
            return Err(malformed_error!("Phi {} can not be moved", id));
        }
        let from = inst.block;

        self.block_mut(block)?;
        self.block_mut(from)?.insts.retain(|&i| i != id);
        self.block_mut(block)?.insts.push(id);
        self.inst_mut(id)?.block = block;
        Ok(())
    }

    /// Replaces every use of `old` by `new`, in instructions and terminators.
    ///
    /// Returns the number of replaced operands.
    pub fn replace_all_uses(&mut self, old: InstId, new: Value) -> usize {
        let target = Value::Inst(old);
        let mut count = 0;
        let mut replace = |v: &mut Value| {
            if *v == target {
                *v = new;
                count += 1;
            }
        };

        for inst in self.insts.iter_mut().flatten() {
            inst.kind.for_each_operand_mut(&mut replace);
        }
        for bb in self.blocks.iter_mut().flatten() {
            if let Some(term) = bb.terminator.as_mut() {
                term.for_each_operand_mut(&mut replace);
            }
        }
        count
    }

    /// Returns the live phis, other than `id` itself, that use `id`.
    #[must_use]
    pub fn phi_users(&self, id: InstId) -> Vec<InstId> {
        let target = Value::Inst(id);
        self.blocks()
            .flat_map(|(_, bb)| bb.phis.iter().copied())
            .filter(|&phi| {
                phi != id
                    && self
                        .phi(phi)
                        .is_some_and(|node| node.operands().iter().any(|op| op.value() == target))
            })
            .collect()
    }

    /// Returns the terminator of `block`, if it has one.
    #[must_use]
    pub fn terminator(&self, block: BlockId) -> Option<&Terminator> {
        self.block(block).and_then(BasicBlock::terminator)
    }

    /// Terminates `block` and registers it as predecessor of each successor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block already has a terminator
    /// or a handle is invalid.
    pub fn set_terminator(&mut self, block: BlockId, term: Terminator) -> Result<()> {
        for succ in term.successors() {
            if !self.contains_block(succ) {
                return Err(malformed_error!("Branch target {} does not exist", succ));
            }
        }

        let bb = self.block_mut(block)?;
        if bb.terminator.is_some() {
            return Err(malformed_error!("Block {} already has a terminator", block));
        }
        let successors: Vec<BlockId> = term.successors().collect();
        bb.terminator = Some(term);

        for succ in successors {
            self.add_predecessor(succ, block)?;
        }
        Ok(())
    }

    /// Replaces the terminator of `block` in place, returning the old one.
    ///
    /// Predecessor lists are not touched; the caller keeps them consistent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block does not exist.
    pub fn replace_terminator(
        &mut self,
        block: BlockId,
        term: Terminator,
    ) -> Result<Option<Terminator>> {
        Ok(self.block_mut(block)?.terminator.replace(term))
    }

    /// Returns the predecessors of `block` (empty for deleted blocks).
    #[must_use]
    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        self.block(block).map_or(&[], BasicBlock::predecessors)
    }

    /// Returns the distinct successors of `block`.
    #[must_use]
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.block(block)
            .map(|bb| bb.successors().collect())
            .unwrap_or_default()
    }

    /// Records `pred` as a predecessor of `block`, once.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block does not exist.
    pub fn add_predecessor(&mut self, block: BlockId, pred: BlockId) -> Result<()> {
        let bb = self.block_mut(block)?;
        if !bb.preds.contains(&pred) {
            bb.preds.push(pred);
        }
        Ok(())
    }

    /// Removes `pred` from the predecessors of `block`.
    ///
    /// The matching operand is dropped from every phi of the block. Phis that
    /// are left merging a single distinct value are replaced by that value (or
    /// by `undef` if nothing is left), cascading to phis that used them.
    /// Deleted blocks are ignored.
    pub fn remove_predecessor(&mut self, block: BlockId, pred: BlockId) {
        let Some(Some(bb)) = self.blocks.get_mut(block.index()) else {
            return;
        };
        bb.preds.retain(|&p| p != pred);
        let phis = bb.phis.clone();

        for &phi in &phis {
            if let Some(Some(inst)) = self.insts.get_mut(phi.index()) {
                if let Some(node) = inst.kind.as_phi_mut() {
                    node.remove_incoming(pred);
                }
            }
        }
        self.fold_trivial_phis(phis, |_| true);
    }

    /// Replaces trivial phis by the value they merge.
    ///
    /// Starting from `candidates`, every phi accepted by `may_fold` that turns
    /// out to be trivial has its uses replaced and is removed; the phis using it
    /// are queued again since they may have become trivial in turn. Returns the
    /// performed replacements in order. A later replacement may remove the value
    /// an earlier one substituted, so consumers resolve chains.
    pub(crate) fn fold_trivial_phis<F>(
        &mut self,
        candidates: Vec<InstId>,
        may_fold: F,
    ) -> Vec<(InstId, Value)>
    where
        F: Fn(InstId) -> bool,
    {
        let mut queued: HashSet<InstId> = candidates.iter().copied().collect();
        let mut worklist: VecDeque<InstId> = candidates.into();
        let mut replaced = Vec::new();

        while let Some(phi) = worklist.pop_front() {
            queued.remove(&phi);
            if !may_fold(phi) {
                continue;
            }
            let Some(same) = self.phi(phi).and_then(|node| node.trivial_value(phi)) else {
                continue;
            };

            let users = self.phi_users(phi);
            self.replace_all_uses(phi, same);
            self.remove_inst(phi);
            replaced.push((phi, same));
            log::trace!("{}: replaced trivial phi {} by {}", self.name, phi, same);

            for user in users {
                if queued.insert(user) {
                    worklist.push_back(user);
                }
            }
        }
        replaced
    }

    /// Deletes a block and unlinks it from its successors.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for the entry block or a block that
    /// does not exist.
    pub fn remove_block(&mut self, block: BlockId) -> Result<()> {
        if block == self.entry {
            return Err(malformed_error!("The entry block can not be deleted"));
        }
        let bb = self
            .blocks
            .get_mut(block.index())
            .and_then(Option::take)
            .ok_or_else(|| malformed_error!("Block {} does not exist", block))?;

        for id in bb.all_insts() {
            if let Some(slot) = self.insts.get_mut(id.index()) {
                *slot = None;
            }
        }
        for succ in bb.successors() {
            self.remove_predecessor(succ, block);
        }
        Ok(())
    }

    /// Checks the structural invariants of the CFG.
    ///
    /// Every live block must be terminated, predecessor and successor lists must
    /// mirror each other, every phi must hold exactly one operand per
    /// predecessor, and every operand must refer to a live instruction or a
    /// valid argument.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] describing the first violation found.
    pub fn verify(&self) -> Result<()> {
        if !self.contains_block(self.entry) {
            return Err(malformed_error!("{}: entry block is missing", self.name));
        }

        for (id, bb) in self.blocks() {
            let Some(term) = bb.terminator() else {
                return Err(malformed_error!("{}: block {} has no terminator", self.name, id));
            };

            for succ in term.successors() {
                if !self.predecessors(succ).contains(&id) {
                    return Err(malformed_error!(
                        "{}: {} branches to {} but is not one of its predecessors",
                        self.name,
                        id,
                        succ
                    ));
                }
            }

            for (i, &pred) in bb.preds.iter().enumerate() {
                if bb.preds[..i].contains(&pred) {
                    return Err(malformed_error!(
                        "{}: {} lists predecessor {} twice",
                        self.name,
                        id,
                        pred
                    ));
                }
                let links = self
                    .block(pred)
                    .is_some_and(|p| p.successors().any(|s| s == id));
                if !links {
                    return Err(malformed_error!(
                        "{}: {} lists {} as predecessor without an edge",
                        self.name,
                        id,
                        pred
                    ));
                }
            }

            for &phi in &bb.phis {
                let node = self
                    .inst(phi)
                    .filter(|inst| inst.block == id)
                    .and_then(|inst| inst.kind.as_phi())
                    .ok_or_else(|| malformed_error!("{}: {} lists a stale phi {}", self.name, id, phi))?;

                let arity_ok = node.operand_count() == bb.preds.len()
                    && bb.preds.iter().all(|&p| node.incoming(p).is_some());
                if !arity_ok {
                    return Err(malformed_error!(
                        "{}: phi {} in {} does not match the block's {} predecessors",
                        self.name,
                        phi,
                        id,
                        bb.preds.len()
                    ));
                }
            }

            for &inst_id in &bb.insts {
                let valid = self
                    .inst(inst_id)
                    .is_some_and(|inst| inst.block == id && !inst.kind.is_phi());
                if !valid {
                    return Err(malformed_error!(
                        "{}: {} lists a stale or misplaced instruction {}",
                        self.name,
                        id,
                        inst_id
                    ));
                }
            }

            let operands = bb
                .all_insts()
                .filter_map(|i| self.inst(i))
                .flat_map(|inst| inst.kind.operands())
                .chain(term.operands());
            for value in operands {
                self.verify_value(id, value)?;
            }
        }
        Ok(())
    }

    fn verify_value(&self, block: BlockId, value: Value) -> Result<()> {
        match value {
            Value::Inst(id) if self.inst(id).is_none() => Err(malformed_error!(
                "{}: {} uses removed instruction {}",
                self.name,
                block,
                id
            )),
            Value::Arg(n) if n >= self.num_args => Err(malformed_error!(
                "{}: {} uses argument {} of {}",
                self.name,
                block,
                n,
                self.num_args
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function @{}(", self.name)?;
        for n in 0..self.num_args {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", Value::Arg(n))?;
        }
        writeln!(f, ") {{")?;

        for (id, bb) in self.blocks() {
            write!(f, "{id}:")?;
            if !bb.preds.is_empty() {
                f.write_str("  ; preds =")?;
                for pred in &bb.preds {
                    write!(f, " {pred}")?;
                }
            }
            writeln!(f)?;

            for inst_id in bb.all_insts() {
                let Some(inst) = self.inst(inst_id) else {
                    continue;
                };
                if inst.kind.has_result() {
                    writeln!(f, "    {inst_id} = {}", inst.kind)?;
                } else {
                    writeln!(f, "    {}", inst.kind)?;
                }
            }
            match bb.terminator() {
                Some(term) => writeln!(f, "    {term}")?,
                None => writeln!(f, "    <unterminated>")?,
            }
        }
        f.write_str("}")
    }
}

impl GraphBase for Function {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }
}

impl Successors for Function {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.block(BlockId::from(node))
            .into_iter()
            .flat_map(BasicBlock::successors)
            .map(NodeId::from)
    }
}

impl Predecessors for Function {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        Function::predecessors(self, BlockId::from(node))
            .iter()
            .copied()
            .map(NodeId::from)
    }
}

impl RootedGraph for Function {
    fn entry(&self) -> NodeId {
        self.entry.into()
    }
}
