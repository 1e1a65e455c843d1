use crate::instruction::{IrInstId, IrInstruction, IrInstructionKind};
use crate::scope::ScopeArena;
use crate::value::ConstExprValue;
use ember_diagnostics::ice;

/// Position of a basic block in its executable.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IrBlockId(pub usize);

/// Marks a block as the header of a loop.
///
/// Blocks are laid out so that the body of the loop is exactly the blocks from the header up to,
/// but not including, the exit block. The exit is `None` when no path leaves the loop.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrLoopInfo {
    pub exit: Option<IrBlockId>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default)]
pub struct IrBasicBlock {
    /// Runtime instructions of the block, ending in exactly one terminator.
    pub instructions: Vec<IrInstId>,
    pub predecessors: Vec<IrBlockId>,
    pub loop_info: Option<IrLoopInfo>,
}

/// An ordered collection of basic blocks, representing one function or standalone expression.
///
/// Every instruction lives in a flat arena and is identified by its position. Compile-time
/// constants stay in the arena only, so a block lists nothing but the runtime work it performs.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct IrExecutable<'ta> {
    instructions: Vec<IrInstruction<'ta>>,
    blocks: Vec<IrBasicBlock>,
    pub scopes: ScopeArena,
}

/// A saved shape of an executable, restored by [`IrExecutable::rollback`].
#[derive(Debug, Clone)]
pub struct ExecCheckpoint {
    instructions: usize,
    blocks: Vec<IrBasicBlock>,
}

impl<'ta> IrExecutable<'ta> {
    pub fn new(scopes: ScopeArena) -> Self {
        Self {
            instructions: Vec::new(),
            blocks: Vec::new(),
            scopes,
        }
    }

    pub fn add_block(&mut self) -> IrBlockId {
        let id = IrBlockId(self.blocks.len());
        self.blocks.push(IrBasicBlock::default());
        id
    }

    /// Add an instruction to the arena without placing it in a block.
    pub fn push(&mut self, instruction: IrInstruction<'ta>) -> IrInstId {
        let id = IrInstId(self.instructions.len());
        self.instructions.push(instruction);
        id
    }

    /// Add an instruction to the end of `block`.
    pub fn append(&mut self, block: IrBlockId, instruction: IrInstruction<'ta>) -> IrInstId {
        if self.is_terminated(block) {
            ice!(format!("appending to terminated block bb{}", block.0));
        }
        let id = self.push(instruction);
        self.block_mut(block).instructions.push(id);
        id
    }

    /// Add an instruction to `block` just before its terminator.
    pub fn insert_before_terminator(
        &mut self,
        block: IrBlockId,
        instruction: IrInstruction<'ta>,
    ) -> IrInstId {
        let id = self.push(instruction);
        let terminated = self.is_terminated(block);
        let instructions = &mut self.block_mut(block).instructions;
        let position = if terminated {
            instructions.len() - 1
        } else {
            instructions.len()
        };
        instructions.insert(position, id);
        id
    }

    pub fn instruction(&self, id: IrInstId) -> &IrInstruction<'ta> {
        self.instructions
            .get(id.0)
            .unwrap_or_else(|| ice!(format!("instruction %{} does not exist", id.0)))
    }

    pub fn instruction_mut(&mut self, id: IrInstId) -> &mut IrInstruction<'ta> {
        self.instructions
            .get_mut(id.0)
            .unwrap_or_else(|| ice!(format!("instruction %{} does not exist", id.0)))
    }

    pub fn block(&self, id: IrBlockId) -> &IrBasicBlock {
        self.blocks
            .get(id.0)
            .unwrap_or_else(|| ice!(format!("block bb{} does not exist", id.0)))
    }

    pub fn block_mut(&mut self, id: IrBlockId) -> &mut IrBasicBlock {
        self.blocks
            .get_mut(id.0)
            .unwrap_or_else(|| ice!(format!("block bb{} does not exist", id.0)))
    }

    pub fn blocks(&self) -> &[IrBasicBlock] {
        &self.blocks
    }

    pub fn block_ids(&self) -> impl Iterator<Item = IrBlockId> {
        (0..self.blocks.len()).map(IrBlockId)
    }

    pub fn instructions_len(&self) -> usize {
        self.instructions.len()
    }

    pub fn terminator(&self, block: IrBlockId) -> Option<IrInstId> {
        let last = *self.block(block).instructions.last()?;
        self.instruction(last).kind.is_terminator().then_some(last)
    }

    pub fn is_terminated(&self, block: IrBlockId) -> bool {
        self.terminator(block).is_some()
    }

    pub fn add_predecessor(&mut self, target: IrBlockId, predecessor: IrBlockId) {
        self.block_mut(target).predecessors.push(predecessor);
    }

    /// Get the phi instructions at the start of `block`.
    pub fn phis(&self, block: IrBlockId) -> Vec<IrInstId> {
        self.block(block)
            .instructions
            .iter()
            .copied()
            .take_while(|id| self.instruction(*id).kind.is_phi())
            .collect()
    }

    pub fn checkpoint(&self) -> ExecCheckpoint {
        ExecCheckpoint {
            instructions: self.instructions.len(),
            blocks: self.blocks.clone(),
        }
    }

    /// Discard every instruction and block created since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: ExecCheckpoint) {
        self.instructions.truncate(checkpoint.instructions);
        self.blocks = checkpoint.blocks;
    }

    /// Drop every block that is not reachable from the entry block and renumber the remaining
    /// blocks in `layout` order.
    ///
    /// Phi inputs and predecessor edges from dropped blocks are removed with them.
    pub fn prune_unreachable(&mut self, layout: &[IrBlockId]) {
        if self.blocks.is_empty() {
            return;
        }
        let mut reachable = vec![false; self.blocks.len()];
        let mut stack = vec![IrBlockId(0)];
        while let Some(block) = stack.pop() {
            if std::mem::replace(&mut reachable[block.0], true) {
                continue;
            }
            if let Some(terminator) = self.terminator(block) {
                stack.extend(self.instruction(terminator).kind.successors());
            }
        }

        let mut order = layout
            .iter()
            .copied()
            .filter(|b| reachable[b.0])
            .collect::<Vec<_>>();
        for id in self.block_ids() {
            if reachable[id.0] && !order.contains(&id) {
                order.push(id);
            }
        }
        let mut remap = vec![None; self.blocks.len()];
        for (position, id) in order.iter().enumerate() {
            remap[id.0] = Some(IrBlockId(position));
        }
        let map = |b: IrBlockId| remap[b.0];

        let mut old_blocks = std::mem::take(&mut self.blocks)
            .into_iter()
            .map(Some)
            .collect::<Vec<_>>();
        let mut blocks = Vec::with_capacity(order.len());
        for id in &order {
            let mut block = old_blocks[id.0]
                .take()
                .unwrap_or_else(|| ice!("block was placed twice in layout"));
            block.predecessors = block.predecessors.iter().filter_map(|p| map(*p)).collect();
            if let Some(info) = &mut block.loop_info {
                info.exit = info.exit.and_then(map);
            }
            for inst in &block.instructions {
                match &mut self.instructions[inst.0].kind {
                    IrInstructionKind::Br { target, .. } => {
                        *target = map(*target).unwrap_or_else(|| ice!("branch to pruned block"));
                    }
                    IrInstructionKind::CondBr {
                        then_block,
                        else_block,
                        ..
                    } => {
                        *then_block =
                            map(*then_block).unwrap_or_else(|| ice!("branch to pruned block"));
                        *else_block =
                            map(*else_block).unwrap_or_else(|| ice!("branch to pruned block"));
                    }
                    IrInstructionKind::Phi { incoming } => {
                        *incoming = incoming
                            .iter()
                            .filter_map(|(pred, value)| map(*pred).map(|p| (p, *value)))
                            .collect();
                    }
                    _ => {}
                }
            }
            blocks.push(block);
        }
        self.blocks = blocks;
    }

    /// Count how often each instruction is read by an instruction placed in a block.
    pub fn use_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.instructions.len()];
        for block in &self.blocks {
            for inst in &block.instructions {
                for operand in self.instruction(*inst).kind.operands() {
                    counts[operand.0] += 1;
                }
            }
        }
        counts
    }

    /// Remove instructions whose results are unused and whose removal is not observable, until no
    /// more can be removed. Returns the number of removed instructions.
    pub fn eliminate_dead_instructions<F>(&mut self, has_side_effects: F) -> usize
    where
        F: Fn(&IrExecutable<'ta>, IrInstId) -> bool,
    {
        let mut removed = 0;
        loop {
            let counts = self.use_counts();
            let dead = self
                .blocks
                .iter()
                .flat_map(|b| b.instructions.iter().copied())
                .filter(|id| counts[id.0] == 0 && !has_side_effects(self, *id))
                .collect::<Vec<_>>();
            if dead.is_empty() {
                return removed;
            }
            removed += dead.len();
            for block in &mut self.blocks {
                block.instructions.retain(|id| !dead.contains(id));
            }
        }
    }

    /// Get the value of the executable when it folded completely.
    ///
    /// This is the case when the executable is a single block holding nothing but a return of a
    /// compile-time value.
    pub fn const_result(&self) -> Option<&ConstExprValue> {
        let [block] = self.blocks.as_slice() else {
            return None;
        };
        let [only] = block.instructions.as_slice() else {
            return None;
        };
        match &self.instruction(*only).kind {
            IrInstructionKind::Return { value } => self.instruction(*value).value.as_ref(),
            _ => None,
        }
    }

    /// Number of instructions placed in blocks, not counting terminators.
    pub fn runtime_instruction_count(&self) -> usize {
        self.blocks
            .iter()
            .flat_map(|b| b.instructions.iter())
            .filter(|id| !self.instruction(**id).kind.is_terminator())
            .count()
    }

    /// Iterate over the instructions placed in blocks, in layout order.
    pub fn placed_instructions(&self) -> impl Iterator<Item = IrInstId> + '_ {
        self.blocks
            .iter()
            .flat_map(|b| b.instructions.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ConstExprValue, IrBlockId, IrExecutable, IrInstId, IrInstruction, IrInstructionKind,
        ScopeArena, ScopeId,
    };
    use ember_macros::{assert_none, assert_some};
    use ember_span::Span;

    fn inst<'ta>(kind: IrInstructionKind<'ta>) -> IrInstruction<'ta> {
        IrInstruction {
            span: Span::empty(),
            scope: ScopeId(0),
            kind,
            ty: None,
            value: None,
        }
    }

    fn constant<'ta>(value: i128) -> IrInstruction<'ta> {
        IrInstruction {
            value: Some(ConstExprValue::Integer(value)),
            ..inst(IrInstructionKind::Const)
        }
    }

    #[test]
    fn test_insert_before_terminator() {
        let mut exec = IrExecutable::new(ScopeArena::new());
        let entry = exec.add_block();
        let c = exec.push(constant(1));
        let ret = exec.append(entry, inst(IrInstructionKind::Return { value: c }));
        let load = exec.insert_before_terminator(entry, inst(IrInstructionKind::Load { ptr: c }));
        assert_eq!(exec.block(entry).instructions, vec![load, ret]);
        assert_eq!(exec.terminator(entry), Some(ret));
    }

    #[test]
    fn test_const_result_requires_a_single_return() {
        let mut exec = IrExecutable::new(ScopeArena::new());
        let entry = exec.add_block();
        let c = exec.push(constant(20));
        exec.append(entry, inst(IrInstructionKind::Return { value: c }));
        assert_eq!(
            assert_some!(exec.const_result()),
            &ConstExprValue::Integer(20)
        );
        assert_eq!(exec.runtime_instruction_count(), 0);

        let mut exec = IrExecutable::new(ScopeArena::new());
        let entry = exec.add_block();
        let p = exec.append(entry, inst(IrInstructionKind::Param { index: 0 }));
        exec.append(entry, inst(IrInstructionKind::Return { value: p }));
        assert_none!(exec.const_result());
    }

    #[test]
    fn test_prune_drops_unreachable_blocks_and_phi_inputs() {
        let mut exec = IrExecutable::new(ScopeArena::new());
        let entry = exec.add_block();
        let dead = exec.add_block();
        let join = exec.add_block();
        let a = exec.push(constant(1));
        let b = exec.push(constant(2));
        exec.append(
            entry,
            inst(IrInstructionKind::Br {
                target: join,
                comptime_cond: None,
            }),
        );
        exec.append(
            dead,
            inst(IrInstructionKind::Br {
                target: join,
                comptime_cond: None,
            }),
        );
        exec.add_predecessor(join, entry);
        exec.add_predecessor(join, dead);
        let phi = exec.append(
            join,
            inst(IrInstructionKind::Phi {
                incoming: vec![(entry, a), (dead, b)],
            }),
        );
        exec.append(join, inst(IrInstructionKind::Return { value: phi }));

        exec.prune_unreachable(&[entry, dead, join]);
        assert_eq!(exec.blocks().len(), 2);
        assert_eq!(exec.block(IrBlockId(1)).predecessors, vec![IrBlockId(0)]);
        let incoming = match &exec.instruction(phi).kind {
            IrInstructionKind::Phi { incoming } => incoming.clone(),
            _ => unreachable!(),
        };
        assert_eq!(incoming, vec![(IrBlockId(0), a)]);
    }

    #[test]
    fn test_dead_instruction_elimination_keeps_side_effects() {
        let mut exec = IrExecutable::new(ScopeArena::new());
        let entry = exec.add_block();
        let p = exec.append(entry, inst(IrInstructionKind::Param { index: 0 }));
        let unused = exec.append(entry, inst(IrInstructionKind::Load { ptr: p }));
        let kept = exec.append(entry, inst(IrInstructionKind::Store { ptr: p, value: p }));
        let c = exec.push(constant(0));
        exec.append(entry, inst(IrInstructionKind::Return { value: c }));
        let removed = exec.eliminate_dead_instructions(|exec, id| {
            matches!(
                exec.instruction(id).kind,
                IrInstructionKind::Store { .. } | IrInstructionKind::Return { .. }
            )
        });
        assert_eq!(removed, 1);
        let remaining = exec.placed_instructions().collect::<Vec<IrInstId>>();
        assert!(remaining.contains(&kept));
        assert!(!remaining.contains(&unused));
        assert!(remaining.contains(&p));
    }
}
