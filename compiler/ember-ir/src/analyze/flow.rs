//! Control flow of the analyzer: following paths through old blocks, scheduling joins, and the
//! treatment of loops.
//!
//! A loop entered in runtime mode is first executed speculatively, as if it were compile-time
//! code. When it terminates without needing any runtime instruction, the unrolled result is kept.
//! Otherwise everything done during speculation is rolled back and the loop is analyzed as runtime
//! code by iterating its body until the types and known values of its header phis stop changing.

use super::typing::concretize;
use super::{Analyzer, Flow, Halt, PendingEdge, RuntimeLoopFrame, Speculation};
use crate::error::{
    FixedPointDivergenceError, QuotaExceededError, TypeMismatchError,
    UnableToEvaluateConstantError, UndefinedValueUseError,
};
use crate::exec::IrBlockId;
use crate::instruction::{IrInstId, IrInstruction, IrInstructionKind};
use crate::scope::ScopeId;
use crate::ty::IrTy;
use crate::value::ConstExprValue;
use ember_diagnostics::ice;
use ember_span::Span;
use tracing::{trace, warn};

/// How a path arrives at the block it starts with.
pub(super) enum Entry {
    /// The entry block of the executable.
    Start,
    /// A scheduled join, with every runtime edge into it.
    Bound(Vec<PendingEdge>),
    /// Straight from `pred`, continuing the current new block.
    Inline { pred: IrBlockId },
    /// A loop header whose phis were bound by the loop analysis.
    Prebound,
}

pub(super) enum PathEnd {
    Ended,
    /// Speculation reached the exit of the loop it runs, coming from `pred`.
    LoopExit { pred: IrBlockId },
}

enum Next {
    Continue(IrBlockId, Entry),
    End(PathEnd),
}

/// What a runtime loop pass assumes about a header phi.
#[derive(Debug, Clone)]
enum Assumption<'ta> {
    /// The phi has the same known value on every iteration.
    Const(&'ta IrTy<'ta>, ConstExprValue),
    Runtime(&'ta IrTy<'ta>),
}

impl<'a, 's, 'ast, 'ta> Analyzer<'a, 's, 'ast, 'ta> {
    /// Analyze old blocks starting at `start` for as long as control flow can be followed
    /// directly.
    pub(super) fn run_path(&mut self, start: IrBlockId, entry: Entry) -> Flow<PathEnd> {
        let exec = self.old;
        let mut block = start;
        let mut entry = entry;
        loop {
            self.visited[block.0] = true;
            match entry {
                Entry::Start | Entry::Prebound => {}
                Entry::Inline { pred } => self.inline_phis(block, pred)?,
                Entry::Bound(edges) => self.bind_phis(block, &edges)?,
            }
            let Some((&terminator, body)) = exec.block(block).instructions.split_last() else {
                ice!(format!("block bb{} has no terminator", block.0));
            };
            for &inst in body {
                if exec.instruction(inst).kind.is_phi() {
                    continue;
                }
                self.analyze_instruction(inst)?;
            }
            match self.terminate(block, terminator)? {
                Next::Continue(target, next) => {
                    block = target;
                    entry = next;
                }
                Next::End(end) => return Ok(end),
            }
        }
    }

    /// Settle the outcome of a path. A failed compile-time path leaves the current block
    /// unreachable.
    pub(super) fn finish_path(&mut self, outcome: Flow<PathEnd>) -> Flow<()> {
        match outcome {
            Ok(PathEnd::Ended) => Ok(()),
            Ok(PathEnd::LoopExit { .. }) => ice!("loop exit reached outside of speculation"),
            Err(Halt::Abort) => {
                self.seal();
                Ok(())
            }
            Err(Halt::Interrupt) => Err(Halt::Interrupt),
        }
    }

    /// Analyze every scheduled old block in `start..end`, in layout order.
    pub(super) fn run_worklist(&mut self, start: usize, end: usize) -> Flow<()> {
        for index in start..end {
            if self.visited[index] {
                continue;
            }
            let block = IrBlockId(index);
            let Some(edges) = self.pending.remove(&block) else {
                continue;
            };
            self.current = self.block_map[index]
                .unwrap_or_else(|| ice!("scheduled block has no counterpart"));
            let outcome = self.run_path(block, Entry::Bound(edges));
            self.finish_path(outcome)?;
        }
        Ok(())
    }

    fn inline_phis(&mut self, block: IrBlockId, pred: IrBlockId) -> Flow<()> {
        let phis = self.old.phis(block);
        // Every phi reads the values of the previous iteration, so nothing is rebound until all
        // incoming values are known.
        let values = phis
            .iter()
            .map(|phi| self.incoming(*phi, pred))
            .collect::<Flow<Vec<_>>>()?;
        for (phi, value) in phis.iter().zip(values) {
            self.others[phi.0] = Some(value);
        }
        Ok(())
    }

    fn incoming(&mut self, phi: IrInstId, pred: IrBlockId) -> Flow<IrInstId> {
        let exec = self.old;
        let IrInstructionKind::Phi { incoming } = &exec.instruction(phi).kind else {
            ice!("expected a phi");
        };
        let (_, value) = incoming
            .iter()
            .find(|(from, _)| *from == pred)
            .unwrap_or_else(|| ice!("phi has no value for its predecessor"));
        self.operand(*value)
    }

    /// Values the phis of `target` receive along the edge from `from`.
    fn edge_values(&mut self, from: IrBlockId, target: IrBlockId) -> Flow<Vec<IrInstId>> {
        self.old
            .phis(target)
            .iter()
            .map(|phi| self.incoming(*phi, from))
            .collect()
    }

    fn bind_phis(&mut self, block: IrBlockId, edges: &[PendingEdge]) -> Flow<()> {
        for (k, phi) in self.old.phis(block).iter().enumerate() {
            let values = edges.iter().map(|e| e.values[k]).collect::<Vec<_>>();
            let merged = self.merge(*phi, edges, &values)?;
            self.others[phi.0] = Some(merged);
        }
        Ok(())
    }

    /// Merge the values of a phi at a runtime join. Values that agree are not merged at all.
    fn merge(
        &mut self,
        phi: IrInstId,
        edges: &[PendingEdge],
        values: &[IrInstId],
    ) -> Flow<IrInstId> {
        let first = values[0];
        if values.iter().all(|v| *v == first) {
            return Ok(first);
        }
        if let Some(value) = self.value_of(first) {
            let ty = self.ty_of(first);
            if values
                .iter()
                .all(|v| self.value_of(*v) == Some(value) && self.ty_of(*v) == ty)
            {
                return Ok(first);
            }
        }
        if values.iter().any(|v| self.ty_of(*v).is_invalid()) {
            return Ok(self.poison(phi));
        }
        let mut peer = self.ty_of(first);
        for value in &values[1..] {
            let ty = self.ty_of(*value);
            match self.peer(peer, ty) {
                Some(merged) => peer = merged,
                None => {
                    self.session.diagnostics.report(TypeMismatchError {
                        actual_type: ty.to_string(),
                        expected_type: peer.to_string(),
                        actual_loc: self.new.instruction(*value).span,
                        expected_loc: Some(self.new.instruction(first).span),
                    });
                    return Ok(self.poison(phi));
                }
            }
        }
        // Literals merged at runtime take the type their result is used as, if they all fit it.
        let hint = self
            .result_hint(phi)
            .filter(|_| peer.is_comptime_only())
            .filter(|hint| !hint.is_invalid() && !hint.is_comptime_only())
            .filter(|hint| values.iter().all(|v| self.coercible(*v, *hint)));
        let ty = match hint {
            Some(hint) => hint,
            None => self.session.concrete_or_report(peer, self.span_of(phi)),
        };
        if ty.is_invalid() {
            return Ok(self.poison(phi));
        }
        let mut incoming = Vec::with_capacity(edges.len());
        for (edge, value) in edges.iter().zip(values) {
            let coerced = self.coerce_at(edge.from, *value, ty)?;
            incoming.push((edge.from, coerced));
        }
        let instruction = self.instruction_for(phi, ty, IrInstructionKind::Phi { incoming }, None);
        Ok(self.new.append(self.current, instruction))
    }

    fn terminate(&mut self, block: IrBlockId, inst: IrInstId) -> Flow<Next> {
        let exec = self.old;
        match &exec.instruction(inst).kind {
            IrInstructionKind::Br {
                target,
                comptime_cond,
            } => {
                let known = match comptime_cond {
                    Some(cond) => {
                        let cond = self.operand(*cond)?;
                        self.value_of(cond).is_some()
                    }
                    None => false,
                };
                self.jump(block, inst, *target, known)
            }
            IrInstructionKind::CondBr {
                cond,
                then_block,
                else_block,
            } => self.cond_branch(block, inst, *cond, *then_block, *else_block),
            IrInstructionKind::Return { value } => {
                self.analyze_return(inst, *value)?;
                Ok(Next::End(PathEnd::Ended))
            }
            IrInstructionKind::Unreachable => {
                self.seal();
                Ok(Next::End(PathEnd::Ended))
            }
            _ => ice!(format!("block bb{} does not end in a terminator", block.0)),
        }
    }

    fn cond_branch(
        &mut self,
        block: IrBlockId,
        inst: IrInstId,
        cond: IrInstId,
        then_block: IrBlockId,
        else_block: IrBlockId,
    ) -> Flow<Next> {
        let value = self.operand(cond)?;
        let ty = self.ty_of(value);
        if ty.is_invalid() {
            return Err(Halt::Abort);
        }
        let bool_ty = self.types().get_bool_ty();
        if ty != bool_ty {
            self.session.diagnostics.report(TypeMismatchError {
                actual_type: ty.to_string(),
                expected_type: bool_ty.to_string(),
                actual_loc: self.span_of(cond),
                expected_loc: None,
            });
            return Err(Halt::Abort);
        }
        match self.value_of(value).cloned() {
            Some(ConstExprValue::Bool(taken)) => {
                let target = if taken { then_block } else { else_block };
                self.jump(block, inst, target, true)
            }
            Some(_) => {
                self.session.diagnostics.report(UndefinedValueUseError {
                    span: self.span_of(cond),
                });
                Err(Halt::Abort)
            }
            None => {
                if self.speculation.is_some() {
                    return Err(Halt::Interrupt);
                }
                if self.comptime_at(inst) {
                    self.session
                        .diagnostics
                        .report(UnableToEvaluateConstantError {
                            span: self.span_of(cond),
                        });
                    return Err(Halt::Abort);
                }
                let then_values = self.edge_values(block, then_block)?;
                let else_values = self.edge_values(block, else_block)?;
                let then_new = self.target_block(then_block);
                let else_new = self.target_block(else_block);
                let from = self.current;
                let noreturn = self.types().get_noreturn_ty();
                let kind = IrInstructionKind::CondBr {
                    cond: value,
                    then_block: then_new,
                    else_block: else_new,
                };
                let instruction = self.instruction_for(inst, noreturn, kind, None);
                self.new.append(from, instruction);
                for (old_target, new_target, values) in [
                    (then_block, then_new, then_values),
                    (else_block, else_new, else_values),
                ] {
                    self.new.add_predecessor(new_target, from);
                    self.pending
                        .entry(old_target)
                        .or_default()
                        .push(PendingEdge { from, values });
                }
                Ok(Next::End(PathEnd::Ended))
            }
        }
    }

    fn analyze_return(&mut self, inst: IrInstId, value: IrInstId) -> Flow<()> {
        if self.speculation.is_some() {
            return Err(Halt::Interrupt);
        }
        let mut result = self.operand(value)?;
        if let Some(expected) = self.expected_type {
            result = self.coerce(inst, result, expected, self.expected_type_source)?;
        }
        let ty = self.ty_of(result);
        self.result_ty = Some(match self.result_ty {
            Some(previous) => self.peer(previous, ty).unwrap_or(previous),
            None => ty,
        });
        let noreturn = self.types().get_noreturn_ty();
        let kind = IrInstructionKind::Return { value: result };
        let instruction = self.instruction_for(inst, noreturn, kind, None);
        self.new.append(self.current, instruction);
        Ok(())
    }

    /// Terminate the current block as unreachable, unless it already ends.
    fn seal(&mut self) {
        if self.new.is_terminated(self.current) {
            return;
        }
        let noreturn = self.types().get_noreturn_ty();
        let instruction = IrInstruction {
            span: Span::empty(),
            scope: ScopeId(0),
            kind: IrInstructionKind::Unreachable,
            ty: Some(noreturn),
            value: None,
        };
        self.new.append(self.current, instruction);
    }

    /// Get the new block that runtime edges into the old block `target` lead to.
    fn target_block(&mut self, target: IrBlockId) -> IrBlockId {
        match self.block_map[target.0] {
            Some(block) => block,
            None => {
                let block = self.new.add_block();
                self.block_map[target.0] = Some(block);
                block
            }
        }
    }

    /// Emit a branch from the current block to the new block `target`.
    fn branch_to(&mut self, inst: IrInstId, target: IrBlockId) {
        let noreturn = self.types().get_noreturn_ty();
        let kind = IrInstructionKind::Br {
            target,
            comptime_cond: None,
        };
        let instruction = self.instruction_for(inst, noreturn, kind, None);
        let from = self.current;
        self.new.append(from, instruction);
        self.new.add_predecessor(target, from);
    }

    /// Follow the unconditional edge `block -> target`. `known` is set when the edge was chosen
    /// by a condition known at compile time.
    fn jump(
        &mut self,
        block: IrBlockId,
        inst: IrInstId,
        target: IrBlockId,
        known: bool,
    ) -> Flow<Next> {
        if let Some(Speculation { exit: Some(exit) }) = self.speculation {
            if exit == target {
                return Ok(Next::End(PathEnd::LoopExit { pred: block }));
            }
        }
        let exec = self.old;
        let comptime = self.comptime_at(inst);
        let is_header = exec.block(target).loop_info.is_some();
        if is_header && target <= block {
            if comptime {
                self.quota += 1;
                let quota = self.session.cx.options.backward_branch_quota;
                if self.quota > quota {
                    if self.speculation.is_some() {
                        return Err(Halt::Interrupt);
                    }
                    warn!(quota, "backward branch quota exhausted");
                    self.session.diagnostics.report(QuotaExceededError {
                        quota,
                        span: self.span_of(inst),
                    });
                    return Err(Halt::Abort);
                }
                return Ok(Next::Continue(target, Entry::Inline { pred: block }));
            }
            self.back_edge(block, inst, target)?;
            return Ok(Next::End(PathEnd::Ended));
        }
        if is_header && !comptime {
            return self.enter_loop(block, inst, target);
        }
        if comptime || known || exec.block(target).predecessors.len() == 1 {
            return Ok(Next::Continue(target, Entry::Inline { pred: block }));
        }
        let values = self.edge_values(block, target)?;
        let new_target = self.target_block(target);
        let from = self.current;
        self.branch_to(inst, new_target);
        self.pending
            .entry(target)
            .or_default()
            .push(PendingEdge { from, values });
        Ok(Next::End(PathEnd::Ended))
    }

    fn back_edge(&mut self, block: IrBlockId, inst: IrInstId, header: IrBlockId) -> Flow<()> {
        let values = self.edge_values(block, header)?;
        let frame = self
            .loops
            .iter()
            .rposition(|f| f.header == header)
            .unwrap_or_else(|| ice!("back edge outside of its loop"));
        let new_header = self.loops[frame].new_header;
        let from = self.current;
        self.branch_to(inst, new_header);
        self.loops[frame]
            .back_edges
            .push(PendingEdge { from, values });
        Ok(())
    }

    /// Enter the loop headed by `header` from `block` in runtime mode.
    fn enter_loop(&mut self, block: IrBlockId, inst: IrInstId, header: IrBlockId) -> Flow<Next> {
        let exit = self.old.block(header).loop_info.and_then(|info| info.exit);
        trace!(header = header.0, "speculating loop");
        let checkpoint = self.checkpoint();
        let mark = checkpoint.diagnostics;
        self.speculation = Some(Speculation { exit });
        self.quota = 0;
        let outcome = self.run_path(header, Entry::Inline { pred: block });
        self.speculation = None;
        if let (Ok(PathEnd::LoopExit { pred }), Some(exit)) = (&outcome, exit) {
            if !self.session.diagnostics.has_reported_since(mark) {
                trace!(header = header.0, "loop executed at compile time");
                return Ok(Next::Continue(exit, Entry::Inline { pred: *pred }));
            }
        }
        trace!(header = header.0, "speculation rolled back");
        self.rollback(checkpoint);
        self.runtime_loop(block, inst, header)
    }

    /// Analyze a loop as runtime code, iterating the body until the header phis are stable.
    fn runtime_loop(&mut self, block: IrBlockId, inst: IrInstId, header: IrBlockId) -> Flow<Next> {
        let exec = self.old;
        let end = exec
            .block(header)
            .loop_info
            .and_then(|info| info.exit)
            .map_or(exec.blocks().len(), |exit| exit.0);
        let phis = exec.phis(header);
        let initial = self.edge_values(block, header)?;
        let mut assumptions = initial
            .iter()
            .map(|v| match self.value_of(*v) {
                Some(value) => Assumption::Const(self.ty_of(*v), value.clone()),
                None => Assumption::Runtime(self.ty_of(*v)),
            })
            .collect::<Vec<_>>();

        let budget = self.session.cx.options.fixed_point_budget;
        for pass in 0..budget {
            trace!(header = header.0, pass, "analyzing loop body");
            let checkpoint = self.checkpoint();
            let preamble = self.current;
            let new_header = self.new.add_block();
            self.branch_to(inst, new_header);
            self.current = new_header;
            for (k, phi) in phis.iter().enumerate() {
                let mapped = match &assumptions[k] {
                    Assumption::Const(ty, value) => self.constant(*phi, ty, value.clone()),
                    Assumption::Runtime(ty) => {
                        let init = self.coerce_at(preamble, initial[k], ty)?;
                        let kind = IrInstructionKind::Phi {
                            incoming: vec![(preamble, init)],
                        };
                        let instruction = self.instruction_for(*phi, ty, kind, None);
                        self.new.append(new_header, instruction)
                    }
                };
                self.others[phi.0] = Some(mapped);
            }

            self.loops.push(RuntimeLoopFrame {
                header,
                new_header,
                back_edges: Vec::new(),
            });
            let outcome = self.run_path(header, Entry::Prebound);
            self.finish_path(outcome)?;
            self.run_worklist(header.0 + 1, end)?;
            let frame = self
                .loops
                .pop()
                .unwrap_or_else(|| ice!("loop frame stack is empty"));

            let widened = assumptions
                .iter()
                .enumerate()
                .map(|(k, assumption)| {
                    let incoming = frame
                        .back_edges
                        .iter()
                        .map(|e| e.values[k])
                        .collect::<Vec<_>>();
                    self.widen(assumption, &incoming)
                })
                .collect::<Vec<_>>();
            if widened.iter().all(Option::is_none) {
                self.close_loop(&phis, &assumptions, &frame)?;
                return Ok(Next::End(PathEnd::Ended));
            }
            self.rollback(checkpoint);
            assumptions = assumptions
                .into_iter()
                .zip(widened)
                .map(|(previous, next)| next.unwrap_or(previous))
                .collect();
        }

        warn!(budget, "loop did not reach a fixed point");
        self.session.diagnostics.report(FixedPointDivergenceError {
            budget,
            span: self.span_of(inst),
        });
        self.seal();
        Ok(Next::End(PathEnd::Ended))
    }

    /// Determine the assumption the next pass must make about a header phi, given the values it
    /// receives along the back edges. Returns `None` when the current assumption holds.
    fn widen(&self, assumption: &Assumption<'ta>, incoming: &[IrInstId]) -> Option<Assumption<'ta>> {
        let (current, holds) = match assumption {
            Assumption::Const(ty, value) => (
                *ty,
                incoming
                    .iter()
                    .all(|v| self.value_of(*v) == Some(value) && self.ty_of(*v) == *ty),
            ),
            Assumption::Runtime(ty) => (*ty, incoming.iter().all(|v| self.coercible(*v, ty))),
        };
        if holds {
            return None;
        }
        let mut types = vec![current];
        types.extend(incoming.iter().map(|v| self.ty_of(*v)));
        let widened = match self.peer_all(&types) {
            Some(peer) => concretize(self.types(), peer),
            // The mismatch is reported when the back edge is coerced into the phi.
            None => current,
        };
        let widened = if widened.is_comptime_only() {
            self.types().get_invalid_ty()
        } else {
            widened
        };
        match assumption {
            Assumption::Runtime(ty) if *ty == widened => None,
            _ => Some(Assumption::Runtime(widened)),
        }
    }

    /// Add the back edges of a stable pass to the header phis.
    fn close_loop(
        &mut self,
        phis: &[IrInstId],
        assumptions: &[Assumption<'ta>],
        frame: &RuntimeLoopFrame,
    ) -> Flow<()> {
        for (k, phi) in phis.iter().enumerate() {
            let Assumption::Runtime(ty) = assumptions[k] else {
                continue;
            };
            let new_phi = self.others[phi.0].unwrap_or_else(|| ice!("header phi is unbound"));
            for edge in &frame.back_edges {
                let value = self.coerce_at(edge.from, edge.values[k], ty)?;
                if let IrInstructionKind::Phi { incoming } =
                    &mut self.new.instruction_mut(new_phi).kind
                {
                    incoming.push((edge.from, value));
                }
            }
        }
        Ok(())
    }
}
