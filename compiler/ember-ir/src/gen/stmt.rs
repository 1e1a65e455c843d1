use super::{Generator, LoopFrame};
use crate::error::{BreakOutsideLoopError, ContinueOutsideLoopError, ReturnOutsideFunctionError};
use crate::exec::IrLoopInfo;
use crate::instruction::{IrCastKind, IrInstId, IrInstructionKind};
use crate::scope::{IrLocalStorage, LocalId};
use ember_diagnostics::ice;
use ember_syntax::{AstBlockExpr, AstStmt, AstWhileExpr};

impl<'g, 'ta> Generator<'g, 'ta> {
    pub(super) fn gen_stmt(&mut self, stmt: &AstStmt) {
        match stmt {
            AstStmt::Let(s) => {
                let mut value = self.gen_expr(&s.value);
                if let Some(ty) = &s.ty {
                    let target = self.annotation(ty);
                    value = self.emit(
                        s.span,
                        IrInstructionKind::Cast {
                            operand: value,
                            target,
                            kind: IrCastKind::Implicit,
                        },
                    );
                }
                self.declare(&s.name.name, s.mutable, s.name.span, value);
            }
            AstStmt::Return(s) => {
                let value = match &s.value {
                    Some(value) => self.gen_expr(value),
                    None => self.unit(s.span),
                };
                if !self.in_function {
                    self.diagnostics
                        .report(ReturnOutsideFunctionError { span: s.span });
                    return;
                }
                self.emit(s.span, IrInstructionKind::Return { value });
                self.start_dead_block();
            }
            AstStmt::Break(s) => {
                let Some(frame) = self.loops.last() else {
                    self.diagnostics
                        .report(BreakOutsideLoopError { span: s.span });
                    return;
                };
                let exit = frame.exit;
                let edge = self.incoming();
                self.branch(s.span, exit, None);
                if let Some(frame) = self.loops.last_mut() {
                    frame.breaks.push(edge);
                }
                self.start_dead_block();
            }
            AstStmt::Continue(s) => {
                let Some(frame) = self.loops.last() else {
                    self.diagnostics
                        .report(ContinueOutsideLoopError { span: s.span });
                    return;
                };
                let header = frame.header;
                let edge = self.incoming();
                self.branch(s.span, header, None);
                if let Some(frame) = self.loops.last_mut() {
                    frame.continues.push(edge);
                }
                self.start_dead_block();
            }
            AstStmt::Expr(s) => {
                self.gen_expr(&s.expr);
            }
        }
    }

    /// Lower a while loop.
    ///
    /// ```text
    ///   bb_pre:    br bb_header
    ///   bb_header: %i = phi [bb_pre, %i0], [bb_latch, %i1]
    ///              condbr %c, bb_body, bb_exit
    ///   bb_body:   ...
    ///   bb_latch:  br bb_header
    ///   bb_exit:
    /// ```
    ///
    /// Every mutable local visible at the loop gets a phi in the header, since the body may rebind
    /// it. The header records its exit block so the analyzer can tell where the loop ends.
    pub(super) fn gen_while(&mut self, e: &AstWhileExpr) -> IrInstId {
        let header = self.new_block();
        let body = self.new_block();
        let exit = self.new_block();
        let preamble = self.current;
        self.branch(e.span, header, None);
        self.switch_to(header);
        self.exec.block_mut(header).loop_info = Some(IrLoopInfo { exit: Some(exit) });

        let before = self.defs.clone();
        let mut phis: Vec<(LocalId, IrInstId)> = Vec::new();
        for local in self.exec.scopes.visible_locals(self.scope) {
            let info = self.exec.scopes.local(local);
            if !info.mutable || info.storage != IrLocalStorage::Value {
                continue;
            }
            let Some(initial) = before.get(&local).copied() else {
                continue;
            };
            let phi = self.emit(
                e.span,
                IrInstructionKind::Phi {
                    incoming: vec![(preamble, initial)],
                },
            );
            self.defs.insert(local, phi);
            phis.push((local, phi));
        }

        let cond = self.gen_expr(&e.condition);
        let cond_edge = self.incoming();
        self.cond_branch(e.condition.span(), cond, body, exit);
        let header_defs = self.defs.clone();

        self.loops.push(LoopFrame {
            header,
            exit,
            breaks: vec![],
            continues: vec![],
        });
        self.switch_to(body);
        self.gen_block(&e.body);
        let latch = self.incoming();
        self.branch(e.body.span, header, None);
        let mut frame = self
            .loops
            .pop()
            .unwrap_or_else(|| ice!("loop frame stack is empty"));
        frame.continues.push(latch);

        for (local, phi) in &phis {
            let incoming = frame
                .continues
                .iter()
                .map(|edge| {
                    let value = edge
                        .defs
                        .get(local)
                        .copied()
                        .unwrap_or_else(|| ice!("loop variable is unbound along a back edge"));
                    (edge.block, value)
                })
                .collect::<Vec<_>>();
            if let IrInstructionKind::Phi { incoming: existing } =
                &mut self.exec.instruction_mut(*phi).kind
            {
                existing.extend(incoming);
            }
        }

        self.switch_to(exit);
        let keys = before.keys().copied().collect::<Vec<_>>();
        self.defs = header_defs;
        let mut edges = vec![cond_edge];
        edges.append(&mut frame.breaks);
        self.merge_defs(e.span, &keys, &edges);
        self.unit(e.span)
    }

    pub(super) fn collect_address_taken_in_block(&mut self, block: &AstBlockExpr) {
        for stmt in &block.stmts {
            match stmt {
                AstStmt::Let(s) => self.collect_address_taken_in_expr(&s.value),
                AstStmt::Return(s) => {
                    if let Some(value) = &s.value {
                        self.collect_address_taken_in_expr(value);
                    }
                }
                AstStmt::Break(_) | AstStmt::Continue(_) => {}
                AstStmt::Expr(s) => self.collect_address_taken_in_expr(&s.expr),
            }
        }
        if let Some(tail) = &block.tail {
            self.collect_address_taken_in_expr(tail);
        }
    }
}
