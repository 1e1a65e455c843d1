//! Semantic analysis of generated IR.
//!
//! The analyzer reads an unanalyzed executable and writes a second, analyzed one. Every old
//! instruction is mapped to its replacement in the new executable through a side table, so the
//! old executable is never modified. Instructions whose operands are all known at compile time
//! are folded into constants instead of being emitted, and branches on known conditions are
//! followed without emitting the untaken side.
//!
//! Analysis runs in one of two modes. In runtime mode, old blocks are visited in layout order and
//! joins become phis. In compile-time mode, which applies to compile-time scopes, to callee bodies
//! of compile-time calls and to speculative loop execution, the analyzer behaves as an
//! interpreter: every branch is followed, loops are unrolled, and anything that would need runtime
//! code is an error.

mod calls;
mod eval;
mod flow;
mod memory;
mod typing;

pub(crate) use typing::concretize;

use crate::error::UnableToEvaluateConstantError;
use crate::exec::{ExecCheckpoint, IrBlockId, IrExecutable};
use crate::instruction::{IrInstId, IrInstruction, IrInstructionKind};
use crate::session::AnalysisSession;
use crate::side_effects::has_side_effects;
use crate::store::StoreCheckpoint;
use crate::table::TypeTable;
use crate::ty::IrTy;
use crate::value::ConstExprValue;
use ember_diagnostics::{ice, DiagnosticMark};
use ember_span::Span;
use std::collections::BTreeMap;

/// Analyze a standalone expression, such as a constant initializer or an array length.
///
/// The result of the expression is coerced to `expected_type` when one is given, and
/// `expected_type_source` points at the annotation that demanded it. Returns the type of the
/// expression. When the whole expression folded, [`IrExecutable::const_result`] of `new` holds its
/// value.
pub fn analyze<'s, 'ast, 'ta>(
    session: &mut AnalysisSession<'s, 'ast, 'ta>,
    old: &IrExecutable<'ta>,
    new: &mut IrExecutable<'ta>,
    expected_type: Option<&'ta IrTy<'ta>>,
    expected_type_source: Option<Span>,
) -> &'ta IrTy<'ta> {
    analyze_body(
        session,
        old,
        new,
        expected_type,
        expected_type_source,
        Parameters::None,
        false,
    )
}

/// Values of the parameters of the executable being analyzed.
#[derive(Debug, Clone)]
pub(crate) enum Parameters<'ta> {
    None,
    /// A function analyzed on its own. Parameters are runtime values.
    Runtime(Vec<&'ta IrTy<'ta>>),
    /// A callee of a compile-time call, with the argument values.
    Comptime(Vec<(&'ta IrTy<'ta>, ConstExprValue)>),
}

pub(crate) fn analyze_body<'s, 'ast, 'ta>(
    session: &mut AnalysisSession<'s, 'ast, 'ta>,
    old: &IrExecutable<'ta>,
    new: &mut IrExecutable<'ta>,
    expected_type: Option<&'ta IrTy<'ta>>,
    expected_type_source: Option<Span>,
    parameters: Parameters<'ta>,
    forced_comptime: bool,
) -> &'ta IrTy<'ta> {
    let mut analyzer = Analyzer::new(
        session,
        old,
        new,
        expected_type,
        expected_type_source,
        parameters,
        forced_comptime,
    );
    analyzer.run();
    analyzer.finish()
}

/// Reasons a path stops before reaching its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
    /// Speculative execution needs runtime code and must be rolled back.
    Interrupt,
    /// Compile-time execution failed and the failure was reported.
    Abort,
}

pub(crate) type Flow<T> = Result<T, Halt>;

/// A runtime edge into a block that has not been analyzed yet, with the values its phis receive.
#[derive(Debug, Clone)]
struct PendingEdge {
    from: IrBlockId,
    values: Vec<IrInstId>,
}

#[derive(Debug, Clone)]
struct RuntimeLoopFrame {
    header: IrBlockId,
    new_header: IrBlockId,
    back_edges: Vec<PendingEdge>,
}

#[derive(Debug, Clone, Copy)]
struct Speculation {
    exit: Option<IrBlockId>,
}

/// Everything speculation or a fixed-point pass may have to undo.
struct Checkpoint<'ta> {
    exec: ExecCheckpoint,
    store: StoreCheckpoint<'ta>,
    diagnostics: DiagnosticMark,
    others: Vec<Option<IrInstId>>,
    block_map: Vec<Option<IrBlockId>>,
    visited: Vec<bool>,
    pending: BTreeMap<IrBlockId, Vec<PendingEdge>>,
    loops: Vec<RuntimeLoopFrame>,
    current: IrBlockId,
    quota: u32,
    result_ty: Option<&'ta IrTy<'ta>>,
}

pub(crate) struct Analyzer<'a, 's, 'ast, 'ta> {
    session: &'a mut AnalysisSession<'s, 'ast, 'ta>,
    old: &'a IrExecutable<'ta>,
    new: &'a mut IrExecutable<'ta>,
    /// Replacement of every old instruction, once analyzed.
    others: Vec<Option<IrInstId>>,
    /// New block that runtime edges into an old block lead to.
    block_map: Vec<Option<IrBlockId>>,
    visited: Vec<bool>,
    pending: BTreeMap<IrBlockId, Vec<PendingEdge>>,
    current: IrBlockId,
    forced_comptime: bool,
    parameters: Parameters<'ta>,
    expected_type: Option<&'ta IrTy<'ta>>,
    expected_type_source: Option<Span>,
    result_ty: Option<&'ta IrTy<'ta>>,
    loops: Vec<RuntimeLoopFrame>,
    speculation: Option<Speculation>,
    /// Backward branches taken by compile-time execution so far.
    quota: u32,
}

impl<'a, 's, 'ast, 'ta> Analyzer<'a, 's, 'ast, 'ta> {
    fn new(
        session: &'a mut AnalysisSession<'s, 'ast, 'ta>,
        old: &'a IrExecutable<'ta>,
        new: &'a mut IrExecutable<'ta>,
        expected_type: Option<&'ta IrTy<'ta>>,
        expected_type_source: Option<Span>,
        parameters: Parameters<'ta>,
        forced_comptime: bool,
    ) -> Self {
        let blocks = old.blocks().len();
        Self {
            session,
            old,
            new,
            others: vec![None; old.instructions_len()],
            block_map: vec![None; blocks],
            visited: vec![false; blocks],
            pending: BTreeMap::new(),
            current: IrBlockId(0),
            forced_comptime,
            parameters,
            expected_type,
            expected_type_source,
            result_ty: None,
            loops: Vec::new(),
            speculation: None,
            quota: 0,
        }
    }

    fn run(&mut self) {
        if self.old.blocks().is_empty() {
            return;
        }
        let blocks = self.old.blocks().len();
        self.current = self.new.add_block();
        let outcome = self.run_path(IrBlockId(0), flow::Entry::Start);
        let remaining = self
            .finish_path(outcome)
            .and_then(|()| self.run_worklist(1, blocks));
        if remaining.is_err() {
            ice!("speculation escaped its loop");
        }
    }

    fn finish(self) -> &'ta IrTy<'ta> {
        let module = self.session.module;
        if self.session.cx.options.eliminate_dead_instructions {
            self.new
                .eliminate_dead_instructions(|exec, id| has_side_effects(exec, id, module));
        }
        let layout = self.new.block_ids().collect::<Vec<_>>();
        self.new.prune_unreachable(&layout);
        let types = self.types();
        match (self.expected_type, self.result_ty) {
            (_, Some(ty)) if ty.is_invalid() => ty,
            (Some(expected), _) => expected,
            (None, Some(ty)) => ty,
            (None, None) => types.get_noreturn_ty(),
        }
    }

    fn types(&self) -> &'s TypeTable<'ta> {
        self.session.types()
    }

    fn checkpoint(&self) -> Checkpoint<'ta> {
        Checkpoint {
            exec: self.new.checkpoint(),
            store: self.session.store.checkpoint(),
            diagnostics: self.session.diagnostics.mark(),
            others: self.others.clone(),
            block_map: self.block_map.clone(),
            visited: self.visited.clone(),
            pending: self.pending.clone(),
            loops: self.loops.clone(),
            current: self.current,
            quota: self.quota,
            result_ty: self.result_ty,
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint<'ta>) {
        self.new.rollback(checkpoint.exec);
        self.session.store.rollback(checkpoint.store);
        self.session.diagnostics.truncate(checkpoint.diagnostics);
        self.others = checkpoint.others;
        self.block_map = checkpoint.block_map;
        self.visited = checkpoint.visited;
        self.pending = checkpoint.pending;
        self.loops = checkpoint.loops;
        self.current = checkpoint.current;
        self.quota = checkpoint.quota;
        self.result_ty = checkpoint.result_ty;
    }

    /// Determine if the old instruction must be evaluated at compile time.
    fn comptime_at(&self, old: IrInstId) -> bool {
        self.forced_comptime
            || self.speculation.is_some()
            || self
                .old
                .scopes
                .is_comptime(self.old.instruction(old).scope)
    }

    fn ty_of(&self, id: IrInstId) -> &'ta IrTy<'ta> {
        self.new
            .instruction(id)
            .ty
            .unwrap_or_else(|| ice!("analyzed instruction has no type"))
    }

    fn value_of(&self, id: IrInstId) -> Option<&ConstExprValue> {
        self.new.instruction(id).value.as_ref()
    }

    fn span_of(&self, old: IrInstId) -> Span {
        self.old.instruction(old).span
    }

    fn instruction_for(
        &self,
        old: IrInstId,
        ty: &'ta IrTy<'ta>,
        kind: IrInstructionKind<'ta>,
        value: Option<ConstExprValue>,
    ) -> IrInstruction<'ta> {
        let origin = self.old.instruction(old);
        IrInstruction {
            span: origin.span,
            scope: origin.scope,
            kind,
            ty: Some(ty),
            value,
        }
    }

    /// Create a compile-time value on behalf of `old`.
    fn constant(&mut self, old: IrInstId, ty: &'ta IrTy<'ta>, value: ConstExprValue) -> IrInstId {
        let instruction = self.instruction_for(old, ty, IrInstructionKind::Const, Some(value));
        self.new.push(instruction)
    }

    /// Create the poisoned result of an instruction that failed analysis.
    fn poison(&mut self, old: IrInstId) -> IrInstId {
        let invalid = self.types().get_invalid_ty();
        self.constant(old, invalid, ConstExprValue::Undefined)
    }

    /// Emit a runtime instruction on behalf of `old`.
    ///
    /// Speculative execution is interrupted instead. In compile-time mode the instruction is
    /// reported as not evaluable and its result is poisoned.
    fn emit(
        &mut self,
        old: IrInstId,
        ty: &'ta IrTy<'ta>,
        kind: IrInstructionKind<'ta>,
    ) -> Flow<IrInstId> {
        if self.speculation.is_some() {
            return Err(Halt::Interrupt);
        }
        if self.comptime_at(old) {
            self.session
                .diagnostics
                .report(UnableToEvaluateConstantError {
                    span: self.span_of(old),
                });
            return Ok(self.poison(old));
        }
        let instruction = self.instruction_for(old, ty, kind, None);
        Ok(self.new.append(self.current, instruction))
    }

    /// Get the replacement of an operand, analyzing it first if it is an unplaced instruction.
    fn operand(&mut self, old: IrInstId) -> Flow<IrInstId> {
        if let Some(new) = self.others[old.0] {
            return Ok(new);
        }
        let exec = self.old;
        let mapped = match &exec.instruction(old).kind {
            IrInstructionKind::Const => self.analyze_literal(old),
            IrInstructionKind::DeclRef { name } => self.analyze_decl_ref(old, name)?,
            _ => ice!(format!("instruction %{} is used before it is analyzed", old.0)),
        };
        self.others[old.0] = Some(mapped);
        Ok(mapped)
    }

    fn analyze_literal(&mut self, old: IrInstId) -> IrInstId {
        let types = self.types();
        let value = self
            .old
            .instruction(old)
            .value
            .clone()
            .unwrap_or_else(|| ice!("literal has no value"));
        let ty = match &value {
            ConstExprValue::Integer(_) => types.get_comptime_int_ty(),
            ConstExprValue::Bool(_) => types.get_bool_ty(),
            ConstExprValue::Undefined => types.get_undefined_ty(),
            ConstExprValue::Unit => types.get_unit_ty(),
            _ => ice!("literal of a non-scalar value"),
        };
        self.constant(old, ty, value)
    }

    /// Analyze one placed, non-terminator instruction.
    fn analyze_instruction(&mut self, old: IrInstId) -> Flow<()> {
        let exec = self.old;
        let new = match &exec.instruction(old).kind {
            IrInstructionKind::Const | IrInstructionKind::DeclRef { .. } => self.operand(old)?,
            IrInstructionKind::Param { index } => self.analyze_param(old, *index),
            IrInstructionKind::BinOp { op, lhs, rhs } => self.analyze_binary(old, *op, *lhs, *rhs)?,
            IrInstructionKind::UnOp { op, operand } => self.analyze_unary(old, *op, *operand)?,
            IrInstructionKind::Cast {
                operand,
                target,
                kind,
            } => self.analyze_cast(old, *operand, target, *kind)?,
            IrInstructionKind::Alloca { name, init } => self.analyze_alloca(old, name, *init)?,
            IrInstructionKind::Load { ptr } => self.analyze_load(old, *ptr)?,
            IrInstructionKind::Store { ptr, value } => self.analyze_store(old, *ptr, *value)?,
            IrInstructionKind::FieldPtr { base, field } => {
                self.analyze_field_ptr(old, *base, &field.name)?
            }
            IrInstructionKind::ElemPtr { base, index } => {
                self.analyze_elem_ptr(old, *base, *index)?
            }
            IrInstructionKind::FieldValue { base, field } => {
                self.analyze_field_value(old, *base, &field.name)?
            }
            IrInstructionKind::ElemValue { base, index } => {
                self.analyze_elem_value(old, *base, *index)?
            }
            IrInstructionKind::InsertField { base, field, value } => {
                self.analyze_insert_field(old, *base, &field.name, *value)?
            }
            IrInstructionKind::InsertElem { base, index, value } => {
                self.analyze_insert_elem(old, *base, *index, *value)?
            }
            IrInstructionKind::Ref { operand } => self.analyze_ref(old, *operand)?,
            IrInstructionKind::StructInit { ty, fields } => {
                self.analyze_struct_init(old, ty, fields)?
            }
            IrInstructionKind::ArrayInit { elements } => {
                self.analyze_array_init(old, elements)?
            }
            IrInstructionKind::Call { callee, args } => self.analyze_call(old, *callee, args)?,
            IrInstructionKind::Phi { .. } => ice!("phi in the middle of a block"),
            IrInstructionKind::Br { .. }
            | IrInstructionKind::CondBr { .. }
            | IrInstructionKind::Return { .. }
            | IrInstructionKind::Unreachable => ice!("terminator in the middle of a block"),
        };
        self.others[old.0] = Some(new);
        Ok(())
    }

    fn analyze_param(&mut self, old: IrInstId, index: usize) -> IrInstId {
        match &self.parameters {
            Parameters::Runtime(types) => {
                let ty = *types
                    .get(index)
                    .unwrap_or_else(|| ice!("parameter index out of range"));
                let instruction =
                    self.instruction_for(old, ty, IrInstructionKind::Param { index }, None);
                self.new.append(self.current, instruction)
            }
            Parameters::Comptime(values) => {
                let (ty, value) = values
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| ice!("parameter index out of range"));
                self.constant(old, ty, value)
            }
            Parameters::None => ice!("parameter outside of a function"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analyze, generate, AnalysisOptions, AnalysisSession, ConstExprValue, IrContext,
        IrExecutable, IrModule, IrTy, TypeTable,
    };
    use bumpalo::Bump;
    use ember_diagnostics::Diagnostics;
    use ember_macros::{assert_ok, assert_some};
    use ember_syntax::{parse_expression, parse_translation_unit};

    #[test]
    fn test_constant_arithmetic_folds_without_runtime_code() {
        let bump = Bump::new();
        let cx = IrContext::new(TypeTable::new(&bump), AnalysisOptions::default());
        let tu = assert_ok!(parse_translation_unit(""));
        let mut diagnostics = Diagnostics::new();
        let module = IrModule::build(&cx.types, &tu, &mut diagnostics);
        let mut session = AnalysisSession::new(&cx, &module);

        let expr = assert_ok!(parse_expression("(2 + 3) * 4"));
        let old = generate(&cx.types, &mut session.diagnostics, &expr);
        let mut new = IrExecutable::new(old.scopes.clone());
        let ty = analyze(&mut session, &old, &mut new, None, None);
        assert_eq!(ty, cx.types.get_comptime_int_ty());
        assert_eq!(new.runtime_instruction_count(), 0);
        assert_eq!(
            assert_some!(new.const_result()),
            &ConstExprValue::Integer(20)
        );
    }

    #[test]
    fn test_expected_type_is_applied_to_the_result() {
        let bump = Bump::new();
        let cx = IrContext::new(TypeTable::new(&bump), AnalysisOptions::default());
        let tu = assert_ok!(parse_translation_unit(""));
        let mut diagnostics = Diagnostics::new();
        let module = IrModule::build(&cx.types, &tu, &mut diagnostics);
        let mut session = AnalysisSession::new(&cx, &module);

        let expr = assert_ok!(parse_expression("if 1 < 2 { 7 } else { 300 }"));
        let old = generate(&cx.types, &mut session.diagnostics, &expr);
        let mut new = IrExecutable::new(old.scopes.clone());
        let u8_ty = cx.types.get_integer_ty(false, 8);
        let ty = analyze(&mut session, &old, &mut new, Some(u8_ty), None);
        assert_eq!(ty, u8_ty);
        assert!(matches!(ty, IrTy::Integer(_)));
        assert_eq!(
            assert_some!(new.const_result()),
            &ConstExprValue::Integer(7)
        );
        assert!(session.diagnostics.is_empty());
    }
}
