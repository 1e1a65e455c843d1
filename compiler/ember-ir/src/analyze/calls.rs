//! Declaration references and calls.
//!
//! A call in compile-time mode runs the callee's body through a nested analyzer in forced
//! compile-time mode, with the argument values bound to its parameters. Allocations the callee
//! makes are released once it returns.

use super::{analyze_body, Analyzer, Flow, Halt, Parameters};
use crate::error::{
    ArgumentCountError, CallDepthExceededError, ExternCallAtComptimeError, InvalidReferenceError,
    NotCallableError, UnableToEvaluateConstantError,
};
use crate::exec::IrExecutable;
use crate::instruction::{IrInstId, IrInstructionKind};
use crate::module::{FnId, IrItemRef};
use crate::ty::IrTy;
use crate::value::ConstExprValue;
use tracing::trace;

impl<'a, 's, 'ast, 'ta> Analyzer<'a, 's, 'ast, 'ta> {
    pub(super) fn analyze_decl_ref(&mut self, old: IrInstId, name: &str) -> Flow<IrInstId> {
        let module = self.session.module;
        match module.lookup(name) {
            Some(IrItemRef::Function(id)) => {
                let ty = self.session.fn_type(id);
                Ok(self.constant(old, ty, ConstExprValue::Function(id)))
            }
            Some(IrItemRef::Const(id)) => match self.session.const_value(id) {
                (ty, Some(value)) => Ok(self.constant(old, ty, value)),
                (_, None) => Ok(self.poison(old)),
            },
            Some(IrItemRef::Struct(_)) | None => {
                self.session.diagnostics.report(InvalidReferenceError {
                    name: name.to_string(),
                    span: self.span_of(old),
                });
                Ok(self.poison(old))
            }
        }
    }

    pub(super) fn analyze_call(
        &mut self,
        old: IrInstId,
        callee: IrInstId,
        args: &[IrInstId],
    ) -> Flow<IrInstId> {
        let callee = self.operand(callee)?;
        let args = args
            .iter()
            .map(|arg| self.operand(*arg))
            .collect::<Flow<Vec<_>>>()?;
        let ty = self.ty_of(callee);
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let Some(function) = ty.as_function() else {
            self.session.diagnostics.report(NotCallableError {
                type_name: ty.to_string(),
                span: self.span_of(old),
            });
            return Ok(self.poison(old));
        };
        let (parameters, return_type) = (function.parameters, function.return_type);
        if parameters.len() != args.len() {
            self.session.diagnostics.report(ArgumentCountError {
                expected: parameters.len(),
                actual: args.len(),
                span: self.span_of(old),
            });
            return Ok(self.poison(old));
        }
        let mut coerced = Vec::with_capacity(args.len());
        for (arg, parameter) in args.iter().zip(parameters) {
            let arg = self.coerce(old, *arg, *parameter, None)?;
            if self.ty_of(arg).is_invalid() {
                return Ok(self.poison(old));
            }
            coerced.push(arg);
        }

        if !self.comptime_at(old) {
            let kind = IrInstructionKind::Call {
                callee,
                args: coerced,
            };
            return self.emit(old, return_type, kind);
        }
        // Calls are never evaluated speculatively. A loop containing one stays a runtime loop.
        if self.speculation.is_some() {
            return Err(Halt::Interrupt);
        }
        let Some(id) = self.value_of(callee).and_then(ConstExprValue::as_function) else {
            self.session
                .diagnostics
                .report(UnableToEvaluateConstantError {
                    span: self.span_of(old),
                });
            return Ok(self.poison(old));
        };
        let mut values = Vec::with_capacity(coerced.len());
        for arg in coerced {
            let Some(value) = self.require_const(old, arg)? else {
                return Ok(self.poison(old));
            };
            values.push((self.ty_of(arg), value));
        }
        Ok(self.call_at_comptime(old, id, values, return_type))
    }

    /// Evaluate a call to `id` at compile time.
    fn call_at_comptime(
        &mut self,
        old: IrInstId,
        id: FnId,
        args: Vec<(&'ta IrTy<'ta>, ConstExprValue)>,
        return_type: &'ta IrTy<'ta>,
    ) -> IrInstId {
        let module = self.session.module;
        let entry = module.function(id);
        let Some(body) = &entry.generated else {
            self.session.diagnostics.report(ExternCallAtComptimeError {
                name: entry.name().to_string(),
                span: self.span_of(old),
            });
            return self.poison(old);
        };
        let limit = self.session.cx.options.comptime_call_depth;
        if self.session.call_depth >= limit {
            self.session.diagnostics.report(CallDepthExceededError {
                depth: limit,
                span: self.span_of(old),
            });
            return self.poison(old);
        }

        trace!(
            name = entry.name(),
            depth = self.session.call_depth,
            "evaluating call at compile time"
        );
        self.session.call_depth += 1;
        let mark = self.session.store.mark();
        let mut analyzed = IrExecutable::new(body.scopes.clone());
        let ty = analyze_body(
            self.session,
            body,
            &mut analyzed,
            Some(return_type),
            None,
            Parameters::Comptime(args),
            true,
        );
        let result = analyzed.const_result().cloned();
        self.session.store.release_from(mark);
        self.session.call_depth -= 1;

        match result {
            Some(value) if !ty.is_invalid() => self.constant(old, return_type, value),
            _ => self.poison(old),
        }
    }
}
