//! Module-wide analysis state.
//!
//! An [`AnalysisSession`] owns everything that outlives the analysis of a single executable: the
//! compile-time memory, the diagnostic sink and the depth of nested compile-time calls. It also
//! resolves the module-level facts that executables depend on (types, signatures, struct layouts
//! and constant values) on demand, memoizing them in the module's tables.

use crate::analyze::{analyze, analyze_body, Parameters};
use crate::error::{
    CannotInferTypeError, DependencyLoopError, DuplicateFieldError, IrError,
    TypeFieldInfiniteRecursionError, UnableToEvaluateConstantError, UnknownTypeError,
};
use crate::exec::IrExecutable;
use crate::gen::generate;
use crate::instruction::IrTypeRef;
use crate::module::{
    ConstId, ConstState, FnId, IrFunctionSignature, IrModule, IrStructField, StructId,
};
use crate::options::IrContext;
use crate::store::ConstStore;
use crate::table::TypeTable;
use crate::ty::IrTy;
use crate::value::ConstExprValue;
use ember_diagnostics::Diagnostics;
use ember_span::Span;
use ember_syntax::AstType;
use std::collections::BTreeSet;
use tracing::debug;

pub struct AnalysisSession<'s, 'ast, 'ta> {
    pub cx: &'s IrContext<'ta>,
    pub module: &'s IrModule<'ast, 'ta>,
    pub store: ConstStore<'ta>,
    pub diagnostics: Diagnostics<IrError>,
    pub(crate) call_depth: u32,
}

impl<'s, 'ast, 'ta> AnalysisSession<'s, 'ast, 'ta> {
    pub fn new(cx: &'s IrContext<'ta>, module: &'s IrModule<'ast, 'ta>) -> Self {
        Self {
            cx,
            module,
            store: ConstStore::new(),
            diagnostics: Diagnostics::new(),
            call_depth: 0,
        }
    }

    pub fn types(&self) -> &'s TypeTable<'ta> {
        let cx: &'s IrContext<'ta> = self.cx;
        &cx.types
    }

    /// Analyze every item of the module.
    ///
    /// Struct layouts and signatures are resolved first, then constant items, then function bodies.
    /// Evaluating constants up front keeps their memoized results out of speculative analysis.
    pub fn analyze_module(&mut self) {
        let module = self.module;
        for id in 0..module.structs.len() {
            self.struct_fields(StructId(id));
        }
        for id in 0..module.functions.len() {
            self.fn_signature(FnId(id));
        }
        for id in 0..module.consts.len() {
            self.const_value(ConstId(id));
        }
        for id in 0..module.functions.len() {
            self.analyze_function(FnId(id));
        }
    }

    /// Analyze the body of a function and store the result in its table entry.
    ///
    /// Compile-time memory allocated by the body is released once the analysis finishes.
    pub fn analyze_function(&mut self, id: FnId) {
        let module = self.module;
        let entry = module.function(id);
        let Some(generated) = &entry.generated else {
            return;
        };
        if entry.with_analyzed(|analyzed| analyzed.is_some()) {
            return;
        }
        debug!(name = entry.name(), "analyzing function");
        let Some(signature) = self.fn_signature(id) else {
            return;
        };
        let source = entry.decl.return_type.as_ref().map(|ty| ty.span());
        let mark = self.store.mark();
        let mut new = IrExecutable::new(generated.scopes.clone());
        analyze_body(
            self,
            generated,
            &mut new,
            Some(signature.return_type),
            source,
            Parameters::Runtime(signature.parameters),
            false,
        );
        self.store.release_from(mark);
        entry.set_analyzed(new);
    }

    /// Get the type and value of a constant item, evaluating it on first use.
    ///
    /// A constant that depends on itself is reported once and poisoned, as is a constant whose
    /// initializer does not fold.
    pub fn const_value(&mut self, id: ConstId) -> (&'ta IrTy<'ta>, Option<ConstExprValue>) {
        let module = self.module;
        let entry = module.const_entry(id);
        let state = entry.state();
        match state {
            ConstState::Done(ty, value) => return (ty, Some(value)),
            ConstState::Failed => return (self.types().get_invalid_ty(), None),
            ConstState::InProgress => {
                self.diagnostics.report(DependencyLoopError {
                    name: entry.name().to_string(),
                    span: entry.decl.name.span,
                });
                entry.state.replace(ConstState::Failed);
                return (self.types().get_invalid_ty(), None);
            }
            ConstState::Unevaluated => {}
        }
        debug!(name = entry.name(), "evaluating constant");
        entry.state.replace(ConstState::InProgress);
        let expected = entry.decl.ty.as_ref().map(|ty| self.resolve_type(ty));
        let source = entry.decl.ty.as_ref().map(|ty| ty.span());
        let mark = self.diagnostics.mark();
        let mut new = IrExecutable::new(entry.generated.scopes.clone());
        let ty = analyze(self, &entry.generated, &mut new, expected, source);
        let value = new.const_result().cloned();
        // A dependency loop through this constant already marked it failed.
        let failed = matches!(&*entry.state.borrow(), ConstState::Failed);
        let state = match value.clone() {
            Some(value) if !failed && !ty.is_invalid() => ConstState::Done(ty, value),
            _ => {
                if !self.diagnostics.has_reported_since(mark) {
                    self.diagnostics.report(UnableToEvaluateConstantError {
                        span: entry.decl.value.span(),
                    });
                }
                ConstState::Failed
            }
        };
        entry.state.replace(state.clone());
        entry.analyzed.replace(Some(new));
        match state {
            ConstState::Done(ty, value) => (ty, Some(value)),
            _ => (self.types().get_invalid_ty(), None),
        }
    }

    /// Resolve the signature of a function, reporting a loop if resolving it needs the signature
    /// itself.
    pub fn fn_signature(&mut self, id: FnId) -> Option<IrFunctionSignature<'ta>> {
        let module = self.module;
        let entry = module.function(id);
        if let Some(signature) = entry.signature() {
            return Some(signature.clone());
        }
        if entry.signature_in_progress.replace(true) {
            self.diagnostics.report(DependencyLoopError {
                name: entry.name().to_string(),
                span: entry.decl.name.span,
            });
            return None;
        }
        let parameters = entry
            .decl
            .parameters
            .iter()
            .map(|p| self.resolve_type(&p.ty))
            .collect::<Vec<_>>();
        let return_type = match &entry.decl.return_type {
            Some(ty) => self.resolve_type(ty),
            None => self.types().get_unit_ty(),
        };
        let signature = IrFunctionSignature {
            parameters,
            return_type,
        };
        entry.signature_in_progress.set(false);
        let _ = entry.signature.set(signature.clone());
        Some(signature)
    }

    pub fn fn_type(&mut self, id: FnId) -> &'ta IrTy<'ta> {
        match self.fn_signature(id) {
            Some(signature) => self
                .types()
                .get_function_ty(&signature.parameters, signature.return_type),
            None => self.types().get_invalid_ty(),
        }
    }

    pub fn resolve_type_ref(&mut self, ty: &IrTypeRef<'ta>) -> &'ta IrTy<'ta> {
        match ty {
            IrTypeRef::Resolved(ty) => ty,
            IrTypeRef::Unresolved(ty) => self.resolve_type(ty),
        }
    }

    /// Resolve a syntactic type. Array lengths are evaluated at compile time.
    pub fn resolve_type(&mut self, ty: &AstType) -> &'ta IrTy<'ta> {
        let types = self.types();
        match ty {
            AstType::Integer(i) => types.get_integer_ty(i.signed, i.bits),
            AstType::Boolean(_) => types.get_bool_ty(),
            AstType::Unit(_) => types.get_unit_ty(),
            AstType::Pointer(p) => {
                let pointee = self.resolve_type(&p.inner);
                if pointee.is_invalid() {
                    return pointee;
                }
                types.get_pointer_ty(pointee)
            }
            AstType::Named(n) => match self.module.find_struct(&n.name.name) {
                Some(_) => types.get_struct_ty(&n.name.name),
                None => {
                    self.diagnostics.report(UnknownTypeError {
                        name: n.name.name.clone(),
                        span: n.span,
                    });
                    types.get_invalid_ty()
                }
            },
            AstType::Array(a) => {
                let element = self.resolve_type(&a.element);
                let len = self.array_len(&a.len);
                match len {
                    Some(_) if element.is_invalid() => element,
                    Some(len) => types.get_array_ty(element, len),
                    None => types.get_invalid_ty(),
                }
            }
        }
    }

    fn array_len(&mut self, expr: &ember_syntax::AstExpr) -> Option<u64> {
        let mark = self.diagnostics.mark();
        let generated = generate(self.types(), &mut self.diagnostics, expr);
        let mut new = IrExecutable::new(generated.scopes.clone());
        let usize_ty = self.types().get_usize_ty();
        analyze(self, &generated, &mut new, Some(usize_ty), None);
        match new.const_result() {
            Some(ConstExprValue::Integer(len)) => u64::try_from(*len).ok(),
            _ => {
                if !self.diagnostics.has_reported_since(mark) {
                    self.diagnostics
                        .report(UnableToEvaluateConstantError { span: expr.span() });
                }
                None
            }
        }
    }

    /// Get the resolved fields of a struct.
    ///
    /// Returns `None` while the struct is still being resolved, which only happens for a struct
    /// that reaches itself through its own fields.
    pub fn struct_fields(&mut self, id: StructId) -> Option<Vec<IrStructField<'ta>>> {
        let module = self.module;
        let entry = module.struct_entry(id);
        if let Some(fields) = entry.fields() {
            return Some(fields.to_vec());
        }
        if entry.resolving.replace(true) {
            return None;
        }
        let mut seen = BTreeSet::new();
        let mut fields = Vec::with_capacity(entry.decl.fields.len());
        for field in &entry.decl.fields {
            if !seen.insert(field.name.name.as_str()) {
                self.diagnostics.report(DuplicateFieldError {
                    field_name: field.name.name.clone(),
                    span: field.span,
                });
                continue;
            }
            let mut ty = self.resolve_type(&field.ty);
            if self.embeds(ty, entry.name()) {
                self.diagnostics.report(TypeFieldInfiniteRecursionError {
                    type_name: entry.name().to_string(),
                    offending_field: field.name.name.clone(),
                    span: field.span,
                });
                ty = self.types().get_invalid_ty();
            }
            fields.push(IrStructField {
                name: field.name.name.clone(),
                ty,
                span: field.span,
            });
        }
        entry.resolving.set(false);
        let _ = entry.fields.set(fields.clone());
        Some(fields)
    }

    /// Determine if a value of type `ty` contains a value of the struct `name` without any pointer
    /// in between.
    fn embeds(&mut self, ty: &'ta IrTy<'ta>, name: &str) -> bool {
        match ty {
            IrTy::Struct(s) if s.name == name => true,
            IrTy::Struct(s) => {
                let Some(id) = self.module.find_struct(s.name) else {
                    return false;
                };
                match self.struct_fields(id) {
                    Some(fields) => fields.iter().any(|f| self.embeds(f.ty, name)),
                    None => false,
                }
            }
            IrTy::Array(a) => self.embeds(a.element, name),
            _ => false,
        }
    }

    /// Find a field of a struct type by name, returning its position and type.
    pub fn struct_field(
        &mut self,
        ty: &'ta IrTy<'ta>,
        name: &str,
    ) -> Option<(u32, &'ta IrTy<'ta>)> {
        let id = self.module.find_struct(ty.as_struct_name()?)?;
        let fields = self.struct_fields(id)?;
        fields
            .iter()
            .position(|f| f.name == name)
            .map(|index| (index as u32, fields[index].ty))
    }

    /// Number of members of an aggregate type, used to expand undefined aggregates.
    pub fn member_count(&mut self, ty: &'ta IrTy<'ta>) -> Option<usize> {
        match ty {
            IrTy::Array(a) => usize::try_from(a.len).ok(),
            IrTy::Struct(s) => {
                let id = self.module.find_struct(s.name)?;
                self.struct_fields(id).map(|f| f.len())
            }
            _ => None,
        }
    }

    /// Type of the member at `index` of an aggregate type.
    pub fn member_type(&mut self, ty: &'ta IrTy<'ta>, index: u64) -> Option<&'ta IrTy<'ta>> {
        match ty {
            IrTy::Array(a) => Some(a.element),
            IrTy::Struct(s) => {
                let id = self.module.find_struct(s.name)?;
                let fields = self.struct_fields(id)?;
                fields.get(usize::try_from(index).ok()?).map(|f| f.ty)
            }
            _ => None,
        }
    }

    /// Reject a type that has no runtime representation, returning the type a runtime value of it
    /// takes instead.
    pub fn concrete_or_report(&mut self, ty: &'ta IrTy<'ta>, span: Span) -> &'ta IrTy<'ta> {
        let concrete = crate::analyze::concretize(self.types(), ty);
        if concrete.is_comptime_only() {
            self.diagnostics.report(CannotInferTypeError {
                type_name: ty.to_string(),
                span,
            });
            return self.types().get_invalid_ty();
        }
        concrete
    }
}

#[cfg(test)]
mod tests {
    use crate::{AnalysisOptions, AnalysisSession, ConstExprValue, IrContext, IrError, IrModule};
    use crate::{IrTy, TypeTable};
    use bumpalo::Bump;
    use ember_diagnostics::Diagnostics;
    use ember_macros::{assert_matches, assert_ok, assert_some};
    use ember_syntax::parse_translation_unit;

    #[test]
    fn test_recursive_struct_by_value_is_reported_once() {
        let bump = Bump::new();
        let cx = IrContext::new(TypeTable::new(&bump), AnalysisOptions::default());
        let tu = assert_ok!(parse_translation_unit(
            "struct A { b: B } struct B { a: A } struct L { next: *L }"
        ));
        let mut diagnostics = Diagnostics::new();
        let module = IrModule::build(&cx.types, &tu, &mut diagnostics);
        let mut session = AnalysisSession::new(&cx, &module);
        session.analyze_module();
        let reports = session.diagnostics.into_vec();
        assert_eq!(reports.len(), 1);
        assert_matches!(&reports[0], IrError::TypeFieldInfiniteRecursion(e) if e.type_name == "A");
    }

    #[test]
    fn test_array_lengths_are_evaluated() {
        let bump = Bump::new();
        let cx = IrContext::new(TypeTable::new(&bump), AnalysisOptions::default());
        let tu = assert_ok!(parse_translation_unit(
            "const N = 2 + 2; struct S { xs: [N * 2]u8 }"
        ));
        let mut diagnostics = Diagnostics::new();
        let module = IrModule::build(&cx.types, &tu, &mut diagnostics);
        let mut session = AnalysisSession::new(&cx, &module);
        let id = assert_some!(module.find_struct("S"));
        let fields = assert_some!(session.struct_fields(id));
        assert_matches!(fields[0].ty, IrTy::Array(a) if a.len == 8);
        let n = assert_some!(module.find_const("N"));
        assert_eq!(session.const_value(n).1, Some(ConstExprValue::Integer(4)));
        assert!(session.diagnostics.is_empty());
    }

    #[test]
    fn test_constant_cycles_are_reported() {
        let bump = Bump::new();
        let cx = IrContext::new(TypeTable::new(&bump), AnalysisOptions::default());
        let tu = assert_ok!(parse_translation_unit("const A = B + 1; const B = A + 1;"));
        let mut diagnostics = Diagnostics::new();
        let module = IrModule::build(&cx.types, &tu, &mut diagnostics);
        let mut session = AnalysisSession::new(&cx, &module);
        session.analyze_module();
        let reports = session.diagnostics.into_vec();
        assert!(reports
            .iter()
            .any(|r| matches!(r, IrError::DependencyLoop(_))));
        assert!(!reports
            .iter()
            .any(|r| matches!(r, IrError::UnableToEvaluateConstant(_))));
    }
}
