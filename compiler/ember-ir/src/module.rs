//! Module-level declaration tables.
//!
//! Every item of a translation unit gets an entry in one of the tables of [`IrModule`]. Entries are
//! created with their unanalyzed executable already generated, and fill in their resolved parts
//! (signatures, field lists, constant values, analyzed bodies) lazily through interior mutability,
//! as the analysis session first needs them.

use crate::error::{DuplicateDeclarationError, IrError};
use crate::exec::IrExecutable;
use crate::gen::{generate, generate_function};
use crate::instruction::{IrBinaryOp, IrInstructionKind};
use crate::table::TypeTable;
use crate::ty::IrTy;
use crate::value::ConstExprValue;
use ember_diagnostics::Diagnostics;
use ember_span::Span;
use ember_syntax::{AstConstItem, AstFunctionItem, AstItem, AstStructItem, AstTranslationUnit};
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::BTreeMap;

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FnId(pub usize);

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructId(pub usize);

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstId(pub usize);

/// What a module-level name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrItemRef {
    Function(FnId),
    Struct(StructId),
    Const(ConstId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purity {
    Unknown,
    InProgress,
    Pure,
    Impure,
}

#[derive(Debug, Clone)]
pub struct IrFunctionSignature<'ta> {
    pub parameters: Vec<&'ta IrTy<'ta>>,
    pub return_type: &'ta IrTy<'ta>,
}

/// Metadata and body of one function.
#[derive(Debug)]
pub struct FnTableEntry<'ast, 'ta> {
    pub decl: &'ast AstFunctionItem,
    /// The unanalyzed body. Extern functions have none.
    pub generated: Option<IrExecutable<'ta>>,
    pub(crate) signature: OnceCell<IrFunctionSignature<'ta>>,
    pub(crate) signature_in_progress: Cell<bool>,
    analyzed: RefCell<Option<IrExecutable<'ta>>>,
    purity: Cell<Purity>,
}

#[derive(Debug, Clone)]
pub struct IrStructField<'ta> {
    pub name: String,
    pub ty: &'ta IrTy<'ta>,
    pub span: Span,
}

#[derive(Debug)]
pub struct StructTableEntry<'ast, 'ta> {
    pub decl: &'ast AstStructItem,
    pub(crate) fields: OnceCell<Vec<IrStructField<'ta>>>,
    pub(crate) resolving: Cell<bool>,
}

#[derive(Debug, Clone)]
pub enum ConstState<'ta> {
    Unevaluated,
    InProgress,
    Done(&'ta IrTy<'ta>, ConstExprValue),
    Failed,
}

#[derive(Debug)]
pub struct ConstTableEntry<'ast, 'ta> {
    pub decl: &'ast AstConstItem,
    pub generated: IrExecutable<'ta>,
    pub(crate) state: RefCell<ConstState<'ta>>,
    pub(crate) analyzed: RefCell<Option<IrExecutable<'ta>>>,
}

/// The declarations of one translation unit.
#[derive(Debug)]
pub struct IrModule<'ast, 'ta> {
    pub functions: Vec<FnTableEntry<'ast, 'ta>>,
    pub structs: Vec<StructTableEntry<'ast, 'ta>>,
    pub consts: Vec<ConstTableEntry<'ast, 'ta>>,
    names: BTreeMap<String, IrItemRef>,
}

impl<'ast, 'ta> FnTableEntry<'ast, 'ta> {
    pub fn name(&self) -> &'ast str {
        &self.decl.name.name
    }

    pub fn is_extern(&self) -> bool {
        self.generated.is_none()
    }

    pub fn signature(&self) -> Option<&IrFunctionSignature<'ta>> {
        self.signature.get()
    }

    /// Take a copy of the analyzed body, if the function has been analyzed.
    pub fn analyzed(&self) -> Option<IrExecutable<'ta>> {
        self.analyzed.borrow().clone()
    }

    pub fn with_analyzed<R>(&self, f: impl FnOnce(Option<&IrExecutable<'ta>>) -> R) -> R {
        f(self.analyzed.borrow().as_ref())
    }

    pub(crate) fn set_analyzed(&self, exec: IrExecutable<'ta>) {
        self.analyzed.replace(Some(exec));
    }

    /// Drop the analyzed body so that the next analysis starts over.
    pub fn invalidate(&self) {
        self.analyzed.take();
    }
}

impl<'ast, 'ta> StructTableEntry<'ast, 'ta> {
    pub fn name(&self) -> &'ast str {
        &self.decl.name.name
    }

    pub fn fields(&self) -> Option<&[IrStructField<'ta>]> {
        self.fields.get().map(|f| f.as_slice())
    }
}

impl<'ast, 'ta> ConstTableEntry<'ast, 'ta> {
    pub fn name(&self) -> &'ast str {
        &self.decl.name.name
    }

    pub fn state(&self) -> ConstState<'ta> {
        self.state.borrow().clone()
    }

    pub fn with_analyzed<R>(&self, f: impl FnOnce(Option<&IrExecutable<'ta>>) -> R) -> R {
        f(self.analyzed.borrow().as_ref())
    }
}

impl<'ast, 'ta> IrModule<'ast, 'ta> {
    /// Create the declaration tables for a translation unit and generate every body.
    ///
    /// A name declared twice is reported, and the later declaration is left out of the tables.
    pub fn build(
        types: &TypeTable<'ta>,
        translation_unit: &'ast AstTranslationUnit,
        diagnostics: &mut Diagnostics<IrError>,
    ) -> Self {
        let mut module = Self {
            functions: Vec::new(),
            structs: Vec::new(),
            consts: Vec::new(),
            names: BTreeMap::new(),
        };
        let mut declared_at = BTreeMap::<&str, Span>::new();
        for item in &translation_unit.items {
            let name = item.name();
            if let Some(previous) = declared_at.get(name.name.as_str()) {
                diagnostics.report(DuplicateDeclarationError {
                    name: name.name.clone(),
                    span: name.span,
                    previous: *previous,
                });
                continue;
            }
            declared_at.insert(&name.name, name.span);
            let item_ref = match item {
                AstItem::Function(f) => {
                    let generated = f
                        .body
                        .as_ref()
                        .map(|_| generate_function(types, diagnostics, f));
                    module.functions.push(FnTableEntry {
                        decl: f,
                        generated,
                        signature: OnceCell::new(),
                        signature_in_progress: Cell::new(false),
                        analyzed: RefCell::new(None),
                        purity: Cell::new(Purity::Unknown),
                    });
                    IrItemRef::Function(FnId(module.functions.len() - 1))
                }
                AstItem::Struct(s) => {
                    module.structs.push(StructTableEntry {
                        decl: s,
                        fields: OnceCell::new(),
                        resolving: Cell::new(false),
                    });
                    IrItemRef::Struct(StructId(module.structs.len() - 1))
                }
                AstItem::Const(c) => {
                    let generated = generate(types, diagnostics, &c.value);
                    module.consts.push(ConstTableEntry {
                        decl: c,
                        generated,
                        state: RefCell::new(ConstState::Unevaluated),
                        analyzed: RefCell::new(None),
                    });
                    IrItemRef::Const(ConstId(module.consts.len() - 1))
                }
            };
            module.names.insert(name.name.clone(), item_ref);
        }
        module
    }

    pub fn lookup(&self, name: &str) -> Option<IrItemRef> {
        self.names.get(name).copied()
    }

    pub fn function(&self, id: FnId) -> &FnTableEntry<'ast, 'ta> {
        &self.functions[id.0]
    }

    pub fn struct_entry(&self, id: StructId) -> &StructTableEntry<'ast, 'ta> {
        &self.structs[id.0]
    }

    pub fn const_entry(&self, id: ConstId) -> &ConstTableEntry<'ast, 'ta> {
        &self.consts[id.0]
    }

    pub fn find_function(&self, name: &str) -> Option<FnId> {
        match self.lookup(name)? {
            IrItemRef::Function(id) => Some(id),
            _ => None,
        }
    }

    pub fn find_struct(&self, name: &str) -> Option<StructId> {
        match self.lookup(name)? {
            IrItemRef::Struct(id) => Some(id),
            _ => None,
        }
    }

    pub fn find_const(&self, name: &str) -> Option<ConstId> {
        match self.lookup(name)? {
            IrItemRef::Const(id) => Some(id),
            _ => None,
        }
    }

    /// Determine if calling `id` has no effect beyond producing its result.
    ///
    /// A function is pure when its body writes no memory, cannot trap on division or indexing,
    /// contains no loops, and only calls pure functions. Extern functions and recursive functions
    /// are never pure.
    pub fn is_pure(&self, id: FnId) -> bool {
        let entry = self.function(id);
        match entry.purity.get() {
            Purity::Pure => return true,
            Purity::Impure | Purity::InProgress => return false,
            Purity::Unknown => {}
        }
        let Some(body) = &entry.generated else {
            entry.purity.set(Purity::Impure);
            return false;
        };
        entry.purity.set(Purity::InProgress);
        let has_loop = body.blocks().iter().any(|b| b.loop_info.is_some());
        let pure = !has_loop
            && body.placed_instructions().all(|inst| {
                match &body.instruction(inst).kind {
                    IrInstructionKind::Store { .. }
                    | IrInstructionKind::ElemPtr { .. }
                    | IrInstructionKind::ElemValue { .. }
                    | IrInstructionKind::InsertElem { .. } => false,
                    IrInstructionKind::BinOp {
                        op: IrBinaryOp::Div | IrBinaryOp::Rem,
                        rhs,
                        ..
                    } => matches!(
                        body.instruction(*rhs).value,
                        Some(ConstExprValue::Integer(v)) if v > 0
                    ),
                    IrInstructionKind::Call { callee, .. } => {
                        match &body.instruction(*callee).kind {
                            IrInstructionKind::DeclRef { name } => self
                                .find_function(name)
                                .map(|callee| self.is_pure(callee))
                                .unwrap_or(false),
                            _ => false,
                        }
                    }
                    _ => true,
                }
            });
        entry
            .purity
            .set(if pure { Purity::Pure } else { Purity::Impure });
        pure
    }
}

#[cfg(test)]
mod tests {
    use crate::{IrError, IrItemRef, IrModule, TypeTable};
    use bumpalo::Bump;
    use ember_diagnostics::Diagnostics;
    use ember_macros::{assert_matches, assert_ok, assert_some};
    use ember_syntax::parse_translation_unit;

    #[test]
    fn test_duplicate_declarations_are_reported() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let tu = assert_ok!(parse_translation_unit(
            "fn a() {} struct a { x: i32 } const b = 1;"
        ));
        let mut diagnostics = Diagnostics::new();
        let module = IrModule::build(&types, &tu, &mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        let first = assert_some!(diagnostics.iter().next());
        assert_matches!(first, IrError::DuplicateDeclaration(_));
        assert_matches!(module.lookup("a"), Some(IrItemRef::Function(_)));
        assert_matches!(module.lookup("b"), Some(IrItemRef::Const(_)));
        assert_eq!(module.structs.len(), 0);
    }

    #[test]
    fn test_purity_follows_calls() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let tu = assert_ok!(parse_translation_unit(
            r#"
            extern fn print(x: i32);
            fn add(a: i32, b: i32) -> i32 { a + b }
            fn twice(a: i32) -> i32 { add(a, a) }
            fn noisy(a: i32) -> i32 { print(a); a }
            fn recurse(a: i32) -> i32 { recurse(a) }
            fn write(p: *i32) { *p = 1; }
            "#
        ));
        let mut diagnostics = Diagnostics::new();
        let module = IrModule::build(&types, &tu, &mut diagnostics);
        assert!(diagnostics.is_empty());
        let pure = |name: &str| module.is_pure(assert_some!(module.find_function(name)));
        assert!(pure("add"));
        assert!(pure("twice"));
        assert!(!pure("print"));
        assert!(!pure("noisy"));
        assert!(!pure("recurse"));
        assert!(!pure("write"));
    }
}
