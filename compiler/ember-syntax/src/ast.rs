//! Syntax tree produced by the parser.
//!
//! Every node records the span it was parsed from. The tree is owned, and nodes derive `Clone` so
//! that later stages can keep type annotations around after the tree itself is gone.

use ember_span::Span;

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstTranslationUnit {
    pub items: Vec<AstItem>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstIdentifier {
    pub name: String,
    pub span: Span,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum AstItem {
    Function(AstFunctionItem),
    Struct(AstStructItem),
    Const(AstConstItem),
}

impl AstItem {
    pub fn name(&self) -> &AstIdentifier {
        match self {
            AstItem::Function(f) => &f.name,
            AstItem::Struct(s) => &s.name,
            AstItem::Const(c) => &c.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            AstItem::Function(f) => f.span,
            AstItem::Struct(s) => s.span,
            AstItem::Const(c) => c.span,
        }
    }
}

/// A function declaration.
///
/// Extern functions have no body and are implemented outside the program.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstFunctionItem {
    pub span: Span,
    pub name: AstIdentifier,
    pub parameters: Vec<AstFunctionParameterItem>,
    pub return_type: Option<AstType>,
    pub body: Option<AstBlockExpr>,
}

impl AstFunctionItem {
    pub fn is_extern(&self) -> bool {
        self.body.is_none()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstFunctionParameterItem {
    pub span: Span,
    pub name: AstIdentifier,
    pub ty: AstType,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstStructItem {
    pub span: Span,
    pub name: AstIdentifier,
    pub fields: Vec<AstStructFieldItem>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstStructFieldItem {
    pub span: Span,
    pub name: AstIdentifier,
    pub ty: AstType,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstConstItem {
    pub span: Span,
    pub name: AstIdentifier,
    pub ty: Option<AstType>,
    pub value: AstExpr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum AstStmt {
    Let(AstLetStmt),
    Return(AstReturnStmt),
    Break(AstBreakStmt),
    Continue(AstContinueStmt),
    Expr(AstExprStmt),
}

impl AstStmt {
    pub fn span(&self) -> Span {
        match self {
            AstStmt::Let(s) => s.span,
            AstStmt::Return(s) => s.span,
            AstStmt::Break(s) => s.span,
            AstStmt::Continue(s) => s.span,
            AstStmt::Expr(s) => s.span,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstLetStmt {
    pub span: Span,
    pub name: AstIdentifier,
    pub mutable: bool,
    pub ty: Option<AstType>,
    pub value: AstExpr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstReturnStmt {
    pub span: Span,
    pub value: Option<AstExpr>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstBreakStmt {
    pub span: Span,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstContinueStmt {
    pub span: Span,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstExprStmt {
    pub span: Span,
    pub expr: AstExpr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum AstExpr {
    IntegerLiteral(AstIntegerLiteralExpr),
    BooleanLiteral(AstBooleanLiteralExpr),
    UndefinedLiteral(AstUndefinedLiteralExpr),
    Reference(AstReferenceExpr),
    Group(AstGroupExpr),
    Block(AstBlockExpr),
    If(AstIfExpr),
    While(AstWhileExpr),
    Comptime(AstComptimeExpr),
    Assign(AstAssignExpr),
    BinaryOp(AstBinaryOpExpr),
    UnaryOp(AstUnaryOpExpr),
    Cast(AstCastExpr),
    Call(AstCallExpr),
    DotIndex(AstDotIndexExpr),
    BracketIndex(AstBracketIndexExpr),
    Construct(AstConstructExpr),
    Array(AstArrayExpr),
}

impl AstExpr {
    pub fn span(&self) -> Span {
        match self {
            AstExpr::IntegerLiteral(e) => e.span,
            AstExpr::BooleanLiteral(e) => e.span,
            AstExpr::UndefinedLiteral(e) => e.span,
            AstExpr::Reference(e) => e.span,
            AstExpr::Group(e) => e.span,
            AstExpr::Block(e) => e.span,
            AstExpr::If(e) => e.span,
            AstExpr::While(e) => e.span,
            AstExpr::Comptime(e) => e.span,
            AstExpr::Assign(e) => e.span,
            AstExpr::BinaryOp(e) => e.span,
            AstExpr::UnaryOp(e) => e.span,
            AstExpr::Cast(e) => e.span,
            AstExpr::Call(e) => e.span,
            AstExpr::DotIndex(e) => e.span,
            AstExpr::BracketIndex(e) => e.span,
            AstExpr::Construct(e) => e.span,
            AstExpr::Array(e) => e.span,
        }
    }

    /// Block-like expressions may appear as statements without a trailing semicolon.
    pub fn is_block_like(&self) -> bool {
        matches!(
            self,
            AstExpr::Block(_) | AstExpr::If(_) | AstExpr::While(_) | AstExpr::Comptime(_)
        )
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstIntegerLiteralExpr {
    pub span: Span,
    pub value: u64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstBooleanLiteralExpr {
    pub span: Span,
    pub value: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstUndefinedLiteralExpr {
    pub span: Span,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstReferenceExpr {
    pub span: Span,
    pub name: AstIdentifier,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstGroupExpr {
    pub span: Span,
    pub inner: Box<AstExpr>,
}

/// A braced sequence of statements with an optional trailing value.
///
/// Without a trailing expression the block evaluates to `unit`.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstBlockExpr {
    pub span: Span,
    pub stmts: Vec<AstStmt>,
    pub tail: Option<Box<AstExpr>>,
}

/// An if expression.
///
/// The else branch is either a block or another if expression.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstIfExpr {
    pub span: Span,
    pub condition: Box<AstExpr>,
    pub happy_path: AstBlockExpr,
    pub unhappy_path: Option<Box<AstExpr>>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstWhileExpr {
    pub span: Span,
    pub condition: Box<AstExpr>,
    pub body: AstBlockExpr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstComptimeExpr {
    pub span: Span,
    pub body: AstBlockExpr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstAssignExpr {
    pub span: Span,
    pub lhs: Box<AstExpr>,
    pub rhs: Box<AstExpr>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstBinaryOpExpr {
    pub span: Span,
    pub op: AstBinaryOp,
    pub lhs: Box<AstExpr>,
    pub rhs: Box<AstExpr>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstUnaryOpExpr {
    pub span: Span,
    pub op: AstUnaryOp,
    pub operand: Box<AstExpr>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstUnaryOp {
    Neg,
    Not,
    Deref,
    AddressOf,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstCastExpr {
    pub span: Span,
    pub operand: Box<AstExpr>,
    pub ty: AstType,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstCallExpr {
    pub span: Span,
    pub callee: Box<AstExpr>,
    pub arguments: Vec<AstExpr>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstDotIndexExpr {
    pub span: Span,
    pub origin: Box<AstExpr>,
    pub field: AstIdentifier,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstBracketIndexExpr {
    pub span: Span,
    pub origin: Box<AstExpr>,
    pub index: Box<AstExpr>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstConstructExpr {
    pub span: Span,
    pub callee: AstIdentifier,
    pub arguments: Vec<AstConstructorExprArgument>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstConstructorExprArgument {
    pub span: Span,
    pub field: AstIdentifier,
    pub expr: AstExpr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstArrayExpr {
    pub span: Span,
    pub elements: Vec<AstExpr>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum AstType {
    Integer(AstIntegerType),
    Boolean(AstBooleanType),
    Unit(AstUnitType),
    Named(AstNamedType),
    Pointer(AstPointerType),
    Array(AstArrayType),
}

impl AstType {
    pub fn span(&self) -> Span {
        match self {
            AstType::Integer(t) => t.span,
            AstType::Boolean(t) => t.span,
            AstType::Unit(t) => t.span,
            AstType::Named(t) => t.span,
            AstType::Pointer(t) => t.span,
            AstType::Array(t) => t.span,
        }
    }
}

/// One of the builtin sized integer types, `i8` through `u64`.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstIntegerType {
    pub span: Span,
    pub signed: bool,
    pub bits: u16,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstBooleanType {
    pub span: Span,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstUnitType {
    pub span: Span,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstNamedType {
    pub span: Span,
    pub name: AstIdentifier,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstPointerType {
    pub span: Span,
    pub inner: Box<AstType>,
}

/// A fixed-length array type. The length is an arbitrary expression evaluated at compile time.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AstArrayType {
    pub span: Span,
    pub len: Box<AstExpr>,
    pub element: Box<AstType>,
}
