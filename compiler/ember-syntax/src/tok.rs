use ember_span::Span;
use std::fmt;
use std::fmt::{Debug, Formatter};

/// A single token lexed from the source code.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub span: Span,
    pub ty: TokenType,
}

impl Token {
    pub fn new(ty: TokenType, span: Span) -> Self {
        Self { span, ty }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)
    }
}

/// Enumeration of all possible token types.
///
/// Builtin type names such as `i32` are lexed as identifiers; the parser recognizes them in type
/// position.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    KeywordFn,
    KeywordExtern,
    KeywordStruct,
    KeywordConst,
    KeywordLet,
    KeywordMut,
    KeywordIf,
    KeywordElse,
    KeywordWhile,
    KeywordReturn,
    KeywordBreak,
    KeywordContinue,
    KeywordComptime,
    KeywordNew,
    KeywordAs,
    KeywordUndefined,

    Identifier(String),
    IntegerLiteral(u64),
    BooleanLiteral(bool),

    AddressOf,
    Bang,
    Dot,
    Plus,
    Star,
    Minus,
    Slash,
    Percent,
    Equal,
    EqualEqual,
    BangEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    LogicalAnd,
    LogicalOr,

    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,

    Semicolon,
    Colon,
    Comma,
    Arrow,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::KeywordFn => write!(f, "fn"),
            TokenType::KeywordExtern => write!(f, "extern"),
            TokenType::KeywordStruct => write!(f, "struct"),
            TokenType::KeywordConst => write!(f, "const"),
            TokenType::KeywordLet => write!(f, "let"),
            TokenType::KeywordMut => write!(f, "mut"),
            TokenType::KeywordIf => write!(f, "if"),
            TokenType::KeywordElse => write!(f, "else"),
            TokenType::KeywordWhile => write!(f, "while"),
            TokenType::KeywordReturn => write!(f, "return"),
            TokenType::KeywordBreak => write!(f, "break"),
            TokenType::KeywordContinue => write!(f, "continue"),
            TokenType::KeywordComptime => write!(f, "comptime"),
            TokenType::KeywordNew => write!(f, "new"),
            TokenType::KeywordAs => write!(f, "as"),
            TokenType::KeywordUndefined => write!(f, "undefined"),
            TokenType::Identifier(v) => write!(f, "{}", v),
            TokenType::IntegerLiteral(v) => write!(f, "{}", v),
            TokenType::BooleanLiteral(v) => write!(f, "{}", v),
            TokenType::AddressOf => write!(f, "&"),
            TokenType::Bang => write!(f, "!"),
            TokenType::Dot => write!(f, "."),
            TokenType::Plus => write!(f, "+"),
            TokenType::Star => write!(f, "*"),
            TokenType::Minus => write!(f, "-"),
            TokenType::Slash => write!(f, "/"),
            TokenType::Percent => write!(f, "%"),
            TokenType::Equal => write!(f, "="),
            TokenType::EqualEqual => write!(f, "=="),
            TokenType::BangEqual => write!(f, "!="),
            TokenType::LessThan => write!(f, "<"),
            TokenType::LessThanEqual => write!(f, "<="),
            TokenType::GreaterThan => write!(f, ">"),
            TokenType::GreaterThanEqual => write!(f, ">="),
            TokenType::LogicalAnd => write!(f, "&&"),
            TokenType::LogicalOr => write!(f, "||"),
            TokenType::OpenParen => write!(f, "("),
            TokenType::CloseParen => write!(f, ")"),
            TokenType::OpenBrace => write!(f, "{{"),
            TokenType::CloseBrace => write!(f, "}}"),
            TokenType::OpenBracket => write!(f, "["),
            TokenType::CloseBracket => write!(f, "]"),
            TokenType::Semicolon => write!(f, ";"),
            TokenType::Colon => write!(f, ":"),
            TokenType::Comma => write!(f, ","),
            TokenType::Arrow => write!(f, "->"),
        }
    }
}
