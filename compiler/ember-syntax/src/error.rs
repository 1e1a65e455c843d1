//! Error types for the parsing frontend.
//!
//! Lexer and parser share one error type. The lexer produces tokens on demand, so its errors
//! surface through the parser the moment the parser asks for the offending token.

use crate::Token;
use ember_macros::declare_error_type;
use ember_span::Span;
use miette::Diagnostic;
use thiserror::Error;

declare_error_type! {
    #[error("parser error: {0}")]
    pub enum ParseError {
        UnexpectedEndOfFile(UnexpectedEndOfFileError),
        UnfinishedToken(UnfinishedTokenError),
        InvalidIntegerLiteral(InvalidIntegerLiteralError),
        UnexpectedCharacter(UnexpectedCharacterError),
        UnexpectedToken(UnexpectedTokenError),
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Signals that the input ended while more tokens were required.
///
/// The lexer also uses this error to signal a regular end of input; the parser's lookahead turns
/// it into `None` and only reports it when a token was actually required.
#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(syntax::unexpected_end_of_file),
    help("add more input to form a valid program")
)]
#[error("expected more characters after this")]
pub struct UnexpectedEndOfFileError {
    #[label = "required more input to parse"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug, PartialEq)]
#[diagnostic(
    code(syntax::unfinished_token),
    help("did you forget to add a '{expected}' character here?")
)]
#[error("expected another '{expected}' character here")]
pub struct UnfinishedTokenError {
    pub expected: char,
    #[label = "this alone does not form a valid token"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(syntax::invalid_integer_literal))]
#[error("found illegal integer literal")]
pub struct InvalidIntegerLiteralError {
    pub buf: String,
    #[label("integer literals must fit in 64 bits and may not have leading zeroes")]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(syntax::unexpected_character))]
#[error("found illegal character during parsing")]
pub struct UnexpectedCharacterError {
    pub ch: char,
    #[label("the character '{ch}' does not parse into any tokens")]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(syntax::unexpected_token))]
#[error("found unexpected token during parsing")]
pub struct UnexpectedTokenError {
    pub token: Token,
    #[label("was not expecting to find '{token}' in this position")]
    pub span: Span,
}
