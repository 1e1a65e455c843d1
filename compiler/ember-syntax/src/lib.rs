//! Lexer, parser and syntax tree for the ember language.
//!
//! The syntax tree is owned and immutable once parsed. The IR generator walks it by reference, and
//! borrows type annotations out of it where types can only be resolved during analysis.

mod ast;
mod error;
mod lexer;
mod parser;
mod tok;

pub use ast::*;
pub use error::*;
pub use lexer::*;
pub use parser::*;
pub use tok::*;

/// Parse a full translation unit from source text.
pub fn parse_translation_unit(input: &str) -> ParseResult<AstTranslationUnit> {
    let mut lexer = Lexer::new(input);
    let mut parser = Parser::new(&mut lexer);
    parser.parse()
}

/// Parse a single standalone expression, requiring the entire input to be consumed.
pub fn parse_expression(input: &str) -> ParseResult<AstExpr> {
    let mut lexer = Lexer::new(input);
    let mut parser = Parser::new(&mut lexer);
    let expr = parser.parse_expr()?;
    parser.expect_end_of_input()?;
    Ok(expr)
}
