use miette::Diagnostic;
use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::combinator::{all_consuming, rest};
use nom::error::{Error as NomError, ErrorKind};
use nom::IResult;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("failed to parse emit query `{0}`")]
    #[diagnostic(
        code(driver::invalid_query),
        help("queries look like `ir.fn.<name>` or `ir.const.<name>`")
    )]
    InvalidQuery(String),
    #[error("no {kind} named `{name}` to emit")]
    #[diagnostic(code(driver::unknown_query_target))]
    UnknownTarget { kind: &'static str, name: String },
}

/// A query for the output of the compiler.
///
/// Dumping the IR of a whole module produces a lot of output. Queries select the items whose IR is
/// printed instead. The `query` part is handed to the query parser of the namespace.
///
/// ```text
/// query     ::= namespace DOT category DOT query
/// namespace ::= identifier
/// category  ::= identifier
/// query     ::= any
/// ```
///
/// For example, the query `ir.fn.fib` requests the analyzed IR of the function named `fib`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitQuery {
    Ir(IrEmitQuery),
}

impl EmitQuery {
    /// Parse a list of queries.
    pub fn from_queries<S: AsRef<str>>(queries: &[S]) -> Result<Vec<Self>, QueryError> {
        queries
            .iter()
            .map(|query| {
                let query = query.as_ref();
                all_consuming(EmitQuery::parse)(query)
                    .map(|(_, parsed)| parsed)
                    .map_err(|_| QueryError::InvalidQuery(query.to_string()))
            })
            .collect()
    }

    /// Parse a single query.
    fn parse(input: &str) -> IResult<&str, Self> {
        let (rest, namespace) = take_while1(|c: char| c != '.')(input)?;
        let (rest, _) = char('.')(rest)?;
        match namespace {
            "ir" => {
                let (rest, query) = IrEmitQuery::parse(rest)?;
                Ok((rest, Self::Ir(query)))
            }
            _ => Err(nom::Err::Error(NomError::new(input, ErrorKind::Tag))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrEmitQuery {
    /// Emit the analyzed IR of this function.
    Function(String),
    /// Emit the analyzed IR of this constant's initializer.
    Const(String),
}

impl IrEmitQuery {
    /// Parse an `ir` namespace query.
    pub fn parse(input: &str) -> IResult<&str, Self> {
        let (rest, category) = take_while1(|c: char| c != '.')(input)?;
        let (rest, _) = char('.')(rest)?;
        let (rest, name) = Self::parse_name(rest)?;
        match category {
            "fn" => Ok((rest, Self::Function(name.to_owned()))),
            "const" => Ok((rest, Self::Const(name.to_owned()))),
            _ => Err(nom::Err::Error(NomError::new(input, ErrorKind::Tag))),
        }
    }

    fn parse_name(input: &str) -> IResult<&str, &str> {
        let (rest, name) = rest(input)?;
        if name.is_empty() {
            return Err(nom::Err::Error(NomError::new(input, ErrorKind::Eof)));
        }
        Ok((rest, name))
    }
}

#[cfg(test)]
mod tests {
    use crate::query::{EmitQuery, IrEmitQuery, QueryError};
    use ember_macros::{assert_err, assert_matches, assert_ok};

    #[test]
    fn test_parse_ir_fn_query() {
        let query = assert_ok!(EmitQuery::from_queries(&["ir.fn.fib"]));
        assert_eq!(query.len(), 1);
        let name = assert_matches!(&query[0], EmitQuery::Ir(IrEmitQuery::Function(n)) => n);
        assert_eq!(name, "fib");
    }

    #[test]
    fn test_parse_ir_const_query() {
        let query = assert_ok!(EmitQuery::from_queries(&["ir.const.N", "ir.fn.main"]));
        assert_eq!(
            query,
            vec![
                EmitQuery::Ir(IrEmitQuery::Const("N".to_string())),
                EmitQuery::Ir(IrEmitQuery::Function("main".to_string())),
            ]
        );
    }

    #[test]
    fn test_reject_malformed_queries() {
        for query in ["hir.fn.f", "ir.struct.S", "ir.fn.", "ir", ""] {
            let err = assert_err!(EmitQuery::from_queries(&[query]));
            assert_matches!(err, QueryError::InvalidQuery(q) if q == query);
        }
    }
}
