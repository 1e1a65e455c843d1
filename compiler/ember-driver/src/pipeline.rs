use crate::operations::{
    AnalyzeOperation, AstEmitOperation, IrBuildOperation, IrEmitOperation, ParseOperation,
};
use crate::query::{EmitQuery, QueryError};
use bumpalo::Bump;
use ember_ir::{AnalysisOptions, IrContext, IrError, TypeTable};
use ember_syntax::ParseError;
use miette::Diagnostic;
use thiserror::Error;

/// Execute the entire compilation pipeline.
pub fn execute_compilation_pipeline(
    opts: PipelineOptions,
    input: &str,
) -> Result<(), PipelineError> {
    let bump = Bump::new();
    let pipeline = Pipeline::new(opts, &bump);
    let tu = ParseOperation::execute(&pipeline, input)?;
    let tu = AstEmitOperation::execute(&pipeline, tu)?;
    let module = IrBuildOperation::execute(&pipeline, &tu)?;
    let module = AnalyzeOperation::execute(&pipeline, &module)?;
    IrEmitOperation::execute(&pipeline, module)?;
    Ok(())
}

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    ParseError(#[from] ParseError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    CompilationFailed(#[from] CompilationFailedError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    QueryError(#[from] QueryError),
}

/// Every diagnostic a stage reported, attached to a single report.
#[derive(Debug, Error, Diagnostic)]
#[diagnostic(code(driver::compilation_failed))]
#[error("compilation failed with {} error(s)", .errors.len())]
pub struct CompilationFailedError {
    #[related]
    pub errors: Vec<IrError>,
}

impl CompilationFailedError {
    /// Turn the diagnostics of a stage into an error, if there were any.
    pub fn check(errors: Vec<IrError>) -> Result<(), Self> {
        if errors.is_empty() {
            return Ok(());
        }
        Err(Self { errors })
    }
}

/// Options for the compilation pipeline.
///
/// Most of these are derived from the command line arguments.
pub struct PipelineOptions {
    pub emit_ast: bool,
    pub emit_ir: bool,
    pub queries: Vec<EmitQuery>,
    pub analysis: AnalysisOptions,
}

/// A compilation pipeline for the compiler.
pub struct Pipeline<'c> {
    pub(crate) opts: PipelineOptions,
    pub(crate) cx: IrContext<'c>,
}

impl<'c> Pipeline<'c> {
    pub fn new(opts: PipelineOptions, bump: &'c Bump) -> Self {
        let cx = IrContext::new(TypeTable::new(bump), opts.analysis.clone());
        Self { opts, cx }
    }
}

pub trait PipelineOperation<'c, I, O> {
    fn execute(pipeline: &Pipeline<'c>, input: I) -> Result<O, PipelineError>;
}

#[cfg(test)]
mod tests {
    use crate::pipeline::{execute_compilation_pipeline, PipelineError, PipelineOptions};
    use ember_ir::{AnalysisOptions, IrError};
    use ember_macros::{assert_err, assert_matches, assert_ok};

    fn options() -> PipelineOptions {
        PipelineOptions {
            emit_ast: false,
            emit_ir: false,
            queries: vec![],
            analysis: AnalysisOptions::default(),
        }
    }

    #[test]
    fn test_well_typed_program_compiles() {
        let source = "const N = 4; fn f(x: i32) -> i32 { x * N }";
        assert_ok!(execute_compilation_pipeline(options(), source));
    }

    #[test]
    fn test_parse_errors_stop_the_pipeline() {
        let err = assert_err!(execute_compilation_pipeline(options(), "fn f( {"));
        assert_matches!(err, PipelineError::ParseError(_));
    }

    #[test]
    fn test_analysis_errors_are_collected() {
        let source = "fn f() -> bool { 1 } fn g(x: i32) -> i32 { x / 0 }";
        let err = assert_err!(execute_compilation_pipeline(options(), source));
        let failed = assert_matches!(err, PipelineError::CompilationFailed(e) => e);
        assert_eq!(failed.errors.len(), 2);
        assert!(failed
            .errors
            .iter()
            .any(|e| matches!(e, IrError::DivisionByZero(_))));
    }
}
