use crate::pipeline::{CompilationFailedError, Pipeline, PipelineError, PipelineOperation};
use ember_ir::{AnalysisSession, IrModule};

/// Operation for analyzing every item of the module.
///
/// Analyzed bodies are stored in the module's tables, so the module is passed through.
pub struct AnalyzeOperation {}

impl<'c, 'm, 'ast> PipelineOperation<'c, &'m IrModule<'ast, 'c>, &'m IrModule<'ast, 'c>>
    for AnalyzeOperation
{
    fn execute(
        pipeline: &Pipeline<'c>,
        input: &'m IrModule<'ast, 'c>,
    ) -> Result<&'m IrModule<'ast, 'c>, PipelineError> {
        let mut session = AnalysisSession::new(&pipeline.cx, input);
        session.analyze_module();
        CompilationFailedError::check(session.diagnostics.into_vec())?;
        Ok(input)
    }
}
