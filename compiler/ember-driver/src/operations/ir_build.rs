use crate::pipeline::{CompilationFailedError, Pipeline, PipelineError, PipelineOperation};
use ember_diagnostics::Diagnostics;
use ember_ir::IrModule;
use ember_syntax::AstTranslationUnit;
use tracing::debug;

/// Operation for building the declaration tables and generating every body.
pub struct IrBuildOperation {}

impl<'c, 'ast> PipelineOperation<'c, &'ast AstTranslationUnit, IrModule<'ast, 'c>>
    for IrBuildOperation
{
    fn execute(
        pipeline: &Pipeline<'c>,
        input: &'ast AstTranslationUnit,
    ) -> Result<IrModule<'ast, 'c>, PipelineError> {
        let mut diagnostics = Diagnostics::new();
        let module = IrModule::build(&pipeline.cx.types, input, &mut diagnostics);
        debug!(
            functions = module.functions.len(),
            structs = module.structs.len(),
            consts = module.consts.len(),
            "generated module"
        );
        CompilationFailedError::check(diagnostics.into_vec())?;
        Ok(module)
    }
}
