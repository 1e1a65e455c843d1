use crate::pipeline::{Pipeline, PipelineError, PipelineOperation};
use ember_diagnostics::ice;
use ember_syntax::AstTranslationUnit;

/// Operation for emitting the AST.
pub struct AstEmitOperation {}

impl<'c> PipelineOperation<'c, AstTranslationUnit, AstTranslationUnit> for AstEmitOperation {
    fn execute(
        pipeline: &Pipeline<'c>,
        input: AstTranslationUnit,
    ) -> Result<AstTranslationUnit, PipelineError> {
        if !pipeline.opts.emit_ast {
            return Ok(input);
        }
        let syntax = ron::ser::to_string_pretty(&input, Default::default())
            .unwrap_or_else(|_| ice!("failed to serialize ast to ron"));
        println!("{}", syntax);
        Ok(input)
    }
}
