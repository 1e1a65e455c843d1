use crate::pipeline::{Pipeline, PipelineError, PipelineOperation};
use ember_syntax::{parse_translation_unit, AstTranslationUnit};

/// Operation for parsing the input source into an AST.
pub struct ParseOperation {}

impl<'c, T: AsRef<str>> PipelineOperation<'c, T, AstTranslationUnit> for ParseOperation {
    fn execute(_: &Pipeline<'c>, input: T) -> Result<AstTranslationUnit, PipelineError> {
        let translation_unit = parse_translation_unit(input.as_ref())?;
        Ok(translation_unit)
    }
}
