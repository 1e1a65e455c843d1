use crate::pipeline::{Pipeline, PipelineError, PipelineOperation};
use crate::query::{EmitQuery, IrEmitQuery, QueryError};
use ember_ir::{format_executable, ConstId, FnId, IrModule};

/// Operation for emitting the analyzed IR.
pub struct IrEmitOperation;

impl IrEmitOperation {
    /// Render the item a query selects.
    pub fn decode(module: &IrModule, query: &IrEmitQuery) -> Result<String, PipelineError> {
        let text = match query {
            IrEmitQuery::Function(name) => {
                let id = module
                    .find_function(name)
                    .ok_or_else(|| QueryError::UnknownTarget {
                        kind: "function",
                        name: name.clone(),
                    })?;
                Self::format_function(module, id)
            }
            IrEmitQuery::Const(name) => {
                let id = module
                    .find_const(name)
                    .ok_or_else(|| QueryError::UnknownTarget {
                        kind: "constant",
                        name: name.clone(),
                    })?;
                Self::format_const(module, id)
            }
        };
        Ok(text)
    }

    fn format_function(module: &IrModule, id: FnId) -> String {
        let entry = module.function(id);
        if entry.is_extern() {
            return format!("extern fn {}", entry.name());
        }
        let body = entry.with_analyzed(|exec| exec.map(format_executable));
        format!("fn {}:\n{}", entry.name(), body.unwrap_or_default())
    }

    fn format_const(module: &IrModule, id: ConstId) -> String {
        let entry = module.const_entry(id);
        let body = entry.with_analyzed(|exec| exec.map(format_executable));
        format!("const {}:\n{}", entry.name(), body.unwrap_or_default())
    }
}

impl<'c, 'm, 'ast> PipelineOperation<'c, &'m IrModule<'ast, 'c>, &'m IrModule<'ast, 'c>>
    for IrEmitOperation
{
    fn execute(
        pipeline: &Pipeline<'c>,
        input: &'m IrModule<'ast, 'c>,
    ) -> Result<&'m IrModule<'ast, 'c>, PipelineError> {
        if !pipeline.opts.emit_ir {
            return Ok(input);
        }
        // If no query patterns have been specified, we dump the entire module.
        if pipeline.opts.queries.is_empty() {
            for id in 0..input.consts.len() {
                println!("{}", Self::format_const(input, ConstId(id)));
            }
            for id in 0..input.functions.len() {
                println!("{}", Self::format_function(input, FnId(id)));
            }
            return Ok(input);
        }
        for query in pipeline.opts.queries.iter() {
            let EmitQuery::Ir(query) = query;
            println!("{}", Self::decode(input, query)?);
        }
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use crate::operations::IrEmitOperation;
    use crate::pipeline::PipelineError;
    use crate::query::{IrEmitQuery, QueryError};
    use bumpalo::Bump;
    use ember_diagnostics::Diagnostics;
    use ember_ir::{AnalysisOptions, AnalysisSession, IrContext, IrModule, TypeTable};
    use ember_macros::{assert_err, assert_matches, assert_ok};
    use ember_syntax::parse_translation_unit;

    #[test]
    fn test_queries_select_analyzed_items() {
        let bump = Bump::new();
        let cx = IrContext::new(TypeTable::new(&bump), AnalysisOptions::default());
        let tu = assert_ok!(parse_translation_unit(
            "const N = 3 * 3; extern fn put(x: i32) -> i32; fn f() -> i32 { put(N) }"
        ));
        let module = IrModule::build(&cx.types, &tu, &mut Diagnostics::new());
        let mut session = AnalysisSession::new(&cx, &module);
        session.analyze_module();
        assert!(session.diagnostics.is_empty());

        let constant = assert_ok!(IrEmitOperation::decode(
            &module,
            &IrEmitQuery::Const("N".to_string())
        ));
        assert!(constant.starts_with("const N:\nbb0:"));
        assert!(constant.contains("ret comptime_int 9"));

        let function = assert_ok!(IrEmitOperation::decode(
            &module,
            &IrEmitQuery::Function("f".to_string())
        ));
        assert!(function.contains("call "));
        let external = assert_ok!(IrEmitOperation::decode(
            &module,
            &IrEmitQuery::Function("put".to_string())
        ));
        assert_eq!(external, "extern fn put");

        let missing = assert_err!(IrEmitOperation::decode(
            &module,
            &IrEmitQuery::Function("g".to_string())
        ));
        assert_matches!(
            missing,
            PipelineError::QueryError(QueryError::UnknownTarget { kind: "function", .. })
        );
    }
}
