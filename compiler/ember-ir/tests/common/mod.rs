#![allow(dead_code)]

use bumpalo::Bump;
use ember_diagnostics::Diagnostics;
use ember_ir::{
    AnalysisOptions, AnalysisSession, ConstExprValue, IrContext, IrError, IrExecutable,
    IrInstructionKind, IrModule, TypeTable,
};
use ember_syntax::parse_translation_unit;

/// Parse and analyze a whole module, then hand the session to `f`.
///
/// Diagnostics from building the module are moved into the session, so `f` sees every report.
pub fn with_analyzed_module<R>(
    source: &str,
    options: AnalysisOptions,
    f: impl FnOnce(&mut AnalysisSession<'_, '_, '_>) -> R,
) -> R {
    let translation_unit = parse_translation_unit(source)
        .unwrap_or_else(|e| panic!("failed to parse test module: {e}"));
    let bump = Bump::new();
    let cx = IrContext::new(TypeTable::new(&bump), options);
    let mut diagnostics = Diagnostics::new();
    let module = IrModule::build(&cx.types, &translation_unit, &mut diagnostics);
    let mut session = AnalysisSession::new(&cx, &module);
    for error in diagnostics.into_vec() {
        session.diagnostics.report(error);
    }
    session.analyze_module();
    f(&mut session)
}

/// Get the analyzed body of the function `name`.
pub fn analyzed_body<'ta>(session: &AnalysisSession<'_, '_, 'ta>, name: &str) -> IrExecutable<'ta> {
    let id = session
        .module
        .find_function(name)
        .unwrap_or_else(|| panic!("no function named {name}"));
    session
        .module
        .function(id)
        .analyzed()
        .unwrap_or_else(|| panic!("function {name} was not analyzed"))
}

/// Get the value of the constant item `name`.
pub fn const_value(session: &mut AnalysisSession<'_, '_, '_>, name: &str) -> Option<ConstExprValue> {
    let id = session
        .module
        .find_const(name)
        .unwrap_or_else(|| panic!("no constant named {name}"));
    session.const_value(id).1
}

/// Count the placed instructions of `exec` matching `predicate`.
pub fn count_placed(exec: &IrExecutable, predicate: impl Fn(&IrInstructionKind) -> bool) -> usize {
    exec.placed_instructions()
        .filter(|id| predicate(&exec.instruction(*id).kind))
        .count()
}

pub fn reports<'a>(session: &'a AnalysisSession<'_, '_, '_>) -> Vec<&'a IrError> {
    session.diagnostics.iter().collect()
}
