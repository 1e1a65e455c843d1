mod common;

use common::{analyzed_body, const_value, count_placed, with_analyzed_module};
use ember_ir::{format_executable, AnalysisOptions, ConstExprValue, IrBinaryOp, IrInstructionKind};
use proptest::prelude::*;

/// Integer expressions over the runtime parameter `x` and small literals. Trees are shallow enough
/// that any folded subtree fits in an `i32`.
fn expression() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        Just("x".to_string()),
        (0i32..10).prop_map(|v| v.to_string()),
    ];
    leaf.prop_recursive(3, 16, 2, |inner| {
        (
            inner.clone(),
            prop_oneof![Just("+"), Just("-"), Just("*")],
            inner,
        )
            .prop_map(|(lhs, op, rhs)| format!("({lhs} {op} {rhs})"))
    })
}

proptest! {
    #[test]
    fn test_constant_arithmetic_matches_host_arithmetic(a in -1000i64..1000, b in 1i64..1000) {
        let source = format!("const X: i64 = ({a}) * ({b}) - ({a}) / ({b}) + ({a}) % ({b});");
        let (value, clean) = with_analyzed_module(&source, AnalysisOptions::default(), |session| {
            (const_value(session, "X"), session.diagnostics.is_empty())
        });
        prop_assert!(clean);
        let expected = a * b - a / b + a % b;
        prop_assert_eq!(value, Some(ConstExprValue::Integer(i128::from(expected))));
    }

    #[test]
    fn test_compile_time_loops_sum_like_host_loops(n in 0u32..60) {
        let source = format!(
            "const X = {{ let mut i = 0; let mut total = 0; while i < {n} {{ total = total + i; i = i + 1; }} total }};"
        );
        let value = with_analyzed_module(&source, AnalysisOptions::default(), |session| {
            const_value(session, "X")
        });
        let expected = (0..n).map(i128::from).sum::<i128>();
        prop_assert_eq!(value, Some(ConstExprValue::Integer(expected)));
    }

    #[test]
    fn test_runtime_instructions_are_fully_typed(expr in expression()) {
        let source = format!("fn f(x: i32) -> i64 {{ {expr} }}");
        let untyped = with_analyzed_module(&source, AnalysisOptions::default(), |session| {
            assert!(session.diagnostics.is_empty(), "diagnostics for {expr}");
            let body = analyzed_body(session, "f");
            body.placed_instructions()
                .filter(|id| {
                    let instruction = body.instruction(*id);
                    !instruction.kind.is_terminator()
                        && instruction
                            .ty
                            .map_or(true, |ty| ty.is_invalid() || ty.is_comptime_only())
                })
                .count()
        });
        prop_assert_eq!(untyped, 0);
    }

    #[test]
    fn test_only_the_taken_branch_is_analyzed(a in -50i32..50, b in -50i32..50) {
        let source = format!("fn f(x: i32) -> i32 {{ if {a} < {b} {{ x + 1 }} else {{ x - 1 }} }}");
        let (adds, subs) = with_analyzed_module(&source, AnalysisOptions::default(), |session| {
            let body = analyzed_body(session, "f");
            let count = |op: IrBinaryOp| {
                count_placed(&body, |k| matches!(k, IrInstructionKind::BinOp { op: o, .. } if *o == op))
            };
            (count(IrBinaryOp::Add), count(IrBinaryOp::Sub))
        });
        prop_assert_eq!(adds, usize::from(a < b));
        prop_assert_eq!(subs, usize::from(a >= b));
    }

    #[test]
    fn test_analysis_is_idempotent(expr in expression()) {
        let source = format!("fn f(x: i32) -> i32 {{ let y = {expr}; y * 2 }}");
        let (first, second) = with_analyzed_module(&source, AnalysisOptions::default(), |session| {
            let first = format_executable(&analyzed_body(session, "f"));
            let id = session.module.find_function("f").unwrap();
            session.module.function(id).invalidate();
            session.analyze_function(id);
            (first, format_executable(&analyzed_body(session, "f")))
        });
        prop_assert_eq!(first, second);
    }
}
