mod common;

use common::{analyzed_body, const_value, count_placed, reports, with_analyzed_module};
use ember_ir::{
    format_executable, AnalysisOptions, ConstExprValue, IrBinaryOp, IrError, IrInstructionKind,
    IrTy,
};
use ember_macros::{assert_matches, assert_some};

#[test]
fn test_constant_function_body_folds_to_its_value() {
    with_analyzed_module(
        "fn f() -> i32 { 2 + 3 * 4 }",
        AnalysisOptions::default(),
        |session| {
            assert!(session.diagnostics.is_empty());
            let body = analyzed_body(session, "f");
            assert_eq!(
                assert_some!(body.const_result()),
                &ConstExprValue::Integer(14)
            );
        },
    );
}

#[test]
fn test_branch_on_known_condition_drops_the_dead_arm() {
    with_analyzed_module(
        "fn f(x: i32) -> i32 { if 1 > 2 { x * 2 } else { x } }",
        AnalysisOptions::default(),
        |session| {
            assert!(session.diagnostics.is_empty());
            let body = analyzed_body(session, "f");
            let binary = count_placed(&body, |k| matches!(k, IrInstructionKind::BinOp { .. }));
            let branches = count_placed(&body, |k| matches!(k, IrInstructionKind::CondBr { .. }));
            assert_eq!(binary, 0);
            assert_eq!(branches, 0);
        },
    );
}

#[test]
fn test_loop_with_known_bounds_is_evaluated_away() {
    let source = r#"
        fn f() -> i32 {
            let mut i = 0;
            while i < 10 {
                i = i + 1;
            }
            i
        }
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        assert!(session.diagnostics.is_empty());
        let body = analyzed_body(session, "f");
        assert_eq!(body.blocks().len(), 1);
        assert_eq!(
            assert_some!(body.const_result()),
            &ConstExprValue::Integer(10)
        );
    });
}

#[test]
fn test_loop_over_runtime_bound_keeps_a_typed_phi() {
    let source = r#"
        fn f(n: i32) -> i32 {
            let mut i = 0;
            while i < n {
                i = i + 1;
            }
            i
        }
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        assert!(session.diagnostics.is_empty());
        let body = analyzed_body(session, "f");
        let phis = body
            .placed_instructions()
            .filter(|id| body.instruction(*id).kind.is_phi())
            .collect::<Vec<_>>();
        assert!(!phis.is_empty());
        for phi in phis {
            let ty = assert_some!(body.instruction(phi).ty);
            assert_matches!(ty, IrTy::Integer(i) if i.signed && i.bits == 32);
        }
        let branches = count_placed(&body, |k| matches!(k, IrInstructionKind::CondBr { .. }));
        assert_eq!(branches, 1);
    });
}

#[test]
fn test_loop_that_needs_more_passes_than_the_budget_diverges() {
    let source = r#"
        fn f(n: i32) -> i32 {
            let mut i = 0;
            while i < n {
                i = i + 1;
            }
            i
        }
    "#;
    let options = AnalysisOptions {
        fixed_point_budget: 1,
        ..AnalysisOptions::default()
    };
    with_analyzed_module(source, options, |session| {
        let reports = reports(session);
        assert_eq!(reports.len(), 1);
        assert_matches!(reports[0], IrError::FixedPointDivergence(e) if e.budget == 1);
    });
}

#[test]
fn test_endless_compile_time_loop_exhausts_the_quota() {
    let source = r#"
        const X = {
            let mut i = 0;
            while i >= 0 {
                i = i + 1;
            }
            i
        };
    "#;
    let options = AnalysisOptions {
        backward_branch_quota: 50,
        ..AnalysisOptions::default()
    };
    with_analyzed_module(source, options, |session| {
        assert!(reports(session)
            .iter()
            .any(|r| matches!(r, IrError::QuotaExceeded(_))));
        assert_eq!(const_value(session, "X"), None);
    });
}

#[test]
fn test_recursive_function_is_called_at_compile_time() {
    let source = r#"
        fn fib(n: i32) -> i32 {
            if n < 2 {
                n
            } else {
                fib(n - 1) + fib(n - 2)
            }
        }
        const X = fib(10);
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        assert!(session.diagnostics.is_empty());
        assert_eq!(const_value(session, "X"), Some(ConstExprValue::Integer(55)));
        let body = analyzed_body(session, "fib");
        let calls = count_placed(&body, |k| matches!(k, IrInstructionKind::Call { .. }));
        assert_eq!(calls, 2);
    });
}

#[test]
fn test_result_type_mismatch_is_reported_once() {
    with_analyzed_module(
        "fn f() -> bool { 1 + 2 }",
        AnalysisOptions::default(),
        |session| {
            let reports = reports(session);
            assert_eq!(reports.len(), 1);
            assert_matches!(
                reports[0],
                IrError::TypeMismatch(e) if e.expected_type == "bool"
                    && e.actual_type == "comptime_int"
                    && e.expected_loc.is_some()
            );
        },
    );
}

#[test]
fn test_overflow_of_sized_integers_is_reported() {
    with_analyzed_module(
        "fn f() -> u8 { let x: u8 = 200; x + 100 }",
        AnalysisOptions::default(),
        |session| {
            assert!(reports(session)
                .iter()
                .any(|r| matches!(r, IrError::IntegerOverflow(e) if e.type_name == "u8")));
        },
    );
}

#[test]
fn test_literal_division_by_zero_is_reported_in_runtime_code() {
    with_analyzed_module(
        "fn f(x: i32) -> i32 { x / 0 }",
        AnalysisOptions::default(),
        |session| {
            assert!(reports(session)
                .iter()
                .any(|r| matches!(r, IrError::DivisionByZero(_))));
        },
    );
}

#[test]
fn test_branching_on_undefined_is_reported() {
    let source = r#"
        fn f() -> i32 {
            let x: i32 = undefined;
            if x > 1 { 1 } else { 2 }
        }
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        assert!(reports(session)
            .iter()
            .any(|r| matches!(r, IrError::UndefinedValueUse(_))));
    });
}

#[test]
fn test_stores_through_field_pointers_are_visible() {
    let source = r#"
        struct P { x: i32, y: i32 }
        const Y = {
            let mut p = new P { x: 1, y: 2 };
            let q = &p.y;
            *q = 7;
            p.y + p.x
        };
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        assert!(session.diagnostics.is_empty());
        assert_eq!(const_value(session, "Y"), Some(ConstExprValue::Integer(8)));
    });
}

#[test]
fn test_array_elements_fold() {
    with_analyzed_module(
        "const A = [1, 2, 3][1];",
        AnalysisOptions::default(),
        |session| {
            assert!(session.diagnostics.is_empty());
            assert_eq!(const_value(session, "A"), Some(ConstExprValue::Integer(2)));
        },
    );
}

#[test]
fn test_pointer_to_released_local_is_dangling() {
    let source = r#"
        fn leak() -> *i32 {
            let x: i32 = 5;
            &x
        }
        const X = *leak();
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        assert!(reports(session)
            .iter()
            .any(|r| matches!(r, IrError::ComptimeMemory(_))));
        assert_eq!(const_value(session, "X"), None);
    });
}

#[test]
fn test_dead_code_elimination_keeps_stores() {
    let source = r#"
        fn f(p: *i32) -> i32 {
            let unused = 1 + 2;
            *p = 3;
            1
        }
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        assert!(session.diagnostics.is_empty());
        let body = analyzed_body(session, "f");
        let stores = count_placed(&body, |k| matches!(k, IrInstructionKind::Store { .. }));
        let binary = count_placed(&body, |k| {
            matches!(
                k,
                IrInstructionKind::BinOp {
                    op: IrBinaryOp::Add,
                    ..
                }
            )
        });
        assert_eq!(stores, 1);
        assert_eq!(binary, 0);
    });
}

#[test]
fn test_reanalysis_produces_the_same_executable() {
    let source = r#"
        fn f(n: i32, m: i8) -> i64 {
            let mut total = 0;
            let mut i = 0;
            while i < n {
                total = total + m;
                i = i + 1;
            }
            total
        }
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        let first = format_executable(&analyzed_body(session, "f"));
        let id = assert_some!(session.module.find_function("f"));
        session.module.function(id).invalidate();
        session.analyze_function(id);
        let second = format_executable(&analyzed_body(session, "f"));
        assert_eq!(first, second);
    });
}

fn assert_runtime_types_are_concrete(body: &ember_ir::IrExecutable) {
    for id in body.placed_instructions() {
        let instruction = body.instruction(id);
        if instruction.kind.is_terminator() {
            continue;
        }
        let ty = assert_some!(instruction.ty);
        assert!(!ty.is_comptime_only(), "%{} has type {}", id.0, ty);
    }
}

#[test]
fn test_indices_beyond_u32_address_large_arrays() {
    let source = r#"
        const X: u8 = {
            let a: [5000000000]u8 = undefined;
            a[4294967296]
        };
        const Y: u8 = {
            let a: [5000000000]u8 = undefined;
            a[5000000000]
        };
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        let reports = reports(session);
        assert_eq!(reports.len(), 1);
        assert_matches!(
            reports[0],
            IrError::IndexOutOfBounds(e) if e.index == 5_000_000_000 && e.len == 5_000_000_000
        );
        assert_eq!(const_value(session, "X"), Some(ConstExprValue::Undefined));
        assert_eq!(const_value(session, "Y"), None);
    });
}

#[test]
fn test_runtime_index_into_literal_array_has_a_concrete_type() {
    let source = r#"
        fn f(i: u64) -> i32 { let a = [1, 2, 3]; a[i] }
        fn g(i: u64) -> i64 { let a = [1, 2, 3]; a[i] }
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        assert!(session.diagnostics.is_empty());
        for (name, bits) in [("f", 32), ("g", 64)] {
            let body = analyzed_body(session, name);
            assert_runtime_types_are_concrete(&body);
            let element = assert_some!(body
                .placed_instructions()
                .find(|id| matches!(body.instruction(*id).kind, IrInstructionKind::ElemValue { .. })));
            let ty = assert_some!(body.instruction(element).ty);
            assert_matches!(ty, IrTy::Integer(i) if i.signed && i.bits == bits);
        }
    });
}

#[test]
fn test_runtime_store_into_literal_array_takes_the_stored_type() {
    let source = r#"
        fn f(i: u64, x: i64) -> i64 {
            let mut a = [1, 2, 3];
            a[i] = x;
            a[0]
        }
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        assert!(session.diagnostics.is_empty());
        let body = analyzed_body(session, "f");
        assert_runtime_types_are_concrete(&body);
        let inserts = count_placed(&body, |k| matches!(k, IrInstructionKind::InsertElem { .. }));
        assert_eq!(inserts, 1);
    });
}

#[test]
fn test_literals_merged_at_runtime_take_the_expected_type() {
    let source = r#"
        fn f(c: bool) -> u8 { if c { 7 } else { 8 } }
        fn g(c: bool) -> i64 {
            let x: u16 = if c { 7 } else { 300 };
            x
        }
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        assert!(session.diagnostics.is_empty());
        for (name, signed, bits) in [("f", false, 8), ("g", false, 16)] {
            let body = analyzed_body(session, name);
            let phi = assert_some!(body
                .placed_instructions()
                .find(|id| body.instruction(*id).kind.is_phi()));
            let ty = assert_some!(body.instruction(phi).ty);
            assert_matches!(ty, IrTy::Integer(i) if i.signed == signed && i.bits == bits);
        }
    });
}

#[test]
fn test_literals_merged_without_a_use_default_to_i32() {
    let source = r#"
        fn f(c: bool) -> i64 {
            let x = if c { 1 } else { 2 };
            let y = x;
            0
        }
    "#;
    let options = AnalysisOptions {
        eliminate_dead_instructions: false,
        ..AnalysisOptions::default()
    };
    with_analyzed_module(source, options, |session| {
        assert!(session.diagnostics.is_empty());
        let body = analyzed_body(session, "f");
        let phi = assert_some!(body
            .placed_instructions()
            .find(|id| body.instruction(*id).kind.is_phi()));
        let ty = assert_some!(body.instruction(phi).ty);
        assert_matches!(ty, IrTy::Integer(i) if i.signed && i.bits == 32);
    });
}

#[test]
fn test_adding_an_aggregate_is_reported_without_cascading() {
    let source = r#"
        struct S { x: i32 }
        fn f() -> i32 { 1 + new S { x: 2 } }
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        let reports = reports(session);
        assert_eq!(reports.len(), 1);
        assert_matches!(
            reports[0],
            IrError::InvalidOperandTypes(e) if e.op == "add"
                && e.lhs_type == "comptime_int"
                && e.rhs_type == "S"
        );
    });
}

#[test]
fn test_merge_mismatch_names_the_types_that_conflict() {
    let source = r#"
        fn f(a: bool, b: bool, x: i8) -> i8 {
            let mut r = x;
            while a {
                if b {
                    r = 1;
                    break;
                }
                r = true;
                break;
            }
            r
        }
    "#;
    with_analyzed_module(source, AnalysisOptions::default(), |session| {
        let reports = reports(session);
        assert_eq!(reports.len(), 1);
        let mismatch = assert_matches!(reports[0], IrError::TypeMismatch(e) => e);
        assert!(mismatch.expected_type == "bool" || mismatch.actual_type == "bool");
        assert_ne!(mismatch.expected_type, mismatch.actual_type);
    });
}
