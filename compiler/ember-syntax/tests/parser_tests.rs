use ember_macros::{assert_err, assert_matches, assert_ok};
use ember_syntax::{
    parse_expression, parse_translation_unit, AstBinaryOp, AstExpr, AstItem, AstStmt, AstType,
    AstUnaryOp, ParseError,
};

#[test]
fn test_parse_function_with_tail_expression() {
    let tu = assert_ok!(parse_translation_unit(
        "fn add(a: i32, b: i32) -> i32 { a + b }"
    ));
    assert_eq!(tu.items.len(), 1);
    let f = assert_matches!(&tu.items[0], AstItem::Function(f) => f);
    assert_eq!(f.name.name, "add");
    assert_eq!(f.parameters.len(), 2);
    assert!(!f.is_extern());
    assert_matches!(
        &f.return_type,
        Some(AstType::Integer(t)) if t.signed && t.bits == 32
    );
    let body = f.body.as_ref().expect("function has a body");
    assert!(body.stmts.is_empty());
    assert_matches!(body.tail.as_deref(), Some(AstExpr::BinaryOp(b)) if b.op == AstBinaryOp::Add);
}

#[test]
fn test_parse_extern_function_without_body() {
    let tu = assert_ok!(parse_translation_unit("extern fn puts(p: *u8) -> i32;"));
    let f = assert_matches!(&tu.items[0], AstItem::Function(f) => f);
    assert!(f.is_extern());
    assert_matches!(&f.parameters[0].ty, AstType::Pointer(_));
}

#[test]
fn test_parse_struct_and_const_items() {
    let tu = assert_ok!(parse_translation_unit(
        "struct Point { x: i32, y: i32, } const ORIGIN: Point = new Point { x: 0, y: 0 };"
    ));
    assert_eq!(tu.items.len(), 2);
    let s = assert_matches!(&tu.items[0], AstItem::Struct(s) => s);
    assert_eq!(s.fields.len(), 2);
    let c = assert_matches!(&tu.items[1], AstItem::Const(c) => c);
    assert_matches!(&c.ty, Some(AstType::Named(n)) if n.name.name == "Point");
    assert_matches!(&c.value, AstExpr::Construct(e) if e.arguments.len() == 2);
}

#[test]
fn test_operator_precedence() {
    let expr = assert_ok!(parse_expression("1 + 2 * 3"));
    let add = assert_matches!(expr, AstExpr::BinaryOp(b) => b);
    assert_eq!(add.op, AstBinaryOp::Add);
    assert_matches!(*add.rhs, AstExpr::BinaryOp(b) if b.op == AstBinaryOp::Mul);

    let expr = assert_ok!(parse_expression("a || b && c == d"));
    let or = assert_matches!(expr, AstExpr::BinaryOp(b) => b);
    assert_eq!(or.op, AstBinaryOp::Or);
    let and = assert_matches!(*or.rhs, AstExpr::BinaryOp(b) => b);
    assert_eq!(and.op, AstBinaryOp::And);
    assert_matches!(*and.rhs, AstExpr::BinaryOp(b) if b.op == AstBinaryOp::Eq);
}

#[test]
fn test_subtraction_is_left_associative() {
    let expr = assert_ok!(parse_expression("10 - 4 - 3"));
    let outer = assert_matches!(expr, AstExpr::BinaryOp(b) => b);
    assert_matches!(*outer.lhs, AstExpr::BinaryOp(b) if b.op == AstBinaryOp::Sub);
    assert_matches!(*outer.rhs, AstExpr::IntegerLiteral(i) if i.value == 3);
}

#[test]
fn test_assignment_is_right_associative() {
    let expr = assert_ok!(parse_expression("a = b = 3"));
    let outer = assert_matches!(expr, AstExpr::Assign(a) => a);
    assert_matches!(*outer.lhs, AstExpr::Reference(_));
    assert_matches!(*outer.rhs, AstExpr::Assign(_));
}

#[test]
fn test_unary_cast_and_postfix() {
    let expr = assert_ok!(parse_expression("-x as i64"));
    let cast = assert_matches!(expr, AstExpr::Cast(c) => c);
    assert_matches!(*cast.operand, AstExpr::UnaryOp(u) if u.op == AstUnaryOp::Neg);

    let expr = assert_ok!(parse_expression("&p.items[2]"));
    let addr = assert_matches!(expr, AstExpr::UnaryOp(u) => u);
    assert_eq!(addr.op, AstUnaryOp::AddressOf);
    let index = assert_matches!(*addr.operand, AstExpr::BracketIndex(i) => i);
    assert_matches!(*index.origin, AstExpr::DotIndex(d) if d.field.name == "items");

    let expr = assert_ok!(parse_expression("f(1, g(2),)"));
    let call = assert_matches!(expr, AstExpr::Call(c) => c);
    assert_eq!(call.arguments.len(), 2);
}

#[test]
fn test_block_like_statements_need_no_semicolon() {
    let tu = assert_ok!(parse_translation_unit(
        r#"
        fn main() -> i32 {
            let mut i = 0;
            while i < 10 { i = i + 1; }
            if i == 10 { i = 0; } else if i == 11 { i = 1; } else { i = 2; }
            comptime { 1 + 1 };
            i
        }
        "#
    ));
    let f = assert_matches!(&tu.items[0], AstItem::Function(f) => f);
    let body = f.body.as_ref().expect("function has a body");
    assert_eq!(body.stmts.len(), 4);
    assert_matches!(&body.stmts[0], AstStmt::Let(l) if l.mutable);
    assert_matches!(&body.stmts[1], AstStmt::Expr(e) if matches!(e.expr, AstExpr::While(_)));
    let branch = assert_matches!(&body.stmts[2], AstStmt::Expr(e) => &e.expr);
    let branch = assert_matches!(branch, AstExpr::If(i) => i);
    assert_matches!(branch.unhappy_path.as_deref(), Some(AstExpr::If(_)));
    assert_matches!(body.tail.as_deref(), Some(AstExpr::Reference(_)));
}

#[test]
fn test_block_with_if_tail() {
    let expr = assert_ok!(parse_expression("{ if c { 1 } else { 2 } }"));
    let block = assert_matches!(expr, AstExpr::Block(b) => b);
    assert!(block.stmts.is_empty());
    assert_matches!(block.tail.as_deref(), Some(AstExpr::If(_)));
}

#[test]
fn test_parse_types() {
    let tu = assert_ok!(parse_translation_unit(
        "fn f(a: [4]u8, b: **bool, c: unit, d: [N + 1]Point) {}"
    ));
    let f = assert_matches!(&tu.items[0], AstItem::Function(f) => f);
    let tys = f.parameters.iter().map(|p| &p.ty).collect::<Vec<_>>();
    assert_matches!(tys[0], AstType::Array(a) if matches!(*a.element, AstType::Integer(_)));
    let outer = assert_matches!(tys[1], AstType::Pointer(p) => p);
    assert_matches!(*outer.inner, AstType::Pointer(_));
    assert_matches!(tys[2], AstType::Unit(_));
    let arr = assert_matches!(tys[3], AstType::Array(a) => a);
    assert_matches!(*arr.len, AstExpr::BinaryOp(_));
}

#[test]
fn test_comments_are_ignored() {
    let tu = assert_ok!(parse_translation_unit(
        "// leading\nconst A = 1; // trailing\n"
    ));
    assert_eq!(tu.items.len(), 1);
}

#[test]
fn test_missing_semicolon_is_reported() {
    let err = assert_err!(parse_translation_unit("fn f() { let x = 1 let y = 2; }"));
    assert_matches!(err, ParseError::UnexpectedToken(_));
}

#[test]
fn test_unfinished_input_is_reported() {
    let err = assert_err!(parse_translation_unit("fn f() { 1 + "));
    assert_matches!(err, ParseError::UnexpectedEndOfFile(_));
}

#[test]
fn test_trailing_input_after_expression_is_rejected() {
    let err = assert_err!(parse_expression("1 + 2 )"));
    assert_matches!(err, ParseError::UnexpectedToken(_));
}

#[test]
fn test_spans_cover_the_whole_item() {
    let input = "fn f() -> unit {}";
    let tu = assert_ok!(parse_translation_unit(input));
    let span = tu.items[0].span();
    assert_eq!(span.low, 0);
    assert_eq!(span.high as usize, input.len());
}
