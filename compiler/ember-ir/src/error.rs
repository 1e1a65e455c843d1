use crate::pointee::PointeeError;
use ember_macros::declare_error_type;
use ember_span::Span;
use miette::Diagnostic;
use thiserror::Error;

declare_error_type! {
    #[error("ir error: {0}")]
    pub enum IrError {
        UnknownType(UnknownTypeError),
        InvalidReference(InvalidReferenceError),
        DuplicateDeclaration(DuplicateDeclarationError),
        TypeMismatch(TypeMismatchError),
        InvalidOperandTypes(InvalidOperandTypesError),
        InvalidUnaryOperand(InvalidUnaryOperandError),
        UnknownField(UnknownFieldError),
        MissingField(MissingFieldError),
        DuplicateField(DuplicateFieldError),
        NotAStruct(NotAStructError),
        NotIndexable(NotIndexableError),
        NotDereferenceable(NotDereferenceableError),
        BreakOutsideLoop(BreakOutsideLoopError),
        ContinueOutsideLoop(ContinueOutsideLoopError),
        ReturnOutsideFunction(ReturnOutsideFunctionError),
        AssignToImmutable(AssignToImmutableError),
        InvalidAssignTarget(InvalidAssignTargetError),
        UnableToEvaluateConstant(UnableToEvaluateConstantError),
        IntegerOverflow(IntegerOverflowError),
        DivisionByZero(DivisionByZeroError),
        UndefinedValueUse(UndefinedValueUseError),
        ComptimeMemory(ComptimeMemoryError),
        IndexOutOfBounds(IndexOutOfBoundsError),
        QuotaExceeded(QuotaExceededError),
        FixedPointDivergence(FixedPointDivergenceError),
        ArgumentCount(ArgumentCountError),
        NotCallable(NotCallableError),
        DependencyLoop(DependencyLoopError),
        ValueDoesNotFit(ValueDoesNotFitError),
        InvalidCast(InvalidCastError),
        TypeFieldInfiniteRecursion(TypeFieldInfiniteRecursionError),
        ComptimeStoreAtRuntime(ComptimeStoreAtRuntimeError),
        CallDepthExceeded(CallDepthExceededError),
        ExternCallAtComptime(ExternCallAtComptimeError),
        CannotInferType(CannotInferTypeError),
    }
}

pub type IrResult<T> = Result<T, IrError>;

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::unknown_type))]
#[error("{name} does not name a known type")]
pub struct UnknownTypeError {
    pub name: String,
    #[label = "could not find type {name}"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::invalid_reference))]
#[error("invalid reference to {name}")]
pub struct InvalidReferenceError {
    pub name: String,
    #[label = "no value in scope named {name}"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::duplicate_declaration))]
#[error("{name} is declared more than once")]
pub struct DuplicateDeclarationError {
    pub name: String,
    #[label = "{name} is redeclared here"]
    pub span: Span,
    #[label = "first declared here"]
    pub previous: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::type_mismatch))]
#[error("type mismatch")]
pub struct TypeMismatchError {
    pub actual_type: String,
    pub expected_type: String,
    #[label = "the expression has type {actual_type}, expected {expected_type}"]
    pub actual_loc: Span,
    #[label = "expected type {expected_type} because of this"]
    pub expected_loc: Option<Span>,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::invalid_operand_types))]
#[error("operator {op} cannot be applied to {lhs_type} and {rhs_type}")]
pub struct InvalidOperandTypesError {
    pub op: String,
    pub lhs_type: String,
    pub rhs_type: String,
    #[label = "invalid operands for {op}"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::invalid_unary_operand))]
#[error("operator {op} cannot be applied to {operand_type}")]
pub struct InvalidUnaryOperandError {
    pub op: String,
    pub operand_type: String,
    #[label = "invalid operand for {op}"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::unknown_field))]
#[error("struct {type_name} has no field named {field_name}")]
pub struct UnknownFieldError {
    pub type_name: String,
    pub field_name: String,
    #[label = "unknown field {field_name}"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::missing_field))]
#[error("missing field {field_name} in construction of {type_name}")]
pub struct MissingFieldError {
    pub type_name: String,
    pub field_name: String,
    #[label = "field {field_name} is not initialized"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::duplicate_field))]
#[error("field {field_name} is initialized more than once")]
pub struct DuplicateFieldError {
    pub field_name: String,
    #[label = "duplicate initializer"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::not_a_struct))]
#[error("type {type_name} is not a struct")]
pub struct NotAStructError {
    pub type_name: String,
    #[label = "expression of type {type_name} has no fields"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::not_indexable))]
#[error("type {type_name} cannot be indexed")]
pub struct NotIndexableError {
    pub type_name: String,
    #[label = "expected an array"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::not_dereferenceable))]
#[error("type {type_name} cannot be dereferenced")]
pub struct NotDereferenceableError {
    pub type_name: String,
    #[label = "expected a pointer"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::break_outside_loop))]
#[error("break statement outside of loop")]
pub struct BreakOutsideLoopError {
    #[label = "there is no enclosing loop"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::continue_outside_loop))]
#[error("continue statement outside of loop")]
pub struct ContinueOutsideLoopError {
    #[label = "there is no enclosing loop"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::return_outside_function))]
#[error("return statement outside of function")]
pub struct ReturnOutsideFunctionError {
    #[label = "there is no enclosing function"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::assign_to_immutable))]
#[error("cannot assign twice to immutable binding {name}")]
pub struct AssignToImmutableError {
    pub name: String,
    #[label = "{name} is not declared mutable"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::invalid_assign_target))]
#[error("invalid left-hand side of assignment")]
pub struct InvalidAssignTargetError {
    #[label = "cannot assign to this expression"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::unable_to_evaluate_constant))]
#[error("unable to evaluate constant expression")]
pub struct UnableToEvaluateConstantError {
    #[label = "this value is only known at runtime"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::integer_overflow))]
#[error("operation overflows type {type_name}")]
pub struct IntegerOverflowError {
    pub type_name: String,
    #[label = "integer overflow in compile-time evaluation"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::division_by_zero))]
#[error("division by zero")]
pub struct DivisionByZeroError {
    #[label = "the divisor is zero"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::undefined_value_use))]
#[error("use of undefined value")]
pub struct UndefinedValueUseError {
    #[label = "this value is undefined"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::comptime_memory))]
#[error("invalid compile-time memory access: {reason}")]
pub struct ComptimeMemoryError {
    pub reason: PointeeError,
    #[label = "{reason}"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::index_out_of_bounds))]
#[error("index {index} is out of bounds for array of length {len}")]
pub struct IndexOutOfBoundsError {
    pub index: i128,
    pub len: u64,
    #[label = "index out of bounds"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(ir::quota_exceeded),
    help("the compile-time evaluation took more than {quota} backward branches")
)]
#[error("evaluation exceeded {quota} backward branches")]
pub struct QuotaExceededError {
    pub quota: u32,
    #[label = "loop does not terminate at compile time"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::fixed_point_divergence))]
#[error("loop types did not stabilize after {budget} passes")]
pub struct FixedPointDivergenceError {
    pub budget: u32,
    #[label = "cannot infer the types of values carried by this loop"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::argument_count))]
#[error("function takes {expected} arguments but {actual} were supplied")]
pub struct ArgumentCountError {
    pub expected: usize,
    pub actual: usize,
    #[label = "wrong number of arguments"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::not_callable))]
#[error("type {type_name} is not callable")]
pub struct NotCallableError {
    pub type_name: String,
    #[label = "expected a function"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::dependency_loop))]
#[error("{name} depends on itself")]
pub struct DependencyLoopError {
    pub name: String,
    #[label = "{name} is needed while it is being evaluated"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::value_does_not_fit))]
#[error("value {value} does not fit in type {type_name}")]
pub struct ValueDoesNotFitError {
    pub value: i128,
    pub type_name: String,
    #[label = "{value} is out of range for {type_name}"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::invalid_cast))]
#[error("cannot cast {from_type} to {to_type}")]
pub struct InvalidCastError {
    pub from_type: String,
    pub to_type: String,
    #[label = "invalid cast"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::infinitely_recursive_type))]
#[error("type is recursive")]
pub struct TypeFieldInfiniteRecursionError {
    pub type_name: String,
    pub offending_field: String,
    #[label = "type {type_name} has an infinite recursion in field {offending_field}"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::comptime_store_at_runtime))]
#[error("cannot write to compile-time memory from runtime code")]
pub struct ComptimeStoreAtRuntimeError {
    #[label = "this store depends on a runtime value"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::call_depth_exceeded))]
#[error("compile-time call depth exceeded {depth}")]
pub struct CallDepthExceededError {
    pub depth: u32,
    #[label = "call nested too deeply"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::extern_call_at_comptime))]
#[error("cannot call extern function {name} at compile time")]
pub struct ExternCallAtComptimeError {
    pub name: String,
    #[label = "{name} has no body"]
    pub span: Span,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::cannot_infer_type))]
#[error("cannot infer a runtime type for {type_name}")]
pub struct CannotInferTypeError {
    pub type_name: String,
    #[label = "value of type {type_name} must be known at compile time"]
    pub span: Span,
}
