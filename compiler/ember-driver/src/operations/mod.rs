mod analyze;
mod emit_ast;
mod emit_ir;
mod ir_build;
mod parse;

pub use analyze::AnalyzeOperation;
pub use emit_ast::AstEmitOperation;
pub use emit_ir::IrEmitOperation;
pub use ir_build::IrBuildOperation;
pub use parse::ParseOperation;
