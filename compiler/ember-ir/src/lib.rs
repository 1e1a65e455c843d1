//! Intermediate representation and semantic analysis.
//!
//! The generator lowers syntax into an untyped [`IrExecutable`]: a control-flow graph of basic
//! blocks over an instruction arena. The analyzer reads one executable and writes another, giving
//! every instruction a type, folding everything known at compile time, and emitting runtime
//! instructions for everything else. Compile-time memory lives in a [`ConstStore`] shared by the
//! whole [`AnalysisSession`].
//!
//! Types are interned in a [`TypeTable`] backed by a bump arena, so they compare by address and
//! are shared freely between executables.

pub mod analyze;
pub mod error;
pub mod exec;
pub mod gen;
pub mod instruction;
pub mod module;
pub mod options;
pub mod pointee;
pub mod scope;
pub mod session;
pub mod side_effects;
pub mod store;
pub mod table;
pub mod textual;
pub mod ty;
pub mod value;

pub use analyze::analyze;
pub use error::{IrError, IrResult};
pub use exec::{IrBasicBlock, IrBlockId, IrExecutable};
pub use gen::{generate, generate_function};
pub use instruction::{
    IrBinaryOp, IrCastKind, IrField, IrInstId, IrInstruction, IrInstructionKind, IrTypeRef,
    IrUnaryOp,
};
pub use module::{ConstId, FnId, FnTableEntry, IrItemRef, IrModule, StructId};
pub use options::{AnalysisOptions, IrContext};
pub use pointee::{pointee_of, pointee_of_mut, PointeeError};
pub use scope::{BlockContext, IrLocal, IrLocalStorage, LocalId, ScopeArena, ScopeId};
pub use session::AnalysisSession;
pub use side_effects::has_side_effects;
pub use store::{ConstStore, SlotHandle};
pub use table::TypeTable;
pub use textual::{format_executable, IrTextualPass};
pub use ty::{IrIntegerTy, IrTy, POINTER_BITS};
pub use value::{ConstExprValue, ConstPtr};
