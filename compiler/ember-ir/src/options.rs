use crate::table::TypeTable;

/// Tuning knobs for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Number of passes over a runtime loop body before its header types must have stabilized.
    pub fixed_point_budget: u32,
    /// Number of backward branches a single compile-time evaluation may take.
    pub backward_branch_quota: u32,
    /// Maximum nesting of compile-time function calls.
    pub comptime_call_depth: u32,
    pub eliminate_dead_instructions: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            fixed_point_budget: 8,
            backward_branch_quota: 1000,
            comptime_call_depth: 64,
            eliminate_dead_instructions: true,
        }
    }
}

/// Compilation-wide state shared by generation and analysis.
pub struct IrContext<'ta> {
    pub types: TypeTable<'ta>,
    pub options: AnalysisOptions,
}

impl<'ta> IrContext<'ta> {
    pub fn new(types: TypeTable<'ta>, options: AnalysisOptions) -> Self {
        Self { types, options }
    }
}
