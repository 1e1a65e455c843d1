//! Command line driver for the ember compiler.
//!
//! The driver strings the compiler stages together into a [`pipeline::Pipeline`] and decides what
//! intermediate results are printed along the way.

pub mod operations;
pub mod pipeline;
pub mod query;
