//! Context assembly for reply generation.

pub mod assembler;

pub use assembler::{AssembledContext, ContextAssembler};
