//! Search Query Compiler and search execution.

pub mod compiler;
pub(crate) mod execute;

pub use compiler::{compile, CompiledQuery, FIELD_ANY};
