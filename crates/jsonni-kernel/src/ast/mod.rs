//! Abstract syntax tree for query expressions.

pub mod sexpr;
mod types;

pub use types::*;
