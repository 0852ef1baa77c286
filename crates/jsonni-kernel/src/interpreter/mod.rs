//! Sandboxed evaluator for query expressions.
//!
//! - [`Scope`] holds variable bindings, `$input` first
//! - [`Evaluator`] reduces expressions under a step and depth budget
//! - native methods give arrays, strings and numbers their usual JavaScript
//!   behavior
//!
//! Nothing here touches the filesystem, the network or the environment:
//! a query can only compute a value from its input.

mod eval;
pub(crate) mod natives;
mod scope;

pub use eval::{EvalError, EvalResult, Evaluator, Limits};
pub use scope::{INPUT, Scope};
