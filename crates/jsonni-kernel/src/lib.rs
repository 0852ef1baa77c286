//! jsonni-kernel: query and conversion core of jsonni.
//!
//! This crate provides:
//!
//! - **Lexer**: Tokenizes query text using logos
//! - **Parser**: Recursive-descent parser for the expression language
//! - **AST**: Expression types and an S-expression printer for tests
//! - **Interpreter**: Sandboxed evaluator with step and depth budgets
//! - **Capabilities**: The `_` utility namespace, the `from` sequence builder
//!   and the intrinsic globals
//! - **Dialect**: Classifies a query and binds the matching capability
//! - **Reader / Format**: JSON, relaxed literal and CSV/TSV in; JSON, literal
//!   dump and CSV/TSV out
//! - **Pipeline**: Ties the stages together with typed errors
//! - **Config**: TOML defaults from `~/.config/jsonni/config.toml`

pub mod ast;
pub mod capabilities;
pub mod config;
pub mod dialect;
pub mod format;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod reader;
pub mod value;

pub use config::Config;
pub use dialect::{Dialect, QueryPlan};
pub use format::{DataFormat, FormatError, OutputSpec, format_result};
pub use interpreter::{EvalError, EvalResult, Evaluator, Limits};
pub use pipeline::{Options, Pipeline, PipelineError};
pub use reader::{InputKind, InputSpec, NormalizedInput, read_input};
pub use value::Value;
