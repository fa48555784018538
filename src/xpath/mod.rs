//! XPath 1.0: lexer, parser, compiler (with a shared LRU cache of compiled
//! expressions), the thirteen axes, the core function library, and the
//! evaluator. Generic over [`crate::doc::DocumentAccess`].

pub mod axes;
pub mod compiler;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

pub use eval::{evaluate, evaluate_from};
pub use parser::Axis;
pub use value::Value;
