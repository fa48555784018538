//! The structural index: a compact flat-array representation of a parsed
//! document, every string a span into the owned input buffer.

pub mod builder;
pub mod node;
pub mod span;
pub mod structural;
pub mod view;

pub use node::{ChildKind, ChildRef, IndexAttribute, IndexElement, IndexText, NIL};
pub use span::{Span, TextSpan};
pub use structural::StructuralIndex;
pub use view::DocView;
