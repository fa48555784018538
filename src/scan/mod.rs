//! Byte-level scanning: cursor, name classes, entity decoding, input
//! preparation, and the event scanner with its strict-mode validator.

pub mod cursor;
pub mod entities;
pub mod input;
pub mod names;
pub mod scanner;

pub use scanner::{AttrSpan, Mode, ScanHandler, Scanner};
