//! Error types for parsing, XPath compilation/evaluation, and streaming.
//!
//! Errors are values: no panics escape the library. `ParseError` carries the
//! byte offset of the violation where one is available.

use thiserror::Error;

/// A well-formedness or structural failure found while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("malformed markup at byte {0}")]
    MalformedMarkup(usize),

    #[error("invalid name at byte {offset}: {reason}")]
    BadName { offset: usize, reason: &'static str },

    #[error("unclosed tag at byte {0}")]
    UnclosedTag(usize),

    #[error("mismatched end tag at byte {offset}: expected </{expected}>, found </{found}>")]
    MismatchedEndTag {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("bad attribute at byte {offset}: {reason}")]
    BadAttribute { offset: usize, reason: &'static str },

    #[error("invalid character reference at byte {0}")]
    InvalidCharRef(usize),

    #[error("reference to undeclared entity at byte {0}")]
    UnknownEntity(usize),

    #[error("malformed comment at byte {offset}: {reason}")]
    BadComment { offset: usize, reason: &'static str },

    #[error("unterminated CDATA section at byte {0}")]
    BadCData(usize),

    #[error("malformed DOCTYPE at byte {offset}: {reason}")]
    BadDoctype { offset: usize, reason: &'static str },

    #[error("forbidden sequence at byte {offset}: {reason}")]
    ForbiddenSequence { offset: usize, reason: &'static str },

    #[error("invalid XML declaration at byte {offset}: {reason}")]
    BadXmlDecl { offset: usize, reason: &'static str },

    #[error("document structure error at byte {offset}: {reason}")]
    Structure { offset: usize, reason: &'static str },

    #[error("invalid encoding: {0}")]
    Encoding(String),
}

impl ParseError {
    /// Byte offset into the (prepared) input where the error was detected.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::UnexpectedEof(p)
            | ParseError::MalformedMarkup(p)
            | ParseError::UnclosedTag(p)
            | ParseError::InvalidCharRef(p)
            | ParseError::UnknownEntity(p)
            | ParseError::BadCData(p) => Some(*p),
            ParseError::BadName { offset, .. }
            | ParseError::MismatchedEndTag { offset, .. }
            | ParseError::BadAttribute { offset, .. }
            | ParseError::BadComment { offset, .. }
            | ParseError::BadDoctype { offset, .. }
            | ParseError::ForbiddenSequence { offset, .. }
            | ParseError::BadXmlDecl { offset, .. }
            | ParseError::Structure { offset, .. } => Some(*offset),
            ParseError::Encoding(_) => None,
        }
    }
}

/// A lexical or syntactic failure in an XPath expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("XPath syntax error at offset {position}: {message}")]
pub struct CompileError {
    pub message: String,
    /// Byte offset into the XPath source string.
    pub position: usize,
}

impl CompileError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        CompileError {
            message: message.into(),
            position,
        }
    }
}

/// A runtime failure while evaluating an XPath expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("variable references are not supported: ${0}")]
    Variable(String),

    #[error("id() is not supported: DTD processing is disabled")]
    IdDisabled,

    #[error("unknown function: {0}()")]
    UnknownFunction(String),

    #[error("{function}() {reason}")]
    Signature {
        function: &'static str,
        reason: &'static str,
    },

    #[error("expected a node-set, got {0}")]
    NotANodeSet(&'static str),
}

/// A latched failure of the streaming parser. Once any call returns one of
/// these, every subsequent `feed`/`finalize` returns the same error; elements
/// completed beforehand stay retrievable through `take`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("incomplete markup at end of stream ({0} bytes unconsumed)")]
    TruncatedInput(usize),

    #[error("end tag without matching start tag in stream")]
    UnbalancedEndTag,

    #[error("element capture still open at end of stream")]
    OpenCapture,

    #[error("streaming parser state corrupted")]
    State,
}
