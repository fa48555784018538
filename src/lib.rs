//! spanxml — span-based zero-copy XML parsing and XPath 1.0 queries.
//!
//! Three ways in:
//! - [`parse_strict`] / [`parse_lenient`]: build a [`Document`] (a structural
//!   index over the owned input buffer) and query it with XPath.
//! - [`StreamingParser`]: feed chunks, take back complete serialized elements
//!   matching a tag filter, under bounded memory.
//! - [`sax_parse`]: an in-order event sequence for callback-style consumers.
//!
//! ```
//! let doc = spanxml::parse_strict("<r><x>1</x><x>2</x><x>3</x></r>").unwrap();
//! match doc.xpath("sum(/r/x)").unwrap() {
//!     spanxml::Value::Number(n) => assert_eq!(n, 6.0),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```
//!
//! A parsed document is immutable; share it across threads freely. The only
//! shared mutable state in the crate is the compiled-XPath cache behind a
//! mutex. Only the five predefined entities and numeric character references
//! are ever expanded, and external entities are never fetched.

pub mod doc;
pub mod error;
pub mod index;
pub mod sax;
pub mod scan;
pub mod stream;
pub mod xpath;

pub use doc::{DocumentAccess, NodeId, NodeKind};
pub use error::{CompileError, EvalError, ParseError, StreamError};
pub use sax::{sax_parse, SaxEvent};
pub use stream::{FeedSummary, StreamingParser};
pub use xpath::Value;

use index::{DocView, StructuralIndex};
use scan::Mode;

/// A parsed, immutable XML document: the structural index plus the input
/// buffer it references.
#[derive(Debug)]
pub struct Document {
    index: StructuralIndex,
}

/// Parse in strict mode: the input is transcoded/normalized, then scanned
/// with every well-formedness constraint enforced. The first violation is
/// returned with its byte offset into the prepared input.
pub fn parse_strict(input: impl Into<Vec<u8>>) -> Result<Document, ParseError> {
    let bytes = scan::input::prepare(input.into())?;
    let index = index::builder::build_index(bytes, Mode::Strict)?;
    Ok(Document { index })
}

/// Parse in lenient mode: recoverable problems are skipped, nothing is ever
/// returned as an error, and malformed input yields a best-effort (possibly
/// empty) document.
pub fn parse_lenient(input: impl Into<Vec<u8>>) -> Document {
    let bytes = scan::input::prepare_lenient(input.into());
    let index = index::builder::build_index(bytes, Mode::Lenient)
        .expect("lenient scan does not fail");
    Document { index }
}

impl Document {
    /// The underlying structural index.
    pub fn index(&self) -> &StructuralIndex {
        &self.index
    }

    /// A document-access view for the XPath engine.
    pub fn view(&self) -> DocView<'_> {
        DocView::new(&self.index)
    }

    /// The root element's node id, when the document has one (lenient
    /// parsing of an empty document does not).
    pub fn root(&self) -> Option<NodeId> {
        self.view().root_element()
    }

    pub fn root_name(&self) -> Option<&str> {
        self.index.root().and_then(|r| self.index.element_name(r))
    }

    pub fn has_doctype(&self) -> bool {
        self.index.has_doctype()
    }

    /// Evaluate an XPath 1.0 expression with the document root as context.
    pub fn xpath(&self, expr: &str) -> Result<Value, EvalError> {
        xpath::evaluate(&self.view(), expr)
    }

    /// Evaluate relative to a context node obtained from an earlier query.
    pub fn xpath_from(&self, ctx: NodeId, expr: &str) -> Result<Value, EvalError> {
        xpath::evaluate_from(&self.view(), ctx, expr)
    }

    /// Fast path: the string-value of every node in a node-set result,
    /// without handing out node ids. Errors if the expression does not
    /// produce a node-set.
    pub fn xpath_text_list(&self, expr: &str) -> Result<Vec<String>, EvalError> {
        let view = self.view();
        match xpath::evaluate(&view, expr)? {
            Value::NodeSet(nodes) => {
                Ok(nodes.iter().map(|&n| view.string_value(n)).collect())
            }
            other => Err(EvalError::NotANodeSet(other.kind_name())),
        }
    }

    /// XPath string-value of a node (concatenated descendant text).
    pub fn string_value(&self, id: NodeId) -> String {
        self.view().string_value(id)
    }

    /// Qualified name of an element or attribute node.
    pub fn name(&self, id: NodeId) -> Option<String> {
        self.view().name(id).map(str::to_string)
    }

    /// Decoded attribute value on an element node.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.view().attribute(id, name).map(|v| v.into_owned())
    }

    /// Child node ids of an element (or of the document node).
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.view().children(id)
    }

    pub fn node_kind(&self, id: NodeId) -> NodeKind {
        self.view().node_kind(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_parse_and_root() {
        let doc = parse_strict("<root><a/></root>").unwrap();
        assert_eq!(doc.root_name(), Some("root"));
        assert!(doc.root().is_some());
    }

    #[test]
    fn strict_rejects_lenient_accepts() {
        assert!(parse_strict("<1invalid/>").is_err());
        let doc = parse_lenient("<1invalid/>");
        assert!(doc.root().is_none());
    }

    #[test]
    fn xpath_entry_points() {
        let doc = parse_strict("<r><i id=\"a\">1</i><i id=\"b\">2</i></r>").unwrap();
        assert_eq!(doc.xpath("count(//i)").unwrap(), Value::Number(2.0));
        assert_eq!(
            doc.xpath_text_list("//i/@id").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(matches!(
            doc.xpath_text_list("count(//i)"),
            Err(EvalError::NotANodeSet("number"))
        ));
    }

    #[test]
    fn xpath_from_context_node() {
        let doc = parse_strict("<r><a><b>x</b></a></r>").unwrap();
        let Value::NodeSet(nodes) = doc.xpath("//a").unwrap() else {
            panic!()
        };
        let v = doc.xpath_from(nodes[0], "string(b)").unwrap();
        assert_eq!(v, Value::String("x".into()));
    }

    #[test]
    fn utf16_input_parses() {
        let mut enc: Vec<u8> = vec![0xFF, 0xFE];
        for b in "<r><a>hi</a></r>".bytes() {
            enc.push(b);
            enc.push(0);
        }
        let doc = parse_strict(enc).unwrap();
        assert_eq!(doc.root_name(), Some("r"));
        assert_eq!(doc.xpath_text_list("/r/a").unwrap(), vec!["hi".to_string()]);
    }

    #[test]
    fn attribute_accessor() {
        let doc = parse_strict("<r k=\"v&amp;w\"/>").unwrap();
        let root = doc.root().unwrap();
        assert_eq!(doc.attribute(root, "k").as_deref(), Some("v&w"));
        assert_eq!(doc.name(root).as_deref(), Some("r"));
    }
}
