//! The document-access capability the XPath engine evaluates against.
//!
//! Any representation that can answer these questions can be queried: the
//! structural index does (see `index::view`), and the test suite carries a
//! plain in-memory tree to keep the engine honest about depending on nothing
//! else.

use std::borrow::Cow;
use std::cmp::Ordering;

/// Opaque node handle. The meaning of the bits belongs to the representation
/// that issued it; callers only pass it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The document root (parent of the root element).
    Root,
    Element,
    Text,
    Attribute,
    Comment,
    Pi,
}

pub trait DocumentAccess {
    /// The document root node.
    fn document(&self) -> NodeId;

    /// The outermost element, when the document has one.
    fn root_element(&self) -> Option<NodeId>;

    fn node_kind(&self, id: NodeId) -> NodeKind;

    fn parent(&self, id: NodeId) -> Option<NodeId>;

    /// Child nodes in document order. Attributes are not children.
    fn children(&self, id: NodeId) -> Vec<NodeId>;

    /// Attribute nodes of an element, in document order.
    fn attribute_nodes(&self, id: NodeId) -> Vec<NodeId>;

    /// Qualified name (elements, attributes) or target (PIs).
    fn name(&self, id: NodeId) -> Option<&str>;

    fn local_name(&self, id: NodeId) -> Option<&str>;

    fn prefix(&self, id: NodeId) -> Option<&str>;

    /// Resolved namespace URI of an element or attribute, when the
    /// representation carries namespace declarations.
    fn namespace_uri(&self, id: NodeId) -> Option<Cow<'_, str>>;

    /// Decoded attribute value looked up by qualified name on an element.
    fn attribute(&self, id: NodeId, name: &str) -> Option<Cow<'_, str>>;

    /// Decoded content of a text, CDATA, comment, or attribute node.
    fn text_content(&self, id: NodeId) -> Option<Cow<'_, str>>;

    /// Total order over all nodes of the document.
    fn document_order(&self, a: NodeId, b: NodeId) -> Ordering;

    /// XPath string-value. Elements and the root concatenate descendant text
    /// with an explicit stack; no recursion, arbitrarily deep input is fine.
    fn string_value(&self, id: NodeId) -> String {
        match self.node_kind(id) {
            NodeKind::Element | NodeKind::Root => {
                let mut out = String::new();
                let mut stack: Vec<NodeId> = self.children(id);
                stack.reverse();
                while let Some(n) = stack.pop() {
                    match self.node_kind(n) {
                        NodeKind::Text => {
                            if let Some(t) = self.text_content(n) {
                                out.push_str(&t);
                            }
                        }
                        NodeKind::Element => {
                            let kids = self.children(n);
                            stack.extend(kids.into_iter().rev());
                        }
                        _ => {}
                    }
                }
                out
            }
            _ => self
                .text_content(id)
                .map(Cow::into_owned)
                .unwrap_or_default(),
        }
    }
}

/// Namespace URI bound to the reserved `xml` prefix.
pub const XML_NS_URI: &str = "http://www.w3.org/XML/1998/namespace";

#[cfg(test)]
pub(crate) mod memtree {
    //! A boxed-node tree used only by tests, proving the XPath engine needs
    //! nothing beyond the DocumentAccess capability.

    use super::*;

    pub struct MemNode {
        pub kind: NodeKind,
        pub name: String,
        pub value: String,
        pub parent: Option<u32>,
        pub children: Vec<u32>,
        pub attrs: Vec<u32>,
    }

    pub struct MemTree {
        nodes: Vec<MemNode>,
    }

    impl MemTree {
        pub fn new() -> Self {
            MemTree {
                nodes: vec![MemNode {
                    kind: NodeKind::Root,
                    name: String::new(),
                    value: String::new(),
                    parent: None,
                    children: Vec::new(),
                    attrs: Vec::new(),
                }],
            }
        }

        pub fn root(&self) -> NodeId {
            NodeId(0)
        }

        fn push(&mut self, node: MemNode) -> NodeId {
            let id = self.nodes.len() as u32;
            self.nodes.push(node);
            id_of(id)
        }

        pub fn elem(&mut self, parent: NodeId, name: &str) -> NodeId {
            let id = self.push(MemNode {
                kind: NodeKind::Element,
                name: name.to_string(),
                value: String::new(),
                parent: Some(parent.0),
                children: Vec::new(),
                attrs: Vec::new(),
            });
            self.nodes[parent.0 as usize].children.push(id.0);
            id
        }

        pub fn text(&mut self, parent: NodeId, content: &str) -> NodeId {
            let id = self.push(MemNode {
                kind: NodeKind::Text,
                name: String::new(),
                value: content.to_string(),
                parent: Some(parent.0),
                children: Vec::new(),
                attrs: Vec::new(),
            });
            self.nodes[parent.0 as usize].children.push(id.0);
            id
        }

        pub fn attr(&mut self, elem: NodeId, name: &str, value: &str) -> NodeId {
            let id = self.push(MemNode {
                kind: NodeKind::Attribute,
                name: name.to_string(),
                value: value.to_string(),
                parent: Some(elem.0),
                children: Vec::new(),
                attrs: Vec::new(),
            });
            self.nodes[elem.0 as usize].attrs.push(id.0);
            id
        }

        fn node(&self, id: NodeId) -> &MemNode {
            &self.nodes[id.0 as usize]
        }
    }

    fn id_of(raw: u32) -> NodeId {
        NodeId(raw)
    }

    impl DocumentAccess for MemTree {
        fn document(&self) -> NodeId {
            NodeId(0)
        }

        fn root_element(&self) -> Option<NodeId> {
            self.nodes[0]
                .children
                .iter()
                .copied()
                .map(id_of)
                .find(|&c| self.node(c).kind == NodeKind::Element)
        }

        fn node_kind(&self, id: NodeId) -> NodeKind {
            self.node(id).kind
        }

        fn parent(&self, id: NodeId) -> Option<NodeId> {
            self.node(id).parent.map(id_of)
        }

        fn children(&self, id: NodeId) -> Vec<NodeId> {
            self.node(id).children.iter().copied().map(id_of).collect()
        }

        fn attribute_nodes(&self, id: NodeId) -> Vec<NodeId> {
            self.node(id).attrs.iter().copied().map(id_of).collect()
        }

        fn name(&self, id: NodeId) -> Option<&str> {
            let n = self.node(id);
            match n.kind {
                NodeKind::Element | NodeKind::Attribute | NodeKind::Pi => Some(&n.name),
                _ => None,
            }
        }

        fn local_name(&self, id: NodeId) -> Option<&str> {
            self.name(id)
                .map(|n| n.split_once(':').map_or(n, |(_, local)| local))
        }

        fn prefix(&self, id: NodeId) -> Option<&str> {
            self.name(id).and_then(|n| n.split_once(':').map(|(p, _)| p))
        }

        fn namespace_uri(&self, _id: NodeId) -> Option<Cow<'_, str>> {
            None
        }

        fn attribute(&self, id: NodeId, name: &str) -> Option<Cow<'_, str>> {
            self.node(id)
                .attrs
                .iter()
                .map(|&a| self.node(id_of(a)))
                .find(|a| a.name == name)
                .map(|a| Cow::Borrowed(a.value.as_str()))
        }

        fn text_content(&self, id: NodeId) -> Option<Cow<'_, str>> {
            let n = self.node(id);
            match n.kind {
                NodeKind::Text | NodeKind::Attribute | NodeKind::Comment => {
                    Some(Cow::Borrowed(n.value.as_str()))
                }
                _ => None,
            }
        }

        fn document_order(&self, a: NodeId, b: NodeId) -> Ordering {
            a.0.cmp(&b.0)
        }
    }

    #[test]
    fn string_value_concatenates_descendants() {
        let mut t = MemTree::new();
        let root = t.root();
        let r = t.elem(root, "r");
        t.text(r, "a");
        let b = t.elem(r, "b");
        t.text(b, "c");
        t.text(r, "d");
        assert_eq!(t.string_value(r), "acd");
        assert_eq!(t.string_value(t.document()), "acd");
    }
}
