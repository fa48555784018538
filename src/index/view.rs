//! `DocView`: the DocumentAccess implementation over a structural index.
//!
//! NodeIds carry a 2-bit kind tag (element / text / attribute) over the
//! destination array index, plus one reserved id for the document node.
//! Document order falls out of byte offsets: every node kind stores an offset
//! into the same input buffer.

use super::node::{ChildKind, NIL};
use super::structural::StructuralIndex;
use crate::doc::{DocumentAccess, NodeId, NodeKind, XML_NS_URI};
use std::borrow::Cow;
use std::cmp::Ordering;

const KIND_SHIFT: u32 = 30;
const INDEX_MASK: u32 = (1 << KIND_SHIFT) - 1;
const TAG_ELEMENT: u32 = 0;
const TAG_TEXT: u32 = 1;
const TAG_ATTR: u32 = 2;
/// The document node: tag 3, index 0.
const DOCUMENT_ID: u32 = 3 << KIND_SHIFT;

#[inline]
fn elem_id(idx: u32) -> NodeId {
    NodeId(idx)
}

#[inline]
fn text_id(idx: u32) -> NodeId {
    NodeId(idx | (TAG_TEXT << KIND_SHIFT))
}

#[inline]
fn attr_id(idx: u32) -> NodeId {
    NodeId(idx | (TAG_ATTR << KIND_SHIFT))
}

#[inline]
fn tag_of(id: NodeId) -> u32 {
    id.0 >> KIND_SHIFT
}

#[inline]
fn index_of(id: NodeId) -> u32 {
    id.0 & INDEX_MASK
}

pub struct DocView<'a> {
    index: &'a StructuralIndex,
}

impl<'a> DocView<'a> {
    pub fn new(index: &'a StructuralIndex) -> Self {
        DocView { index }
    }

    fn child_to_id(child: super::node::ChildRef) -> NodeId {
        match child.kind() {
            ChildKind::Element => elem_id(child.index()),
            ChildKind::Text | ChildKind::CData => text_id(child.index()),
        }
    }

    /// The element owning attribute `idx`. Attribute ranges partition the
    /// attrs array in element order, so a binary search on `attr_start`
    /// lands at (or just past) the owner.
    fn attr_owner(&self, idx: u32) -> Option<u32> {
        let elements = &self.index.elements;
        let p = elements.partition_point(|e| e.attr_start <= idx);
        for i in (0..p).rev() {
            let e = &elements[i];
            if e.attr_count > 0 {
                let start = e.attr_start;
                let end = start + e.attr_count as u32;
                return (idx >= start && idx < end).then_some(i as u32);
            }
            // Zero-attr elements share attr_start with the next element.
        }
        None
    }

    /// Resolve a namespace prefix (or the default namespace for `prefix`
    /// None) by walking `xmlns` declarations from `elem` to the root.
    fn resolve_ns(&self, mut elem: u32, prefix: Option<&[u8]>) -> Option<Cow<'a, str>> {
        let mut target = Vec::with_capacity(6 + prefix.map_or(0, <[u8]>::len));
        match prefix {
            Some(p) => {
                target.extend_from_slice(b"xmlns:");
                target.extend_from_slice(p);
            }
            None => target.extend_from_slice(b"xmlns"),
        }
        loop {
            for a in self.index.attributes(elem) {
                if a.name.slice(self.index.input()) == target.as_slice() {
                    let value = self.index.decode_attr(a);
                    // An empty default namespace undeclares it.
                    if prefix.is_none() && value.is_empty() {
                        return None;
                    }
                    return Some(value);
                }
            }
            match self.index.element(elem)?.parent {
                NIL => return None,
                p => elem = p,
            }
        }
    }

    fn order_key(&self, id: NodeId) -> u64 {
        let (offset, rank) = match tag_of(id) {
            TAG_ELEMENT => (
                self.index
                    .element(index_of(id))
                    .map_or(0, |e| e.name.offset),
                1u64,
            ),
            TAG_TEXT => (
                self.index.text(index_of(id)).map_or(0, |t| t.span.offset),
                3u64,
            ),
            TAG_ATTR => (
                self.index.attr(index_of(id)).map_or(0, |a| a.name.offset),
                2u64,
            ),
            _ => (0, 0u64),
        };
        ((offset as u64) << 2) | rank
    }
}

impl<'a> DocumentAccess for DocView<'a> {
    fn document(&self) -> NodeId {
        NodeId(DOCUMENT_ID)
    }

    fn root_element(&self) -> Option<NodeId> {
        self.index.root().map(elem_id)
    }

    fn node_kind(&self, id: NodeId) -> NodeKind {
        match tag_of(id) {
            TAG_ELEMENT => NodeKind::Element,
            TAG_TEXT => NodeKind::Text,
            TAG_ATTR => NodeKind::Attribute,
            _ => NodeKind::Root,
        }
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        match tag_of(id) {
            TAG_ELEMENT => {
                let idx = index_of(id);
                match self.index.element(idx)?.parent {
                    NIL => (self.index.root() == Some(idx)).then(|| self.document()),
                    p => Some(elem_id(p)),
                }
            }
            TAG_TEXT => {
                let t = self.index.text(index_of(id))?;
                (t.parent != NIL).then(|| elem_id(t.parent))
            }
            TAG_ATTR => self.attr_owner(index_of(id)).map(elem_id),
            _ => None,
        }
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        match tag_of(id) {
            TAG_ELEMENT => self
                .index
                .children(index_of(id))
                .iter()
                .map(|&c| Self::child_to_id(c))
                .collect(),
            TAG_TEXT | TAG_ATTR => Vec::new(),
            _ => self.root_element().into_iter().collect(),
        }
    }

    fn attribute_nodes(&self, id: NodeId) -> Vec<NodeId> {
        if tag_of(id) != TAG_ELEMENT {
            return Vec::new();
        }
        let idx = index_of(id);
        match self.index.element(idx) {
            Some(e) => (e.attr_start..e.attr_start + e.attr_count as u32)
                .map(attr_id)
                .collect(),
            None => Vec::new(),
        }
    }

    fn name(&self, id: NodeId) -> Option<&str> {
        match tag_of(id) {
            TAG_ELEMENT => self.index.element_name(index_of(id)),
            TAG_ATTR => self.index.attr(index_of(id))?.name.as_str(self.index.input()),
            _ => None,
        }
    }

    fn local_name(&self, id: NodeId) -> Option<&str> {
        match tag_of(id) {
            TAG_ELEMENT => self.index.element_local_name(index_of(id)),
            TAG_ATTR => {
                let name = self.index.attr(index_of(id))?.name.as_str(self.index.input())?;
                Some(name.split_once(':').map_or(name, |(_, l)| l))
            }
            _ => None,
        }
    }

    fn prefix(&self, id: NodeId) -> Option<&str> {
        match tag_of(id) {
            TAG_ELEMENT => {
                let e = self.index.element(index_of(id))?;
                e.prefix_span()?.as_str(self.index.input())
            }
            TAG_ATTR => {
                let name = self.index.attr(index_of(id))?.name.as_str(self.index.input())?;
                name.split_once(':').map(|(p, _)| p)
            }
            _ => None,
        }
    }

    fn namespace_uri(&self, id: NodeId) -> Option<Cow<'_, str>> {
        match tag_of(id) {
            TAG_ELEMENT => {
                let idx = index_of(id);
                let e = self.index.element(idx)?;
                match e.prefix_span() {
                    Some(p) => {
                        let prefix = p.slice(self.index.input());
                        if prefix == b"xml" {
                            return Some(Cow::Borrowed(XML_NS_URI));
                        }
                        self.resolve_ns(idx, Some(prefix))
                    }
                    None => self.resolve_ns(idx, None),
                }
            }
            TAG_ATTR => {
                let idx = index_of(id);
                let a = self.index.attr(idx)?;
                let name = a.name.slice(self.index.input());
                let colon = memchr::memchr(b':', name)?;
                let prefix = &name[..colon];
                if prefix == b"xml" {
                    return Some(Cow::Borrowed(XML_NS_URI));
                }
                let owner = self.attr_owner(idx)?;
                self.resolve_ns(owner, Some(prefix))
            }
            _ => None,
        }
    }

    fn attribute(&self, id: NodeId, name: &str) -> Option<Cow<'_, str>> {
        if tag_of(id) != TAG_ELEMENT {
            return None;
        }
        self.index.attribute_value(index_of(id), name)
    }

    fn text_content(&self, id: NodeId) -> Option<Cow<'_, str>> {
        match tag_of(id) {
            TAG_TEXT => self.index.text_content(index_of(id)),
            TAG_ATTR => {
                let a = self.index.attr(index_of(id))?;
                Some(self.index.decode_attr(a))
            }
            _ => None,
        }
    }

    fn document_order(&self, a: NodeId, b: NodeId) -> Ordering {
        self.order_key(a).cmp(&self.order_key(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::build_index;
    use crate::scan::Mode;

    fn build(xml: &[u8]) -> StructuralIndex {
        build_index(xml.to_vec(), Mode::Lenient).unwrap()
    }

    #[test]
    fn navigation_round_trip() {
        let idx = build(b"<root><a/><b>t</b></root>");
        let view = DocView::new(&idx);
        let doc = view.document();
        assert_eq!(view.node_kind(doc), NodeKind::Root);

        let root = view.root_element().unwrap();
        assert_eq!(view.name(root), Some("root"));
        assert_eq!(view.parent(root), Some(doc));
        assert_eq!(view.children(doc), vec![root]);

        let kids = view.children(root);
        assert_eq!(kids.len(), 2);
        for &k in &kids {
            assert_eq!(view.parent(k), Some(root));
        }
        let b_kids = view.children(kids[1]);
        assert_eq!(b_kids.len(), 1);
        assert_eq!(view.node_kind(b_kids[0]), NodeKind::Text);
        assert_eq!(view.text_content(b_kids[0]).as_deref(), Some("t"));
    }

    #[test]
    fn attribute_nodes_have_owner_and_value() {
        let idx = build(b"<r><a x=\"1\"/><b/><c y=\"2\" z=\"3\"/></r>");
        let view = DocView::new(&idx);
        let root = view.root_element().unwrap();
        let kids = view.children(root);

        let a_attrs = view.attribute_nodes(kids[0]);
        assert_eq!(a_attrs.len(), 1);
        assert_eq!(view.name(a_attrs[0]), Some("x"));
        assert_eq!(view.text_content(a_attrs[0]).as_deref(), Some("1"));
        assert_eq!(view.parent(a_attrs[0]), Some(kids[0]));
        assert_eq!(view.node_kind(a_attrs[0]), NodeKind::Attribute);

        assert!(view.attribute_nodes(kids[1]).is_empty());

        let c_attrs = view.attribute_nodes(kids[2]);
        assert_eq!(c_attrs.len(), 2);
        assert_eq!(view.parent(c_attrs[1]), Some(kids[2]));
        assert_eq!(view.name(c_attrs[1]), Some("z"));
    }

    #[test]
    fn document_order_spans_node_kinds() {
        let idx = build(b"<r>one<a k=\"v\"/>two</r>");
        let view = DocView::new(&idx);
        let root = view.root_element().unwrap();
        let kids = view.children(root);
        let attr = view.attribute_nodes(kids[1])[0];

        assert_eq!(view.document_order(view.document(), root), Ordering::Less);
        assert_eq!(view.document_order(root, kids[0]), Ordering::Less);
        assert_eq!(view.document_order(kids[0], kids[1]), Ordering::Less);
        assert_eq!(view.document_order(kids[1], attr), Ordering::Less);
        assert_eq!(view.document_order(attr, kids[2]), Ordering::Less);
        assert_eq!(view.document_order(kids[2], kids[2]), Ordering::Equal);
    }

    #[test]
    fn namespace_resolution() {
        let idx = build(
            b"<r xmlns=\"urn:d\" xmlns:p=\"urn:p\"><p:c/><plain/><p:c p:a=\"1\" b=\"2\"/></r>",
        );
        let view = DocView::new(&idx);
        let root = view.root_element().unwrap();
        let kids = view.children(root);

        assert_eq!(view.namespace_uri(root).as_deref(), Some("urn:d"));
        assert_eq!(view.namespace_uri(kids[0]).as_deref(), Some("urn:p"));
        // Unprefixed child inherits the default namespace.
        assert_eq!(view.namespace_uri(kids[1]).as_deref(), Some("urn:d"));

        let attrs = view.attribute_nodes(kids[2]);
        assert_eq!(view.namespace_uri(attrs[0]).as_deref(), Some("urn:p"));
        // Unprefixed attributes are in no namespace.
        assert_eq!(view.namespace_uri(attrs[1]), None);
    }

    #[test]
    fn string_value_of_element() {
        let idx = build(b"<r>a<b>c<d/>e</b>f</r>");
        let view = DocView::new(&idx);
        let root = view.root_element().unwrap();
        assert_eq!(view.string_value(root), "acef");
        assert_eq!(view.string_value(view.document()), "acef");
    }
}
