//! The thirteen XPath 1.0 axes over the document-access capability.
//!
//! Every traversal uses an explicit work stack; document depth never touches
//! the call stack. Nodes come back in axis order: forward axes in document
//! order, reverse axes nearest-first, so `position()` inside predicates
//! counts along the axis direction.

use super::parser::{Axis, NodeTest};
use crate::doc::{DocumentAccess, NodeId, NodeKind};

pub fn axis_nodes<D: DocumentAccess>(doc: &D, ctx: NodeId, axis: Axis) -> Vec<NodeId> {
    match axis {
        Axis::Child => doc.children(ctx),
        Axis::Descendant => {
            let mut out = Vec::new();
            push_subtree(doc, ctx, &mut out);
            out
        }
        Axis::DescendantOrSelf => {
            let mut out = vec![ctx];
            push_subtree(doc, ctx, &mut out);
            out
        }
        Axis::Parent => doc.parent(ctx).into_iter().collect(),
        Axis::Ancestor => ancestors(doc, ctx),
        Axis::AncestorOrSelf => {
            let mut out = vec![ctx];
            out.extend(ancestors(doc, ctx));
            out
        }
        Axis::FollowingSibling => {
            let (sibs, pos) = siblings_of(doc, ctx);
            match pos {
                Some(p) => sibs[p + 1..].to_vec(),
                None => Vec::new(),
            }
        }
        Axis::PrecedingSibling => {
            let (sibs, pos) = siblings_of(doc, ctx);
            match pos {
                Some(p) => sibs[..p].iter().rev().copied().collect(),
                None => Vec::new(),
            }
        }
        Axis::Following => {
            let mut out = Vec::new();
            let mut node = ctx;
            while let Some(parent) = doc.parent(node) {
                let sibs = doc.children(parent);
                if let Some(p) = sibs.iter().position(|&s| s == node) {
                    for &s in &sibs[p + 1..] {
                        out.push(s);
                        push_subtree(doc, s, &mut out);
                    }
                }
                node = parent;
            }
            out
        }
        Axis::Preceding => {
            // Reverse document order: nearest preceding subtree first, its
            // document-last node first within it. Ancestors are excluded by
            // construction (only earlier siblings' subtrees are visited).
            let mut out = Vec::new();
            let mut node = ctx;
            while let Some(parent) = doc.parent(node) {
                let sibs = doc.children(parent);
                if let Some(p) = sibs.iter().position(|&s| s == node) {
                    for &s in sibs[..p].iter().rev() {
                        let mut sub = vec![s];
                        push_subtree(doc, s, &mut sub);
                        out.extend(sub.into_iter().rev());
                    }
                }
                node = parent;
            }
            out
        }
        Axis::SelfAxis => vec![ctx],
        Axis::Attribute => doc.attribute_nodes(ctx),
        // Namespace nodes are not representable through the capability; the
        // axis is empty by documented limitation.
        Axis::Namespace => Vec::new(),
    }
}

/// Append the subtree below `root` in document order (root excluded).
fn push_subtree<D: DocumentAccess>(doc: &D, root: NodeId, out: &mut Vec<NodeId>) {
    let mut stack = doc.children(root);
    stack.reverse();
    while let Some(n) = stack.pop() {
        out.push(n);
        let kids = doc.children(n);
        stack.extend(kids.into_iter().rev());
    }
}

/// Ancestors, nearest first (axis order for the reverse `ancestor` axis).
fn ancestors<D: DocumentAccess>(doc: &D, ctx: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut node = ctx;
    while let Some(p) = doc.parent(node) {
        out.push(p);
        node = p;
    }
    out
}

fn siblings_of<D: DocumentAccess>(doc: &D, ctx: NodeId) -> (Vec<NodeId>, Option<usize>) {
    match doc.parent(ctx) {
        Some(parent) => {
            let sibs = doc.children(parent);
            let pos = sibs.iter().position(|&s| s == ctx);
            (sibs, pos)
        }
        None => (Vec::new(), None),
    }
}

/// Does `id` pass the step's node test? `principal` is the axis's principal
/// node kind: attributes for the attribute axis, elements otherwise.
pub fn test_matches<D: DocumentAccess>(
    doc: &D,
    id: NodeId,
    test: &NodeTest,
    principal: NodeKind,
) -> bool {
    match test {
        NodeTest::Node => true,
        NodeTest::Text => doc.node_kind(id) == NodeKind::Text,
        NodeTest::Comment => doc.node_kind(id) == NodeKind::Comment,
        NodeTest::Pi(target) => {
            doc.node_kind(id) == NodeKind::Pi
                && target
                    .as_deref()
                    .map_or(true, |t| doc.name(id) == Some(t))
        }
        NodeTest::Any => doc.node_kind(id) == principal,
        NodeTest::Name(n) => {
            doc.node_kind(id) == principal && doc.local_name(id) == Some(n.as_str())
        }
        NodeTest::Prefixed(p, l) => {
            doc.node_kind(id) == principal
                && doc.prefix(id) == Some(p.as_str())
                && doc.local_name(id) == Some(l.as_str())
        }
        NodeTest::PrefixWild(p) => {
            doc.node_kind(id) == principal && doc.prefix(id) == Some(p.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::build_index;
    use crate::index::{DocView, StructuralIndex};
    use crate::scan::Mode;

    fn build(xml: &[u8]) -> StructuralIndex {
        build_index(xml.to_vec(), Mode::Lenient).unwrap()
    }

    fn names<D: DocumentAccess>(doc: &D, nodes: &[NodeId]) -> Vec<String> {
        nodes
            .iter()
            .map(|&n| doc.name(n).unwrap_or("#text").to_string())
            .collect()
    }

    #[test]
    fn child_and_descendant() {
        let idx = build(b"<r><a><b/></a><c/></r>");
        let view = DocView::new(&idx);
        let root = view.root_element().unwrap();
        assert_eq!(names(&view, &axis_nodes(&view, root, Axis::Child)), ["a", "c"]);
        assert_eq!(
            names(&view, &axis_nodes(&view, root, Axis::Descendant)),
            ["a", "b", "c"]
        );
        let dos = axis_nodes(&view, root, Axis::DescendantOrSelf);
        assert_eq!(names(&view, &dos), ["r", "a", "b", "c"]);
    }

    #[test]
    fn ancestor_is_nearest_first() {
        let idx = build(b"<r><a><b><c/></b></a></r>");
        let view = DocView::new(&idx);
        let mut n = view.root_element().unwrap();
        for _ in 0..3 {
            n = view.children(n)[0];
        }
        assert_eq!(view.name(n), Some("c"));
        let anc = axis_nodes(&view, n, Axis::Ancestor);
        // b, a, r, then the document node (unnamed).
        assert_eq!(names(&view, &anc), ["b", "a", "r", "#text"]);
        assert_eq!(view.node_kind(anc[3]), NodeKind::Root);
    }

    #[test]
    fn sibling_axes() {
        let idx = build(b"<r><a/><b/><c/><d/></r>");
        let view = DocView::new(&idx);
        let kids = view.children(view.root_element().unwrap());
        let c = kids[2];
        assert_eq!(
            names(&view, &axis_nodes(&view, c, Axis::FollowingSibling)),
            ["d"]
        );
        // Reverse order: nearest first.
        assert_eq!(
            names(&view, &axis_nodes(&view, c, Axis::PrecedingSibling)),
            ["b", "a"]
        );
    }

    #[test]
    fn following_and_preceding() {
        let idx = build(b"<r><a><x/></a><b/><c><y/></c></r>");
        let view = DocView::new(&idx);
        let kids = view.children(view.root_element().unwrap());
        let b = kids[1];
        assert_eq!(
            names(&view, &axis_nodes(&view, b, Axis::Following)),
            ["c", "y"]
        );
        // Preceding is in reverse document order and excludes ancestors.
        assert_eq!(
            names(&view, &axis_nodes(&view, b, Axis::Preceding)),
            ["x", "a"]
        );
    }

    #[test]
    fn attribute_axis_and_principal_kind() {
        let idx = build(b"<r a=\"1\" b=\"2\"/>");
        let view = DocView::new(&idx);
        let root = view.root_element().unwrap();
        let attrs = axis_nodes(&view, root, Axis::Attribute);
        assert_eq!(names(&view, &attrs), ["a", "b"]);
        // '*' on the attribute axis matches attributes, not elements.
        assert!(test_matches(&view, attrs[0], &NodeTest::Any, NodeKind::Attribute));
        assert!(!test_matches(&view, attrs[0], &NodeTest::Any, NodeKind::Element));
    }

    #[test]
    fn name_test_matches_local_name() {
        let idx = build(b"<r xmlns:n=\"u\"><n:item/><item/></r>");
        let view = DocView::new(&idx);
        let kids = view.children(view.root_element().unwrap());
        let test = NodeTest::Name("item".into());
        assert!(test_matches(&view, kids[0], &test, NodeKind::Element));
        assert!(test_matches(&view, kids[1], &test, NodeKind::Element));
        let prefixed = NodeTest::Prefixed("n".into(), "item".into());
        assert!(test_matches(&view, kids[0], &prefixed, NodeKind::Element));
        assert!(!test_matches(&view, kids[1], &prefixed, NodeKind::Element));
    }
}
