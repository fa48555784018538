//! Index builder: a [`ScanHandler`] that materializes a [`StructuralIndex`].
//!
//! Each open element carries a scratch list of child references; when its end
//! tag arrives the scratch entries are copied contiguously into
//! `children_data` and the element's range is sealed. Adjacent text runs
//! under the same parent coalesce into one node.

use super::node::{ChildRef, IndexAttribute, IndexElement, IndexText, NIL};
use super::span::{Span, TextSpan};
use super::structural::StructuralIndex;
use crate::error::ParseError;
use crate::scan::{AttrSpan, Mode, ScanHandler, Scanner};

struct OpenElement {
    index: u32,
    children: Vec<ChildRef>,
}

pub struct IndexBuilder {
    index: StructuralIndex,
    stack: Vec<OpenElement>,
    /// Scratch-list recycling; closing an element returns its list here.
    spare: Vec<Vec<ChildRef>>,
}

impl IndexBuilder {
    pub fn new(input_len: usize) -> Self {
        IndexBuilder {
            index: StructuralIndex::with_input_capacity(input_len),
            stack: Vec::with_capacity(32),
            spare: Vec::new(),
        }
    }

    /// Seal remaining open elements (lenient truncation) and attach the input
    /// buffer the spans refer to.
    pub fn finish(mut self, input: Vec<u8>) -> StructuralIndex {
        while let Some(open) = self.stack.pop() {
            self.seal(open);
        }
        self.index.set_input(input);
        self.index
    }

    fn seal(&mut self, open: OpenElement) {
        let start = self.index.children_data.len() as u32;
        let len = open.children.len() as u32;
        self.index.children_data.extend_from_slice(&open.children);
        let elem = &mut self.index.elements[open.index as usize];
        elem.children_start = start;
        elem.children_len = len;
        let mut list = open.children;
        list.clear();
        self.spare.push(list);
    }

    fn scratch(&mut self) -> Vec<ChildRef> {
        self.spare.pop().unwrap_or_default()
    }

    #[inline]
    fn parent_index(&self) -> u32 {
        self.stack.last().map_or(NIL, |o| o.index)
    }
}

impl ScanHandler for IndexBuilder {
    fn start_element(&mut self, name: Span, prefix_len: u16, attrs: &[AttrSpan], is_empty: bool) {
        let parent = self.parent_index();
        let mut elem = IndexElement::new(name, prefix_len, parent);

        // attr_start is set even for attribute-less elements so the ranges
        // stay monotonic across the elements array (the view's reverse
        // attribute-to-owner lookup binary-searches on it).
        elem.attr_start = self.index.attrs.len() as u32;
        if !attrs.is_empty() {
            elem.attr_count = attrs.len().min(u16::MAX as usize) as u16;
            for a in attrs {
                self.index
                    .attrs
                    .push(IndexAttribute::new(a.name, a.value, a.needs_decode));
            }
        }
        if is_empty {
            elem.flags |= super::node::elem_flags::IS_EMPTY;
            // No children; point at the current end of children_data.
            elem.children_start = self.index.children_data.len() as u32;
        }

        let idx = self.index.elements.len() as u32;
        self.index.elements.push(elem);
        if self.index.root.is_none() && parent == NIL {
            self.index.root = Some(idx);
        }
        if let Some(top) = self.stack.last_mut() {
            top.children.push(ChildRef::element(idx));
        }
        if !is_empty {
            let children = self.scratch();
            self.stack.push(OpenElement { index: idx, children });
        }
    }

    fn end_element(&mut self, _name: Span) {
        if let Some(open) = self.stack.pop() {
            self.seal(open);
        }
    }

    fn text(&mut self, span: TextSpan, needs_decode: bool) {
        let Some(top) = self.stack.last_mut() else {
            // Document-level whitespace is not indexed.
            return;
        };
        // Coalesce with an immediately preceding text run.
        if let Some(last) = top.children.last() {
            if last.kind() == super::node::ChildKind::Text {
                let t = &mut self.index.texts[last.index() as usize];
                if t.span.end() == span.offset {
                    t.span.len += span.len;
                    if needs_decode {
                        t.flags |= super::node::text_flags::NEEDS_DECODE;
                    }
                    return;
                }
            }
        }
        let parent = top.index;
        let idx = self.index.texts.len() as u32;
        self.index.texts.push(IndexText::new(span, parent, needs_decode));
        self.stack
            .last_mut()
            .expect("stack checked above")
            .children
            .push(ChildRef::text(idx));
    }

    fn cdata(&mut self, span: TextSpan) {
        let Some(top) = self.stack.last_mut() else {
            return;
        };
        let parent = top.index;
        let idx = self.index.texts.len() as u32;
        self.index.texts.push(IndexText::cdata(span, parent));
        top.children.push(ChildRef::cdata(idx));
    }

    // Comments and PIs are not part of the index; SAX consumers get them.

    fn doctype(&mut self) {
        self.index.has_doctype = true;
    }
}

/// Scan `input` and build the index in one pass. Strict mode returns the
/// first well-formedness violation; lenient mode always succeeds.
pub fn build_index(input: Vec<u8>, mode: Mode) -> Result<StructuralIndex, ParseError> {
    let mut builder = IndexBuilder::new(input.len());
    let mut scanner = Scanner::new(&input, mode);
    let result = scanner.scan(&mut builder);
    match mode {
        Mode::Strict => result?,
        Mode::Lenient => {}
    }
    Ok(builder.finish(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::node::ChildKind;

    fn lenient(xml: &[u8]) -> StructuralIndex {
        build_index(xml.to_vec(), Mode::Lenient).unwrap()
    }

    #[test]
    fn nested_structure() {
        let idx = lenient(b"<a><b><c/></b><d/></a>");
        assert_eq!(idx.element_count(), 4);
        assert_eq!(idx.children(0).len(), 2);
        assert_eq!(idx.parent(1), Some(0));
        assert_eq!(idx.parent(2), Some(1));
        assert_eq!(idx.parent(3), Some(0));
        assert_eq!(idx.parent(0), None);
    }

    #[test]
    fn parents_precede_children() {
        let idx = lenient(b"<a><b><c/><d/></b><e><f/></e></a>");
        for (i, e) in idx.elements.iter().enumerate() {
            if e.parent != super::NIL {
                assert!((e.parent as usize) < i);
            }
        }
    }

    #[test]
    fn adjacent_text_coalesces_around_entities() {
        // The scanner emits one text event here, but lenient recovery paths
        // can split runs; either way the builder must produce a single node.
        let idx = lenient(b"<a>one &amp; two</a>");
        assert_eq!(idx.text_count(), 1);
        assert!(idx.texts[0].needs_decode());
        assert_eq!(idx.text_content(0).as_deref(), Some("one & two"));
    }

    #[test]
    fn cdata_is_not_coalesced_with_text() {
        let idx = lenient(b"<a>x<![CDATA[y]]>z</a>");
        assert_eq!(idx.text_count(), 3);
        let kids = idx.children(0);
        assert_eq!(kids.len(), 3);
        assert_eq!(kids[1].kind(), ChildKind::CData);
    }

    #[test]
    fn empty_element_has_empty_children_range() {
        let idx = lenient(b"<a><b/></a>");
        assert_eq!(idx.children(1).len(), 0);
    }

    #[test]
    fn doctype_flag_recorded() {
        let idx = lenient(b"<!DOCTYPE a><a/>");
        assert!(idx.has_doctype());
        let idx = lenient(b"<a/>");
        assert!(!idx.has_doctype());
    }

    #[test]
    fn truncated_input_still_builds() {
        let idx = lenient(b"<a><b>unclosed");
        assert_eq!(idx.element_count(), 2);
        // The open elements were sealed with the children gathered so far.
        assert_eq!(idx.children(0).len(), 1);
        assert_eq!(idx.children(1).len(), 1);
    }

    #[test]
    fn strict_propagates_scanner_errors() {
        assert!(build_index(b"<a><b></a>".to_vec(), Mode::Strict).is_err());
        assert!(build_index(b"<1bad/>".to_vec(), Mode::Strict).is_err());
        assert!(build_index(b"<a/>".to_vec(), Mode::Strict).is_ok());
    }

    #[test]
    fn span_bounds_hold() {
        let idx = lenient(b"<root a=\"1\"><k>text</k><![CDATA[c]]></root>");
        let n = idx.input().len() as u32;
        for e in &idx.elements {
            assert!(e.name.end() <= n);
        }
        for t in &idx.texts {
            assert!(t.span.end() <= n);
        }
        for a in &idx.attrs {
            assert!(a.name.end() <= n && a.value.end() <= n);
        }
    }
}
