//! The structural index: flat arrays of elements, texts, and attributes, all
//! referencing the owned input buffer by span. Immutable once built; the
//! arrays and the buffer are dropped as one unit.

use super::node::{ChildRef, IndexAttribute, IndexElement, IndexText, NIL};
use crate::scan::entities;
use std::borrow::Cow;

#[derive(Debug, Default)]
pub struct StructuralIndex {
    input: Vec<u8>,
    pub(crate) elements: Vec<IndexElement>,
    pub(crate) texts: Vec<IndexText>,
    pub(crate) attrs: Vec<IndexAttribute>,
    pub(crate) children_data: Vec<ChildRef>,
    pub(crate) root: Option<u32>,
    pub(crate) has_doctype: bool,
}

impl StructuralIndex {
    /// Advisory pre-reservation from the input size; growth stays geometric.
    pub(crate) fn with_input_capacity(input_len: usize) -> Self {
        StructuralIndex {
            input: Vec::new(),
            elements: Vec::with_capacity((input_len / 50).max(16)),
            texts: Vec::with_capacity((input_len / 40).max(16)),
            attrs: Vec::with_capacity((input_len / 30).max(16)),
            children_data: Vec::with_capacity((input_len / 25).max(16)),
            root: None,
            has_doctype: false,
        }
    }

    #[inline]
    pub fn input(&self) -> &[u8] {
        &self.input
    }

    pub(crate) fn set_input(&mut self, input: Vec<u8>) {
        self.input = input;
    }

    #[inline]
    pub fn root(&self) -> Option<u32> {
        self.root
    }

    #[inline]
    pub fn has_doctype(&self) -> bool {
        self.has_doctype
    }

    #[inline]
    pub fn element(&self, idx: u32) -> Option<&IndexElement> {
        self.elements.get(idx as usize)
    }

    #[inline]
    pub fn text(&self, idx: u32) -> Option<&IndexText> {
        self.texts.get(idx as usize)
    }

    #[inline]
    pub fn attr(&self, idx: u32) -> Option<&IndexAttribute> {
        self.attrs.get(idx as usize)
    }

    #[inline]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn text_count(&self) -> usize {
        self.texts.len()
    }

    #[inline]
    pub fn attr_count(&self) -> usize {
        self.attrs.len()
    }

    /// Qualified name of an element.
    pub fn element_name(&self, idx: u32) -> Option<&str> {
        self.element(idx)?.name.as_str(&self.input)
    }

    /// Local name of an element (after the prefix, if any).
    pub fn element_local_name(&self, idx: u32) -> Option<&str> {
        self.element(idx)?.local_span().as_str(&self.input)
    }

    /// Children of an element, in document order.
    pub fn children(&self, idx: u32) -> &[ChildRef] {
        match self.element(idx) {
            Some(e) => {
                let start = e.children_start as usize;
                let end = start + e.children_len as usize;
                self.children_data.get(start..end).unwrap_or(&[])
            }
            None => &[],
        }
    }

    /// Attributes of an element, in document order.
    pub fn attributes(&self, idx: u32) -> &[IndexAttribute] {
        match self.element(idx) {
            Some(e) => {
                let start = e.attr_start as usize;
                let end = start + e.attr_count as usize;
                self.attrs.get(start..end).unwrap_or(&[])
            }
            None => &[],
        }
    }

    /// Raw (undecoded) bytes of an attribute value, looked up by name.
    pub fn attribute_raw(&self, elem: u32, name: &str) -> Option<&[u8]> {
        let name = name.as_bytes();
        self.attributes(elem)
            .iter()
            .find(|a| a.name.slice(&self.input) == name)
            .map(|a| a.value.slice(&self.input))
    }

    /// Decoded attribute value, looked up by name. Borrows when the value has
    /// no entity references.
    pub fn attribute_value(&self, elem: u32, name: &str) -> Option<Cow<'_, str>> {
        let name = name.as_bytes();
        let attr = self
            .attributes(elem)
            .iter()
            .find(|a| a.name.slice(&self.input) == name)?;
        Some(self.decode_attr(attr))
    }

    pub(crate) fn decode_attr(&self, attr: &IndexAttribute) -> Cow<'_, str> {
        let raw = attr.value.slice(&self.input);
        if attr.needs_decode() {
            Cow::Owned(entities::decode_to_string(raw))
        } else {
            String::from_utf8_lossy(raw)
        }
    }

    /// Decoded content of a text node.
    pub fn text_content(&self, idx: u32) -> Option<Cow<'_, str>> {
        let t = self.text(idx)?;
        let raw = t.span.slice(&self.input);
        Some(if t.needs_decode() {
            Cow::Owned(entities::decode_to_string(raw))
        } else {
            String::from_utf8_lossy(raw)
        })
    }

    #[inline]
    pub fn parent(&self, idx: u32) -> Option<u32> {
        let e = self.element(idx)?;
        (e.parent != NIL).then_some(e.parent)
    }
}
