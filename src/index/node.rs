//! Compact record types stored in the structural index's flat arrays.

use super::span::{Span, TextSpan};

/// Sentinel for "no node" (the root element's parent).
pub const NIL: u32 = u32::MAX;

pub mod elem_flags {
    /// Element was written as a self-closing tag.
    pub const IS_EMPTY: u8 = 0x01;
}

pub mod text_flags {
    /// Run contains `&` and needs entity decoding on access.
    pub const NEEDS_DECODE: u8 = 0x01;
    /// Run came from a CDATA section.
    pub const IS_CDATA: u8 = 0x02;
}

pub mod attr_flags {
    pub const NEEDS_DECODE: u8 = 0x01;
}

/// One element in document order. 28 bytes.
#[derive(Debug, Clone, Copy)]
pub struct IndexElement {
    /// Qualified name span (covers `prefix:local` when prefixed).
    pub name: Span,
    /// Byte length of the prefix within `name` (0 = no prefix).
    pub prefix_len: u16,
    /// Parent element index, or `NIL` for the root.
    pub parent: u32,
    /// Range into `children_data`.
    pub children_start: u32,
    pub children_len: u32,
    /// Range into `attrs`.
    pub attr_start: u32,
    pub attr_count: u16,
    pub flags: u8,
}

impl IndexElement {
    #[inline]
    pub fn new(name: Span, prefix_len: u16, parent: u32) -> Self {
        IndexElement {
            name,
            prefix_len,
            parent,
            children_start: 0,
            children_len: 0,
            attr_start: 0,
            attr_count: 0,
            flags: 0,
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent == NIL
    }

    /// Span of the prefix, when the name is prefixed.
    #[inline]
    pub fn prefix_span(&self) -> Option<Span> {
        (self.prefix_len > 0).then(|| Span::new(self.name.offset, self.prefix_len))
    }

    /// Span of the local part of the name.
    #[inline]
    pub fn local_span(&self) -> Span {
        if self.prefix_len == 0 {
            self.name
        } else {
            let skip = self.prefix_len + 1;
            Span::new(self.name.offset + skip as u32, self.name.len - skip)
        }
    }
}

/// One text or CDATA run. 16 bytes.
#[derive(Debug, Clone, Copy)]
pub struct IndexText {
    pub span: TextSpan,
    /// Parent element index, or `NIL` for document-level runs.
    pub parent: u32,
    pub flags: u8,
}

impl IndexText {
    #[inline]
    pub fn new(span: TextSpan, parent: u32, needs_decode: bool) -> Self {
        IndexText {
            span,
            parent,
            flags: if needs_decode { text_flags::NEEDS_DECODE } else { 0 },
        }
    }

    #[inline]
    pub fn cdata(span: TextSpan, parent: u32) -> Self {
        IndexText {
            span,
            parent,
            flags: text_flags::IS_CDATA,
        }
    }

    #[inline]
    pub fn needs_decode(&self) -> bool {
        self.flags & text_flags::NEEDS_DECODE != 0
    }

    #[inline]
    pub fn is_cdata(&self) -> bool {
        self.flags & text_flags::IS_CDATA != 0
    }
}

/// One attribute in document order. 14 bytes.
#[derive(Debug, Clone, Copy)]
pub struct IndexAttribute {
    pub name: Span,
    pub value: Span,
    pub flags: u8,
}

impl IndexAttribute {
    #[inline]
    pub fn new(name: Span, value: Span, needs_decode: bool) -> Self {
        IndexAttribute {
            name,
            value,
            flags: if needs_decode { attr_flags::NEEDS_DECODE } else { 0 },
        }
    }

    #[inline]
    pub fn needs_decode(&self) -> bool {
        self.flags & attr_flags::NEEDS_DECODE != 0
    }
}

/// The kind half of a [`ChildRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Element,
    Text,
    CData,
}

/// A tagged 32-bit child reference: 2 kind bits in the top, destination array
/// index in the low 30. Text and CData both index into `texts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRef(u32);

impl ChildRef {
    const KIND_SHIFT: u32 = 30;
    const INDEX_MASK: u32 = (1 << Self::KIND_SHIFT) - 1;

    const K_ELEMENT: u32 = 0;
    const K_TEXT: u32 = 1;
    const K_CDATA: u32 = 2;

    #[inline]
    pub const fn element(idx: u32) -> Self {
        debug_assert!(idx <= Self::INDEX_MASK);
        ChildRef(idx)
    }

    #[inline]
    pub const fn text(idx: u32) -> Self {
        debug_assert!(idx <= Self::INDEX_MASK);
        ChildRef(idx | (Self::K_TEXT << Self::KIND_SHIFT))
    }

    #[inline]
    pub const fn cdata(idx: u32) -> Self {
        debug_assert!(idx <= Self::INDEX_MASK);
        ChildRef(idx | (Self::K_CDATA << Self::KIND_SHIFT))
    }

    #[inline]
    pub fn kind(&self) -> ChildKind {
        match self.0 >> Self::KIND_SHIFT {
            Self::K_ELEMENT => ChildKind::Element,
            Self::K_TEXT => ChildKind::Text,
            _ => ChildKind::CData,
        }
    }

    #[inline]
    pub const fn index(&self) -> u32 {
        self.0 & Self::INDEX_MASK
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.0 >> Self::KIND_SHIFT == Self::K_ELEMENT
    }

    /// True for both plain text and CDATA (both live in `texts`).
    #[inline]
    pub fn is_text(&self) -> bool {
        !self.is_element()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes_stay_compact() {
        assert!(std::mem::size_of::<IndexElement>() <= 32);
        assert!(std::mem::size_of::<IndexText>() <= 16);
        assert!(std::mem::size_of::<IndexAttribute>() <= 16);
        assert_eq!(std::mem::size_of::<ChildRef>(), 4);
    }

    #[test]
    fn child_ref_tagging() {
        let e = ChildRef::element(42);
        assert_eq!(e.kind(), ChildKind::Element);
        assert_eq!(e.index(), 42);
        assert!(e.is_element());

        let t = ChildRef::text(7);
        assert_eq!(t.kind(), ChildKind::Text);
        assert_eq!(t.index(), 7);
        assert!(t.is_text());

        let c = ChildRef::cdata(9);
        assert_eq!(c.kind(), ChildKind::CData);
        assert_eq!(c.index(), 9);
        assert!(c.is_text());
    }

    #[test]
    fn prefix_spans() {
        // name "ns:item" at offset 10
        let e = IndexElement::new(Span::new(10, 7), 2, NIL);
        assert_eq!(e.prefix_span(), Some(Span::new(10, 2)));
        assert_eq!(e.local_span(), Span::new(13, 4));

        let plain = IndexElement::new(Span::new(5, 4), 0, NIL);
        assert_eq!(plain.prefix_span(), None);
        assert_eq!(plain.local_span(), Span::new(5, 4));
    }
}
