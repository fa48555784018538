//! The tokenizing scanner.
//!
//! Alternates between text and markup phases, classifies each construct by
//! the bytes after `<`, and dispatches span events to a [`ScanHandler`].
//! Strict mode enforces the XML 1.0 well-formedness constraints inline and
//! returns the first violation; lenient mode recovers wherever the grammar
//! allows a salvageable interpretation. An end-tag mismatch stops the scan in
//! both modes (lenient returns what was built up to that point).

use super::cursor::Cursor;
use super::entities::{self, RefCheck};
use super::names;
use crate::error::ParseError;
use crate::index::span::{Span, TextSpan};

/// Enforcement level for well-formedness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Strict,
    Lenient,
}

/// An attribute's name and value spans, as they appear in the input.
#[derive(Debug, Clone, Copy)]
pub struct AttrSpan {
    pub name: Span,
    pub value: Span,
    /// Set when the value contains `&` and needs entity decoding on access.
    pub needs_decode: bool,
}

/// Receiver for scan events. Spans reference the scanner's input buffer.
pub trait ScanHandler {
    /// `prefix_len` is the byte length of the namespace prefix within `name`
    /// (0 when the name has no prefix).
    fn start_element(&mut self, name: Span, prefix_len: u16, attrs: &[AttrSpan], is_empty: bool);
    fn end_element(&mut self, name: Span);
    fn text(&mut self, span: TextSpan, needs_decode: bool);
    fn cdata(&mut self, span: TextSpan);
    fn comment(&mut self, _span: TextSpan) {}
    fn processing_instruction(&mut self, _target: Span, _data: Option<TextSpan>) {}
    fn xml_declaration(&mut self, _attrs: &[AttrSpan]) {}
    fn doctype(&mut self) {}
}

pub struct Scanner<'a> {
    input: &'a [u8],
    cur: Cursor<'a>,
    mode: Mode,
    /// Reused attribute buffer, cleared per tag.
    attrs: Vec<AttrSpan>,
    /// Name spans of currently open elements.
    open: Vec<Span>,
    seen_root: bool,
    seen_doctype: bool,
    /// Lenient-mode stop flag (set on an end-tag mismatch).
    halted: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a [u8], mode: Mode) -> Self {
        Scanner {
            input,
            cur: Cursor::new(input),
            mode,
            attrs: Vec::with_capacity(8),
            open: Vec::with_capacity(16),
            seen_root: false,
            seen_doctype: false,
            halted: false,
        }
    }

    #[inline]
    fn strict(&self) -> bool {
        self.mode == Mode::Strict
    }

    /// Scan the whole document, dispatching events to `handler`.
    pub fn scan<H: ScanHandler>(&mut self, handler: &mut H) -> Result<(), ParseError> {
        while !self.halted && !self.cur.is_eof() {
            if self.cur.peek() == Some(b'<') {
                self.scan_markup(handler)?;
            } else {
                self.scan_text(handler)?;
            }
        }
        if self.strict() {
            if let Some(top) = self.open.last() {
                return Err(ParseError::UnclosedTag(top.offset as usize));
            }
            if !self.seen_root {
                return Err(ParseError::Structure {
                    offset: self.input.len(),
                    reason: "document has no root element",
                });
            }
        }
        Ok(())
    }

    fn scan_text<H: ScanHandler>(&mut self, handler: &mut H) -> Result<(), ParseError> {
        let start = self.cur.pos();
        let mut needs_decode = false;
        loop {
            match self.cur.find_text_break() {
                None => {
                    self.cur.set_pos(self.input.len());
                    break;
                }
                Some(p) => match self.input[p] {
                    b'<' => {
                        self.cur.set_pos(p);
                        break;
                    }
                    b'&' => {
                        needs_decode = true;
                        if self.strict() {
                            match entities::check_reference(&self.input[p..]) {
                                RefCheck::Ok(n) => self.cur.set_pos(p + n),
                                RefCheck::BadCharRef => {
                                    return Err(ParseError::InvalidCharRef(p))
                                }
                                RefCheck::Unknown => return Err(ParseError::UnknownEntity(p)),
                                RefCheck::Bare => {
                                    return Err(ParseError::ForbiddenSequence {
                                        offset: p,
                                        reason: "bare '&' in character data",
                                    })
                                }
                            }
                        } else {
                            self.cur.set_pos(p + 1);
                        }
                    }
                    _ => {
                        // ']'
                        if self.strict() && self.input[p..].starts_with(b"]]>") {
                            return Err(ParseError::ForbiddenSequence {
                                offset: p,
                                reason: "']]>' not allowed in character data",
                            });
                        }
                        self.cur.set_pos(p + 1);
                    }
                },
            }
        }
        let end = self.cur.pos();
        if end > start {
            if self.strict() && self.open.is_empty() {
                let run = &self.input[start..end];
                if !run.iter().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')) {
                    return Err(ParseError::Structure {
                        offset: start,
                        reason: if self.seen_root {
                            "content not allowed after the root element"
                        } else {
                            "text content not allowed before the root element"
                        },
                    });
                }
            }
            handler.text(TextSpan::new(start as u32, (end - start) as u32), needs_decode);
        }
        Ok(())
    }

    fn scan_markup<H: ScanHandler>(&mut self, handler: &mut H) -> Result<(), ParseError> {
        let start = self.cur.pos();
        match self.cur.peek_at(1) {
            Some(b'/') => self.scan_end_tag(handler, start),
            Some(b'!') => {
                if self.cur.starts_with(b"<!--") {
                    self.scan_comment(handler, start)
                } else if self.cur.starts_with(b"<![CDATA[") {
                    self.scan_cdata(handler, start)
                } else if self.input[start + 2..]
                    .get(..7)
                    .is_some_and(|s| s.eq_ignore_ascii_case(b"DOCTYPE"))
                {
                    self.scan_doctype(handler, start)
                } else if self.strict() {
                    Err(ParseError::MalformedMarkup(start))
                } else {
                    self.skip_to_tag_end(start);
                    Ok(())
                }
            }
            Some(b'?') => self.scan_pi(handler, start),
            Some(c) if names::is_ascii_name_start(c) || c >= 0x80 => {
                self.scan_start_tag(handler, start)
            }
            Some(_) => {
                if self.strict() {
                    Err(ParseError::MalformedMarkup(start))
                } else {
                    // Not markup after all: emit the '<' as literal text and
                    // let the text phase pick up from the next byte.
                    handler.text(TextSpan::new(start as u32, 1), false);
                    self.cur.advance(1);
                    Ok(())
                }
            }
            None => {
                if self.strict() {
                    Err(ParseError::UnexpectedEof(self.input.len()))
                } else {
                    handler.text(TextSpan::new(start as u32, 1), false);
                    self.cur.advance(1);
                    Ok(())
                }
            }
        }
    }

    fn scan_start_tag<H: ScanHandler>(
        &mut self,
        handler: &mut H,
        start: usize,
    ) -> Result<(), ParseError> {
        self.cur.set_pos(start + 1);
        let name_start = self.cur.pos();
        let name = match self.cur.read_name() {
            Some(n) => n,
            None => {
                if self.strict() {
                    return Err(ParseError::BadName {
                        offset: name_start,
                        reason: "element name must start with a letter, '_', or ':'",
                    });
                }
                handler.text(TextSpan::new(start as u32, 1), false);
                self.cur.set_pos(start + 1);
                return Ok(());
            }
        };
        if self.strict() {
            names::validate_name(name).map_err(|reason| ParseError::BadName {
                offset: name_start,
                reason,
            })?;
        }
        let name_span = span_for(name_start, self.cur.pos());
        let prefix_len = prefix_len_of(name);

        self.attrs.clear();
        loop {
            self.cur.skip_whitespace();
            match self.cur.peek() {
                None => {
                    if self.strict() {
                        return Err(ParseError::UnclosedTag(start));
                    }
                    return Ok(());
                }
                Some(b'>') => {
                    self.cur.advance(1);
                    return self.open_element(handler, name_span, prefix_len, false, start);
                }
                Some(b'/') => {
                    if self.cur.peek_at(1) == Some(b'>') {
                        self.cur.advance(2);
                        return self.open_element(handler, name_span, prefix_len, true, start);
                    }
                    if self.strict() {
                        return Err(ParseError::MalformedMarkup(self.cur.pos()));
                    }
                    self.cur.advance(1);
                }
                Some(c) if names::is_ascii_name_start(c) || c >= 0x80 => {
                    self.scan_attribute()?;
                }
                Some(_) => {
                    if self.strict() {
                        return Err(ParseError::BadAttribute {
                            offset: self.cur.pos(),
                            reason: "expected attribute name, '>' or '/>'",
                        });
                    }
                    self.cur.advance(1);
                }
            }
        }
    }

    fn open_element<H: ScanHandler>(
        &mut self,
        handler: &mut H,
        name_span: Span,
        prefix_len: u16,
        is_empty: bool,
        tag_start: usize,
    ) -> Result<(), ParseError> {
        if self.open.is_empty() {
            if self.seen_root && self.strict() {
                return Err(ParseError::Structure {
                    offset: tag_start,
                    reason: "content not allowed after the root element",
                });
            }
            self.seen_root = true;
        }
        handler.start_element(name_span, prefix_len, &self.attrs, is_empty);
        if !is_empty {
            self.open.push(name_span);
        }
        Ok(())
    }

    fn scan_attribute(&mut self) -> Result<(), ParseError> {
        let name_start = self.cur.pos();
        let name = match self.cur.read_name() {
            Some(n) => n,
            None => {
                self.cur.advance(1);
                return Ok(());
            }
        };
        if self.strict() {
            names::validate_name(name).map_err(|reason| ParseError::BadName {
                offset: name_start,
                reason,
            })?;
            for a in &self.attrs {
                if a.name.slice(self.input) == name {
                    return Err(ParseError::BadAttribute {
                        offset: name_start,
                        reason: "duplicate attribute name",
                    });
                }
            }
        }
        let name_span = span_for(name_start, self.cur.pos());

        self.cur.skip_whitespace();
        if self.cur.peek() != Some(b'=') {
            if self.strict() {
                return Err(ParseError::BadAttribute {
                    offset: self.cur.pos(),
                    reason: "expected '=' after attribute name",
                });
            }
            // Valueless attribute in lenient mode.
            self.attrs.push(AttrSpan {
                name: name_span,
                value: Span::empty(),
                needs_decode: false,
            });
            return Ok(());
        }
        self.cur.advance(1);
        self.cur.skip_whitespace();

        let quote = match self.cur.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => {
                if self.strict() {
                    return Err(ParseError::BadAttribute {
                        offset: self.cur.pos(),
                        reason: "attribute value must be quoted",
                    });
                }
                // Unquoted value: run to whitespace or tag end.
                let vstart = self.cur.pos();
                while let Some(b) = self.cur.peek() {
                    if matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/') {
                        break;
                    }
                    self.cur.advance(1);
                }
                self.attrs.push(AttrSpan {
                    name: name_span,
                    value: span_for(vstart, self.cur.pos()),
                    needs_decode: self.input[vstart..self.cur.pos()].contains(&b'&'),
                });
                return Ok(());
            }
        };
        self.cur.advance(1);
        let vstart = self.cur.pos();
        let mut needs_decode = false;
        loop {
            match self.cur.find_value_break(quote) {
                None => {
                    if self.strict() {
                        return Err(ParseError::BadAttribute {
                            offset: vstart,
                            reason: "unterminated attribute value",
                        });
                    }
                    self.cur.set_pos(self.input.len());
                    break;
                }
                Some(p) if self.input[p] == quote => {
                    self.cur.set_pos(p);
                    break;
                }
                Some(p) if self.input[p] == b'<' => {
                    if self.strict() {
                        return Err(ParseError::BadAttribute {
                            offset: p,
                            reason: "'<' not allowed in attribute value",
                        });
                    }
                    self.cur.set_pos(p + 1);
                }
                Some(p) => {
                    needs_decode = true;
                    if self.strict() {
                        match entities::check_reference(&self.input[p..]) {
                            RefCheck::Ok(n) => self.cur.set_pos(p + n),
                            RefCheck::BadCharRef => return Err(ParseError::InvalidCharRef(p)),
                            RefCheck::Unknown => return Err(ParseError::UnknownEntity(p)),
                            RefCheck::Bare => {
                                return Err(ParseError::BadAttribute {
                                    offset: p,
                                    reason: "bare '&' in attribute value",
                                })
                            }
                        }
                    } else {
                        self.cur.set_pos(p + 1);
                    }
                }
            }
        }
        let vend = self.cur.pos();
        if self.cur.peek() == Some(quote) {
            self.cur.advance(1);
        }
        self.attrs.push(AttrSpan {
            name: name_span,
            value: span_for(vstart, vend),
            needs_decode,
        });
        Ok(())
    }

    fn scan_end_tag<H: ScanHandler>(
        &mut self,
        handler: &mut H,
        start: usize,
    ) -> Result<(), ParseError> {
        self.cur.set_pos(start + 2);
        let name_start = self.cur.pos();
        let name = match self.cur.read_name() {
            Some(n) => n,
            None => {
                if self.strict() {
                    return Err(ParseError::BadName {
                        offset: name_start,
                        reason: "invalid end tag name",
                    });
                }
                self.skip_to_tag_end(start);
                return Ok(());
            }
        };
        if self.strict() {
            names::validate_name(name).map_err(|reason| ParseError::BadName {
                offset: name_start,
                reason,
            })?;
        }
        let name_span = span_for(name_start, self.cur.pos());
        self.cur.skip_whitespace();
        match self.cur.peek() {
            Some(b'>') => self.cur.advance(1),
            Some(_) if self.strict() => {
                return Err(ParseError::MalformedMarkup(self.cur.pos()))
            }
            None if self.strict() => return Err(ParseError::UnexpectedEof(self.input.len())),
            _ => self.skip_to_tag_end(self.cur.pos()),
        }

        match self.open.last().copied() {
            Some(top) => {
                if top.slice(self.input) != name {
                    if self.strict() {
                        return Err(ParseError::MismatchedEndTag {
                            expected: String::from_utf8_lossy(top.slice(self.input)).into_owned(),
                            found: String::from_utf8_lossy(name).into_owned(),
                            offset: start,
                        });
                    }
                    self.halted = true;
                    return Ok(());
                }
                self.open.pop();
                handler.end_element(name_span);
                Ok(())
            }
            None => {
                if self.strict() {
                    return Err(ParseError::Structure {
                        offset: start,
                        reason: "end tag without matching start tag",
                    });
                }
                self.halted = true;
                Ok(())
            }
        }
    }

    fn scan_comment<H: ScanHandler>(
        &mut self,
        handler: &mut H,
        start: usize,
    ) -> Result<(), ParseError> {
        let content_start = start + 4;
        let mut search = content_start;
        loop {
            self.cur.set_pos(search);
            match self.cur.find_byte(b'-') {
                None => {
                    if self.strict() {
                        return Err(ParseError::UnexpectedEof(self.input.len()));
                    }
                    handler.comment(text_span(content_start, self.input.len()));
                    self.cur.set_pos(self.input.len());
                    return Ok(());
                }
                Some(p) => {
                    if self.input.get(p + 1) == Some(&b'-') {
                        if self.input.get(p + 2) == Some(&b'>') {
                            handler.comment(text_span(content_start, p));
                            self.cur.set_pos(p + 3);
                            return Ok(());
                        }
                        if self.strict() {
                            return Err(ParseError::BadComment {
                                offset: p,
                                reason: "'--' not allowed inside a comment",
                            });
                        }
                    }
                    search = p + 1;
                }
            }
        }
    }

    fn scan_cdata<H: ScanHandler>(
        &mut self,
        handler: &mut H,
        start: usize,
    ) -> Result<(), ParseError> {
        if self.strict() && self.open.is_empty() {
            return Err(ParseError::Structure {
                offset: start,
                reason: "CDATA section not allowed outside the root element",
            });
        }
        let content_start = start + 9;
        let mut search = content_start;
        loop {
            self.cur.set_pos(search);
            match self.cur.find_byte(b']') {
                None => {
                    if self.strict() {
                        return Err(ParseError::BadCData(start));
                    }
                    handler.cdata(text_span(content_start, self.input.len()));
                    self.cur.set_pos(self.input.len());
                    return Ok(());
                }
                Some(p) => {
                    if self.input[p..].starts_with(b"]]>") {
                        handler.cdata(text_span(content_start, p));
                        self.cur.set_pos(p + 3);
                        return Ok(());
                    }
                    search = p + 1;
                }
            }
        }
    }

    fn scan_pi<H: ScanHandler>(
        &mut self,
        handler: &mut H,
        start: usize,
    ) -> Result<(), ParseError> {
        self.cur.set_pos(start + 2);
        let tstart = self.cur.pos();
        let target = match self.cur.read_name() {
            Some(t) => t,
            None => {
                if self.strict() {
                    return Err(ParseError::BadName {
                        offset: tstart,
                        reason: "invalid processing instruction target",
                    });
                }
                self.skip_to_pi_end();
                return Ok(());
            }
        };
        if target.eq_ignore_ascii_case(b"xml") {
            if start == 0 && target == b"xml" {
                return self.scan_xml_declaration(handler);
            }
            if self.strict() {
                return Err(ParseError::Structure {
                    offset: tstart,
                    reason: "PI target 'xml' is only legal as the XML declaration at the start",
                });
            }
        }
        let target_span = span_for(tstart, self.cur.pos());
        self.cur.skip_whitespace();
        let dstart = self.cur.pos();
        loop {
            match self.cur.find_byte(b'?') {
                None => {
                    if self.strict() {
                        return Err(ParseError::UnexpectedEof(self.input.len()));
                    }
                    handler.processing_instruction(target_span, None);
                    self.cur.set_pos(self.input.len());
                    return Ok(());
                }
                Some(p) => {
                    if self.input.get(p + 1) == Some(&b'>') {
                        let data = (p > dstart).then(|| text_span(dstart, p));
                        handler.processing_instruction(target_span, data);
                        self.cur.set_pos(p + 2);
                        return Ok(());
                    }
                    self.cur.set_pos(p + 1);
                }
            }
        }
    }

    fn scan_xml_declaration<H: ScanHandler>(
        &mut self,
        handler: &mut H,
    ) -> Result<(), ParseError> {
        self.attrs.clear();
        loop {
            self.cur.skip_whitespace();
            if self.cur.starts_with(b"?>") {
                self.cur.advance(2);
                break;
            }
            match self.cur.peek() {
                None => {
                    if self.strict() {
                        return Err(ParseError::UnexpectedEof(self.input.len()));
                    }
                    break;
                }
                Some(c) if names::is_ascii_name_start(c) || c >= 0x80 => {
                    self.scan_attribute()?;
                }
                Some(_) => {
                    if self.strict() {
                        return Err(ParseError::BadXmlDecl {
                            offset: self.cur.pos(),
                            reason: "unexpected character in XML declaration",
                        });
                    }
                    self.cur.advance(1);
                }
            }
        }
        if self.strict() {
            let mut has_version = false;
            for a in &self.attrs {
                let name = a.name.slice(self.input);
                if name == b"version" {
                    has_version = true;
                } else if name == b"standalone" {
                    let v = a.value.slice(self.input);
                    if v != b"yes" && v != b"no" {
                        return Err(ParseError::BadXmlDecl {
                            offset: a.value.offset as usize,
                            reason: "standalone must be 'yes' or 'no'",
                        });
                    }
                }
            }
            if !has_version {
                return Err(ParseError::BadXmlDecl {
                    offset: 0,
                    reason: "XML declaration is missing the version attribute",
                });
            }
        }
        handler.xml_declaration(&self.attrs);
        Ok(())
    }

    fn scan_doctype<H: ScanHandler>(
        &mut self,
        handler: &mut H,
        start: usize,
    ) -> Result<(), ParseError> {
        if self.strict() {
            if self.seen_doctype {
                return Err(ParseError::BadDoctype {
                    offset: start,
                    reason: "multiple DOCTYPE declarations",
                });
            }
            if self.seen_root {
                return Err(ParseError::Structure {
                    offset: start,
                    reason: "DOCTYPE must precede the root element",
                });
            }
        }
        self.cur.set_pos(start + 9);
        // Skip balanced [ ] internal subsets and balanced < > markup inside
        // them without interpreting anything; quoted literals may contain '>'.
        let mut brackets: u32 = 0;
        let mut angles: u32 = 0;
        loop {
            match self.cur.peek() {
                None => {
                    if self.strict() {
                        return Err(ParseError::UnexpectedEof(self.input.len()));
                    }
                    break;
                }
                Some(b'"') | Some(b'\'') => {
                    let q = self.cur.peek().unwrap_or(b'"');
                    self.cur.advance(1);
                    match self.cur.find_byte(q) {
                        Some(p) => self.cur.set_pos(p + 1),
                        None => {
                            if self.strict() {
                                return Err(ParseError::BadDoctype {
                                    offset: self.cur.pos(),
                                    reason: "unterminated literal in DOCTYPE",
                                });
                            }
                            self.cur.set_pos(self.input.len());
                        }
                    }
                }
                Some(b'[') => {
                    brackets += 1;
                    self.cur.advance(1);
                }
                Some(b']') => {
                    if brackets == 0 && self.strict() {
                        return Err(ParseError::BadDoctype {
                            offset: self.cur.pos(),
                            reason: "unbalanced ']' in DOCTYPE",
                        });
                    }
                    brackets = brackets.saturating_sub(1);
                    self.cur.advance(1);
                }
                Some(b'<') if brackets > 0 => {
                    angles += 1;
                    self.cur.advance(1);
                }
                Some(b'>') => {
                    if brackets == 0 && angles == 0 {
                        self.cur.advance(1);
                        self.seen_doctype = true;
                        handler.doctype();
                        return Ok(());
                    }
                    angles = angles.saturating_sub(1);
                    self.cur.advance(1);
                }
                Some(_) => self.cur.advance(1),
            }
        }
        // Lenient: ran off the end of an unterminated DOCTYPE.
        self.seen_doctype = true;
        handler.doctype();
        Ok(())
    }

    fn skip_to_tag_end(&mut self, start: usize) {
        self.cur.set_pos(start);
        match self.cur.find_tag_end_quoted() {
            Some(p) => self.cur.set_pos(p + 1),
            None => self.cur.set_pos(self.input.len()),
        }
    }

    fn skip_to_pi_end(&mut self) {
        loop {
            match self.cur.find_byte(b'?') {
                Some(p) if self.input.get(p + 1) == Some(&b'>') => {
                    self.cur.set_pos(p + 2);
                    return;
                }
                Some(p) => self.cur.set_pos(p + 1),
                None => {
                    self.cur.set_pos(self.input.len());
                    return;
                }
            }
        }
    }
}

#[inline]
fn span_for(start: usize, end: usize) -> Span {
    Span::new(start as u32, (end - start).min(u16::MAX as usize) as u16)
}

#[inline]
fn text_span(start: usize, end: usize) -> TextSpan {
    TextSpan::new(start as u32, (end - start) as u32)
}

/// Byte length of the prefix within a qualified name (0 when unprefixed).
/// A leading or trailing colon does not count as a prefix split.
fn prefix_len_of(name: &[u8]) -> u16 {
    match memchr::memchr(b':', name) {
        Some(p) if p > 0 && p + 1 < name.len() => p.min(u16::MAX as usize) as u16,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Events {
        starts: Vec<(String, usize, bool)>,
        ends: Vec<String>,
        texts: Vec<(String, bool)>,
        cdatas: Vec<String>,
        comments: Vec<String>,
        pis: Vec<String>,
        doctypes: usize,
        input: Vec<u8>,
    }

    impl Events {
        fn scan(input: &[u8], mode: Mode) -> Result<Events, ParseError> {
            let mut ev = Events {
                input: input.to_vec(),
                ..Events::default()
            };
            let mut scanner = Scanner::new(input, mode);
            scanner.scan(&mut ev)?;
            Ok(ev)
        }
        fn s(&self, span: Span) -> String {
            String::from_utf8_lossy(span.slice(&self.input)).into_owned()
        }
        fn t(&self, span: TextSpan) -> String {
            String::from_utf8_lossy(span.slice(&self.input)).into_owned()
        }
    }

    impl ScanHandler for Events {
        fn start_element(&mut self, name: Span, _p: u16, attrs: &[AttrSpan], is_empty: bool) {
            let name = String::from_utf8_lossy(name.slice(&self.input)).into_owned();
            self.starts.push((name, attrs.len(), is_empty));
        }
        fn end_element(&mut self, name: Span) {
            let name = self.s(name);
            self.ends.push(name);
        }
        fn text(&mut self, span: TextSpan, needs_decode: bool) {
            let t = self.t(span);
            self.texts.push((t, needs_decode));
        }
        fn cdata(&mut self, span: TextSpan) {
            let t = self.t(span);
            self.cdatas.push(t);
        }
        fn comment(&mut self, span: TextSpan) {
            let t = self.t(span);
            self.comments.push(t);
        }
        fn processing_instruction(&mut self, target: Span, _data: Option<TextSpan>) {
            let t = self.s(target);
            self.pis.push(t);
        }
        fn doctype(&mut self) {
            self.doctypes += 1;
        }
    }

    #[test]
    fn simple_document() {
        let ev = Events::scan(b"<root><a id=\"1\"/>text</root>", Mode::Strict).unwrap();
        assert_eq!(ev.starts, vec![("root".into(), 0, false), ("a".into(), 1, true)]);
        assert_eq!(ev.ends, vec!["root".to_string()]);
        assert_eq!(ev.texts, vec![("text".to_string(), false)]);
    }

    #[test]
    fn entity_sets_decode_flag() {
        let ev = Events::scan(b"<a>x &amp; y</a>", Mode::Strict).unwrap();
        assert_eq!(ev.texts, vec![("x &amp; y".to_string(), true)]);
    }

    #[test]
    fn comment_and_cdata() {
        let ev = Events::scan(
            b"<r><!-- note --><![CDATA[<raw>]]></r>",
            Mode::Strict,
        )
        .unwrap();
        assert_eq!(ev.comments, vec![" note ".to_string()]);
        assert_eq!(ev.cdatas, vec!["<raw>".to_string()]);
    }

    #[test]
    fn doctype_with_internal_subset() {
        let input = b"<!DOCTYPE r [<!ENTITY e \"v\"> <!ELEMENT r ANY>]><r/>";
        let ev = Events::scan(input, Mode::Strict).unwrap();
        assert_eq!(ev.doctypes, 1);
        assert_eq!(ev.starts.len(), 1);
    }

    #[test]
    fn doctype_with_gt_in_literal() {
        let input = b"<!DOCTYPE r SYSTEM \"a>b\"><r/>";
        let ev = Events::scan(input, Mode::Strict).unwrap();
        assert_eq!(ev.doctypes, 1);
        assert_eq!(ev.starts.len(), 1);
    }

    #[test]
    fn strict_rejects_mismatched_end_tag() {
        let err = Events::scan(b"<a><b></a></b>", Mode::Strict).unwrap_err();
        assert!(matches!(err, ParseError::MismatchedEndTag { .. }));
    }

    #[test]
    fn lenient_halts_on_mismatch_without_error() {
        let ev = Events::scan(b"<a><b></a>", Mode::Lenient).unwrap();
        assert_eq!(ev.starts.len(), 2);
        assert!(ev.ends.is_empty());
    }

    #[test]
    fn strict_rejects_duplicate_attribute() {
        let err = Events::scan(b"<a x=\"1\" x=\"2\"/>", Mode::Strict).unwrap_err();
        assert!(matches!(err, ParseError::BadAttribute { .. }));
    }

    #[test]
    fn strict_rejects_double_hyphen_in_comment() {
        let err = Events::scan(b"<r><!-- a -- b --></r>", Mode::Strict).unwrap_err();
        assert!(matches!(err, ParseError::BadComment { .. }));
        let err = Events::scan(b"<r><!-- a ---></r>", Mode::Strict).unwrap_err();
        assert!(matches!(err, ParseError::BadComment { .. }));
    }

    #[test]
    fn strict_rejects_cdata_close_in_text() {
        let err = Events::scan(b"<r>a ]]> b</r>", Mode::Strict).unwrap_err();
        assert!(matches!(err, ParseError::ForbiddenSequence { .. }));
    }

    #[test]
    fn strict_rejects_multiple_roots() {
        let err = Events::scan(b"<a/><b/>", Mode::Strict).unwrap_err();
        assert!(matches!(err, ParseError::Structure { .. }));
    }

    #[test]
    fn strict_rejects_unknown_entity() {
        let err = Events::scan(b"<a>&nope;</a>", Mode::Strict).unwrap_err();
        assert!(matches!(err, ParseError::UnknownEntity(_)));
    }

    #[test]
    fn strict_rejects_bad_char_ref() {
        let err = Events::scan(b"<a>&#x0;</a>", Mode::Strict).unwrap_err();
        assert!(matches!(err, ParseError::InvalidCharRef(_)));
    }

    #[test]
    fn strict_rejects_reserved_pi_target() {
        let err = Events::scan(b"<a><?xml version=\"1.0\"?></a>", Mode::Strict).unwrap_err();
        assert!(matches!(err, ParseError::Structure { .. }));
    }

    #[test]
    fn xml_declaration_at_start_is_accepted() {
        let ev = Events::scan(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><r/>", Mode::Strict)
            .unwrap();
        assert_eq!(ev.starts.len(), 1);
    }

    #[test]
    fn strict_validates_standalone() {
        let err = Events::scan(
            b"<?xml version=\"1.0\" standalone=\"maybe\"?><r/>",
            Mode::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::BadXmlDecl { .. }));
    }

    #[test]
    fn strict_rejects_unclosed_tag() {
        let err = Events::scan(b"<a><b>", Mode::Strict).unwrap_err();
        assert!(matches!(err, ParseError::UnclosedTag(_)));
    }

    #[test]
    fn lenient_treats_bad_markup_as_text() {
        let ev = Events::scan(b"<1invalid/>", Mode::Lenient).unwrap();
        assert!(ev.starts.is_empty());
        assert!(!ev.texts.is_empty());
    }

    #[test]
    fn lenient_mixes_bad_and_good_markup() {
        let ev = Events::scan(b"<1bad/><good/>", Mode::Lenient).unwrap();
        assert_eq!(ev.starts.len(), 1);
        assert_eq!(ev.starts[0].0, "good");
    }

    #[test]
    fn prefix_split() {
        assert_eq!(prefix_len_of(b"ns:local"), 2);
        assert_eq!(prefix_len_of(b"plain"), 0);
        assert_eq!(prefix_len_of(b":odd"), 0);
        assert_eq!(prefix_len_of(b"odd:"), 0);
    }
}
