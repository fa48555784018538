//! SAX-style event collection: an in-order event sequence for callback-style
//! consumers, with text and attribute values entity-decoded. No tree is
//! built; taking the events leaves nothing behind.

use crate::scan::entities::decode_to_string;
use crate::scan::{AttrSpan, Mode, ScanHandler, Scanner};
use crate::index::span::{Span, TextSpan};

#[derive(Debug, Clone, PartialEq)]
pub enum SaxEvent {
    StartElement {
        name: String,
        attributes: Vec<(String, String)>,
    },
    EndElement {
        name: String,
    },
    Characters(String),
    CData(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: Option<String>,
    },
}

pub struct SaxCollector<'a> {
    input: &'a [u8],
    events: Vec<SaxEvent>,
}

impl<'a> SaxCollector<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        SaxCollector {
            input,
            // Rough guess: one event per 30 bytes of markup-heavy input.
            events: Vec::with_capacity((input.len() / 30).max(16)),
        }
    }

    pub fn into_events(self) -> Vec<SaxEvent> {
        self.events
    }

    fn str_of(&self, span: Span) -> String {
        String::from_utf8_lossy(span.slice(self.input)).into_owned()
    }
}

impl ScanHandler for SaxCollector<'_> {
    fn start_element(&mut self, name: Span, _prefix_len: u16, attrs: &[AttrSpan], is_empty: bool) {
        let name = self.str_of(name);
        let attributes = attrs
            .iter()
            .map(|a| {
                let value = if a.needs_decode {
                    decode_to_string(a.value.slice(self.input))
                } else {
                    self.str_of(a.value)
                };
                (self.str_of(a.name), value)
            })
            .collect();
        self.events.push(SaxEvent::StartElement {
            name: name.clone(),
            attributes,
        });
        // Empty elements emit start then end, immediately.
        if is_empty {
            self.events.push(SaxEvent::EndElement { name });
        }
    }

    fn end_element(&mut self, name: Span) {
        let name = self.str_of(name);
        self.events.push(SaxEvent::EndElement { name });
    }

    fn text(&mut self, span: TextSpan, needs_decode: bool) {
        let content = if needs_decode {
            decode_to_string(span.slice(self.input))
        } else {
            String::from_utf8_lossy(span.slice(self.input)).into_owned()
        };
        self.events.push(SaxEvent::Characters(content));
    }

    fn cdata(&mut self, span: TextSpan) {
        let content = String::from_utf8_lossy(span.slice(self.input)).into_owned();
        self.events.push(SaxEvent::CData(content));
    }

    fn comment(&mut self, span: TextSpan) {
        let content = String::from_utf8_lossy(span.slice(self.input)).into_owned();
        self.events.push(SaxEvent::Comment(content));
    }

    fn processing_instruction(&mut self, target: Span, data: Option<TextSpan>) {
        let target = self.str_of(target);
        let data = data.map(|d| String::from_utf8_lossy(d.slice(self.input)).into_owned());
        self.events.push(SaxEvent::ProcessingInstruction { target, data });
    }
}

/// Parse (leniently) and return the document's events in order.
pub fn sax_parse(input: &[u8]) -> Vec<SaxEvent> {
    let mut collector = SaxCollector::new(input);
    let mut scanner = Scanner::new(input, Mode::Lenient);
    // Lenient scans recover rather than fail.
    let _ = scanner.scan(&mut collector);
    collector.into_events()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_text_element() {
        let events = sax_parse(b"<a>hello</a>");
        assert_eq!(
            events,
            vec![
                SaxEvent::StartElement {
                    name: "a".into(),
                    attributes: vec![],
                },
                SaxEvent::Characters("hello".into()),
                SaxEvent::EndElement { name: "a".into() },
            ]
        );
    }

    #[test]
    fn empty_element_emits_start_and_end() {
        let events = sax_parse(b"<root><child/></root>");
        assert_eq!(events.len(), 4);
        assert_eq!(events[1], SaxEvent::StartElement { name: "child".into(), attributes: vec![] });
        assert_eq!(events[2], SaxEvent::EndElement { name: "child".into() });
    }

    #[test]
    fn text_and_attributes_are_decoded() {
        let events = sax_parse(b"<a t=\"x&lt;y\">1 &amp; 2</a>");
        assert_eq!(
            events[0],
            SaxEvent::StartElement {
                name: "a".into(),
                attributes: vec![("t".into(), "x<y".into())],
            }
        );
        assert_eq!(events[1], SaxEvent::Characters("1 & 2".into()));
    }

    #[test]
    fn cdata_comment_and_pi() {
        let events = sax_parse(b"<r><!--c--><![CDATA[<x>]]><?t d?></r>");
        assert!(events.contains(&SaxEvent::Comment("c".into())));
        assert!(events.contains(&SaxEvent::CData("<x>".into())));
        assert!(events.contains(&SaxEvent::ProcessingInstruction {
            target: "t".into(),
            data: Some("d".into()),
        }));
    }
}
