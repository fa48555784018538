//! Streaming element extraction under bounded memory.
//!
//! Feed arbitrary chunks; complete top-level elements matching the optional
//! tag filter come back as verbatim serialized bytes, in end-tag order. The
//! working set stays around one chunk plus the largest element in flight:
//! processed bytes are dropped from the buffer after every feed, and an
//! element spanning chunk boundaries accumulates into its capture frame as
//! the buffer compacts under it.
//!
//! The first fatal error latches: every later `feed`/`finalize` returns it,
//! while elements completed beforehand stay retrievable through `take`.

use crate::error::StreamError;
use memchr::memchr;
use std::collections::VecDeque;

/// What `feed` reports back: completed elements awaiting `take`, and the
/// residual buffer size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSummary {
    pub available: usize,
    pub buffered: usize,
}

struct Capture {
    /// Bytes of this element already compacted out of the buffer.
    acc: Vec<u8>,
    /// Stream-absolute offset of the first byte not yet accumulated.
    start: usize,
    /// Depth at which the element opened; its end tag closes at this depth.
    depth: usize,
}

pub struct StreamingParser {
    buf: Vec<u8>,
    /// Stream-absolute offset of `buf[0]`.
    base: usize,
    depth: usize,
    filter: Option<Vec<u8>>,
    capture: Option<Capture>,
    completed: VecDeque<Vec<u8>>,
    error: Option<StreamError>,
    finalized: bool,
}

impl StreamingParser {
    pub fn new() -> Self {
        StreamingParser {
            buf: Vec::with_capacity(8192),
            base: 0,
            depth: 0,
            filter: None,
            capture: None,
            completed: VecDeque::with_capacity(16),
            error: None,
            finalized: false,
        }
    }

    /// Only top-level elements with exactly this tag name are emitted.
    pub fn with_filter(tag: &[u8]) -> Self {
        let mut p = Self::new();
        p.filter = Some(tag.to_vec());
        p
    }

    pub fn available(&self) -> usize {
        self.completed.len()
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append a chunk and advance as far as complete constructs allow.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<FeedSummary, StreamError> {
        self.check_usable()?;
        self.buf.extend_from_slice(chunk);
        let consumed = self.run()?;
        self.compact(consumed);
        Ok(FeedSummary {
            available: self.completed.len(),
            buffered: self.buf.len(),
        })
    }

    /// Drain up to `max` completed elements, in end-tag order.
    pub fn take(&mut self, max: usize) -> Vec<Vec<u8>> {
        let n = max.min(self.completed.len());
        self.completed.drain(..n).collect()
    }

    /// Consume any remaining buffered input and drain the queue. Partial
    /// markup or a still-open capture at the end of the stream is fatal.
    pub fn finalize(&mut self) -> Result<Vec<Vec<u8>>, StreamError> {
        self.check_usable()?;
        self.finalized = true;
        let consumed = self.run()?;
        if consumed < self.buf.len() {
            let leftover = self.buf.len() - consumed;
            return Err(self.latch(StreamError::TruncatedInput(leftover)));
        }
        if self.capture.is_some() {
            return Err(self.latch(StreamError::OpenCapture));
        }
        self.buf.clear();
        Ok(self.completed.drain(..).collect())
    }

    fn check_usable(&self) -> Result<(), StreamError> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        if self.finalized {
            return Err(StreamError::State);
        }
        Ok(())
    }

    fn latch(&mut self, e: StreamError) -> StreamError {
        self.error = Some(e.clone());
        e
    }

    /// Drop the consumed prefix, first folding it into the open capture.
    fn compact(&mut self, consumed: usize) {
        if consumed == 0 {
            return;
        }
        if let Some(c) = &mut self.capture {
            let rel = c.start - self.base;
            if rel < consumed {
                c.acc.extend_from_slice(&self.buf[rel..consumed]);
                c.start = self.base + consumed;
            }
        }
        self.buf.drain(..consumed);
        self.base += consumed;
        self.buf.shrink_to(8192);
    }

    /// Process the buffer as far as complete constructs allow; returns the
    /// number of bytes consumed. Stops (without error) at the first construct
    /// whose terminator has not arrived yet.
    fn run(&mut self) -> Result<usize, StreamError> {
        let mut pos = 0;
        loop {
            let Some(rel) = memchr(b'<', &self.buf[pos..]) else {
                // Pure character data is always consumable; captures keep
                // their bytes through accumulation.
                return Ok(self.buf.len());
            };
            let lt = pos + rel;
            if lt + 1 >= self.buf.len() {
                return Ok(lt);
            }
            match self.buf[lt + 1] {
                b'/' => {
                    let Some(gt) = memchr(b'>', &self.buf[lt..]).map(|i| lt + i) else {
                        return Ok(lt);
                    };
                    if let Err(e) = self.close_element(gt + 1) {
                        return Err(self.latch(e));
                    }
                    pos = gt + 1;
                }
                b'!' => match self.bang_end(lt) {
                    BangScan::NeedMore => return Ok(lt),
                    BangScan::EndsAt(end) => pos = end,
                },
                b'?' => {
                    let Some(end) = find_seq(&self.buf, lt + 2, b"?>") else {
                        return Ok(lt);
                    };
                    pos = end + 2;
                }
                _ => {
                    let Some(gt) = find_tag_end_quoted(&self.buf, lt) else {
                        return Ok(lt);
                    };
                    let is_empty = gt > lt && self.buf[gt - 1] == b'/';
                    self.open_element(lt, gt + 1, is_empty);
                    pos = gt + 1;
                }
            }
        }
    }

    /// Where does the `<!`-construct starting at `lt` end?
    fn bang_end(&self, lt: usize) -> BangScan {
        let rest = &self.buf[lt..];
        if rest.starts_with(b"<!--") {
            return match find_seq(&self.buf, lt + 4, b"-->") {
                Some(end) => BangScan::EndsAt(end + 3),
                None => BangScan::NeedMore,
            };
        }
        if rest.starts_with(b"<![CDATA[") {
            return match find_seq(&self.buf, lt + 9, b"]]>") {
                Some(end) => BangScan::EndsAt(end + 3),
                None => BangScan::NeedMore,
            };
        }
        // Might still become a comment or CDATA opener once more bytes land.
        if b"<!--".starts_with(rest) || b"<![CDATA[".starts_with(rest) {
            return BangScan::NeedMore;
        }
        // DOCTYPE or other declaration: skipped wholesale.
        match memchr(b'>', rest) {
            Some(i) => BangScan::EndsAt(lt + i + 1),
            None => BangScan::NeedMore,
        }
    }

    fn open_element(&mut self, lt: usize, end: usize, is_empty: bool) {
        let name = tag_name(&self.buf[lt..end]);
        let matches = self.capture.is_none()
            && self.filter.as_deref().map_or(true, |f| f == name);

        if is_empty {
            if matches {
                self.completed.push_back(self.buf[lt..end].to_vec());
            }
            return;
        }
        self.depth += 1;
        if matches {
            self.capture = Some(Capture {
                acc: Vec::new(),
                start: self.base + lt,
                depth: self.depth,
            });
        }
    }

    fn close_element(&mut self, end: usize) -> Result<(), StreamError> {
        if self.depth == 0 {
            return Err(StreamError::UnbalancedEndTag);
        }
        let completes = matches!(&self.capture, Some(c) if c.depth == self.depth);
        if completes {
            let c = self.capture.take().expect("capture checked above");
            let rel = c.start - self.base;
            let mut element = c.acc;
            element.extend_from_slice(&self.buf[rel..end]);
            self.completed.push_back(element);
        }
        self.depth -= 1;
        Ok(())
    }
}

impl Default for StreamingParser {
    fn default() -> Self {
        Self::new()
    }
}

enum BangScan {
    NeedMore,
    EndsAt(usize),
}

/// Tag name bytes of a serialized tag (`<name ...>`).
fn tag_name(tag: &[u8]) -> &[u8] {
    let body = &tag[1..];
    let end = body
        .iter()
        .position(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'/' | b'>'))
        .unwrap_or(body.len());
    &body[..end]
}

/// First occurrence of `needle` at or after `from`.
fn find_seq(buf: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= buf.len() {
        return None;
    }
    let mut pos = from;
    loop {
        let rel = memchr(needle[0], &buf[pos..])?;
        let at = pos + rel;
        if buf[at..].len() < needle.len() {
            return None;
        }
        if &buf[at..at + needle.len()] == needle {
            return Some(at);
        }
        pos = at + 1;
    }
}

/// Position of the `>` closing the tag that opens at `lt`, ignoring `>`
/// inside quoted attribute values. None until the whole tag has arrived.
fn find_tag_end_quoted(buf: &[u8], lt: usize) -> Option<usize> {
    let mut in_single = false;
    let mut in_double = false;
    for (i, &b) in buf[lt..].iter().enumerate() {
        match b {
            b'"' if !in_single => in_double = !in_double,
            b'\'' if !in_double => in_single = !in_single,
            b'>' if !in_single && !in_double => return Some(lt + i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_document_in_one_feed() {
        let mut p = StreamingParser::with_filter(b"item");
        p.feed(b"<root><item/><other/><item a=\"1\">x</item></root>")
            .unwrap();
        let items = p.take(10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], b"<item/>");
        assert_eq!(items[1], b"<item a=\"1\">x</item>");
    }

    #[test]
    fn element_split_across_chunks() {
        let mut p = StreamingParser::with_filter(b"item");
        p.feed(b"<root><it").unwrap();
        p.feed(b"em><chi").unwrap();
        p.feed(b"ld/>tail</it").unwrap();
        let s = p.feed(b"em></root>").unwrap();
        assert_eq!(s.available, 1);
        let items = p.take(1);
        assert_eq!(items[0], b"<item><child/>tail</item>");
    }

    #[test]
    fn buffer_stays_bounded_between_elements() {
        let mut p = StreamingParser::with_filter(b"i");
        p.feed(b"<root>").unwrap();
        for _ in 0..100 {
            let s = p.feed(b"<i>payload</i>").unwrap();
            // Everything consumable is dropped from the buffer each feed.
            assert_eq!(s.buffered, 0);
        }
        assert_eq!(p.take(1000).len(), 100);
    }

    #[test]
    fn take_respects_max_and_order() {
        let mut p = StreamingParser::with_filter(b"i");
        p.feed(b"<r><i>1</i><i>2</i><i>3</i></r>").unwrap();
        let first = p.take(2);
        assert_eq!(first, vec![b"<i>1</i>".to_vec(), b"<i>2</i>".to_vec()]);
        assert_eq!(p.available(), 1);
        assert_eq!(p.take(5), vec![b"<i>3</i>".to_vec()]);
    }

    #[test]
    fn nested_same_name_stays_inside_capture() {
        let mut p = StreamingParser::with_filter(b"a");
        p.feed(b"<r><a><a/></a></r>").unwrap();
        let items = p.take(10);
        assert_eq!(items, vec![b"<a><a/></a>".to_vec()]);
    }

    #[test]
    fn no_filter_emits_top_level_elements() {
        let mut p = StreamingParser::new();
        p.feed(b"<a>1</a><b/><c>2</c>").unwrap();
        let items = p.take(10);
        assert_eq!(
            items,
            vec![b"<a>1</a>".to_vec(), b"<b/>".to_vec(), b"<c>2</c>".to_vec()]
        );
    }

    #[test]
    fn comments_and_pis_are_skipped_atomically() {
        let mut p = StreamingParser::with_filter(b"i");
        p.feed(b"<r><!-- <i>not real</i> --><?pi <i/> ?><i>real</i></r>")
            .unwrap();
        let items = p.take(10);
        assert_eq!(items, vec![b"<i>real</i>".to_vec()]);
    }

    #[test]
    fn quoted_gt_does_not_end_tag() {
        let mut p = StreamingParser::with_filter(b"i");
        p.feed(b"<r><i a=\"x>y\">v</i></r>").unwrap();
        assert_eq!(p.take(1)[0], b"<i a=\"x>y\">v</i>");
    }

    #[test]
    fn finalize_flushes_and_rejects_partial_markup() {
        let mut p = StreamingParser::with_filter(b"i");
        p.feed(b"<r><i>1</i>").unwrap();
        p.feed(b"<i>2</i").unwrap();
        // The unparseable tail is the "</i" left after the second feed.
        let err = p.finalize().unwrap_err();
        assert_eq!(err, StreamError::TruncatedInput(3));
        // Completed elements before the error remain retrievable.
        assert_eq!(p.take(10), vec![b"<i>1</i>".to_vec()]);
        // The error is latched.
        assert_eq!(p.feed(b"x"), Err(StreamError::TruncatedInput(3)));
    }

    #[test]
    fn finalize_rejects_open_capture() {
        let mut p = StreamingParser::with_filter(b"i");
        p.feed(b"<r><i>unfinished").unwrap();
        assert_eq!(p.finalize(), Err(StreamError::OpenCapture));
    }

    #[test]
    fn unbalanced_end_tag_latches() {
        let mut p = StreamingParser::new();
        let err = p.feed(b"</oops>").unwrap_err();
        assert_eq!(err, StreamError::UnbalancedEndTag);
        assert_eq!(p.feed(b"<a/>"), Err(StreamError::UnbalancedEndTag));
    }

    #[test]
    fn finalize_succeeds_on_clean_stream() {
        let mut p = StreamingParser::with_filter(b"i");
        p.feed(b"<r><i>1</i></r").unwrap();
        let rest = p.finalize();
        // "</r" is partial markup.
        assert!(rest.is_err());

        let mut p = StreamingParser::with_filter(b"i");
        p.feed(b"<r><i>1</i></r>").unwrap();
        assert_eq!(p.finalize().unwrap(), vec![b"<i>1</i>".to_vec()]);
    }
}
