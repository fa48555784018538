//! Input preparation: encoding detection/conversion and line-ending
//! normalization, applied before tokenization.

use crate::error::ParseError;
use memchr::memchr;

/// Encoding detected from a BOM or the initial byte pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return Encoding::Utf8;
        }
        match (input[0], input[1]) {
            (0xFF, 0xFE) => Encoding::Utf16Le,
            (0xFE, 0xFF) => Encoding::Utf16Be,
            // A '<' interleaved with a null byte means UTF-16 without a BOM.
            (0x00, b'<') => Encoding::Utf16Be,
            (b'<', 0x00) => Encoding::Utf16Le,
            _ => Encoding::Utf8,
        }
    }
}

/// Convert to UTF-8, strip a UTF-8 BOM, and normalize line endings
/// (`\r\n` -> `\n`, bare `\r` -> `\n`) per XML 1.0 §2.11.
pub fn prepare(input: Vec<u8>) -> Result<Vec<u8>, ParseError> {
    let bytes = match Encoding::detect(&input) {
        Encoding::Utf8 => strip_utf8_bom(input),
        Encoding::Utf16Le => utf16_to_utf8(&input, &[0xFF, 0xFE], u16::from_le_bytes)?,
        Encoding::Utf16Be => utf16_to_utf8(&input, &[0xFE, 0xFF], u16::from_be_bytes)?,
    };
    Ok(normalize_newlines(bytes))
}

/// Lenient preparation: a failed UTF-16 conversion falls back to the raw
/// bytes instead of erroring.
pub fn prepare_lenient(input: Vec<u8>) -> Vec<u8> {
    let bytes = match Encoding::detect(&input) {
        Encoding::Utf8 => strip_utf8_bom(input),
        Encoding::Utf16Le => {
            utf16_to_utf8(&input, &[0xFF, 0xFE], u16::from_le_bytes).unwrap_or(input)
        }
        Encoding::Utf16Be => {
            utf16_to_utf8(&input, &[0xFE, 0xFF], u16::from_be_bytes).unwrap_or(input)
        }
    };
    normalize_newlines(bytes)
}

fn strip_utf8_bom(input: Vec<u8>) -> Vec<u8> {
    if input.starts_with(&[0xEF, 0xBB, 0xBF]) {
        input[3..].to_vec()
    } else {
        input
    }
}

fn utf16_to_utf8(
    input: &[u8],
    bom: &[u8],
    from_bytes: fn([u8; 2]) -> u16,
) -> Result<Vec<u8>, ParseError> {
    let body = if input.starts_with(bom) {
        &input[2..]
    } else {
        input
    };
    if body.len() % 2 != 0 {
        return Err(ParseError::Encoding(
            "UTF-16 input has an odd number of bytes".into(),
        ));
    }
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|c| from_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units)
        .map(String::into_bytes)
        .map_err(|e| ParseError::Encoding(format!("invalid UTF-16: {e}")))
}

/// Rewrite `\r\n` and bare `\r` to `\n`, in place. Skipped entirely when the
/// input has no `\r` (one memchr pass).
fn normalize_newlines(mut bytes: Vec<u8>) -> Vec<u8> {
    let Some(first_cr) = memchr(b'\r', &bytes) else {
        return bytes;
    };
    let mut write = first_cr;
    let mut read = first_cr;
    while read < bytes.len() {
        let b = bytes[read];
        if b == b'\r' {
            bytes[write] = b'\n';
            write += 1;
            read += 1;
            if bytes.get(read) == Some(&b'\n') {
                read += 1;
            }
        } else {
            bytes[write] = b;
            write += 1;
            read += 1;
        }
    }
    bytes.truncate(write);
    bytes
}
