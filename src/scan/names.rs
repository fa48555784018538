//! XML 1.0 (Fifth Edition) name character classes.
//!
//! ASCII bytes go through `match` fast paths; anything above 0x7F is decoded
//! and checked against the `NameStartChar`/`NameChar` codepoint ranges.

/// ASCII subset of `NameStartChar`.
#[inline]
pub fn is_ascii_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':')
}

/// ASCII subset of `NameChar`.
#[inline]
pub fn is_ascii_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':')
}

/// `NameStartChar` per XML 1.0 5th ed. production [4].
pub fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | '_'
        | 'A'..='Z'
        | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

/// `NameChar` per XML 1.0 5th ed. production [4a].
pub fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.'
            | '0'..='9'
            | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// Validate a whole name, decoding UTF-8 once. Used by the strict validator;
/// the cursor's ASCII fast path already admitted the bytes.
pub fn validate_name(name: &[u8]) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty name");
    }
    // Fully-ASCII names were already vetted byte-by-byte.
    if name.iter().all(|&b| b < 0x80) {
        if !is_ascii_name_start(name[0]) {
            return Err("name must start with a letter, '_', or ':'");
        }
        return Ok(());
    }
    let s = std::str::from_utf8(name).map_err(|_| "name is not valid UTF-8")?;
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_name_start_char(c) => {}
        _ => return Err("invalid name start character"),
    }
    for c in chars {
        if !is_name_char(c) {
            return Err("invalid name character");
        }
    }
    Ok(())
}
