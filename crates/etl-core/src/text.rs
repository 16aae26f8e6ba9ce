//! Character-encoding helpers for legacy registry text.

/// Decode ISO-8859-1 bytes. Every byte maps to the code point of equal value,
/// so decoding cannot fail.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Strip a leading UTF-8 byte-order mark, if any.
pub fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{feff}').unwrap_or(s)
}

/// Undo UTF-8 text that was mis-decoded as Latin-1 (`"SAÃ\u{9a}DE"` →
/// `"SAÚDE"`), then upper-case and trim.
///
/// Only meant for display of legacy name fields. When the text holds a char
/// above U+00FF, or the reinterpreted bytes are not valid UTF-8, the input is
/// taken as already correct and only upper-cased and trimmed.
pub fn repair_mojibake(text: &str) -> String {
    let reinterpreted = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()
        .and_then(|bytes| String::from_utf8(bytes).ok());

    reinterpreted
        .as_deref()
        .unwrap_or(text)
        .to_uppercase()
        .trim()
        .to_string()
}
