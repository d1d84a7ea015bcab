//! Base64 decoding for link payloads
//!
//! Proxy links embed base64 in both the URL-safe and standard alphabets,
//! frequently without padding. The shared rule: map the URL-safe alphabet
//! onto the standard one, right-pad to a multiple-of-4 length, then decode
//! with the standard engine.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::ParseError;

/// Decode a base64 payload into a UTF-8 string.
///
/// `-`/`_` are mapped to `+`/`/` and `=` padding is appended as needed
/// before decoding. Failures surface as [`ParseError::InvalidEncoding`]
/// with the library error message attached.
pub fn decode_base64_string(data: &str) -> Result<String, ParseError> {
    let sanitized: String = data
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let padded = pad_base64(&sanitized);

    let bytes = STANDARD
        .decode(padded.as_bytes())
        .map_err(|e| ParseError::InvalidEncoding(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ParseError::InvalidEncoding(e.to_string()))
}

/// Right-pad a base64 string with `=` to a multiple-of-4 length
fn pad_base64(s: &str) -> String {
    let mut result = s.to_string();
    while result.len() % 4 != 0 {
        result.push('=');
    }
    result
}
