//! Charset resolution for request and response bodies.
//!
//! The same resolution is used when decoding a body for logging and when the body is
//! replayed, so a logged text always corresponds to the bytes the caller receives.

use axum::http::{header::CONTENT_TYPE, HeaderMap};
use encoding_rs::{Encoding, UTF_8};

use crate::error::ResponseError;

/// Resolves the charset declared by the `Content-Type` header, falling back to UTF-8.
///
/// Unknown labels and unreadable header values also fall back to UTF-8.
pub fn resolve_charset(headers: &HeaderMap) -> &'static Encoding {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8)
}

/// Extracts the `charset` parameter of a media type, e.g. `text/html; charset="Shift_JIS"`.
fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then_some(value)
    })
}

/// Strictly decodes `bytes` with `charset`.
///
/// Malformed input is an error rather than being replaced. The decoded text encodes
/// back to exactly `bytes` only for charsets with one byte sequence per character:
/// Shift_JIS, for one, decodes the NEC and IBM duplicates of a character to the same
/// text. Keep the raw bytes when they have to be reproduced.
pub fn decode(bytes: &[u8], charset: &'static Encoding) -> Result<String, ResponseError> {
    charset
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or(ResponseError::Decode {
            charset: charset.name(),
        })
}
