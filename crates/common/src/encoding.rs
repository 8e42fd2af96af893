//! Text <-> base64 transport encoding.
//!
//! The content API stores file bodies as base64. Text goes through its UTF-8
//! bytes so multi-byte characters survive the trip.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded content is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encode arbitrary text as standard base64 of its UTF-8 bytes.
pub fn encode(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Inverse of [`encode`]. ASCII whitespace is ignored, since the content API
/// wraps its base64 payloads with newlines.
pub fn decode(transport: &str) -> Result<String, DecodeError> {
    let compact: String = transport.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}
