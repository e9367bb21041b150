//! Pasted payload decoding.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Bytes of a pasted payload plus the type the caller claimed for them.
#[derive(Debug)]
pub struct DecodedPayload {
    /// Media type from a `data:` prefix. Informational only.
    pub claimed_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Decode a data URL (`data:<type>;base64,<body>`) or bare base64.
///
/// # Errors
/// [`AppError::BadRequest`] for empty, malformed, or non-base64 payloads;
/// [`AppError::PayloadTooLarge`] when the decoded bytes exceed `max_size`.
pub fn decode_payload(raw: &str, max_size: usize) -> Result<DecodedPayload, AppError> {
    let raw = raw.trim();
    let (claimed_type, body) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, body) = rest
                .split_once(',')
                .ok_or_else(|| AppError::BadRequest("Malformed data URL".to_string()))?;
            let Some(media_type) = header.strip_suffix(";base64") else {
                return Err(AppError::BadRequest(
                    "Only base64 data URLs are supported".to_string(),
                ));
            };
            let media_type = media_type.trim();
            let claimed = (!media_type.is_empty()).then(|| media_type.to_string());
            (claimed, body)
        }
        None => (None, raw),
    };

    let body: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if body.is_empty() {
        return Err(AppError::BadRequest("Payload is empty".to_string()));
    }
    // Reject before decoding anything far past the limit.
    if body.len() / 4 * 3 > max_size.saturating_add(2) {
        return Err(AppError::PayloadTooLarge(max_size));
    }

    let bytes = STANDARD
        .decode(body.as_bytes())
        .map_err(|err| AppError::BadRequest(format!("Payload is not valid base64: {}", err)))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Payload is empty".to_string()));
    }
    if bytes.len() > max_size {
        return Err(AppError::PayloadTooLarge(max_size));
    }
    Ok(DecodedPayload {
        claimed_type,
        bytes,
    })
}
