//! Upload validation module
//!
//! Provides validation utilities for multipart file uploads.

use aureo_core::Anchor;

use crate::error::ApiError;

/// Allowed MIME types for seal uploads. Only containers the compositor can re-encode.
const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "application/octet-stream",
];

/// Validates the Content-Type of an uploaded file
///
/// Accepts PNG, JPEG, and application/octet-stream (binary data, sniffed later).
/// Parameters after `;` are ignored.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(ct) => {
            let ct_lower = ct.to_lowercase();
            let essence = ct_lower.split(';').next().unwrap_or("").trim();
            if ALLOWED_MIME_TYPES.contains(&essence) {
                Ok(())
            } else {
                Err(ApiError::bad_request(format!(
                    "Unsupported Content-Type: '{}'. Allowed types: image/png, image/jpeg, application/octet-stream",
                    ct
                )))
            }
        }
        // Allow missing Content-Type (treat as binary)
        None => Ok(()),
    }
}

/// Validates the size of an uploaded file
///
/// Returns an error if the file is empty or exceeds the maximum size.
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size == 0 {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    if size > max_size {
        let max_mb = max_size / (1024 * 1024);
        let actual_mb = size / (1024 * 1024);
        Err(ApiError::payload_too_large(format!(
            "File too large: {} MB exceeds maximum of {} MB",
            actual_mb, max_mb
        )))
    } else {
        Ok(())
    }
}

/// Build an anchor from optional form coordinates.
///
/// Returns `None` when neither axis is given; a missing axis takes the default's value.
/// Each axis must lie in `[0, 1]`.
pub fn parse_anchor(
    x: Option<f64>,
    y: Option<f64>,
    default: Anchor,
) -> Result<Option<Anchor>, ApiError> {
    if x.is_none() && y.is_none() {
        return Ok(None);
    }
    let anchor = Anchor::new(x.unwrap_or(default.x), y.unwrap_or(default.y));
    for (axis, value) in [("anchor_x", anchor.x), ("anchor_y", anchor.y)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ApiError::bad_request(format!(
                "{} must be between 0 and 1, got {}",
                axis, value
            )));
        }
    }
    Ok(Some(anchor))
}
