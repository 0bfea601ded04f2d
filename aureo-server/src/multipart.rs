//! Multipart form parsing helpers
//!
//! Provides reusable abstractions for parsing multipart/form-data uploads,
//! shared by the seal and detect handlers.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;

use crate::error::ApiError;
use crate::validation::{validate_content_type, validate_file_size};

/// Represents a file uploaded via multipart form
#[derive(Debug, Clone)]
pub struct FileField {
    /// File data bytes
    pub data: Vec<u8>,
    /// Content-Type from the multipart field (if provided)
    pub content_type: Option<String>,
    /// Original filename from the multipart field (if provided)
    pub file_name: Option<String>,
}

/// Parsed multipart form fields
///
/// Provides structured access to file and text fields from a multipart/form-data request.
#[derive(Debug)]
pub struct MultipartFields {
    /// File field (named "file")
    file: Option<FileField>,
    /// Text fields indexed by name
    text_fields: HashMap<String, String>,
}

impl MultipartFields {
    /// Parse all fields from a multipart request
    ///
    /// The file's Content-Type and size are validated as soon as it is read.
    pub async fn parse(multipart: &mut Multipart, max_file_size: usize) -> Result<Self, ApiError> {
        let mut file: Option<FileField> = None;
        let mut text_fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == "file" {
                let content_type = field.content_type().map(|s| s.to_string());
                let file_name = field.file_name().map(|s| s.to_string());

                validate_content_type(content_type.as_deref())?;

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?
                    .to_vec();

                validate_file_size(data.len(), max_file_size)?;

                file = Some(FileField {
                    data,
                    content_type,
                    file_name,
                });
            } else {
                let value = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read field '{}': {}", name, e))
                })?;
                text_fields.insert(name, value);
            }
        }

        Ok(Self { file, text_fields })
    }

    /// Take ownership of the file field (required)
    ///
    /// Returns an error if no file was uploaded.
    pub fn take_file(&mut self) -> Result<FileField, ApiError> {
        self.file.take().ok_or_else(|| {
            ApiError::bad_request("No file provided. Use 'file' field in multipart form.")
        })
    }

    /// Get a text field value
    ///
    /// Returns `None` if the field is not present.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.text_fields.get(name).map(|s| s.as_str())
    }

    /// Get a required, non-blank text field.
    pub fn require_text(&self, name: &str) -> Result<&str, ApiError> {
        match self.get_text(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ApiError::bad_request(format!(
                "Missing '{}' field in multipart form",
                name
            ))),
        }
    }

    /// Get a text field parsed with `FromStr`
    ///
    /// Returns:
    /// - `Ok(Some(T))` if the field exists and parses
    /// - `Ok(None)` if the field is missing or empty
    /// - `Err(ApiError)` if the field exists but does not parse
    pub fn get_parsed<T: FromStr>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.text_fields.get(name).map(|s| s.trim()) {
            Some(value) if !value.is_empty() => value
                .parse()
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("Invalid {} value: '{}'", name, value))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> MultipartFields {
        MultipartFields {
            file: None,
            text_fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_get_text() {
        let fields = fields(&[("name", "test")]);
        assert_eq!(fields.get_text("name"), Some("test"));
        assert_eq!(fields.get_text("missing"), None);
    }

    #[test]
    fn test_require_text_rejects_blank() {
        let fields = fields(&[("author_id", "  "), ("other", "x")]);
        assert!(fields.require_text("author_id").is_err());
        assert!(fields.require_text("missing").is_err());
        assert_eq!(fields.require_text("other").unwrap(), "x");
    }

    #[test]
    fn test_get_parsed() {
        let fields = fields(&[("anchor_x", " 0.25 "), ("anchor_y", "left"), ("empty", "")]);
        assert_eq!(fields.get_parsed::<f64>("anchor_x").unwrap(), Some(0.25));
        assert!(fields.get_parsed::<f64>("anchor_y").is_err());
        assert_eq!(fields.get_parsed::<f64>("empty").unwrap(), None);
        assert_eq!(fields.get_parsed::<f64>("missing").unwrap(), None);
    }

    #[test]
    fn test_take_file_missing() {
        let mut fields = fields(&[]);
        assert!(fields.take_file().is_err());
    }
}
