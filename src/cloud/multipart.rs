use std::collections::BTreeMap;

use bytes::Bytes;
use uuid::Uuid;

use crate::cloud::error::UploadError;
use crate::constants::{DEFAULT_CONTENT_TYPE, MAX_BOUNDARY_LEN};

/// Framing bytes of a multipart/form-data body with exactly one file part.
///
/// The envelope holds everything except the file payload: the opening header
/// (text fields followed by the file part header) and the closing boundary.
/// Sending `header`, then the raw file bytes, then `trailer` yields a complete
/// RFC 7578 body whose length is known before the first byte is written.
#[derive(Debug, Clone)]
pub struct MultipartEnvelope {
    header: Bytes,
    trailer: Bytes,
    boundary: String,
    content_type: String,
}

impl MultipartEnvelope {
    /// Build an envelope with a freshly generated boundary token.
    pub fn new(
        fields: &BTreeMap<String, String>,
        file_field: &str,
        file_name: &str,
    ) -> Result<Self, UploadError> {
        Self::with_boundary(fields, file_field, file_name, &random_boundary())
    }

    /// Build an envelope for an explicit boundary token.
    ///
    /// Pure: no file or network I/O happens here, so the byte accounting can be
    /// checked in isolation.
    pub fn with_boundary(
        fields: &BTreeMap<String, String>,
        file_field: &str,
        file_name: &str,
        boundary: &str,
    ) -> Result<Self, UploadError> {
        validate_boundary(boundary)?;
        validate_name(file_field, "file field name")?;

        let delimiter = format!("--{}", boundary);
        let mut header = String::new();

        for (name, value) in fields {
            validate_name(name, "field name")?;
            if value.contains(&delimiter) {
                return Err(UploadError::construction(format!(
                    "value of field '{}' contains the multipart boundary",
                    name
                )));
            }

            header.push_str(&delimiter);
            header.push_str("\r\n");
            header.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_quotes(name)
            ));
            header.push_str(value);
            header.push_str("\r\n");
        }

        if file_name.contains(['\r', '\n']) {
            return Err(UploadError::construction("file name contains a line break"));
        }

        header.push_str(&delimiter);
        header.push_str("\r\n");
        header.push_str(&format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            escape_quotes(file_field),
            escape_quotes(file_name)
        ));
        header.push_str(&format!("Content-Type: {}\r\n\r\n", DEFAULT_CONTENT_TYPE));

        let trailer = format!("\r\n{}--\r\n", delimiter);

        Ok(Self {
            header: Bytes::from(header),
            trailer: Bytes::from(trailer),
            boundary: boundary.to_string(),
            content_type: form_data_content_type(boundary),
        })
    }

    pub fn header(&self) -> &Bytes {
        &self.header
    }

    pub fn trailer(&self) -> &Bytes {
        &self.trailer
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the `Content-Type` request header, boundary included.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Exact body length for a payload of `file_size` bytes.
    pub fn content_length(&self, file_size: u64) -> Result<u64, UploadError> {
        (self.header.len() as u64)
            .checked_add(file_size)
            .and_then(|n| n.checked_add(self.trailer.len() as u64))
            .ok_or_else(|| UploadError::construction("multipart content length overflows u64"))
    }

    pub fn into_parts(self) -> (Bytes, Bytes) {
        (self.header, self.trailer)
    }
}

/// Generate a random boundary token (32 lowercase hex characters).
pub fn random_boundary() -> String {
    Uuid::new_v4().simple().to_string()
}

fn validate_boundary(boundary: &str) -> Result<(), UploadError> {
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(UploadError::construction(format!(
            "invalid boundary length {}",
            boundary.len()
        )));
    }

    let valid = boundary.bytes().enumerate().all(|(i, b)| match b {
        b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => true,
        b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?' => true,
        b' ' => i != boundary.len() - 1,
        _ => false,
    });

    if !valid {
        return Err(UploadError::construction(format!("invalid boundary '{}'", boundary)));
    }
    Ok(())
}

fn validate_name(name: &str, what: &str) -> Result<(), UploadError> {
    if name.is_empty() {
        return Err(UploadError::construction(format!("empty {}", what)));
    }
    if name.contains(['\r', '\n']) {
        return Err(UploadError::construction(format!("{} '{}' contains a line break", what, name.escape_debug())));
    }
    Ok(())
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn form_data_content_type(boundary: &str) -> String {
    // Boundaries holding tspecials must be quoted in the header parameter
    if boundary.contains(['(', ')', ',', '/', ':', '=', '?', ' ']) {
        format!("multipart/form-data; boundary=\"{}\"", boundary)
    } else {
        format!("multipart/form-data; boundary={}", boundary)
    }
}
