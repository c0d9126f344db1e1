use std::io::{self, Read, Seek, SeekFrom};

use log::{debug, warn};

use crate::constants::{DEFAULT_CONTENT_TYPE, SNIFF_PREFIX_LEN, TEXT_CONTENT_TYPE};

/// Classify the content type of `file` from its first bytes.
///
/// At most `SNIFF_PREFIX_LEN` bytes are read from the start of the file and the
/// cursor is left at offset 0 afterwards, whatever the outcome. Detection never
/// fails the transfer: unreadable or unrecognized content is reported as
/// `application/octet-stream`.
pub fn sniff<R: Read + Seek>(file: &mut R) -> String {
    let mime = match read_prefix(file) {
        Ok(prefix) => classify(&prefix),
        Err(e) => {
            warn!("Failed to read file prefix for MIME detection: {}", e);
            DEFAULT_CONTENT_TYPE.to_string()
        }
    };

    if let Err(e) = file.seek(SeekFrom::Start(0)) {
        warn!("Failed to rewind file after MIME detection: {}", e);
    }

    debug!("Detected content type {}", mime);
    mime
}

/// Classify a byte prefix without any I/O.
pub fn classify(prefix: &[u8]) -> String {
    if let Some(kind) = infer::get(prefix) {
        return kind.mime_type().to_string();
    }

    if !prefix.is_empty() && !prefix.contains(&0) && looks_like_utf8(prefix) {
        return TEXT_CONTENT_TYPE.to_string();
    }

    DEFAULT_CONTENT_TYPE.to_string()
}

fn read_prefix<R: Read + Seek>(file: &mut R) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;

    let mut prefix = Vec::with_capacity(SNIFF_PREFIX_LEN);
    file.by_ref()
        .take(SNIFF_PREFIX_LEN as u64)
        .read_to_end(&mut prefix)?;
    Ok(prefix)
}

// A multi-byte sequence cut at the end of the prefix still counts as text
fn looks_like_utf8(prefix: &[u8]) -> bool {
    match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}
