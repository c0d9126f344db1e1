//! Global constants for the rust-uploader application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Streaming constants
/// Smallest chunk the producer is allowed to read from disk (1MB)
pub const MIN_CHUNK_SIZE: usize = 1024 * 1024;

/// Number of chunks the pipe holds before the producer blocks
pub const PIPE_CAPACITY: usize = 1;

/// Bytes inspected when sniffing the content type of a file
pub const SNIFF_PREFIX_LEN: usize = 512;

/// Fallback content type when sniffing cannot classify a file
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type reported for prefixes that look like plain UTF-8 text
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

// Multipart constants
/// Form field name the API expects the file payload under
pub const FILE_FIELD_NAME: &str = "file";

/// Longest boundary token allowed by RFC 2046
pub const MAX_BOUNDARY_LEN: usize = 70;

// API file types
/// File type for the plugin descriptor
pub const UPLUGIN_FILE_TYPE: &str = "uplugin";

/// File type for the zipped plugin content
pub const UPLUGIN_CONTENT_FILE_TYPE: &str = "uplugin_content";

/// MIME type declared for the plugin descriptor
pub const UPLUGIN_MIME: &str = "application/json";

/// MIME type declared for the plugin content archive
pub const ZIP_MIME: &str = "application/zip";

// Project layout
/// Extension of the project descriptor marking a project root
pub const PROJECT_FILE_EXTENSION: &str = "uproject";

/// Extension of the plugin descriptor
pub const PLUGIN_FILE_EXTENSION: &str = "uplugin";

/// Directory holding project plugins
pub const PLUGINS_DIR: &str = "Plugins";

// Packaging constants
/// Files larger than this are compressed with the fastest level (100MB)
pub const LARGE_FILE_COMPRESSION_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Extensions of formats that are already compressed
pub const COMPRESSED_EXTENSIONS: &[&str] = &[
    "zip", "gz", "xz", "bz2", "7z", "rar", "jpg", "jpeg", "png", "gif", "mp3", "mp4", "avi", "mov",
    "mpg", "mpeg", "uasset", "umap",
];

/// Log file written when `--log` is passed
pub const LOG_FILE_NAME: &str = "sdk-automation.log";

/// Exit code for CLI usage errors
pub const USAGE_EXIT_CODE: i32 = -1;
