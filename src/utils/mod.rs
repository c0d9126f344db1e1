//! Local file handling around an upload.
//!
//! ## Components
//!
//! - **Project**: locating the project root and the plugin layout inside it
//! - **Compress**: packing a staging directory into a zip archive
//! - **Extract**: unpacking a downloaded archive with its mode bits
//!
//! ## Creating a ZIP Archive
//!
//! ```no_run
//! use rust_uploader::utils::compress::compress_directory;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let size = compress_directory(
//!     Path::new("/work/Demo/Plugins/Widget/Temp/Widget"),
//!     Path::new("/work/Demo/Plugins/Widget/Widget.zip"),
//! )?;
//! println!("Archive is {} bytes", size);
//! # Ok(())
//! # }
//! ```

/// Project and plugin directory discovery
pub mod project;

/// ZIP archive creation
pub mod compress;

/// ZIP archive extraction
pub mod extract;
