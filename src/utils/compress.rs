use std::fs;
use std::io::{self, BufReader};
use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::constants::{COMPRESSED_EXTENSIONS, LARGE_FILE_COMPRESSION_THRESHOLD};

/// Pick the compression level for one file.
///
/// Already compressed formats and very large files get the fastest level,
/// everything else the default one. Permission bits go into the entry as-is.
pub fn get_compression_options(path: &Path, metadata: &fs::Metadata) -> FileOptions {
    let low_compression = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| COMPRESSED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    let large_file = metadata.len() > LARGE_FILE_COMPRESSION_THRESHOLD;

    let level = if low_compression || large_file { 1 } else { 6 };
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level))
        .unix_permissions(mode_bits(metadata))
}

#[cfg(unix)]
fn mode_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn mode_bits(metadata: &fs::Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Entry name of `path` inside the archive: relative to `base`, `/` separated.
fn entry_name(base: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(base)
        .with_context(|| format!("{} is outside {}", path.display(), base.display()))?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Pack everything below `source_dir` into a new zip at `zip_path`.
///
/// Entry names are relative to `source_dir`, so the directory itself is not
/// part of the archive. Directories get their own entries ahead of their
/// contents. Returns the size of the finished archive in bytes.
pub fn compress_directory(source_dir: &Path, zip_path: &Path) -> Result<u64> {
    let start = Instant::now();
    if !source_dir.is_dir() {
        return Err(anyhow!("Source directory not found: {}", source_dir.display()));
    }
    info!("Compressing {} into {}", source_dir.display(), zip_path.display());

    let zip_file = fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file {}", zip_path.display()))?;
    let mut zip = ZipWriter::new(zip_file);
    let mut files = 0usize;

    let walker = WalkDir::new(source_dir)
        .min_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", source_dir.display()))?;
        let path = entry.path();
        if path == zip_path {
            continue;
        }

        let name = entry_name(source_dir, path)?;
        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to stat {}", path.display()))?;

        if metadata.is_dir() {
            let options = FileOptions::default().unix_permissions(mode_bits(&metadata));
            zip.add_directory(format!("{}/", name), options)
                .with_context(|| format!("Failed to add directory entry {}", name))?;
            continue;
        }
        if !metadata.is_file() {
            debug!("Skipping {}: not a regular file", path.display());
            continue;
        }

        zip.start_file(name.clone(), get_compression_options(path, &metadata))
            .with_context(|| format!("Failed to start file entry for {}", name))?;
        let mut reader = BufReader::new(
            fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        );
        io::copy(&mut reader, &mut zip)
            .with_context(|| format!("Failed to write {} to the archive", name))?;
        debug!("Compressed {} ({} bytes)", name, metadata.len());
        files += 1;
    }

    zip.finish().context("Failed to finalize zip file")?;

    let size = fs::metadata(zip_path)
        .with_context(|| format!("Failed to stat {}", zip_path.display()))?
        .len();
    info!(
        "Compressed {} files into {} ({} bytes) in {:?}",
        files,
        zip_path.display(),
        size,
        start.elapsed()
    );
    Ok(size)
}
