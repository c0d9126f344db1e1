use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use zip::read::ZipArchive;

/// Unpack `zip_path` into `dest_dir`, creating directories as needed.
///
/// Entries whose names would escape `dest_dir` are skipped. On unix the mode
/// bits stored in the archive are applied to extracted files and
/// directories. Returns the number of files written.
pub fn extract_archive(zip_path: &Path, dest_dir: &Path) -> Result<usize> {
    let start = Instant::now();
    let file = fs::File::open(zip_path)
        .with_context(|| format!("Failed to open archive {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read archive {}", zip_path.display()))?;

    info!("Extracting {} into {}", zip_path.display(), dest_dir.display());
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create {}", dest_dir.display()))?;

    let mut files = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read entry {} of {}", i, zip_path.display()))?;

        let rel: PathBuf = match entry.enclosed_name() {
            Some(rel) => rel.to_path_buf(),
            None => {
                warn!("Skipping entry with unsafe path: {}", entry.name());
                continue;
            }
        };
        let out_path = dest_dir.join(&rel);
        let mode = entry.unix_mode();

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("Failed to create {}", out_path.display()))?;
            apply_mode(&out_path, mode)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut out = fs::File::create(&out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;
        let written = io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to extract {}", rel.display()))?;
        drop(out);
        apply_mode(&out_path, mode)?;

        debug!("Extracted {} ({} bytes)", rel.display(), written);
        files += 1;
    }

    info!("Extracted {} files in {:?}", files, start.elapsed());
    Ok(files)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}
