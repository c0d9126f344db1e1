//! Test utilities for rust-uploader
//!
//! Common fixtures shared by the unit test modules.

#![cfg(test)]

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a temporary file with the given content
pub fn create_temp_file(content: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content)?;
    file.flush()?;
    Ok(file)
}

/// Creates a test file structure in a temporary directory
pub fn create_test_file_structure() -> Result<TempDir> {
    let temp_dir = create_temp_dir()?;
    let base_path = temp_dir.path();

    fs::create_dir_all(base_path.join("dir1/subdir1"))?;
    fs::create_dir_all(base_path.join("dir2"))?;

    fs::write(base_path.join("file1.txt"), b"Test content 1")?;
    fs::write(base_path.join("file2.log"), b"Test log content")?;
    fs::write(base_path.join("dir1/file3.txt"), b"Test content 3")?;
    fs::write(base_path.join("dir1/subdir1/file4.txt"), b"Test content 4")?;
    fs::write(base_path.join("dir2/file5.log"), b"Another log file")?;

    Ok(temp_dir)
}

/// Creates a project with one plugin laid out the way the tasks expect.
///
/// Returns the temp dir holding the project and the plugin root.
pub fn create_test_project(project: &str, plugin: &str) -> Result<(TempDir, PathBuf)> {
    let temp_dir = create_temp_dir()?;
    let base_path = temp_dir.path();

    fs::write(base_path.join(format!("{}.uproject", project)), b"{\"FileVersion\": 3}")?;

    let plugin_root = base_path.join("Plugins").join(plugin);
    let staging = plugin_root.join("Temp").join(plugin);
    fs::create_dir_all(staging.join("Source"))?;
    fs::write(
        plugin_root.join(format!("{}.uplugin", plugin)),
        b"{\"FileVersion\": 3, \"VersionName\": \"1.0\"}",
    )?;
    fs::write(staging.join("Source/Module.cpp"), b"// module\n")?;
    fs::write(staging.join("README.md"), b"# plugin\n")?;

    Ok((temp_dir, plugin_root))
}

/// Reads a whole file, panicking with the path on failure
pub fn read_to_vec(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}
