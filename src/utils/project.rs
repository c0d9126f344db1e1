use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::debug;

use crate::constants::{PLUGINS_DIR, PLUGIN_FILE_EXTENSION, PROJECT_FILE_EXTENSION};

/// Check whether `dir` holds the project descriptor.
///
/// With an empty `project` any `*.uproject` file matches; otherwise the file
/// stem must equal `project`, ignoring case.
pub fn is_project_dir(project: &str, dir: &Path) -> Result<bool> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_project_file = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case(PROJECT_FILE_EXTENSION));
        if !is_project_file {
            continue;
        }
        if project.is_empty() {
            return Ok(true);
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem.eq_ignore_ascii_case(project) {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Walk up from `start` to the first directory holding the project descriptor.
pub fn find_project_dir(project: &str, start: &Path) -> Result<PathBuf> {
    for dir in start.ancestors() {
        if is_project_dir(project, dir)? {
            debug!("Found project directory {}", dir.display());
            return Ok(dir.to_path_buf());
        }
    }

    let name = if project.is_empty() { "any" } else { project };
    Err(anyhow!(
        "Project directory not found: no {} .{} file above {}",
        name,
        PROJECT_FILE_EXTENSION,
        start.display()
    ))
}

/// Paths of one plugin inside a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginLayout {
    root: PathBuf,
    name: String,
}

impl PluginLayout {
    pub fn new(project_dir: &Path, plugin: &str) -> Self {
        Self {
            root: project_dir.join(PLUGINS_DIR).join(plugin),
            name: plugin.to_string(),
        }
    }

    /// Resolve the project from `start` and lay out `plugin` inside it.
    pub fn locate(project: &str, plugin: &str, start: &Path) -> Result<Self> {
        if plugin.trim().is_empty() {
            return Err(anyhow!("Plugin name is required"));
        }
        let project_dir = find_project_dir(project, start)?;
        let layout = Self::new(&project_dir, plugin);
        if !layout.root.is_dir() {
            return Err(anyhow!("Plugin directory not found: {}", layout.root.display()));
        }
        Ok(layout)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<plugin>.uplugin`
    pub fn descriptor_name(&self) -> String {
        format!("{}.{}", self.name, PLUGIN_FILE_EXTENSION)
    }

    pub fn descriptor(&self) -> PathBuf {
        self.root.join(self.descriptor_name())
    }

    /// `<plugin>.zip`
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.name)
    }

    /// Archive produced for upload, next to the descriptor
    pub fn archive(&self) -> PathBuf {
        self.root.join(self.archive_name())
    }

    /// Staged plugin sources that get packed for upload
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("Temp").join(&self.name)
    }

    /// Downloaded package waiting to be unpacked
    pub fn download_archive(&self) -> PathBuf {
        self.root.join("temp").join(self.archive_name())
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join("Content")
    }
}
