//! The package tasks run by the binary.
//!
//! Each task resolves the plugin inside the project first, then works only
//! with paths from [`PluginLayout`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::cli::Task;
use crate::cloud::api::ApiClient;
use crate::cloud::client::create_http_client;
use crate::cloud::uploader::{TransferDescriptor, UploadOutcome, UploadTarget, Uploader};
use crate::config::UploaderConfig;
use crate::constants::{UPLUGIN_CONTENT_FILE_TYPE, UPLUGIN_FILE_TYPE, UPLUGIN_MIME, ZIP_MIME};
use crate::utils::compress::compress_directory;
use crate::utils::extract::extract_archive;
use crate::utils::project::PluginLayout;

/// Everything a task needs besides the network clients.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    pub config: UploaderConfig,
    pub project: String,
    pub plugin: String,
    pub entity_id: Uuid,
    /// Only logged; packaging is keyed by the entity
    pub app_id: Option<Uuid>,
    /// Directory the project search starts from
    pub work_dir: PathBuf,
}

impl TaskOptions {
    fn layout(&self) -> Result<PluginLayout> {
        PluginLayout::locate(&self.project, &self.plugin, &self.work_dir)
    }

    fn require_entity(&self) -> Result<Uuid> {
        if self.entity_id.is_nil() {
            return Err(anyhow!("A valid entity id is required"));
        }
        Ok(self.entity_id)
    }
}

/// Run `task`, building the HTTP clients it needs.
pub async fn run_task(task: Task, options: &TaskOptions) -> Result<()> {
    let start = Instant::now();
    info!("Running task {}", task);

    match task {
        Task::UploadPackageSource => {
            let client = create_http_client()?;
            let api = ApiClient::with_client(client.clone(), &options.config);
            let uploader = Uploader::with_client(client, &options.config);
            upload_package_source(options, &api, &uploader).await?;
        }
        Task::UnzipPackageSource => {
            let layout = options.layout()?;
            tokio::task::spawn_blocking(move || unzip_package_source(&layout))
                .await
                .context("Extraction task panicked")??;
        }
    }

    info!("Task {} completed in {:?}", task, start.elapsed());
    Ok(())
}

/// Upload the plugin descriptor and its zipped sources, then queue packaging.
///
/// The archive is built next to the descriptor and removed again whether or
/// not the upload succeeds.
pub async fn upload_package_source(options: &TaskOptions, api: &ApiClient, uploader: &Uploader) -> Result<()> {
    let entity_id = options.require_entity()?;
    let layout = options.layout()?;
    let chunk_size = options.config.chunk_size;

    let descriptor_name = layout.descriptor_name();
    let target = api.metadata_target(entity_id, UPLUGIN_FILE_TYPE, UPLUGIN_MIME, &descriptor_name)?;
    let descriptor = TransferDescriptor::open(&layout.descriptor(), chunk_size)?.with_original_path(&descriptor_name);
    match uploader
        .upload(descriptor, &target, &BTreeMap::new())
        .await
        .with_context(|| format!("Failed to upload {}", descriptor_name))?
    {
        UploadOutcome::Metadata(record) => {
            info!("Uploaded {} as file {:?}", descriptor_name, record.id);
        }
        UploadOutcome::Stored => info!("Uploaded {}", descriptor_name),
    }

    let archive = ArchiveGuard::new(layout.archive());
    let staging = layout.staging_dir();
    let archive_path = archive.path().to_path_buf();
    let size = tokio::task::spawn_blocking(move || compress_directory(&staging, &archive_path))
        .await
        .context("Compression task panicked")?
        .context("Failed to pack plugin sources")?;

    let archive_name = layout.archive_name();
    let record = api
        .request_upload_url(entity_id, UPLUGIN_CONTENT_FILE_TYPE, ZIP_MIME, size, &archive_name)
        .await
        .context("Failed to get an upload url")?;
    debug!("Upload url issued for {} ({})", archive_name, record.file_type);

    let descriptor = TransferDescriptor::open(archive.path(), chunk_size)?.with_original_path(&archive_name);
    uploader
        .upload(descriptor, &UploadTarget::presigned(record.url), &BTreeMap::new())
        .await
        .with_context(|| format!("Failed to upload {}", archive_name))?;

    api.create_package_job(entity_id)
        .await
        .context("Failed to create package job")?;
    info!("Package job created for entity {}", entity_id);

    if let Some(app_id) = options.app_id {
        debug!("Package belongs to app {}", app_id);
    }
    Ok(())
}

/// Unpack the downloaded package into the plugin's Content directory.
pub fn unzip_package_source(layout: &PluginLayout) -> Result<usize> {
    let archive = layout.download_archive();
    if !archive.is_file() {
        return Err(anyhow!("Package archive not found: {}", archive.display()));
    }
    extract_archive(&archive, &layout.content_dir())
        .with_context(|| format!("Failed to unpack {}", archive.display()))
}

/// Deletes the archive it points at when dropped.
struct ArchiveGuard {
    path: PathBuf,
}

impl ArchiveGuard {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArchiveGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}
