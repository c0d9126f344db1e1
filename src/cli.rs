use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::ProducerPolicy;

/// Command-line arguments for the plugin uploader.
///
/// Options are grouped into API access, project selection, package identity
/// and streaming behaviour.
#[derive(Parser, Debug)]
#[clap(name = "rust-uploader", about = "Package a plugin and stream it to the artifact API")]
pub struct Args {
    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Also write the log to a file in the working directory
    #[clap(long)]
    pub log: bool,

    /// API base url
    #[clap(long)]
    pub api: String,

    /// Bearer token for API calls
    #[clap(long)]
    pub token: String,

    /// Task to run
    #[clap(long, value_enum)]
    pub task: Task,

    /// Project name; any project file matches when empty
    #[clap(long, default_value = "")]
    pub project: String,

    /// Plugin name inside the project's Plugins directory
    #[clap(long)]
    pub plugin: String,

    /// Entity the package belongs to
    #[clap(long)]
    pub entity_id: Option<String>,

    /// Application the package belongs to
    #[clap(long)]
    pub app_id: Option<String>,

    /// Bytes read per chunk while streaming (minimum 1MB)
    #[clap(long)]
    pub chunk_size: Option<usize>,

    /// What to do when the file cannot be read mid-upload
    #[clap(long, value_enum, default_value_t = ProducerPolicy::FailFast)]
    pub producer_policy: ProducerPolicy,

    /// Working directory to start the project search from (default: current directory)
    #[clap(long)]
    pub work_dir: Option<PathBuf>,
}

/// Tasks the binary can run.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum Task {
    /// Upload the plugin descriptor and its zipped sources, then queue packaging
    UploadPackageSource,
    /// Unpack a downloaded package into the plugin's Content directory
    UnzipPackageSource,
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::UploadPackageSource => write!(f, "upload-package-source"),
            Task::UnzipPackageSource => write!(f, "unzip-package-source"),
        }
    }
}
