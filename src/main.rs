use std::env;
use std::fs::File;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger};
use tokio::runtime::Runtime;
use uuid::Uuid;

use rust_uploader::cli::Args;
use rust_uploader::config::UploaderConfig;
use rust_uploader::constants::{LOG_FILE_NAME, USAGE_EXIT_CODE};
use rust_uploader::tasks::{run_task, TaskOptions};

fn main() -> Result<()> {
    // Usage errors exit with their own code; --help and --version still exit 0
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(USAGE_EXIT_CODE);
        }
        Err(e) => e.exit(),
    };

    initialize_logging(args.verbose, args.log)?;

    let entity_id = parse_entity_id(args.entity_id.as_deref());
    let app_id = parse_app_id(args.app_id.as_deref());

    let config = match UploaderConfig::new(&args.api, &args.token, args.chunk_size, args.producer_policy) {
        Ok(config) => config,
        Err(e) => usage_error(&e.to_string()),
    };
    info!("Using {:?}", config);

    let work_dir = match args.work_dir.clone() {
        Some(dir) => dir,
        None => env::current_dir().context("Failed to get current directory")?,
    };

    let options = TaskOptions {
        config,
        project: args.project.clone(),
        plugin: args.plugin.clone(),
        entity_id,
        app_id,
        work_dir,
    };

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    runtime.block_on(run_task(args.task, &options))
}

/// Initialize logging with the specified verbosity level.
///
/// With `log_to_file` the same records also go to a log file in the
/// working directory.
fn initialize_logging(verbose: bool, log_to_file: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));

    if log_to_file {
        let file = File::create(LOG_FILE_NAME)
            .with_context(|| format!("Failed to create log file {}", LOG_FILE_NAME))?;
        loggers.push(WriteLogger::new(log_level, Config::default(), file));
    }

    CombinedLogger::init(loggers).context("Failed to initialize logger")?;
    Ok(())
}

/// The entity id is mandatory and must not be nil.
fn parse_entity_id(raw: Option<&str>) -> Uuid {
    let raw = match raw {
        Some(raw) => raw,
        None => usage_error("--entity-id is required"),
    };
    match Uuid::parse_str(raw) {
        Ok(id) if !id.is_nil() => id,
        Ok(_) => usage_error("--entity-id must not be the nil uuid"),
        Err(e) => usage_error(&format!("invalid --entity-id {}: {}", raw, e)),
    }
}

/// The app id is optional; a bad one is reported and ignored.
fn parse_app_id(raw: Option<&str>) -> Option<Uuid> {
    match raw.map(Uuid::parse_str) {
        Some(Ok(id)) if !id.is_nil() => Some(id),
        Some(Ok(_)) | None => {
            warn!("No app id given");
            None
        }
        Some(Err(e)) => {
            warn!("Ignoring invalid app id: {}", e);
            None
        }
    }
}

fn usage_error(message: &str) -> ! {
    eprintln!("error: {}\n\nFor more information, try '--help'.", message);
    std::process::exit(USAGE_EXIT_CODE)
}
