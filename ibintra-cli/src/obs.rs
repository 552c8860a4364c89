use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Console logging on stderr, plus an append-only plain-text file when `file` is set.
///
/// `IBINTRA_LOG` overrides the configured level.
pub fn init_logging(level: &str, file: Option<&Path>) -> Result<()> {
    let filter = std::env::var("IBINTRA_LOG").unwrap_or_else(|_| level.to_string());
    let env_filter =
        EnvFilter::try_new(&filter).with_context(|| format!("invalid log filter '{filter}'"))?;

    let console = fmt::layer().with_writer(std::io::stderr);

    let file_layer = match file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)
                    .with_context(|| format!("create log directory {}", dir.display()))?;
            }
            let handle = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(handle)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}
