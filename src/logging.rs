use std::{fs::OpenOptions, path::Path, sync::Mutex};

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

const LOG_FILE: &str = "montse.log";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Logs to stderr, filtered by `RUST_LOG`.
pub fn init_stderr() {
    fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Logs to `montse.log` inside `data_dir`, for front ends that own the
/// terminal.
pub fn init_file(data_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join(LOG_FILE))?;

    fmt()
        .with_env_filter(filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
