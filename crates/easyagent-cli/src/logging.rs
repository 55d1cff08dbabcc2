use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub enum LogTarget {
    Stderr,
    /// The full-screen UI owns the terminal, so logs go to a file.
    File(PathBuf),
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init(level: &str, target: LogTarget) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .without_time()
            .try_init()
            .map_err(|err| err.to_string())?,
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .map_err(|err| err.to_string())?;
        }
    }
    Ok(())
}
