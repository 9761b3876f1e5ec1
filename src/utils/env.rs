// src/utils/env.rs
use log::{debug, info, warn};
use std::path::PathBuf;

/// Loads a `.env` file from the working directory (or a parent) if present.
/// Variables already set in the process environment win.
///
/// Runs before the logger exists so `RUST_LOG` can come from `.env`; pass the
/// result to [`report_env`] once logging is initialised.
pub fn load_env() -> dotenv::Result<PathBuf> {
    dotenv::dotenv()
}

/// Logs the outcome of [`load_env`] and returns the loaded file, if any.
pub fn report_env(result: dotenv::Result<PathBuf>) -> Option<PathBuf> {
    match result {
        Ok(path) => {
            info!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => {
            debug!("No .env file found, using process environment");
            None
        }
        Err(e) => {
            warn!("Failed to load .env file: {}", e);
            None
        }
    }
}
