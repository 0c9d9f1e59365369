//! Errors of the command-line front end

use std::io;
use std::path::PathBuf;

use syncpulse_core::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Cannot read {}: {source}", .path.display())]
    ReadConfig { path: PathBuf, source: io::Error },

    #[error("Invalid configuration file {}: {source}", .path.display())]
    ParseConfig {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Cannot render configuration: {0}")]
    RenderConfig(#[from] serde_yaml::Error),

    #[error("Cannot install signal handler: {0}")]
    Signal(io::Error),

    #[error("Cannot write output: {0}")]
    Output(#[from] io::Error),
}

pub type CliResult<T> = std::result::Result<T, CliError>;
