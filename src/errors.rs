// src/errors.rs

//! Crate-wide error type and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RebuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Config path does not exist: {}", .0.display())]
    MissingConfigPath(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Another instance (PID {pid}) still running after {retries} retries")]
    AlreadyRunning { pid: i32, retries: u32 },

    #[error("Failed to connect to the watch service after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RebuildError>;
