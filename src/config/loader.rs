// src/config/loader.rs

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::command::{detect_rebuild_command, RebuildCommand};
use crate::config::model::{DaemonConfig, IgnoreConfig};
use crate::errors::{RebuildError, Result};

/// Per-project ignore file, relative to the config root.
pub const IGNORE_CONFIG_FILE: &str = ".watchman-rebuild.json";

pub fn ignore_config_path(config_path: &Path) -> PathBuf {
    config_path.join(IGNORE_CONFIG_FILE)
}

/// Read and deserialize the ignore file.
///
/// Returns `Ok(None)` when the file does not exist. Malformed JSON is an
/// error here; [`load_ignore_patterns`] is the lenient entry point.
pub fn load_ignore_config(config_path: &Path) -> Result<Option<IgnoreConfig>> {
    let path = ignore_config_path(config_path);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let config: IgnoreConfig = serde_json::from_str(&contents)?;
    Ok(Some(config))
}

/// Ignore patterns for `config_path`, normalised for filter construction.
///
/// A missing file yields no patterns. A file that cannot be read or parsed is
/// logged and also yields no patterns, so a typo never stops the daemon.
pub fn load_ignore_patterns(config_path: &Path) -> Vec<String> {
    match load_ignore_config(config_path) {
        Ok(Some(config)) => normalise_patterns(config.ignore_patterns),
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!(
                file = %ignore_config_path(config_path).display(),
                error = %err,
                "failed to parse ignore config; watching everything"
            );
            Vec::new()
        }
    }
}

/// Strip trailing slashes so `result/` and `result` mean the same subtree.
fn normalise_patterns(patterns: Vec<String>) -> Vec<String> {
    patterns
        .into_iter()
        .map(|p| p.trim_end_matches('/').to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Resolve everything the daemon needs from the CLI inputs.
///
/// The config path must already exist; an explicit command wins over
/// platform detection.
pub fn load_daemon_config(config_path: &Path, command: Option<String>) -> Result<DaemonConfig> {
    if !config_path.exists() {
        return Err(RebuildError::MissingConfigPath(config_path.to_path_buf()));
    }

    let command = match command {
        Some(line) => RebuildCommand::explicit(line),
        None => detect_rebuild_command()?,
    };

    Ok(DaemonConfig {
        config_path: config_path.to_path_buf(),
        command,
        ignore_patterns: load_ignore_patterns(config_path),
    })
}
