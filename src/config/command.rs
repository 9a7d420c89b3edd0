// src/config/command.rs

//! Platform rebuild command detection.

use std::fmt;

use crate::errors::{RebuildError, Result};
use crate::types::CommandSource;

const REBUILD_ARGS: &str = "switch --impure -L --flake .";

// Full paths: sudo's secure_path usually lacks the nix profile.
const DARWIN_REBUILD: &str = "/run/current-system/sw/bin/darwin-rebuild";
const NIXOS_REBUILD: &str = "/run/current-system/sw/bin/nixos-rebuild";

/// A shell command line plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildCommand {
    pub line: String,
    pub source: CommandSource,
}

impl RebuildCommand {
    pub fn explicit(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            source: CommandSource::Explicit,
        }
    }
}

impl fmt::Display for RebuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// Pick the rebuild command for the running host.
pub fn detect_rebuild_command() -> Result<RebuildCommand> {
    let is_root = nix::unistd::geteuid().is_root();
    let line = rebuild_command_for(std::env::consts::OS, is_root)?;
    Ok(RebuildCommand {
        line,
        source: CommandSource::Detected,
    })
}

/// Command line for `os` (as in `std::env::consts::OS`).
///
/// `sudo -E` is prepended unless already running as root; `-E` keeps
/// `NIXPKGS_ALLOW_UNFREE` visible to the rebuild.
pub fn rebuild_command_for(os: &str, is_root: bool) -> Result<String> {
    let binary = match os {
        "macos" => DARWIN_REBUILD,
        "linux" => NIXOS_REBUILD,
        other => return Err(RebuildError::UnsupportedPlatform(other.to_string())),
    };
    let sudo_prefix = if is_root { "" } else { "sudo -E " };
    Ok(format!("{sudo_prefix}{binary} {REBUILD_ARGS}"))
}
