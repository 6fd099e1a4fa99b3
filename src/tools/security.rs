//! Plugin security checks
//!
//! Two independent filters:
//! - [`EntryJail`] keeps a manifest's entry point inside its plugin directory
//! - [`check_command`] is an advisory deny-list for the `execute:` shell path
//!
//! Neither is a sandbox. Plugin code runs with the privileges of the host
//! process.

use crate::errors::{AlfredError, Result};
use std::path::{Path, PathBuf};

/// Substrings that get a shell command rejected outright
pub const BLOCKED_COMMANDS: &[&str] = &["rm -rf", "sudo", "passwd", "del /f"];

/// Message returned in place of output for a blocked command
pub const BLOCKED_MESSAGE: &str = "Error: Dangerous command blocked";

/// Returns the first deny-list entry contained in `command`
pub fn check_command(command: &str) -> Option<&'static str> {
    BLOCKED_COMMANDS
        .iter()
        .copied()
        .find(|pattern| command.contains(pattern))
}

/// Confines entry-point resolution to one plugin directory
#[derive(Debug, Clone)]
pub struct EntryJail {
    /// Canonicalized plugin directory
    root: PathBuf,
}

impl EntryJail {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|e| {
            AlfredError::Manifest(format!(
                "plugin directory {} is not accessible: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    /// Resolve an existing entry file, rejecting anything outside the root
    pub fn resolve(&self, entry_point: &str) -> Result<PathBuf> {
        let candidate = self.root.join(entry_point);
        let canonical = candidate.canonicalize().map_err(|_| {
            AlfredError::Manifest(format!(
                "entry point not found: {}",
                candidate.display()
            ))
        })?;

        if !canonical.starts_with(&self.root) {
            return Err(AlfredError::Manifest(format!(
                "entry point escapes plugin directory: {}",
                entry_point
            )));
        }
        if !canonical.is_file() {
            return Err(AlfredError::Manifest(format!(
                "entry point is not a file: {}",
                canonical.display()
            )));
        }

        Ok(canonical)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
