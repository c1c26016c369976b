//! Log path validation.
//!
//! A path is summarizable only when it names an existing regular file
//! inside a configured watch directory or alert-log-path entry. Paths
//! are normalized lexically before comparison.

use std::path::{Component, Path, PathBuf};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::models::Config;

/// Allow-list derived from configuration at startup.
#[derive(Debug, Clone, Default)]
pub struct PathAllowList {
    watch_dirs: Vec<PathBuf>,
    alert_paths: Vec<PathBuf>,
}

impl PathAllowList {
    pub fn from_config(config: &Config) -> Self {
        Self {
            watch_dirs: config
                .watch_dir_list()
                .iter()
                .map(|p| clean_path(Path::new(p)))
                .collect(),
            alert_paths: config
                .alert_log_path_list()
                .iter()
                .map(|p| clean_path(Path::new(p)))
                .collect(),
        }
    }

    /// Validate a raw request path and return its normalized form.
    pub fn validate(&self, raw: &str) -> DomainResult<PathBuf> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DomainError::invalid("path is required"));
        }

        let path = clean_path(Path::new(raw));
        let meta = std::fs::metadata(&path)
            .map_err(|_| DomainError::invalid(format!("log file not found: {}", path.display())))?;
        if !meta.is_file() {
            return Err(DomainError::invalid(format!(
                "not a regular file: {}",
                path.display()
            )));
        }

        let inside_watch = self.watch_dirs.iter().any(|dir| path.starts_with(dir));
        // Alert entries may name a file exactly or a directory prefix.
        let inside_alert = self
            .alert_paths
            .iter()
            .any(|entry| path == *entry || path.starts_with(entry));

        if inside_watch || inside_alert {
            Ok(path)
        } else {
            Err(DomainError::Forbidden(format!(
                "path is outside the allowed log directories: {}",
                path.display()
            )))
        }
    }
}

/// Lexical path normalization: resolves `.` and `..` without touching
/// the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push(Component::ParentDir);
                }
            }
            other => cleaned.push(other),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}
