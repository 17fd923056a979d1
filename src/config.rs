//! Runtime configuration: defaults, then an optional JSON file, then the
//! environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::principals::{
    ApplicationDirectory, DirectoryError, DirectoryErrorCode, DirectoryResult, NoApplications,
    PackagesListDirectory,
};

pub const ENV_PACKAGES_LIST: &str = "PRINCIPAL_DIR_PACKAGES_LIST";
pub const ENV_WORKERS: &str = "PRINCIPAL_DIR_WORKERS";
pub const ENV_LOG_DIR: &str = "PRINCIPAL_DIR_LOG_DIR";
pub const ENV_LOG_STDERR: &str = "PRINCIPAL_DIR_LOG_STDERR";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct DirectoryConfig {
    pub packages_list: Option<PathBuf>,
    pub worker_threads: Option<usize>,
    pub log_dir: Option<PathBuf>,
    pub log_to_stderr: bool,
}

impl DirectoryConfig {
    pub fn load(file: Option<&Path>) -> DirectoryResult<Self> {
        let mut config = match file {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> DirectoryResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DirectoryError::new(
                DirectoryErrorCode::ConfigInvalid,
                format!("Invalid config {}: {e}", path.display()),
            )
        })?;
        Self::from_json_str(&raw).map_err(|err| {
            DirectoryError::new(
                DirectoryErrorCode::ConfigInvalid,
                format!("Invalid config {}: {err}", path.display()),
            )
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Overrides fields from `lookup`; values that do not parse are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_PACKAGES_LIST).filter(|v| !v.trim().is_empty()) {
            self.packages_list = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup(ENV_WORKERS) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.worker_threads = Some(n),
                _ => warn!(key = ENV_WORKERS, value = %raw, "ignoring invalid worker count"),
            }
        }
        if let Some(path) = lookup(ENV_LOG_DIR).filter(|v| !v.trim().is_empty()) {
            self.log_dir = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup(ENV_LOG_STDERR) {
            match parse_flag(&raw) {
                Some(flag) => self.log_to_stderr = flag,
                None => warn!(key = ENV_LOG_STDERR, value = %raw, "ignoring invalid flag"),
            }
        }
    }

    pub fn application_directory(&self) -> Arc<dyn ApplicationDirectory> {
        match &self.packages_list {
            Some(path) => Arc::new(PackagesListDirectory::new(path.clone())),
            None => Arc::new(NoApplications),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
