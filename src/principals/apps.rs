use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::{DirectoryError, DirectoryErrorCode, DirectoryResult};

/// An installed application as reported by the package directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRef {
    pub package_name: String,
    pub version_code: u64,
    /// Numeric ID the application runs under.
    pub uid: u32,
}

impl ApplicationRef {
    pub fn new(package_name: impl Into<String>, version_code: u64, uid: u32) -> Self {
        Self {
            package_name: package_name.into(),
            version_code,
            uid,
        }
    }
}

/// Source of installed applications; may be slow, so only call it off the
/// observing thread.
pub trait ApplicationDirectory: Send + Sync {
    fn list_installed_applications(&self) -> DirectoryResult<Vec<ApplicationRef>>;
    fn label(&self, app: &ApplicationRef) -> String;
}

/// Host without per-application identities.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoApplications;

impl ApplicationDirectory for NoApplications {
    fn list_installed_applications(&self) -> DirectoryResult<Vec<ApplicationRef>> {
        Ok(Vec::new())
    }

    fn label(&self, app: &ApplicationRef) -> String {
        app.package_name.clone()
    }
}

/// Fixed application list supplied by an embedding host.
#[derive(Debug, Clone, Default)]
pub struct StaticApplications {
    apps: Vec<ApplicationRef>,
    labels: HashMap<String, String>,
}

impl StaticApplications {
    pub fn new(apps: Vec<ApplicationRef>) -> Self {
        Self {
            apps,
            labels: HashMap::new(),
        }
    }

    pub fn with_label(mut self, package_name: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(package_name.into(), label.into());
        self
    }
}

impl ApplicationDirectory for StaticApplications {
    fn list_installed_applications(&self) -> DirectoryResult<Vec<ApplicationRef>> {
        Ok(self.apps.clone())
    }

    fn label(&self, app: &ApplicationRef) -> String {
        self.labels
            .get(&app.package_name)
            .cloned()
            .unwrap_or_else(|| app.package_name.clone())
    }
}

/// Reads an Android `packages.list` manifest.
///
/// Each line is `<package> <uid> <debuggable> <dataDir> <seinfo> <gids>...`.
/// The manifest carries no version, so every entry reports version code 0.
#[derive(Debug, Clone)]
pub struct PackagesListDirectory {
    path: PathBuf,
}

impl PackagesListDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ApplicationDirectory for PackagesListDirectory {
    fn list_installed_applications(&self) -> DirectoryResult<Vec<ApplicationRef>> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "packages manifest unreadable");
            DirectoryError::package_query(format!(
                "Failed to read packages manifest {}: {e}",
                self.path.display()
            ))
        })?;
        let apps = parse_packages_list(&raw)?;
        debug!(path = %self.path.display(), count = apps.len(), "packages manifest loaded");
        Ok(apps)
    }

    fn label(&self, app: &ApplicationRef) -> String {
        app.package_name.clone()
    }
}

pub(crate) fn parse_packages_list(raw: &str) -> DirectoryResult<Vec<ApplicationRef>> {
    let mut apps = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let package = fields.next().unwrap_or_default();
        let uid = fields.next().and_then(|raw| raw.parse::<u32>().ok());
        let Some(uid) = uid else {
            return Err(DirectoryError::new(
                DirectoryErrorCode::ManifestParseFailed,
                format!("Malformed package entry on line {}: {line}", idx + 1),
            ));
        };
        apps.push(ApplicationRef::new(package, 0, uid));
    }
    Ok(apps)
}
