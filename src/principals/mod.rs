//! Identity model shared by the user and group directories.

use serde::Serialize;

mod apps;
mod enumerator;
mod error;
mod lookup;
mod merge;
mod naming;
mod system_table;

pub use apps::{
    ApplicationDirectory, ApplicationRef, NoApplications, PackagesListDirectory,
    StaticApplications,
};
pub use enumerator::{enumerate, OsEntry, PrincipalTableReader};
pub use error::{DirectoryError, DirectoryErrorCode, DirectoryResult};
pub use lookup::{current_principal_id, lookup_id, lookup_name, resolve_spec};
pub use merge::merge;
pub use naming::synthesize_name;
pub use system_table::SystemTable;

/// Whether numeric IDs are resolved as UIDs or GIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    User,
    Group,
}

/// Namespace-specific branches of the synthetic naming convention.
///
/// Applications get one canonical UID but may hold extra GIDs for shared and
/// cache access, so only the group namespace enables those ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingRules {
    pub shared_gids: bool,
    pub cache_gids: bool,
}

impl Namespace {
    pub fn rules(self) -> NamingRules {
        match self {
            Namespace::User => NamingRules {
                shared_gids: false,
                cache_gids: false,
            },
            Namespace::Group => NamingRules {
                shared_gids: true,
                cache_gids: true,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::User => "user",
            Namespace::Group => "group",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One identity in a merged directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: u32,
    pub name: Option<String>,
    pub associated_apps: Vec<ApplicationRef>,
    /// Display labels for `associated_apps`, same order and length.
    pub associated_labels: Vec<String>,
}

impl Principal {
    pub fn from_os(id: u32, name: Option<String>) -> Self {
        Self {
            id,
            name,
            associated_apps: Vec::new(),
            associated_labels: Vec::new(),
        }
    }

    /// `"name (id)"` when named, the bare ID otherwise.
    pub fn display_text(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} ({})", self.id),
            None => self.id.to_string(),
        }
    }

    /// Label of the first associated application; `None` for pure OS identities.
    pub fn primary_label(&self) -> Option<&str> {
        self.associated_labels.first().map(String::as_str)
    }

    pub fn is_application(&self) -> bool {
        !self.associated_apps.is_empty()
    }
}
