use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::{synthesize_name, ApplicationRef, Namespace, OsEntry, Principal};

/// Joins the OS table with installed applications into one ID-sorted list.
///
/// OS entries keep their own name even when an application shares the ID.
/// Applications whose ID is not in the table are grouped per ID and named by
/// [`synthesize_name`]. When the table repeats an ID, the first row wins, the
/// same row `getpwuid`/`getgrgid` would return.
pub fn merge<L>(
    os_entries: Vec<OsEntry>,
    installed_apps: Vec<ApplicationRef>,
    namespace: Namespace,
    label: L,
) -> Vec<Principal>
where
    L: Fn(&ApplicationRef) -> String,
{
    let mut os_ids: HashSet<u32> = HashSet::with_capacity(os_entries.len());
    let mut principals: Vec<Principal> = Vec::with_capacity(os_entries.len());
    for entry in os_entries {
        if !os_ids.insert(entry.id) {
            debug!(id = entry.id, namespace = %namespace, "duplicate OS principal ignored");
            continue;
        }
        principals.push(Principal::from_os(entry.id, entry.name));
    }
    let os_count = principals.len();

    let mut app_groups: BTreeMap<u32, Vec<ApplicationRef>> = BTreeMap::new();
    for app in installed_apps {
        if os_ids.contains(&app.uid) {
            continue;
        }
        app_groups.entry(app.uid).or_default().push(app);
    }

    for (id, apps) in app_groups {
        let labels = apps.iter().map(&label).collect();
        principals.push(Principal {
            id,
            name: Some(synthesize_name(id, namespace)),
            associated_apps: apps,
            associated_labels: labels,
        });
    }

    principals.sort_by_key(|principal| principal.id);
    debug!(
        namespace = %namespace,
        os = os_count,
        synthesized = principals.len() - os_count,
        "principal merge done"
    );
    principals
}
