use std::sync::Arc;
use tracing::trace;

use super::LoadState;
use crate::principals::Principal;

/// Case-sensitive substring match over the ID, name, package names and labels.
pub fn matches(principal: &Principal, filter: &str) -> bool {
    principal.id.to_string().contains(filter)
        || principal
            .name
            .as_deref()
            .is_some_and(|name| name.contains(filter))
        || principal
            .associated_apps
            .iter()
            .any(|app| app.package_name.contains(filter))
        || principal
            .associated_labels
            .iter()
            .any(|label| label.contains(filter))
}

/// Filters a successful load from scratch; other states pass through.
pub fn recompute(base: &LoadState, filter: &str) -> LoadState {
    if filter.is_empty() {
        return base.clone();
    }
    match base {
        LoadState::Success(principals) => {
            let kept: Vec<Principal> = principals
                .iter()
                .filter(|principal| matches(principal, filter))
                .cloned()
                .collect();
            trace!(filter, total = principals.len(), kept = kept.len(), "filter recomputed");
            LoadState::Success(Arc::new(kept))
        }
        other => other.clone(),
    }
}

/// Index of `id` in an ID-sorted list.
pub fn position_by_id(principals: &[Principal], id: u32) -> Option<usize> {
    principals
        .binary_search_by_key(&id, |principal| principal.id)
        .ok()
}
