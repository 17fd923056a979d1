use super::Namespace;

pub(crate) const AID_USER_OFFSET: u32 = 100_000;
pub(crate) const AID_APP_START: u32 = 10_000;
pub(crate) const AID_CACHE_GID_START: u32 = 20_000;
pub(crate) const AID_CACHE_GID_END: u32 = 29_999;
pub(crate) const AID_SHARED_GID_START: u32 = 50_000;
pub(crate) const AID_SHARED_GID_END: u32 = 59_999;
pub(crate) const AID_ISOLATED_START: u32 = 99_000;

/// Builds the display name for an ID the OS table did not name.
///
/// The ID splits into a profile slot (`id / 100000`) and a local app ID
/// (`id % 100000`). Isolated processes win first; the shared and cache GID
/// ranges only apply when the namespace rules enable them; everything else is
/// an ordinary per-app identity.
pub fn synthesize_name(id: u32, namespace: Namespace) -> String {
    let rules = namespace.rules();
    let user_id = id / AID_USER_OFFSET;
    let app_id = id % AID_USER_OFFSET;

    if app_id > AID_ISOLATED_START {
        return format!("u{user_id}_i{}", app_id - AID_ISOLATED_START);
    }
    if rules.shared_gids
        && user_id == 0
        && (AID_SHARED_GID_START..=AID_SHARED_GID_END).contains(&app_id)
    {
        return format!("all_a{}", app_id - AID_SHARED_GID_START);
    }
    if rules.cache_gids && (AID_CACHE_GID_START..=AID_CACHE_GID_END).contains(&app_id) {
        return format!("u{user_id}_a{}_cache", app_id - AID_CACHE_GID_START);
    }
    // Below the app range the offset goes negative, as the platform's own
    // formatter prints it.
    format!("u{user_id}_a{}", i64::from(app_id) - i64::from(AID_APP_START))
}
