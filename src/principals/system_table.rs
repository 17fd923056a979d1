#[cfg(unix)]
use std::sync::{Condvar, Mutex};
use tracing::{debug, trace};

use super::{DirectoryError, DirectoryResult, Namespace, OsEntry, PrincipalTableReader};

// The libc passwd and group cursors are process-global; one reader per
// database at a time.
#[cfg(unix)]
struct CursorLock {
    busy: Mutex<bool>,
    released: Condvar,
}

#[cfg(unix)]
impl CursorLock {
    const fn new() -> Self {
        Self {
            busy: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    fn acquire(&self) {
        // Poisoning only means another reader panicked; the flag itself stays valid.
        let mut busy = self.busy.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while *busy {
            busy = self
                .released
                .wait(busy)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *busy = true;
    }

    fn release(&self) {
        let mut busy = self.busy.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *busy = false;
        self.released.notify_one();
    }
}

#[cfg(unix)]
static PASSWD_CURSOR: CursorLock = CursorLock::new();
#[cfg(unix)]
static GROUP_CURSOR: CursorLock = CursorLock::new();

#[cfg(unix)]
fn cursor_lock(namespace: Namespace) -> &'static CursorLock {
    match namespace {
        Namespace::User => &PASSWD_CURSOR,
        Namespace::Group => &GROUP_CURSOR,
    }
}

/// Reads the host's passwd or group database through libc.
///
/// An open table holds its database's cursor until it is closed or dropped.
/// Opening a second table of the same namespace blocks until then, so a
/// thread must not open one while it already holds another of that namespace.
/// Users and groups lock independently.
pub struct SystemTable {
    namespace: Namespace,
    is_open: bool,
}

impl SystemTable {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            is_open: false,
        }
    }

    pub fn users() -> Self {
        Self::new(Namespace::User)
    }

    pub fn groups() -> Self {
        Self::new(Namespace::Group)
    }
}

impl PrincipalTableReader for SystemTable {
    fn namespace(&self) -> Namespace {
        self.namespace
    }

    #[cfg(unix)]
    fn open(&mut self) -> DirectoryResult<()> {
        if self.is_open {
            return Err(DirectoryError::enumeration(format!(
                "Failed to open {} table: already open",
                self.namespace
            )));
        }
        cursor_lock(self.namespace).acquire();
        // setpwent/setgrent report no errors; failures surface on the first read.
        match self.namespace {
            Namespace::User => unsafe { libc::setpwent() },
            Namespace::Group => unsafe { libc::setgrent() },
        }
        self.is_open = true;
        trace!(namespace = %self.namespace, "principal table opened");
        Ok(())
    }

    #[cfg(not(unix))]
    fn open(&mut self) -> DirectoryResult<()> {
        Err(DirectoryError::enumeration(format!(
            "Enumerating the {} table is not supported on this platform",
            self.namespace
        )))
    }

    #[cfg(unix)]
    fn next_entry(&mut self) -> DirectoryResult<Option<OsEntry>> {
        if !self.is_open {
            return Err(DirectoryError::enumeration(format!(
                "Failed to read {} table: table is not open",
                self.namespace
            )));
        }
        loop {
            let entry = match self.namespace {
                Namespace::User => read_passwd()?,
                Namespace::Group => read_group()?,
            };
            let Some(entry) = entry else {
                return Ok(None);
            };
            match platform_filter(&entry) {
                EntryDisposition::Keep => return Ok(Some(entry)),
                EntryDisposition::Skip => {
                    trace!(id = entry.id, "skipping vendor principal");
                    continue;
                }
                EntryDisposition::Stop => {
                    debug!(id = entry.id, "reached synthesized principals, stopping read");
                    return Ok(None);
                }
            }
        }
    }

    #[cfg(not(unix))]
    fn next_entry(&mut self) -> DirectoryResult<Option<OsEntry>> {
        Ok(None)
    }

    #[cfg(unix)]
    fn close(&mut self) -> DirectoryResult<()> {
        if !self.is_open {
            return Ok(());
        }
        match self.namespace {
            Namespace::User => unsafe { libc::endpwent() },
            Namespace::Group => unsafe { libc::endgrent() },
        }
        self.is_open = false;
        cursor_lock(self.namespace).release();
        trace!(namespace = %self.namespace, "principal table closed");
        Ok(())
    }

    #[cfg(not(unix))]
    fn close(&mut self) -> DirectoryResult<()> {
        Ok(())
    }
}

impl Drop for SystemTable {
    fn drop(&mut self) {
        if self.is_open {
            let _ = self.close();
        }
    }
}

#[cfg(unix)]
fn os_failure(context: &str, err: std::io::Error) -> DirectoryError {
    debug!(context, error = %err, "principal table call failed");
    DirectoryError::enumeration(format!("{context}: {err}"))
}

/// Only the errors POSIX lists for getpwent/getgrent count; NSS backends
/// leave unrelated errno values (ENOENT, ECONNREFUSED from nscd lookups) at
/// end of table.
#[cfg(unix)]
fn is_read_failure(err: &std::io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EIO | libc::EMFILE | libc::ENFILE | libc::ENOMEM | libc::ERANGE)
    )
}

#[cfg(unix)]
fn read_passwd() -> DirectoryResult<Option<OsEntry>> {
    loop {
        errno::clear();
        let pwd = unsafe { libc::getpwent() };
        if pwd.is_null() {
            return match errno::take() {
                Some(err) if err.raw_os_error() == Some(libc::EINTR) => continue,
                Some(err) if is_read_failure(&err) => Err(os_failure("getpwent failed", err)),
                _ => Ok(None),
            };
        }
        let (id, name) = unsafe { ((*pwd).pw_uid, c_name((*pwd).pw_name)) };
        return Ok(Some(OsEntry { id, name }));
    }
}

#[cfg(unix)]
fn read_group() -> DirectoryResult<Option<OsEntry>> {
    loop {
        errno::clear();
        let grp = unsafe { libc::getgrent() };
        if grp.is_null() {
            return match errno::take() {
                Some(err) if err.raw_os_error() == Some(libc::EINTR) => continue,
                Some(err) if is_read_failure(&err) => Err(os_failure("getgrent failed", err)),
                _ => Ok(None),
            };
        }
        let (id, name) = unsafe { ((*grp).gr_gid, c_name((*grp).gr_name)) };
        return Ok(Some(OsEntry { id, name }));
    }
}

#[cfg(unix)]
unsafe fn c_name(ptr: *const libc::c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let name = std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum EntryDisposition {
    Keep,
    Skip,
    Stop,
}

/// Android's bionic walks OEM ranges and then per-app identities after the
/// fixed system accounts; both are left out so the merge can name apps itself.
#[cfg(target_os = "android")]
fn platform_filter(entry: &OsEntry) -> EntryDisposition {
    classify_bionic_name(entry.name.as_deref())
}

#[cfg(not(target_os = "android"))]
fn platform_filter(_entry: &OsEntry) -> EntryDisposition {
    EntryDisposition::Keep
}

#[cfg_attr(not(any(test, target_os = "android")), allow(dead_code))]
fn classify_bionic_name(name: Option<&str>) -> EntryDisposition {
    let Some(name) = name else {
        return EntryDisposition::Keep;
    };
    if name.starts_with("oem_") {
        return EntryDisposition::Skip;
    }
    let mut chars = name.chars();
    if chars.next() == Some('u') && chars.next().is_some_and(|c| c.is_ascii_digit()) {
        return EntryDisposition::Stop;
    }
    EntryDisposition::Keep
}

#[cfg(unix)]
mod errno {
    #[cfg(any(target_os = "linux", target_os = "emscripten"))]
    fn location() -> *mut libc::c_int {
        unsafe { libc::__errno_location() }
    }

    #[cfg(any(target_os = "android", target_os = "netbsd", target_os = "openbsd"))]
    fn location() -> *mut libc::c_int {
        unsafe { libc::__errno() }
    }

    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    fn location() -> *mut libc::c_int {
        unsafe { libc::__error() }
    }

    #[cfg(any(
        target_os = "linux",
        target_os = "emscripten",
        target_os = "android",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd"
    ))]
    pub(super) fn clear() {
        unsafe { *location() = 0 };
    }

    // Without a known errno location a stale value may remain; only the
    // read-failure errno set is acted on, so end of table still reads as such.
    #[cfg(not(any(
        target_os = "linux",
        target_os = "emscripten",
        target_os = "android",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd"
    )))]
    pub(super) fn clear() {}

    pub(super) fn take() -> Option<std::io::Error> {
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            None | Some(0) => None,
            Some(_) => Some(err),
        }
    }
}
