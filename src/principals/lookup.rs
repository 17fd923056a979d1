use std::fs;
#[cfg(unix)]
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use super::{DirectoryError, DirectoryErrorCode, DirectoryResult, Namespace};

/// Name of a single user or group, `None` when the table has no entry.
#[cfg(unix)]
pub fn lookup_name(namespace: Namespace, id: u32) -> Option<String> {
    match namespace {
        Namespace::User => with_growing_buffer(
            |pwd: *mut libc::passwd, buf, len, result| unsafe {
                libc::getpwuid_r(id, pwd, buf, len, result)
            },
            |pwd| unsafe { owned_name(pwd.pw_name) },
        )
        .flatten(),
        Namespace::Group => with_growing_buffer(
            |grp: *mut libc::group, buf, len, result| unsafe {
                libc::getgrgid_r(id, grp, buf, len, result)
            },
            |grp| unsafe { owned_name(grp.gr_name) },
        )
        .flatten(),
    }
}

#[cfg(not(unix))]
pub fn lookup_name(_namespace: Namespace, _id: u32) -> Option<String> {
    None
}

/// Numeric ID for a user or group name.
#[cfg(unix)]
pub fn lookup_id(namespace: Namespace, name: &str) -> Option<u32> {
    let c_name = std::ffi::CString::new(name).ok()?;
    match namespace {
        Namespace::User => with_growing_buffer(
            |pwd: *mut libc::passwd, buf, len, result| unsafe {
                libc::getpwnam_r(c_name.as_ptr(), pwd, buf, len, result)
            },
            |pwd| pwd.pw_uid,
        ),
        Namespace::Group => with_growing_buffer(
            |grp: *mut libc::group, buf, len, result| unsafe {
                libc::getgrnam_r(c_name.as_ptr(), grp, buf, len, result)
            },
            |grp| grp.gr_gid,
        ),
    }
}

#[cfg(not(unix))]
pub fn lookup_id(_namespace: Namespace, _name: &str) -> Option<u32> {
    None
}

/// Accepts either a numeric ID or a principal name.
pub fn resolve_spec(namespace: Namespace, spec: &str) -> DirectoryResult<u32> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(DirectoryError::new(
            DirectoryErrorCode::InvalidInput,
            format!("Empty principal for {namespace}"),
        ));
    }
    if spec.contains('\0') {
        return Err(DirectoryError::new(
            DirectoryErrorCode::InvalidInput,
            "Principal contains nul byte",
        ));
    }
    if let Ok(id) = spec.parse::<u32>() {
        return Ok(id);
    }
    lookup_id(namespace, spec).ok_or_else(|| {
        let kind = match namespace {
            Namespace::User => "User",
            Namespace::Group => "Group",
        };
        DirectoryError::new(
            DirectoryErrorCode::PrincipalNotFound,
            format!("{kind} not found: {spec}"),
        )
    })
}

/// Owner UID or group GID of `path`, without following a final symlink.
#[cfg(unix)]
pub fn current_principal_id(path: &Path, namespace: Namespace) -> DirectoryResult<u32> {
    let meta = fs::symlink_metadata(path).map_err(|e| {
        DirectoryError::new(
            DirectoryErrorCode::MetadataReadFailed,
            format!("Failed to read metadata for {}: {e}", path.display()),
        )
    })?;
    Ok(match namespace {
        Namespace::User => meta.uid(),
        Namespace::Group => meta.gid(),
    })
}

#[cfg(not(unix))]
pub fn current_principal_id(path: &Path, namespace: Namespace) -> DirectoryResult<u32> {
    fs::symlink_metadata(path).map_err(|e| {
        DirectoryError::new(
            DirectoryErrorCode::MetadataReadFailed,
            format!("Failed to read metadata for {}: {e}", path.display()),
        )
    })?;
    Err(DirectoryError::new(
        DirectoryErrorCode::MetadataReadFailed,
        format!("File {namespace} is not supported on this platform"),
    ))
}

/// Runs a reentrant `get*_r` call, doubling the scratch buffer on `ERANGE`.
///
/// `extract` sees the record while the buffer its strings point into is alive.
#[cfg(unix)]
fn with_growing_buffer<T, R, F, X>(mut call: F, extract: X) -> Option<R>
where
    F: FnMut(*mut T, *mut libc::c_char, libc::size_t, *mut *mut T) -> libc::c_int,
    X: FnOnce(&T) -> R,
{
    use std::mem::MaybeUninit;
    use std::ptr;

    let mut buf_len = 1024usize;
    for _ in 0..4 {
        let mut record = MaybeUninit::<T>::zeroed();
        let mut result: *mut T = ptr::null_mut();
        let mut buf = vec![0u8; buf_len];
        let rc = call(
            record.as_mut_ptr(),
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            &mut result,
        );
        if rc == 0 {
            if result.is_null() {
                return None;
            }
            let record = unsafe { record.assume_init() };
            return Some(extract(&record));
        }
        if rc == libc::ERANGE {
            buf_len *= 2;
            continue;
        }
        return None;
    }
    None
}

#[cfg(unix)]
unsafe fn owned_name(ptr: *const libc::c_char) -> Option<String> {
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
