//! Owner and group directory for file-ownership pickers.
//!
//! Enumerates the host's users or groups, merges in installed applications
//! that run under IDs the OS table does not name, and serves the result as an
//! observable, filterable list with a single selection.

pub mod config;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod picker;
pub mod principals;
pub mod reactive;

pub use config::DirectoryConfig;
pub use errors::api_error::{ApiError, ApiResult};
pub use executor::{InlineExecutor, SharedPoolExecutor, TaskExecutor};
pub use picker::{
    ChangeKind, FileJobExecutor, LoadRequest, LoadState, PrincipalChange, PrincipalDirectory,
    PrincipalPicker,
};
pub use principals::{
    ApplicationDirectory, ApplicationRef, DirectoryError, DirectoryErrorCode, Namespace,
    Principal,
};
