use crate::errors::domain::{classify_message_by_patterns, DomainError, ErrorCode};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryErrorCode {
    EnumerationFailed,
    PackageQueryFailed,
    PrincipalNotFound,
    InvalidInput,
    MetadataReadFailed,
    ManifestParseFailed,
    ConfigInvalid,
    WorkerUnavailable,
    UnknownError,
}

impl ErrorCode for DirectoryErrorCode {
    fn as_code_str(self) -> &'static str {
        match self {
            Self::EnumerationFailed => "enumeration_failed",
            Self::PackageQueryFailed => "package_query_failed",
            Self::PrincipalNotFound => "principal_not_found",
            Self::InvalidInput => "invalid_input",
            Self::MetadataReadFailed => "metadata_read_failed",
            Self::ManifestParseFailed => "manifest_parse_failed",
            Self::ConfigInvalid => "config_invalid",
            Self::WorkerUnavailable => "worker_unavailable",
            Self::UnknownError => "unknown_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryError {
    code: DirectoryErrorCode,
    message: String,
}

impl DirectoryError {
    pub fn new(code: DirectoryErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn enumeration(message: impl Into<String>) -> Self {
        Self::new(DirectoryErrorCode::EnumerationFailed, message)
    }

    pub fn package_query(message: impl Into<String>) -> Self {
        Self::new(DirectoryErrorCode::PackageQueryFailed, message)
    }

    pub fn from_external_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let code = classify_message_by_patterns(
            &message,
            DIRECTORY_CLASSIFICATION_RULES,
            DirectoryErrorCode::UnknownError,
        );
        Self::new(code, message)
    }

    pub fn code(&self) -> DirectoryErrorCode {
        self.code
    }
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DirectoryError {}

impl DomainError for DirectoryError {
    fn code_str(&self) -> &'static str {
        self.code.as_code_str()
    }

    fn message(&self) -> &str {
        &self.message
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

const DIRECTORY_CLASSIFICATION_RULES: &[(DirectoryErrorCode, &[&str])] = &[
    (
        DirectoryErrorCode::EnumerationFailed,
        &[
            "getpwent failed",
            "getgrent failed",
            "failed to open",
            "failed to close",
        ],
    ),
    (
        DirectoryErrorCode::PackageQueryFailed,
        &["failed to list installed applications", "failed to read packages"],
    ),
    (
        DirectoryErrorCode::ManifestParseFailed,
        &["malformed package entry"],
    ),
    (
        DirectoryErrorCode::ConfigInvalid,
        &["invalid config"],
    ),
    (
        DirectoryErrorCode::PrincipalNotFound,
        &["user not found", "group not found"],
    ),
    (
        DirectoryErrorCode::InvalidInput,
        &["empty principal", "nul byte"],
    ),
    (
        DirectoryErrorCode::MetadataReadFailed,
        &["failed to read metadata"],
    ),
    (
        DirectoryErrorCode::WorkerUnavailable,
        &["worker exited", "worker crashed"],
    ),
];
