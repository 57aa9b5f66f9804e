//! Error types for Agent Mesh.
//!
//! Every failure carries a machine-readable [`ErrorKind`] and, where a record
//! is involved, the address of that record.

use crate::core::types::{Address, Hash256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Agent Mesh operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of record an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Agent,
    ModelProfile,
    Intent,
    Blob,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Agent => write!(f, "agent"),
            RecordKind::ModelProfile => write!(f, "model_profile"),
            RecordKind::Intent => write!(f, "intent"),
            RecordKind::Blob => write!(f, "blob"),
        }
    }
}

/// Machine-readable error classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionDenied,
    NotFound,
    InvalidState,
    InvalidArgument,
    IntegrityViolation,
    NoProviderConfigured,
    UnsupportedAction,
    BackendUnavailable,
    BackendTimeout,
    AlreadyExists,
    RateLimited,
    Storage,
    Serialization,
    Config,
}

impl ErrorKind {
    /// Stable string form of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::IntegrityViolation => "integrity_violation",
            ErrorKind::NoProviderConfigured => "no_provider_configured",
            ErrorKind::UnsupportedAction => "unsupported_action",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::BackendTimeout => "backend_timeout",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Storage => "storage",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in Agent Mesh operations.
#[derive(Error, Debug)]
pub enum Error {
    // Authorization errors
    #[error("Permission denied for {address}: {reason}")]
    PermissionDenied { address: Address, reason: String },

    // Lookup errors
    #[error("{kind} not found: {address}")]
    NotFound { kind: RecordKind, address: Address },

    #[error("{kind} already exists: {address}")]
    AlreadyExists { kind: RecordKind, address: Address },

    // State machine errors
    #[error("Invalid state for {address}: {reason}")]
    InvalidState { address: Address, reason: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        address: Option<Address>,
        reason: String,
    },

    // Integrity errors
    #[error("Integrity violation on {address}: expected digest {expected}, computed {actual}")]
    IntegrityViolation {
        address: Address,
        expected: Hash256,
        actual: Hash256,
    },

    // Routing and execution errors
    #[error("No provider configured for {address}")]
    NoProviderConfigured { address: Address },

    #[error("Unsupported action '{action}' requested by {address}")]
    UnsupportedAction { address: Address, action: String },

    #[error("Backend unavailable while processing {address}: {reason}")]
    BackendUnavailable { address: Address, reason: String },

    #[error("Backend timed out after {after_ms}ms while processing {address}")]
    BackendTimeout { address: Address, after_ms: u64 },

    #[error("Rate limit exceeded for {address}: {reason}")]
    RateLimited { address: Address, reason: String },

    // Infrastructure errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::IntegrityViolation { .. } => ErrorKind::IntegrityViolation,
            Error::NoProviderConfigured { .. } => ErrorKind::NoProviderConfigured,
            Error::UnsupportedAction { .. } => ErrorKind::UnsupportedAction,
            Error::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Error::BackendTimeout { .. } => ErrorKind::BackendTimeout,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Address of the record involved, if any.
    pub fn address(&self) -> Option<&Address> {
        match self {
            Error::PermissionDenied { address, .. }
            | Error::NotFound { address, .. }
            | Error::AlreadyExists { address, .. }
            | Error::InvalidState { address, .. }
            | Error::IntegrityViolation { address, .. }
            | Error::NoProviderConfigured { address }
            | Error::UnsupportedAction { address, .. }
            | Error::BackendUnavailable { address, .. }
            | Error::BackendTimeout { address, .. }
            | Error::RateLimited { address, .. } => Some(address),
            Error::InvalidArgument { address, .. } => address.as_ref(),
            Error::Storage(_) | Error::Serialization(_) | Error::Config(_) => None,
        }
    }

    pub(crate) fn invalid_argument(address: Option<Address>, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            address,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_state(address: Address, reason: impl Into<String>) -> Self {
        Error::InvalidState {
            address,
            reason: reason.into(),
        }
    }

    pub(crate) fn permission_denied(address: Address, reason: impl Into<String>) -> Self {
        Error::PermissionDenied {
            address,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
