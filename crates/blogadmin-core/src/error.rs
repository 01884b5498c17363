//! Error types for blogadmin-core
//!
//! Every failure that can cross the Resource Client boundary is a typed value.
//! Transport and status errors surface as [`ApiError`]/[`AuthError`]; per-record
//! problems surface as [`NormalizationError`] and are absorbed at the list level.

use crate::models::ResourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Server message the backend returns when the last admin account would be removed
pub const LAST_ADMIN_MARKER: &str = "Cannot delete the last admin";

/// Failure below the HTTP status layer (DNS, connect, timeout, broken body)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Cannot connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Transport failure for {url}: {message}")]
    Other { url: String, message: String },
}

/// Sub-reason attached to a 400 response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// Deleting this user would remove the last admin account
    LastAdminProtected,
    /// Request rejected locally before any round-trip
    EmptySelection,
    /// Any other validation failure, with the server's message
    Other(String),
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::LastAdminProtected => write!(f, "{}", LAST_ADMIN_MARKER),
            InvalidReason::EmptySelection => write!(f, "no ids selected"),
            InvalidReason::Other(message) => write!(f, "{}", message),
        }
    }
}

/// A single record could not be converted to its canonical shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("{kind} record is not a JSON object")]
    NotAnObject { kind: ResourceKind },

    #[error("{kind} record is missing required field '{field}'")]
    MissingField {
        kind: ResourceKind,
        field: &'static str,
    },

    #[error("{kind} field '{field}' is invalid: {message}")]
    InvalidField {
        kind: ResourceKind,
        field: &'static str,
        message: String,
    },
}

/// Outcome taxonomy shared by every Resource Client call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Server unreachable: {0}")]
    Unreachable(#[from] TransportError),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid request: {0}")]
    InvalidRequest(InvalidReason),

    #[error("{kind} not found{}", id_suffix(.id))]
    NotFound {
        kind: ResourceKind,
        id: Option<i64>,
    },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Normalization failed: {0}")]
    Normalization(#[from] NormalizationError),
}

impl ApiError {
    /// Human-readable reason suitable for direct display to the operator
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unreachable(TransportError::Timeout { .. }) => {
                "Timed out. Please try again later.".to_string()
            }
            ApiError::Unreachable(_) => {
                "Unable to connect to the server. Please check your network connection.".to_string()
            }
            ApiError::Unauthenticated => "Unauthorized: please log in again.".to_string(),
            ApiError::Forbidden => "Forbidden: admin privileges required.".to_string(),
            ApiError::InvalidRequest(InvalidReason::LastAdminProtected) => {
                "Cannot delete the last admin user.".to_string()
            }
            ApiError::InvalidRequest(InvalidReason::EmptySelection) => {
                "Nothing selected.".to_string()
            }
            ApiError::InvalidRequest(InvalidReason::Other(message)) if message.is_empty() => {
                "Invalid request.".to_string()
            }
            ApiError::InvalidRequest(InvalidReason::Other(message)) => {
                format!("Invalid request: {}", message)
            }
            ApiError::NotFound { kind, id: Some(id) } => {
                format!("{} (id: {}) not found.", capitalize(kind.singular()), id)
            }
            ApiError::NotFound { kind, id: None } => {
                format!("{} not found.", capitalize(kind.singular()))
            }
            ApiError::ServerError(message) => format!("Server error: {}", message),
            ApiError::UnexpectedStatus(code) => {
                format!("Unexpected response from server (HTTP {}).", code)
            }
            ApiError::MalformedResponse(_) | ApiError::Normalization(_) => {
                "The server sent a response that could not be understood.".to_string()
            }
        }
    }
}

/// Login/logout failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Wrong username or password")]
    InvalidCredentials,

    #[error("Server unreachable: {0}")]
    Unreachable(#[from] TransportError),

    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("Malformed login response: {0}")]
    MalformedResponse(String),

    #[error("No active session")]
    NotAuthenticated,
}

/// Configuration loading failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse {
        path: PathBuf,
        message: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Failed to build HTTP client: {message}")]
    HttpClient { message: String },
}

fn id_suffix(id: &Option<i64>) -> String {
    match id {
        Some(id) => format!(" (id: {})", id),
        None => String::new(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
