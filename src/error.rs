//! Error types for the linkboard client

use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, BoardError>;

/// Client error taxonomy
///
/// Every failure reaches the invoking view as one of these. Nothing in the
/// core retries; callers decide whether to show inline text or a flash.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    /// Transient network or store failure
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Authorization refusal by the store (or by the poster check on delete)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Target document missing at the adapter level
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Target record disappeared before a mutation could apply
    #[error("Record no longer exists: {0}")]
    RecordGone(String),

    /// Document could not be normalized into a typed record
    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    /// Delivery would shorten an append-only sequence this reader already saw
    #[error("Stale snapshot: {key} went from {seen} to {delivered} entries")]
    StaleSnapshot {
        key: String,
        seen: usize,
        delivered: usize,
    },

    /// Credential or account failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Input rejected before reaching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BoardError {
    /// Whether re-invoking the same action could succeed without changes
    pub fn is_transient(&self) -> bool {
        matches!(self, BoardError::Unavailable(_))
    }

    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        BoardError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        BoardError::MalformedRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Auth collaborator failures, surfaced to the user as-is
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("The email or password is incorrect")]
    InvalidCredentials,

    #[error("The email address is already in use by another account")]
    EmailInUse,

    #[error("Password should be at least {min_len} characters")]
    WeakPassword { min_len: usize },

    #[error("The email address is badly formatted")]
    InvalidEmail,

    #[error("There is no user record corresponding to this identifier")]
    UserNotFound,

    #[error("Sign-in provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for BoardError {
    fn from(err: serde_json::Error) -> Self {
        BoardError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for BoardError {
    fn from(err: reqwest::Error) -> Self {
        BoardError::Unavailable(err.to_string())
    }
}

impl From<toml::de::Error> for BoardError {
    fn from(err: toml::de::Error) -> Self {
        BoardError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BoardError {
    fn from(err: toml::ser::Error) -> Self {
        BoardError::Config(err.to_string())
    }
}
