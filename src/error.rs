//! Error types for walletmux operations.

use std::fmt;
use thiserror::Error;

/// Result type alias using [`WalletError`].
pub type Result<T> = std::result::Result<T, WalletError>;

/// Errors that can occur while building, issuing or storing passes.
///
/// All errors implement `std::error::Error` and can be chained with `source()`.
/// Use [`WalletError::kind`] to get the stable taxonomy name that surfaces at
/// the command line.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Malformed template or pass data (missing image, unresolved field,
    /// type mismatch, duplicate field id).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Credential loading or signature production failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A remote wallet API call did not succeed.
    ///
    /// `status` is `None` when no response arrived (connection failure,
    /// timeout).
    #[error("{provider} API call failed ({}): {body}", status_label(.status))]
    ProviderApi {
        /// Provider name
        provider: String,
        /// HTTP status, if a response was received
        status: Option<u16>,
        /// Response body or transport error message
        body: String,
    },

    /// Record, template or provider was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Illegal lifecycle transition (e.g. updating a voided pass).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Storage backend I/O failure.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Provider or storage configuration is incomplete or malformed.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Provider operation failed with context.
    #[error("{provider}: {operation} {pass_id}: {source}")]
    ProviderOperation {
        /// Provider name
        provider: String,
        /// Operation name (create, update, void, etc.)
        operation: String,
        /// Pass id the operation targeted
        pass_id: String,
        /// Underlying error
        #[source]
        source: Box<WalletError>,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error (catch-all).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "no response".to_string(),
    }
}

/// Stable error taxonomy reported to callers and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed template or data.
    Validation,
    /// Credential load or signing failure.
    Signing,
    /// Remote call did not succeed.
    ProviderApi,
    /// Missing record or reference.
    NotFound,
    /// Illegal lifecycle transition.
    InvalidState,
    /// Storage I/O failure.
    Storage,
    /// Configuration problem.
    Configuration,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "ValidationError"),
            Self::Signing => write!(f, "SigningError"),
            Self::ProviderApi => write!(f, "ProviderAPIError"),
            Self::NotFound => write!(f, "NotFoundError"),
            Self::InvalidState => write!(f, "InvalidStateError"),
            Self::Storage => write!(f, "StorageError"),
            Self::Configuration => write!(f, "ConfigurationError"),
            Self::Internal => write!(f, "InternalError"),
        }
    }
}

impl WalletError {
    /// Creates a provider operation error with context.
    ///
    /// This wraps an underlying error with information about which provider,
    /// operation, and pass caused the failure.
    ///
    /// # Example
    ///
    /// ```
    /// use walletmux::{ErrorKind, WalletError};
    ///
    /// let err = WalletError::InvalidState("pass is voided".to_string());
    /// let wrapped = WalletError::provider_op("google", "update", "issuer.S1", err);
    ///
    /// assert_eq!(
    ///     wrapped.to_string(),
    ///     "google: update issuer.S1: invalid state: pass is voided"
    /// );
    /// assert_eq!(wrapped.kind(), ErrorKind::InvalidState);
    /// ```
    pub fn provider_op(
        provider: impl Into<String>,
        operation: impl Into<String>,
        pass_id: impl Into<String>,
        err: WalletError,
    ) -> Self {
        Self::ProviderOperation {
            provider: provider.into(),
            operation: operation.into(),
            pass_id: pass_id.into(),
            source: Box::new(err),
        }
    }

    /// Builds a [`WalletError::ProviderApi`] error.
    pub fn provider_api(
        provider: impl Into<String>,
        status: Option<u16>,
        body: impl Into<String>,
    ) -> Self {
        Self::ProviderApi {
            provider: provider.into(),
            status,
            body: body.into(),
        }
    }

    /// Returns the taxonomy kind of this error.
    ///
    /// Context wrappers report the kind of the error they wrap.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Json(_) => ErrorKind::Validation,
            Self::Signing(_) => ErrorKind::Signing,
            Self::ProviderApi { .. } => ErrorKind::ProviderApi,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Storage,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::ProviderOperation { source, .. } => source.kind(),
            Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status of a provider API failure, looking through
    /// context wrappers.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::ProviderApi { status, .. } => *status,
            Self::ProviderOperation { source, .. } => source.http_status(),
            _ => None,
        }
    }
}
