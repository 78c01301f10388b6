//! Error types for the GitHub gateway.
//!
//! Calls made through the [`Gateway`](reconcile::Gateway) trait report
//! [`RemoteError`]s. This module covers the rest: credentials, keys and the
//! installation token exchange, plus the mapping from transport errors.

use reconcile::{RemoteError, RemoteErrorKind};
use std::io;
use std::path::PathBuf;

/// Result type alias for gateway setup.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither a token nor App credentials were provided.
    #[error("no GitHub credentials: set GITHUB_TOKEN, or GITHUB_APP_ID and GITHUB_APP_PRIVATE_KEY")]
    MissingCredentials,

    /// The App id is not numeric.
    #[error("invalid GitHub App id: {0:?}")]
    InvalidAppId(String),

    /// The private key file could not be read.
    #[error("failed to read private key {path}: {source}")]
    KeyFile {
        /// Path to the key.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The private key could not be used to sign a JWT.
    #[error("invalid GitHub App private key: {0}")]
    InvalidKey(String),

    /// A remote call failed during setup.
    #[error("{context}: {source}")]
    Remote {
        /// What was being done.
        context: String,
        /// The remote failure.
        #[source]
        source: RemoteError,
    },
}

impl Error {
    /// Wrap a remote error with context.
    pub fn remote(context: impl Into<String>, source: RemoteError) -> Self {
        Self::Remote {
            context: context.into(),
            source,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote { source, .. } if source.is_retryable())
    }
}

/// Map a transport error onto a remote error kind.
pub fn from_transport(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::StatusCode(code) => RemoteError::from_status(code, format!("HTTP {code}")),
        ureq::Error::Io(_)
        | ureq::Error::Timeout(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed => {
            RemoteError::new(RemoteErrorKind::Network, err.to_string())
        }
        other => RemoteError::new(RemoteErrorKind::Other, other.to_string()),
    }
}
