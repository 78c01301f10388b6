//! Error types for reconciliation runs.
//!
//! Remote failures carry a [`RemoteErrorKind`] so planners and the applier can
//! tell tolerated races (a repository that already exists, a team or file that
//! is not there yet) from failures that must abort the run.

use std::fmt;
use std::time::Duration;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The resource does not exist (HTTP 404).
    NotFound,
    /// The resource already exists or the request conflicts with it (HTTP 422).
    AlreadyExists,
    /// Primary or secondary rate limit hit (HTTP 403/429 with rate headers).
    RateLimited,
    /// Connection failures, timeouts and 5xx responses.
    Network,
    /// Bad or missing credentials (HTTP 401, plain 403).
    Unauthorized,
    /// The caller's cancellation token tripped before or during the call.
    Cancelled,
    /// Anything else.
    Other,
}

impl RemoteErrorKind {
    /// Whether this kind is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::RateLimited)
    }

    /// Get a user-friendly description of this kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::RateLimited => "rate limited",
            Self::Network => "network failure",
            Self::Unauthorized => "unauthorized",
            Self::Cancelled => "cancelled",
            Self::Other => "remote error",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// An error reported by a [`Gateway`](crate::gateway::Gateway).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
pub struct RemoteError {
    /// Category used for tolerance and retry decisions.
    pub kind: RemoteErrorKind,
    /// HTTP status code if the failure came from a response.
    pub status: Option<u16>,
    /// Message from the remote system or transport.
    pub message: String,
    /// How long the remote asked callers to wait before trying again.
    pub retry_after: Option<Duration>,
}

impl RemoteError {
    /// Create a remote error.
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a remote error from an HTTP status, classifying it.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            404 => RemoteErrorKind::NotFound,
            422 => RemoteErrorKind::AlreadyExists,
            429 => RemoteErrorKind::RateLimited,
            401 | 403 => RemoteErrorKind::Unauthorized,
            500..=599 => RemoteErrorKind::Network,
            _ => RemoteErrorKind::Other,
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attach the wait the remote asked for, e.g. until a rate-limit window resets.
    #[must_use]
    pub fn with_retry_after(mut self, wait: Duration) -> Self {
        self.retry_after = Some(wait);
        self
    }

    /// Error returned by gateways that observed cancellation.
    pub fn cancelled() -> Self {
        Self::new(RemoteErrorKind::Cancelled, "operation cancelled")
    }

    /// Shorthand for a 404.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_status(404, message)
    }

    /// Shorthand for a 422.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::from_status(422, message)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        self.kind == RemoteErrorKind::AlreadyExists
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == RemoteErrorKind::Cancelled
    }
}

/// Errors surfaced by planning and applying.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A remote call failed while building the plan.
    #[error("{context}: {source}")]
    Remote {
        /// What the planner was doing.
        context: String,
        #[source]
        source: RemoteError,
    },

    /// A change failed to apply. Earlier changes stay applied.
    #[error("{scope}:{action} {target} failed after {applied} applied change(s): {message}")]
    ApplyFailed {
        scope: String,
        target: String,
        action: String,
        /// Number of changes that succeeded before this one.
        applied: usize,
        /// Operation context, e.g. `create team "Platform"`.
        message: String,
        #[source]
        source: RemoteError,
    },

    /// A change's details do not match the shape its scope and action expect.
    #[error("malformed details for {scope}:{action}: {message}")]
    MalformedChange {
        scope: String,
        action: String,
        message: String,
    },

    /// A serialized plan could not be read.
    #[error("invalid plan document: {0}")]
    InvalidPlan(String),

    /// The run was cancelled.
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl Error {
    /// Wrap a remote error with planning context.
    ///
    /// A cancelled call becomes [`Error::Cancelled`] regardless of context.
    pub fn remote(context: impl Into<String>, source: RemoteError) -> Self {
        if source.is_cancelled() {
            return Self::Cancelled;
        }
        Self::Remote {
            context: context.into(),
            source,
        }
    }

    /// Whether this error is an engine contract violation rather than a remote failure.
    #[must_use]
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::MalformedChange { .. })
    }
}
