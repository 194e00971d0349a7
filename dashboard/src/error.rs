//! Error taxonomy for dashboard operations.
//!
//! Every user action (list accounts, add an account, show a report, export it)
//! resolves to either a value or one of these errors. The HTTP layer in
//! [`crate::youtube_api`] works with [`eyre::Report`]s; the operations built on
//! top of it wrap those into [`Error::Query`] so callers can tell a failed API
//! call apart from a missing account or a rejected authorization code.

use std::path::PathBuf;

/// Boxed underlying cause, kept so the full chain can be shown to the user.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No stored credential exists for the label.
    #[error("no such account: {0}")]
    AccountNotFound(String),

    /// The label cannot be used as a token file name.
    #[error("invalid account label {0:?}")]
    InvalidLabel(String),

    /// A stored credential exists but could not be parsed.
    #[error("stored credential for {label} is unreadable")]
    CorruptCredential {
        label: String,
        #[source]
        source: serde_json::Error,
    },

    /// The provider rejected the authorization code (bad, expired, or already used).
    #[error("authorization code exchange failed")]
    AuthExchange(#[source] BoxError),

    /// The session already exchanged its code; a new sign-in must be started.
    #[error("authorization code was already exchanged in this session; start a new sign-in")]
    AuthSessionConsumed,

    /// An API call failed, or its response did not have the expected shape.
    #[error("{operation} failed")]
    Query {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("I/O on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV export failed")]
    Csv(#[from] csv::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn query(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Query {
            operation,
            source: source.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
