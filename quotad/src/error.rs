//! Distinguishable error type definitions

use shared::parser::quota_size::QuotaParseError;
use thiserror::Error;

/// The result type used at the server access layer.
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// The error type used at the server access layer.
///
/// Contains information about the nature/type/cause of the error, which can be matched on by the
/// caller to decide whether only one database or the whole pass is affected.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The server rejected the credentials.
    #[error("Access denied: {desc}")]
    AccessDenied { desc: String },
    /// A database that was enumerated before no longer exists.
    #[error("Database {name} does not exist")]
    UnknownDatabase { name: String },
    /// The server rejected a single statement. The connection is still usable.
    #[error("Statement failed: {desc}")]
    Statement { desc: String },
    /// Transport or protocol failure. The connection can not be used anymore.
    #[error("Server connection failed")]
    Connection {
        #[from]
        source: sqlx::Error,
    },
}

impl ServerError {
    pub fn access_denied(desc: impl ToString) -> Self {
        Self::AccessDenied {
            desc: desc.to_string(),
        }
    }

    pub fn unknown_database(name: impl ToString) -> Self {
        Self::UnknownDatabase {
            name: name.to_string(),
        }
    }

    pub fn statement(desc: impl ToString) -> Self {
        Self::Statement {
            desc: desc.to_string(),
        }
    }

    /// Whether the remaining databases of the current pass can't be processed anymore
    pub fn aborts_pass(&self) -> bool {
        matches!(self, Self::AccessDenied { .. } | Self::Connection { .. })
    }
}

/// Necessary for the log_error_chain! macro which also has to deal with anyhow::Error
impl AsRef<dyn std::error::Error + 'static> for ServerError {
    fn as_ref(&self) -> &(dyn std::error::Error + 'static) {
        self
    }
}

/// Why a single database was skipped during a pass.
#[derive(Debug, Error)]
pub enum SkipReason {
    /// The configured quota string for this database is malformed
    #[error("Configuration error")]
    Config(#[from] QuotaParseError),
    /// The database vanished after it was enumerated
    #[error("Database was removed during the pass")]
    MissingDatabase,
    /// A query or statement for this database failed
    #[error("Server error")]
    Server(#[source] ServerError),
}

impl AsRef<dyn std::error::Error + 'static> for SkipReason {
    fn as_ref(&self) -> &(dyn std::error::Error + 'static) {
        self
    }
}

/// Why a whole polling cycle was aborted.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The configuration file couldn't be loaded
    #[error("Loading configuration failed")]
    Config(#[source] anyhow::Error),
    /// The server rejected the credentials
    #[error("Authentication failed, check the configured user and password")]
    Authentication(#[source] ServerError),
    /// The connection broke down or couldn't be established
    #[error("Server connection failed")]
    Connection(#[source] ServerError),
}

impl From<ServerError> for CycleError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::AccessDenied { .. } => Self::Authentication(err),
            err => Self::Connection(err),
        }
    }
}

impl AsRef<dyn std::error::Error + 'static> for CycleError {
    fn as_ref(&self) -> &(dyn std::error::Error + 'static) {
        self
    }
}
