use crate::session::TransactionState;
use crate::sql_state::SqlState;

/// Error type for session and transaction management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Transaction is not active (state: {0})")]
    TransactionNotActive(TransactionState),

    #[error("A transaction is already active on this session")]
    TransactionAlreadyActive,

    #[error("Unknown named query: {0}")]
    UnknownNamedQuery(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl SessionError {
    /// Returns the SQL state carried by a database error, if its code is known.
    ///
    /// Errors that did not originate from the database, or whose code is not
    /// listed in [`SqlState`], yield `None`.
    pub fn sql_state(&self) -> Option<SqlState> {
        match self {
            SessionError::Database(sqlx::Error::Database(db_error)) => {
                db_error.code().and_then(|code| SqlState::from_code(&code))
            }
            _ => None,
        }
    }
}

/// Result type for session and transaction management.
pub type SessionResult<T> = Result<T, SessionError>;
