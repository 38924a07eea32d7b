use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

use crate::{NamedQueries, SessionResult};

/// Lifecycle state of a transaction.
///
/// A transaction starts `Active` and ends in exactly one of the two
/// terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Active => f.write_str("active"),
            TransactionState::Committed => f.write_str("committed"),
            TransactionState::RolledBack => f.write_str("rolled back"),
        }
    }
}

/// Long-lived factory for sessions against a backing store.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: Session;

    /// Open a new session.
    async fn open_session(&self) -> SessionResult<Self::Session>;

    /// Queries registered with this factory, addressable by name.
    fn named_queries(&self) -> &NamedQueries;
}

/// Handle to one interaction context with the backing store.
///
/// Clones share the same underlying session: closing one closes all of them.
#[async_trait]
pub trait Session: Clone + Send + Sync + 'static {
    type Transaction: Transaction;
    type Row: Send + 'static;

    /// Begin a transaction on this session.
    ///
    /// Fails with `TransactionAlreadyActive` while a previous transaction is
    /// still unresolved.
    async fn begin_transaction(&self) -> SessionResult<Self::Transaction>;

    /// Run a query and materialize every row.
    async fn fetch_all(&self, query: &str) -> SessionResult<Vec<Self::Row>>;

    /// Run a query and produce its rows lazily.
    ///
    /// The stream stays bound to this session and must not outlive it.
    async fn fetch_stream(&self, query: &str)
        -> SessionResult<BoxStream<'static, SessionResult<Self::Row>>>;

    /// Release the session, rolling back any transaction still active.
    ///
    /// Closing an already closed session is a no-op.
    async fn close(&self) -> SessionResult<()>;
}

/// Handle to a transaction scoped to a session.
#[async_trait]
pub trait Transaction: Clone + Send + Sync + 'static {
    /// Current lifecycle state; only `Active` accepts commit or rollback.
    fn state(&self) -> TransactionState;

    fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// Make the pending changes permanent.
    async fn commit(&self) -> SessionResult<()>;

    /// Discard the pending changes.
    async fn rollback(&self) -> SessionResult<()>;
}

/// An object that knows how to persist itself through a session.
#[async_trait]
pub trait Entity<S: Session>: Send + Sync {
    async fn save(&self, session: &S) -> SessionResult<()>;

    async fn update(&self, session: &S) -> SessionResult<()>;

    async fn delete(&self, session: &S) -> SessionResult<()>;

    /// Whether the object is already stored.
    async fn exists(&self, session: &S) -> SessionResult<bool>;

    async fn save_or_update(&self, session: &S) -> SessionResult<()> {
        if self.exists(session).await? {
            self.update(session).await
        } else {
            self.save(session).await
        }
    }
}

/// Decoding of a query result row into a typed value.
pub trait FromSessionRow<R>: Sized {
    fn from_session_row(row: &R) -> SessionResult<Self>;
}
