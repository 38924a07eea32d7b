use parking_lot::RwLock;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, Postgres};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::{SessionError, SessionResult, TransactionState};

/// Executor wraps the pooled connection owned by a session.
///
/// Clones share the same connection slot, so the session, its transactions
/// and any open result stream all see the same connection and the same
/// closed state.
#[derive(Clone, Debug)]
pub struct Executor {
    slot: Arc<Mutex<ConnectionSlot>>,
}

impl Executor {
    /// Creates a new Executor owning a pooled connection.
    pub fn new(connection: PoolConnection<Postgres>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(ConnectionSlot {
                connection: Some(connection),
                transaction: None,
            })),
        }
    }

    /// Locks the connection slot for exclusive use.
    pub async fn lock(&self) -> MutexGuard<'_, ConnectionSlot> {
        self.slot.lock().await
    }

    /// Runs a statement with no bind parameters and returns every row.
    pub async fn fetch_all(&self, query: &str) -> SessionResult<Vec<sqlx::postgres::PgRow>> {
        let mut slot = self.lock().await;
        let rows = sqlx::query(query).fetch_all(slot.connection()?).await?;
        Ok(rows)
    }
}

/// The connection of a session together with the state of its open transaction.
#[derive(Debug)]
pub struct ConnectionSlot {
    connection: Option<PoolConnection<Postgres>>,
    transaction: Option<Arc<RwLock<TransactionState>>>,
}

impl ConnectionSlot {
    /// The live connection, or `SessionClosed` once the session has been released.
    pub fn connection(&mut self) -> SessionResult<&mut PgConnection> {
        self.connection
            .as_deref_mut()
            .ok_or(SessionError::SessionClosed)
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub(crate) fn has_active_transaction(&self) -> bool {
        self.transaction
            .as_ref()
            .is_some_and(|state| *state.read() == TransactionState::Active)
    }

    /// Records a freshly begun transaction and returns its shared state.
    pub(crate) fn track_transaction(&mut self) -> Arc<RwLock<TransactionState>> {
        let state = Arc::new(RwLock::new(TransactionState::Active));
        self.transaction = Some(state.clone());
        state
    }

    /// Marks the tracked transaction as resolved.
    pub(crate) fn resolve_transaction(&mut self, outcome: TransactionState) {
        if let Some(state) = self.transaction.take() {
            *state.write() = outcome;
        }
    }

    pub(crate) fn take_connection(&mut self) -> Option<PoolConnection<Postgres>> {
        self.connection.take()
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        if !self.has_active_transaction() {
            return;
        }
        self.resolve_transaction(TransactionState::RolledBack);
        if let Some(connection) = self.connection.take() {
            // The server discards the open transaction once the socket closes.
            tracing::warn!("session dropped with an active transaction; discarding connection");
            drop(connection.detach());
        }
    }
}
