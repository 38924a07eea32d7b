use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::{
    ConnectionSlot, Executor, FromSessionRow, NamedQueries, Session, SessionError, SessionFactory, SessionResult,
    SqlState, Transaction, TransactionState,
};

/// Rows fetched per round trip when streaming through a cursor.
pub const DEFAULT_FETCH_SIZE: u32 = 256;

/// Session factory backed by a PostgreSQL connection pool.
///
/// Every session checks out one connection from the pool and returns it
/// when closed.
#[derive(Clone, Debug)]
pub struct PostgresSessionFactory {
    pool: Arc<PgPool>,
    named_queries: NamedQueries,
    fetch_size: u32,
}

impl PostgresSessionFactory {
    /// Create a new PostgresSessionFactory with the given connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            named_queries: NamedQueries::default(),
            fetch_size: DEFAULT_FETCH_SIZE,
        }
    }

    /// Replaces the queries addressable by name.
    pub fn with_named_queries(mut self, named_queries: NamedQueries) -> Self {
        self.named_queries = named_queries;
        self
    }

    /// Rows fetched per round trip by streaming queries; at least one.
    pub fn with_fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }

    /// The connection pool sessions are drawn from.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionFactory for PostgresSessionFactory {
    type Session = PostgresSession;

    async fn open_session(&self) -> SessionResult<Self::Session> {
        let connection = self.pool.acquire().await?;
        debug!("session opened");
        Ok(PostgresSession {
            executor: Executor::new(connection),
            fetch_size: self.fetch_size,
        })
    }

    fn named_queries(&self) -> &NamedQueries {
        &self.named_queries
    }
}

/// Session owning a single pooled PostgreSQL connection.
#[derive(Clone, Debug)]
pub struct PostgresSession {
    executor: Executor,
    fetch_size: u32,
}

impl PostgresSession {
    /// Get the executor for this session (provides access to the connection).
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Whether the session still holds its connection.
    pub async fn is_open(&self) -> bool {
        self.executor.lock().await.is_open()
    }
}

#[async_trait]
impl Session for PostgresSession {
    type Transaction = PostgresTransaction;
    type Row = PgRow;

    async fn begin_transaction(&self) -> SessionResult<Self::Transaction> {
        let mut slot = self.executor.lock().await;
        if slot.has_active_transaction() {
            return Err(SessionError::TransactionAlreadyActive);
        }
        sqlx::query("BEGIN").execute(slot.connection()?).await?;
        let state = slot.track_transaction();
        debug!("transaction begun");
        Ok(PostgresTransaction {
            executor: self.executor.clone(),
            state,
        })
    }

    async fn fetch_all(&self, query: &str) -> SessionResult<Vec<PgRow>> {
        self.executor.fetch_all(query).await
    }

    async fn fetch_stream(&self, query: &str) -> SessionResult<BoxStream<'static, SessionResult<PgRow>>> {
        let cursor = format!("session_cursor_{}", Uuid::new_v4().simple());
        {
            let mut slot = self.executor.lock().await;
            // Cursors only live inside a transaction.
            if !slot.has_active_transaction() {
                sqlx::query("BEGIN READ ONLY").execute(slot.connection()?).await?;
                slot.track_transaction();
            }
            let declare = format!("DECLARE {cursor} NO SCROLL CURSOR FOR {query}");
            sqlx::query(&declare).execute(slot.connection()?).await?;
        }
        debug!(%cursor, "cursor declared");

        let fetch_size = self.fetch_size as usize;
        let cursor = CursorState {
            executor: self.executor.clone(),
            fetch: format!("FETCH FORWARD {} FROM {cursor}", self.fetch_size),
            buffer: VecDeque::new(),
            exhausted: false,
        };

        let rows = stream::try_unfold(cursor, move |mut cursor| async move {
            if cursor.buffer.is_empty() && !cursor.exhausted {
                let batch = cursor.executor.fetch_all(&cursor.fetch).await?;
                cursor.exhausted = batch.len() < fetch_size;
                cursor.buffer.extend(batch);
            }
            Ok::<_, SessionError>(cursor.buffer.pop_front().map(|row| (row, cursor)))
        });
        Ok(rows.boxed())
    }

    async fn close(&self) -> SessionResult<()> {
        let mut slot = self.executor.lock().await;
        let Some(mut connection) = slot.take_connection() else {
            return Ok(());
        };
        let had_transaction = slot.has_active_transaction();
        slot.resolve_transaction(TransactionState::RolledBack);
        if had_transaction {
            if let Err(error) = sqlx::query("ROLLBACK").execute(&mut *connection).await {
                drop(connection.detach());
                return Err(error.into());
            }
        }
        debug!("session closed");
        Ok(())
    }
}

struct CursorState {
    executor: Executor,
    fetch: String,
    buffer: VecDeque<PgRow>,
    exhausted: bool,
}

/// Transaction driven by explicit statements on the session connection.
#[derive(Clone, Debug)]
pub struct PostgresTransaction {
    executor: Executor,
    state: Arc<RwLock<TransactionState>>,
}

impl PostgresTransaction {
    fn ensure_active(&self) -> SessionResult<()> {
        match self.state() {
            TransactionState::Active => Ok(()),
            other => Err(SessionError::TransactionNotActive(other)),
        }
    }

    async fn finish(&self, statement: &str, outcome: TransactionState) -> SessionResult<()> {
        self.ensure_active()?;
        let mut slot = self.executor.lock().await;
        // The session may have resolved us while we waited for the lock.
        self.ensure_active()?;

        if outcome == TransactionState::Committed {
            // COMMIT on an aborted transaction answers with a silent ROLLBACK.
            let usable = sqlx::query("SELECT 1").execute(slot.connection()?).await;
            if let Err(error) = usable {
                let error = SessionError::from(error);
                if error.sql_state() == Some(SqlState::InFailedSqlTransaction) {
                    sqlx::query("ROLLBACK").execute(slot.connection()?).await?;
                    self.resolve(&mut slot, TransactionState::RolledBack);
                }
                return Err(error);
            }
        }

        sqlx::query(statement).execute(slot.connection()?).await?;
        self.resolve(&mut slot, outcome);
        Ok(())
    }

    fn resolve(&self, slot: &mut ConnectionSlot, outcome: TransactionState) {
        *self.state.write() = outcome;
        slot.resolve_transaction(outcome);
        debug!(state = %outcome, "transaction resolved");
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    fn state(&self) -> TransactionState {
        *self.state.read()
    }

    async fn commit(&self) -> SessionResult<()> {
        self.finish("COMMIT", TransactionState::Committed).await
    }

    async fn rollback(&self) -> SessionResult<()> {
        self.finish("ROLLBACK", TransactionState::RolledBack).await
    }
}

impl<T> FromSessionRow<PgRow> for T
where
    T: for<'r> FromRow<'r, PgRow>,
{
    fn from_session_row(row: &PgRow) -> SessionResult<Self> {
        T::from_row(row).map_err(SessionError::from)
    }
}
