use futures::StreamExt;
use std::future::Future;
use tracing::{debug, warn};

use crate::{
    Entity, FromSessionRow, Session, SessionError, SessionFactory, SessionResult, SessionStream,
    Transaction,
};

type RowOf<F> = <<F as SessionFactory>::Session as Session>::Row;
type TransactionOf<F> = <<F as SessionFactory>::Session as Session>::Transaction;

/// Unit of Work pattern for managing sessions and transactions.
///
/// Every call opens its own session and releases it before returning, on
/// success and on failure alike. Transactional calls additionally resolve
/// their transaction exactly once: an operation that returns `Ok` without
/// resolving the transaction itself gets it committed, anything else gets
/// it rolled back.
///
/// Secondary failures raised while cleaning up after a failed operation
/// (rollback, close) are logged and never replace the operation's error.
#[derive(Clone, Debug)]
pub struct UnitOfWork<F> {
    factory: F,
}

impl<F: SessionFactory> UnitOfWork<F> {
    /// Create a new UnitOfWork over the given long-lived session factory.
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    /// The session factory this unit of work opens sessions from.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Run `operation` with a freshly opened session and close the session afterwards.
    ///
    /// No transaction is begun.
    pub async fn run_in_session<T, E, Op, Fut>(&self, operation: Op) -> Result<T, E>
    where
        Op: FnOnce(F::Session) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<SessionError>,
    {
        let session = self.factory.open_session().await?;
        let outcome = operation(session.clone()).await;
        let closed = session.close().await;

        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_error)) => Err(close_error.into()),
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(close_error)) => {
                warn!(error = %close_error, "failed to close session after a failed operation");
                Err(error)
            }
        }
    }

    /// Run `operation` inside a transaction on a freshly opened session.
    ///
    /// The operation may commit or roll back the transaction itself, in which
    /// case nothing further happens to it. Otherwise it is committed when the
    /// operation succeeds; if the operation or the commit fails it is rolled
    /// back and the failure is returned.
    pub async fn run_in_transaction<T, E, Op, Fut>(&self, operation: Op) -> Result<T, E>
    where
        Op: FnOnce(F::Session, TransactionOf<F>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<SessionError>,
    {
        self.run_in_session(|session| async move {
            let transaction = session.begin_transaction().await?;

            let outcome = match operation(session, transaction.clone()).await {
                Ok(value) if transaction.is_active() => {
                    transaction.commit().await.map(|_| value).map_err(E::from)
                }
                outcome => outcome,
            };

            if transaction.is_active() {
                debug!("rolling back unresolved transaction");
                if let Err(rollback_error) = transaction.rollback().await {
                    warn!(error = %rollback_error, "rollback failed; keeping the original outcome");
                }
            }

            outcome
        })
        .await
    }

    /// Saves the given object, within a transaction block.
    pub async fn save_in_transaction<En>(&self, entity: &En) -> SessionResult<()>
    where
        En: Entity<F::Session> + ?Sized,
    {
        self.run_in_transaction(|session, _| async move { entity.save(&session).await })
            .await
    }

    /// Updates the given object, within a transaction block.
    pub async fn update_in_transaction<En>(&self, entity: &En) -> SessionResult<()>
    where
        En: Entity<F::Session> + ?Sized,
    {
        self.run_in_transaction(|session, _| async move { entity.update(&session).await })
            .await
    }

    /// Deletes the given object, within a transaction block.
    pub async fn delete_in_transaction<En>(&self, entity: &En) -> SessionResult<()>
    where
        En: Entity<F::Session> + ?Sized,
    {
        self.run_in_transaction(|session, _| async move { entity.delete(&session).await })
            .await
    }

    /// Saves or updates the given object, within a transaction block.
    pub async fn save_or_update_in_transaction<En>(&self, entity: &En) -> SessionResult<()>
    where
        En: Entity<F::Session> + ?Sized,
    {
        self.run_in_transaction(|session, _| async move { entity.save_or_update(&session).await })
            .await
    }

    /// Runs a query and returns its whole result set; the session is closed
    /// before this returns.
    pub async fn run_list_query<T>(&self, query: &str) -> SessionResult<Vec<T>>
    where
        T: FromSessionRow<RowOf<F>>,
    {
        self.run_in_session(|session| async move {
            let rows = session.fetch_all(query).await?;
            rows.iter()
                .map(T::from_session_row)
                .collect::<SessionResult<Vec<T>>>()
        })
        .await
    }

    /// [`run_list_query`](Self::run_list_query) for a query registered with the factory.
    pub async fn run_named_list_query<T>(&self, name: &str) -> SessionResult<Vec<T>>
    where
        T: FromSessionRow<RowOf<F>>,
    {
        let query = self.factory.named_queries().resolve(name)?;
        self.run_list_query(query).await
    }

    /// Runs a query and returns its result set as a stream.
    ///
    /// The stream owns the session; it must be closed by the caller to close
    /// the session. If the query cannot be started the session is closed
    /// before the error is returned.
    pub async fn run_stream_query<T>(&self, query: &str) -> SessionResult<SessionStream<F::Session, T>>
    where
        T: FromSessionRow<RowOf<F>> + Send + 'static,
    {
        let session = self.factory.open_session().await?;

        match session.fetch_stream(query).await {
            Ok(rows) => {
                let rows = rows
                    .map(|row| row.and_then(|row| T::from_session_row(&row)))
                    .boxed();
                Ok(SessionStream::new(session, rows))
            }
            Err(error) => {
                if let Err(close_error) = session.close().await {
                    warn!(error = %close_error, "failed to close session after a failed stream query");
                }
                Err(error)
            }
        }
    }

    /// [`run_stream_query`](Self::run_stream_query) for a query registered with the factory.
    pub async fn run_named_stream_query<T>(
        &self,
        name: &str,
    ) -> SessionResult<SessionStream<F::Session, T>>
    where
        T: FromSessionRow<RowOf<F>> + Send + 'static,
    {
        let query = self.factory.named_queries().resolve(name)?;
        self.run_stream_query(query).await
    }
}
