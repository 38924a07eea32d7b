//! Postgres Functional Session Module
//!
//! This module provides session and transaction handling primitives for database work.
//! A [`UnitOfWork`] opens a session per call, wraps the caller's operation in a
//! transaction when asked to, and always resolves the transaction and releases the
//! session before returning.

pub mod builder;
pub mod config;
pub mod error;
pub mod executor;
pub mod named_queries;
pub mod postgres;
pub mod query_stream;
pub mod session;
pub mod sql_state;
pub mod unit_of_work;

pub use builder::SessionFactoryBuilder;
pub use config::SessionFactoryConfig;
pub use error::{SessionError, SessionResult};
pub use executor::{ConnectionSlot, Executor};
pub use named_queries::NamedQueries;
pub use postgres::{PostgresSession, PostgresSessionFactory, PostgresTransaction};
pub use query_stream::SessionStream;
pub use session::{Entity, FromSessionRow, Session, SessionFactory, Transaction, TransactionState};
pub use sql_state::SqlState;
pub use unit_of_work::UnitOfWork;
