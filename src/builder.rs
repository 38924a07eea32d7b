use sqlx::postgres::PgPoolOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::{NamedQueries, PostgresSessionFactory, SessionFactoryConfig, SessionResult};

/// Fluent builder for a [`PostgresSessionFactory`].
#[derive(Debug, Clone)]
pub struct SessionFactoryBuilder {
    connection_string: String,
    max_connections: u32,
    acquire_timeout: Duration,
    fetch_size: u32,
    named_queries: NamedQueries,
}

impl SessionFactoryBuilder {
    /// Starts from the default pool settings for the given connection string.
    pub fn new(connection_string: impl Into<String>) -> Self {
        let defaults = SessionFactoryConfig::new(connection_string);
        Self {
            acquire_timeout: defaults.acquire_timeout(),
            connection_string: defaults.url,
            max_connections: defaults.max_connections,
            fetch_size: defaults.fetch_size,
            named_queries: NamedQueries::new(),
        }
    }

    /// Builder preloaded from a configuration, including its query files.
    pub fn from_config(config: &SessionFactoryConfig) -> SessionResult<Self> {
        Self::new(config.url.clone())
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .fetch_size(config.fetch_size)
            .add_resources(&config.query_files)
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Rows fetched per round trip by streaming queries.
    pub fn fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    pub fn add_named_query(mut self, name: impl Into<String>, query: impl Into<String>) -> Self {
        self.named_queries.insert(name, query);
        self
    }

    pub fn add_named_queries(mut self, named_queries: NamedQueries) -> Self {
        self.named_queries.merge(named_queries);
        self
    }

    /// Adds the named queries declared in the given TOML resource files.
    pub fn add_resources<P: AsRef<Path>>(mut self, paths: &[P]) -> SessionResult<Self> {
        for path in paths {
            let resource = NamedQueries::load_file(path.as_ref())?;
            self.named_queries.merge(resource);
        }
        Ok(self)
    }

    pub fn named_queries(&self) -> &NamedQueries {
        &self.named_queries
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
    }

    /// Connects the pool eagerly and builds the factory.
    pub async fn build(self) -> SessionResult<PostgresSessionFactory> {
        let pool = self.pool_options().connect(&self.connection_string).await?;
        Ok(self.into_factory(pool))
    }

    /// Builds the factory without connecting; connections open on first use.
    pub fn build_lazy(self) -> SessionResult<PostgresSessionFactory> {
        let pool = self.pool_options().connect_lazy(&self.connection_string)?;
        Ok(self.into_factory(pool))
    }

    fn into_factory(self, pool: sqlx::PgPool) -> PostgresSessionFactory {
        PostgresSessionFactory::new(Arc::new(pool))
            .with_named_queries(self.named_queries)
            .with_fetch_size(self.fetch_size)
    }
}
