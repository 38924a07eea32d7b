use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::{SessionError, SessionResult};

/// Registry of queries addressable by name.
///
/// Resource files are TOML documents with a `[queries]` table:
///
/// ```toml
/// [queries]
/// all_users = "SELECT id, username, email FROM users ORDER BY username"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedQueries {
    queries: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct QueryResource {
    #[serde(default)]
    queries: HashMap<String, String>,
}

impl NamedQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a query, replacing any previous one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, query: impl Into<String>) {
        self.queries.insert(name.into(), query.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.queries.get(name).map(String::as_str)
    }

    /// Like [`get`](Self::get), but an unknown name is an error.
    pub fn resolve(&self, name: &str) -> SessionResult<&str> {
        self.get(name)
            .ok_or_else(|| SessionError::UnknownNamedQuery(name.to_string()))
    }

    /// Adds every query of `other`; later definitions win.
    pub fn merge(&mut self, other: NamedQueries) {
        self.queries.extend(other.queries);
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn from_toml_str(contents: &str) -> SessionResult<Self> {
        let resource: QueryResource = toml::from_str(contents)
            .map_err(|err| SessionError::Configuration(format!("invalid query resource: {err}")))?;
        Ok(Self {
            queries: resource.queries,
        })
    }

    pub fn load_file(path: &Path) -> SessionResult<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            SessionError::Configuration(format!(
                "failed to read query resource {}: {err}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&contents).map_err(|err| match err {
            SessionError::Configuration(message) => {
                SessionError::Configuration(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }
}
