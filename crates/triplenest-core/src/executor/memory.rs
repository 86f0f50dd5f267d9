//! In-memory executor backed by canned results.
//!
//! Results are keyed by query text with whitespace runs collapsed, so
//! fixtures do not depend on the template's formatting.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use crate::cursor::{IterCursor, ResultCursor};
use crate::error::{Error, ExecutionError};

use super::QueryExecutor;

/// One canned query result, or a canned failure when `error` is set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Fixture {
    /// Expanded query text.
    pub query: String,
    /// Binding names of the result.
    #[serde(default)]
    pub bindings: Vec<String>,
    /// Result rows, parallel to `bindings`.
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    /// Rejection message returned instead of rows.
    #[serde(default)]
    pub error: Option<String>,
}

/// A fixture file: `{"queries": [...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureSet {
    pub queries: Vec<Fixture>,
}

#[derive(Debug)]
enum Outcome {
    Rows {
        bindings: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Rejected(String),
}

/// Query executor answering from a table of canned results.
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    results: HashMap<String, Outcome>,
    log_queries: bool,
    executed: Mutex<Vec<String>>,
}

impl MemoryExecutor {
    /// Create an empty executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rows returned for `query`.
    pub fn with_rows<B, R>(mut self, query: &str, bindings: B, rows: R) -> Self
    where
        B: IntoIterator,
        B::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator,
        <R::Item as IntoIterator>::Item: Into<String>,
    {
        let bindings = bindings.into_iter().map(Into::into).collect();
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        self.results
            .insert(normalize(query), Outcome::Rows { bindings, rows });
        self
    }

    /// Register a rejection for `query`.
    pub fn with_rejection(mut self, query: &str, message: impl Into<String>) -> Self {
        self.results
            .insert(normalize(query), Outcome::Rejected(message.into()));
        self
    }

    /// Build an executor from parsed fixtures.
    pub fn from_fixtures(fixtures: FixtureSet) -> Self {
        let mut executor = Self::new();
        for fixture in fixtures.queries {
            let outcome = match fixture.error {
                Some(message) => Outcome::Rejected(message),
                None => Outcome::Rows {
                    bindings: fixture.bindings,
                    rows: fixture.rows,
                },
            };
            executor.results.insert(normalize(&fixture.query), outcome);
        }
        executor
    }

    /// Load fixtures from a JSON reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let fixtures: FixtureSet = serde_json::from_reader(reader)?;
        Ok(Self::from_fixtures(fixtures))
    }

    /// Load fixtures from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Record every executed query for [`MemoryExecutor::executed`]. Off by
    /// default, the log grows with the number of level invocations.
    pub fn with_query_log(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Number of registered queries.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if no query is registered.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Normalized text of every query executed so far, in order. Empty unless
    /// the query log is enabled.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

impl QueryExecutor for MemoryExecutor {
    fn execute<'a>(
        &'a self,
        query: &str,
    ) -> Result<Box<dyn ResultCursor + 'a>, ExecutionError> {
        let key = normalize(query);
        debug!(query = %key, "executing fixture query");
        if self.log_queries {
            self.executed.lock().push(key.clone());
        }

        match self.results.get(&key) {
            Some(Outcome::Rows { bindings, rows }) => Ok(Box::new(IterCursor::from_rows(
                bindings.clone(),
                rows.clone(),
            ))),
            Some(Outcome::Rejected(message)) => Err(ExecutionError::rejected(message.clone())),
            None => Err(ExecutionError::rejected(format!(
                "no fixture registered for query: {}",
                key
            ))),
        }
    }
}

fn normalize(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}
