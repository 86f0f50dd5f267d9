//! Query executor boundary.
//!
//! The engine never runs queries itself; it hands fully expanded query text
//! to a [`QueryExecutor`] and consumes the returned [`ResultCursor`].

mod memory;

use crate::cursor::ResultCursor;
use crate::error::ExecutionError;

pub use memory::{Fixture, FixtureSet, MemoryExecutor};

/// Executes expanded query text against a triple data source.
pub trait QueryExecutor {
    /// Run `query` and return a forward-only cursor over its rows.
    fn execute<'a>(&'a self, query: &str) -> Result<Box<dyn ResultCursor + 'a>, ExecutionError>;
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for &E {
    fn execute<'a>(&'a self, query: &str) -> Result<Box<dyn ResultCursor + 'a>, ExecutionError> {
        (**self).execute(query)
    }
}
