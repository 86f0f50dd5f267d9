//! triplenest core - nested query templates over triple stores.
//!
//! A chain of parameterized queries is executed depth-first: the rows of each
//! level are grouped by a pivot binding and every group drives the next
//! level. Results stream into a [`ResultCollector`](collector::ResultCollector)
//! without materializing the whole result set.

pub mod collector;
pub mod config;
pub mod cursor;
pub mod error;
pub mod executor;
pub mod nested;
pub mod template;

pub use collector::{
    DocumentWriter, Event, FieldMapping, JsonCollector, JsonWriter, RecordingCollector,
    ResultCollector, TraceCollector,
};
pub use config::{CancellationToken, ExecutionConfig, FailurePolicy, PivotOrder};
pub use cursor::{collect_rows, IterCursor, ResultCursor};
pub use error::{Error, ExecutionError, ExecutionErrorKind, Result};
pub use executor::{Fixture, FixtureSet, MemoryExecutor, QueryExecutor};
pub use nested::{
    ChainDescription, ExecutionSummary, Level, LevelDescription, NestedQuery, NestedQueryBuilder,
    PropertyPivot,
};
pub use template::{ArgumentEscape, QueryTemplate};
