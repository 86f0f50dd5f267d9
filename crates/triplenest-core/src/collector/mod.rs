//! Result collectors.
//!
//! A collector receives the structural events of a nested query execution
//! and renders them. The engine guarantees that events are properly nested:
//! `begin`/`end` once, `start_level`/`end_level` balanced, and
//! `start_property_pivot`/`end_property_pivot` balanced within a level.

mod json;
mod trace;
mod writer;

use std::fmt;

use crate::error::{Error, Result};

pub use json::{FieldMapping, JsonCollector};
pub use trace::{RecordingCollector, TraceCollector};
pub use writer::{DocumentWriter, JsonWriter};

/// Sink for nested query events.
pub trait ResultCollector {
    /// Execution started.
    fn begin(&mut self) -> Result<()>;

    /// A level started streaming rows, bound with `args`.
    fn start_level(&mut self, level: usize, name: &str, args: &[String]) -> Result<()>;

    /// Raw values of every row, before any other row event.
    fn values(&mut self, _values: &[String]) -> Result<()> {
        Ok(())
    }

    /// The pivot value of the current level changed.
    fn pivot(&mut self, value: &str) -> Result<()>;

    /// A property-pivot match opens an extra nesting scope.
    fn start_property_pivot(&mut self, value: &str) -> Result<()>;

    /// Closes the scope opened by `start_property_pivot`.
    fn end_property_pivot(&mut self, value: &str) -> Result<()>;

    /// A row of the current pivot group.
    fn collect(&mut self, bindings: &[String], values: &[String]) -> Result<()>;

    /// A level invocation was skipped because its query failed.
    fn level_error(&mut self, _level: usize, _name: &str, _error: &Error) -> Result<()> {
        Ok(())
    }

    /// The level's rows are exhausted.
    fn end_level(&mut self, level: usize) -> Result<()>;

    /// Execution finished.
    fn end(&mut self) -> Result<()>;
}

impl<C: ResultCollector + ?Sized> ResultCollector for &mut C {
    fn begin(&mut self) -> Result<()> {
        (**self).begin()
    }

    fn start_level(&mut self, level: usize, name: &str, args: &[String]) -> Result<()> {
        (**self).start_level(level, name, args)
    }

    fn values(&mut self, values: &[String]) -> Result<()> {
        (**self).values(values)
    }

    fn pivot(&mut self, value: &str) -> Result<()> {
        (**self).pivot(value)
    }

    fn start_property_pivot(&mut self, value: &str) -> Result<()> {
        (**self).start_property_pivot(value)
    }

    fn end_property_pivot(&mut self, value: &str) -> Result<()> {
        (**self).end_property_pivot(value)
    }

    fn collect(&mut self, bindings: &[String], values: &[String]) -> Result<()> {
        (**self).collect(bindings, values)
    }

    fn level_error(&mut self, level: usize, name: &str, error: &Error) -> Result<()> {
        (**self).level_error(level, name, error)
    }

    fn end_level(&mut self, level: usize) -> Result<()> {
        (**self).end_level(level)
    }

    fn end(&mut self) -> Result<()> {
        (**self).end()
    }
}

/// A collector event, as seen by the trace and recording collectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Begin,
    StartLevel {
        level: usize,
        name: String,
        args: Vec<String>,
    },
    Values(Vec<String>),
    Pivot(String),
    StartPropertyPivot(String),
    EndPropertyPivot(String),
    Collect {
        bindings: Vec<String>,
        values: Vec<String>,
    },
    LevelError {
        level: usize,
        name: String,
        message: String,
    },
    EndLevel(usize),
    End,
}

struct List<'a>(&'a [String]);

impl fmt::Display for List<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Begin => write!(f, "Begin"),
            Event::StartLevel { level, name, args } => {
                write!(f, "Start level {}: {} {}", level, name, List(args))
            }
            Event::Values(values) => write!(f, "Values {}", List(values)),
            Event::Pivot(value) => write!(f, "Pivot {}", value),
            Event::StartPropertyPivot(value) => write!(f, "Start property pivot {}", value),
            Event::EndPropertyPivot(value) => write!(f, "End property pivot {}", value),
            Event::Collect { bindings, values } => {
                write!(f, "Collect {} {}", List(bindings), List(values))
            }
            Event::LevelError {
                level,
                name,
                message,
            } => write!(f, "Level error {}: {}: {}", level, name, message),
            Event::EndLevel(level) => write!(f, "End level {}", level),
            Event::End => write!(f, "End"),
        }
    }
}
