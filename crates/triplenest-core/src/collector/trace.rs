//! Line-oriented trace collector and in-memory recording collector.

use std::io::Write;

use crate::error::{Error, Result};

use super::{Event, ResultCollector};

/// Writes one line per event. Meant for debugging, not production output.
pub struct TraceCollector<W: Write> {
    out: W,
    show_values: bool,
}

impl<W: Write> TraceCollector<W> {
    /// Create a trace collector writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_values: false,
        }
    }

    /// Also trace the raw `values` hook of every row.
    pub fn with_values(mut self, show: bool) -> Self {
        self.show_values = show;
        self
    }

    /// Consume the collector and return the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, event: Event) -> Result<()> {
        writeln!(self.out, "{}", event)?;
        Ok(())
    }
}

impl<W: Write> ResultCollector for TraceCollector<W> {
    fn begin(&mut self) -> Result<()> {
        self.line(Event::Begin)
    }

    fn start_level(&mut self, level: usize, name: &str, args: &[String]) -> Result<()> {
        self.line(Event::StartLevel {
            level,
            name: name.to_string(),
            args: args.to_vec(),
        })
    }

    fn values(&mut self, values: &[String]) -> Result<()> {
        if self.show_values {
            self.line(Event::Values(values.to_vec()))?;
        }
        Ok(())
    }

    fn pivot(&mut self, value: &str) -> Result<()> {
        self.line(Event::Pivot(value.to_string()))
    }

    fn start_property_pivot(&mut self, value: &str) -> Result<()> {
        self.line(Event::StartPropertyPivot(value.to_string()))
    }

    fn end_property_pivot(&mut self, value: &str) -> Result<()> {
        self.line(Event::EndPropertyPivot(value.to_string()))
    }

    fn collect(&mut self, bindings: &[String], values: &[String]) -> Result<()> {
        self.line(Event::Collect {
            bindings: bindings.to_vec(),
            values: values.to_vec(),
        })
    }

    fn level_error(&mut self, level: usize, name: &str, error: &Error) -> Result<()> {
        self.line(Event::LevelError {
            level,
            name: name.to_string(),
            message: error.to_string(),
        })
    }

    fn end_level(&mut self, level: usize) -> Result<()> {
        self.line(Event::EndLevel(level))
    }

    fn end(&mut self) -> Result<()> {
        self.line(Event::End)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingCollector {
    events: Vec<Event>,
    record_values: bool,
}

impl RecordingCollector {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also record the raw `values` hook.
    pub fn with_values(mut self, record: bool) -> Self {
        self.record_values = record;
        self
    }

    /// Events recorded so far.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events rendered as trace lines.
    pub fn lines(&self) -> Vec<String> {
        self.events.iter().map(ToString::to_string).collect()
    }

    /// Pivot values in the order they were reported.
    pub fn pivots(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Pivot(v) => Some(v.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl ResultCollector for RecordingCollector {
    fn begin(&mut self) -> Result<()> {
        self.events.push(Event::Begin);
        Ok(())
    }

    fn start_level(&mut self, level: usize, name: &str, args: &[String]) -> Result<()> {
        self.events.push(Event::StartLevel {
            level,
            name: name.to_string(),
            args: args.to_vec(),
        });
        Ok(())
    }

    fn values(&mut self, values: &[String]) -> Result<()> {
        if self.record_values {
            self.events.push(Event::Values(values.to_vec()));
        }
        Ok(())
    }

    fn pivot(&mut self, value: &str) -> Result<()> {
        self.events.push(Event::Pivot(value.to_string()));
        Ok(())
    }

    fn start_property_pivot(&mut self, value: &str) -> Result<()> {
        self.events.push(Event::StartPropertyPivot(value.to_string()));
        Ok(())
    }

    fn end_property_pivot(&mut self, value: &str) -> Result<()> {
        self.events.push(Event::EndPropertyPivot(value.to_string()));
        Ok(())
    }

    fn collect(&mut self, bindings: &[String], values: &[String]) -> Result<()> {
        self.events.push(Event::Collect {
            bindings: bindings.to_vec(),
            values: values.to_vec(),
        });
        Ok(())
    }

    fn level_error(&mut self, level: usize, name: &str, error: &Error) -> Result<()> {
        self.events.push(Event::LevelError {
            level,
            name: name.to_string(),
            message: error.to_string(),
        });
        Ok(())
    }

    fn end_level(&mut self, level: usize) -> Result<()> {
        self.events.push(Event::EndLevel(level));
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.events.push(Event::End);
        Ok(())
    }
}
