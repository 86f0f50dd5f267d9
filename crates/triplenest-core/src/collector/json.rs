//! Streaming JSON collector.
//!
//! Output shape for a two level chain `articles -> agents` with mapping `p:o`:
//!
//! ```text
//! {"articles": {"A1": {"agents": {"Ag1": {"name": "Ada"}}, "title": "T1"},
//!               "A2": {...}}}
//! ```
//!
//! Row pairs are buffered per level until the pivot group closes, so a key
//! seen on several rows of the group becomes an array. Property-pivot scopes
//! of a group are written as an array of objects under the pivot property;
//! the flat pairs of that property are then omitted from the group.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{Error, Result};

use super::writer::DocumentWriter;
use super::ResultCollector;

/// Which row bindings become JSON field names and values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    field: String,
    value: String,
}

impl FieldMapping {
    /// Map `row[field]` to `row[value]`.
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Parse a `<field-binding>:<value-binding>` pattern, e.g. `p:o`.
    pub fn parse(pattern: &str) -> Result<Self> {
        match pattern.split(':').collect::<Vec<_>>().as_slice() {
            [field, value] if !field.is_empty() && !value.is_empty() => {
                Ok(Self::new(*field, *value))
            }
            _ => Err(Error::InvalidFieldMapping(pattern.to_string())),
        }
    }

    /// Binding providing field names.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Binding providing field values.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FromStr for FieldMapping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Insertion-ordered multimap of pending field values.
#[derive(Debug, Default)]
struct PendingFields {
    entries: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl PendingFields {
    fn push(&mut self, key: &str, value: &str) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1.push(value.to_string()),
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), vec![value.to_string()]));
            }
        }
    }

    fn take(&mut self) -> Vec<(String, Vec<String>)> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }
}

#[derive(Debug, Default)]
struct LevelFrame {
    pivot_open: bool,
    pending: PendingFields,
    // Property-pivot array open in the current group, and whether one of its
    // element objects is open.
    property: Option<String>,
    in_property_scope: bool,
    // Property expanded in the current group; its flat pairs are dropped.
    expanded: Option<String>,
}

impl LevelFrame {
    fn close_property_array<W: DocumentWriter>(&mut self, writer: &mut W) -> Result<()> {
        if self.property.take().is_some() {
            writer.end_array()?;
        }
        Ok(())
    }

    fn close_group<W: DocumentWriter>(&mut self, writer: &mut W) -> Result<()> {
        self.close_property_array(writer)?;
        let expanded = self.expanded.take();
        for (key, values) in self.pending.take() {
            if expanded.as_deref() == Some(key.as_str()) {
                continue;
            }
            writer.field_name(&key)?;
            if let [single] = values.as_slice() {
                writer.string_value(single)?;
            } else {
                writer.start_array()?;
                for value in &values {
                    writer.string_value(value)?;
                }
                writer.end_array()?;
            }
        }
        if self.pivot_open {
            writer.end_object()?;
            self.pivot_open = false;
        }
        Ok(())
    }
}

/// Renders nested query events as one streaming JSON document.
pub struct JsonCollector<W: DocumentWriter> {
    writer: W,
    mapping: FieldMapping,
    levels: Vec<LevelFrame>,
    with_args: bool,
}

impl<W: DocumentWriter> JsonCollector<W> {
    /// Create a collector writing through `writer`.
    pub fn new(writer: W, mapping: FieldMapping) -> Self {
        Self {
            writer,
            mapping,
            levels: Vec::new(),
            with_args: false,
        }
    }

    /// Write each level's bound arguments as an `@args` array.
    pub fn with_args(mut self, enabled: bool) -> Self {
        self.with_args = enabled;
        self
    }

    /// Borrow the document writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Consume the collector and return the document writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Prepare the enclosing level for a nested field. A nested level outside
    /// a property scope ends the group's property array.
    fn enter_nested(&mut self) -> Result<()> {
        if let Some(frame) = self.levels.last_mut() {
            if !frame.in_property_scope {
                frame.close_property_array(&mut self.writer)?;
            }
        }
        Ok(())
    }

    fn current(&mut self, event: &str) -> Result<&mut LevelFrame> {
        self.levels
            .last_mut()
            .ok_or_else(|| Error::Document(format!("{} outside a level", event)))
    }
}

impl<W: DocumentWriter> ResultCollector for JsonCollector<W> {
    fn begin(&mut self) -> Result<()> {
        self.writer.start_object()
    }

    fn start_level(&mut self, _level: usize, name: &str, args: &[String]) -> Result<()> {
        self.enter_nested()?;
        self.writer.field_name(name)?;
        self.writer.start_object()?;
        if self.with_args {
            self.writer.field_name("@args")?;
            self.writer.start_array()?;
            for arg in args {
                self.writer.string_value(arg)?;
            }
            self.writer.end_array()?;
        }
        self.levels.push(LevelFrame::default());
        Ok(())
    }

    fn pivot(&mut self, value: &str) -> Result<()> {
        let Some(frame) = self.levels.last_mut() else {
            return Err(Error::Document(format!("pivot '{}' outside a level", value)));
        };
        frame.close_group(&mut self.writer)?;
        self.writer.field_name(value)?;
        self.writer.start_object()?;
        frame.pivot_open = true;
        Ok(())
    }

    fn start_property_pivot(&mut self, value: &str) -> Result<()> {
        let Some(frame) = self.levels.last_mut() else {
            return Err(Error::Document(format!(
                "property pivot '{}' outside a level",
                value
            )));
        };
        if frame.in_property_scope {
            return Err(Error::Document(format!(
                "property pivot '{}' opened inside another property pivot",
                value
            )));
        }
        if frame.property.as_deref() != Some(value) {
            frame.close_property_array(&mut self.writer)?;
            self.writer.field_name(value)?;
            self.writer.start_array()?;
            frame.property = Some(value.to_string());
            frame.expanded = Some(value.to_string());
        }
        self.writer.start_object()?;
        frame.in_property_scope = true;
        Ok(())
    }

    fn end_property_pivot(&mut self, value: &str) -> Result<()> {
        let frame = self.current("end of property pivot")?;
        if !frame.in_property_scope {
            return Err(Error::Document(format!(
                "property pivot '{}' closed but never opened",
                value
            )));
        }
        frame.in_property_scope = false;
        self.writer.end_object()
    }

    fn collect(&mut self, bindings: &[String], values: &[String]) -> Result<()> {
        let mut key = None;
        let mut value = None;
        for (binding, v) in bindings.iter().zip(values) {
            if binding == self.mapping.field() {
                key = Some(v);
            } else if binding == self.mapping.value() {
                value = Some(v);
            }
        }
        if let (Some(k), Some(v)) = (key, value) {
            self.current("collect")?.pending.push(k, v);
        }
        Ok(())
    }

    fn level_error(&mut self, _level: usize, name: &str, error: &Error) -> Result<()> {
        self.enter_nested()?;
        self.writer.field_name(name)?;
        self.writer.start_object()?;
        self.writer.field_name("@error")?;
        self.writer.string_value(&error.to_string())?;
        self.writer.end_object()
    }

    fn end_level(&mut self, level: usize) -> Result<()> {
        let mut frame = self
            .levels
            .pop()
            .ok_or_else(|| Error::Document(format!("end of level {} without start", level)))?;
        if frame.in_property_scope {
            return Err(Error::Document(format!(
                "level {} ended inside a property pivot",
                level
            )));
        }
        frame.close_group(&mut self.writer)?;
        self.writer.end_object()
    }

    fn end(&mut self) -> Result<()> {
        if !self.levels.is_empty() {
            return Err(Error::Document(format!(
                "unbalanced document: {} levels still open",
                self.levels.len()
            )));
        }
        self.writer.end_object()?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::JsonWriter;
    use crate::error::ExecutionError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn collector() -> JsonCollector<JsonWriter<Vec<u8>>> {
        JsonCollector::new(JsonWriter::new(Vec::new()), FieldMapping::new("p", "o"))
    }

    fn parse(collector: JsonCollector<JsonWriter<Vec<u8>>>) -> serde_json::Value {
        let bytes = collector.into_inner().into_inner();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_field_mapping_parse() {
        let mapping: FieldMapping = "p:o".parse().unwrap();
        assert_eq!(mapping.field(), "p");
        assert_eq!(mapping.value(), "o");
        assert!(FieldMapping::parse("p").is_err());
        assert!(FieldMapping::parse("p:o:x").is_err());
        assert!(FieldMapping::parse(":o").is_err());
    }

    #[test]
    fn test_groups_rows_per_pivot() {
        let mut c = collector();
        let bindings = s(&["s", "p", "o"]);
        c.begin().unwrap();
        c.start_level(0, "things", &[]).unwrap();
        c.pivot("a").unwrap();
        c.collect(&bindings, &s(&["a", "name", "Alpha"])).unwrap();
        c.collect(&bindings, &s(&["a", "tag", "x"])).unwrap();
        c.collect(&bindings, &s(&["a", "tag", "y"])).unwrap();
        c.pivot("b").unwrap();
        c.collect(&bindings, &s(&["b", "name", "Beta"])).unwrap();
        c.end_level(0).unwrap();
        c.end().unwrap();

        assert_eq!(
            parse(c),
            json!({
                "things": {
                    "a": {"name": "Alpha", "tag": ["x", "y"]},
                    "b": {"name": "Beta"}
                }
            })
        );
    }

    #[test]
    fn test_rows_without_mapped_bindings_are_ignored() {
        let mut c = collector();
        c.begin().unwrap();
        c.start_level(0, "things", &[]).unwrap();
        c.pivot("a").unwrap();
        c.collect(&s(&["s"]), &s(&["a"])).unwrap();
        c.end_level(0).unwrap();
        c.end().unwrap();

        assert_eq!(parse(c), json!({"things": {"a": {}}}));
    }

    #[test]
    fn test_nested_levels_and_property_pivot() {
        let mut c = collector().with_args(true);
        let bindings = s(&["s", "p", "o"]);
        c.begin().unwrap();
        c.start_level(0, "outer", &s(&["T"])).unwrap();
        c.pivot("a").unwrap();
        c.start_level(1, "inner", &s(&["a"])).unwrap();
        c.pivot("x").unwrap();
        c.collect(&bindings, &s(&["x", "k", "v"])).unwrap();
        c.end_level(1).unwrap();
        c.collect(&bindings, &s(&["a", "title", "First"])).unwrap();
        for target in ["x", "y"] {
            c.start_property_pivot("rel").unwrap();
            c.start_level(1, "inner", &s(&[target])).unwrap();
            c.end_level(1).unwrap();
            c.end_property_pivot("rel").unwrap();
            c.collect(&bindings, &s(&["a", "rel", target])).unwrap();
        }
        c.end_level(0).unwrap();
        c.end().unwrap();

        assert_eq!(
            parse(c),
            json!({
                "outer": {
                    "@args": ["T"],
                    "a": {
                        "inner": {"@args": ["a"], "x": {"k": "v"}},
                        "rel": [
                            {"inner": {"@args": ["x"]}},
                            {"inner": {"@args": ["y"]}}
                        ],
                        "title": "First"
                    }
                }
            })
        );
    }

    #[test]
    fn test_level_error_is_rendered() {
        let mut c = collector();
        c.begin().unwrap();
        c.start_level(0, "outer", &[]).unwrap();
        c.pivot("a").unwrap();
        let err = Error::Execution(ExecutionError::rejected("bad"));
        c.level_error(1, "inner", &err).unwrap();
        c.end_level(0).unwrap();
        c.end().unwrap();

        assert_eq!(
            parse(c),
            json!({"outer": {"a": {"inner": {"@error": "query rejected: bad"}}}})
        );
    }

    #[test]
    fn test_unbalanced_end_fails() {
        let mut c = collector();
        c.begin().unwrap();
        c.start_level(0, "outer", &[]).unwrap();
        assert!(c.end().is_err());
    }

    #[test]
    fn test_pivot_outside_level_fails() {
        let mut c = collector();
        c.begin().unwrap();
        assert!(c.pivot("a").is_err());
        assert!(c.end_property_pivot("a").is_err());
    }
}
