//! Streaming structured-document writer.

use std::io::Write;

use crate::error::{Error, Result};

/// Output boundary of the JSON collector, modeled after a streaming JSON generator.
pub trait DocumentWriter {
    fn start_object(&mut self) -> Result<()>;
    fn end_object(&mut self) -> Result<()>;
    fn field_name(&mut self, name: &str) -> Result<()>;
    fn string_value(&mut self, value: &str) -> Result<()>;
    fn start_array(&mut self) -> Result<()>;
    fn end_array(&mut self) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

#[derive(Debug)]
enum Scope {
    Object { has_fields: bool, awaiting_value: bool },
    Array { has_items: bool },
}

/// Compact JSON writer over any [`Write`].
///
/// Rejects call sequences that would produce invalid JSON.
pub struct JsonWriter<W: Write> {
    out: W,
    scopes: Vec<Scope>,
    root_written: bool,
}

impl<W: Write> JsonWriter<W> {
    /// Create a writer.
    pub fn new(out: W) -> Self {
        Self {
            out,
            scopes: Vec::new(),
            root_written: false,
        }
    }

    /// Number of open objects and arrays.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Check if exactly one complete root value was written.
    pub fn is_complete(&self) -> bool {
        self.root_written && self.scopes.is_empty()
    }

    /// Consume the writer and return the underlying output.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn before_value(&mut self) -> Result<()> {
        match self.scopes.last_mut() {
            None => {
                if self.root_written {
                    return Err(Error::Document("multiple root values".to_string()));
                }
                self.root_written = true;
            }
            Some(Scope::Object { awaiting_value, .. }) => {
                if !*awaiting_value {
                    return Err(Error::Document(
                        "value inside object without a field name".to_string(),
                    ));
                }
                *awaiting_value = false;
            }
            Some(Scope::Array { has_items }) => {
                if *has_items {
                    self.out.write_all(b",")?;
                }
                *has_items = true;
            }
        }
        Ok(())
    }

    fn write_escaped(&mut self, value: &str) -> Result<()> {
        serde_json::to_writer(&mut self.out, value).map_err(|e| Error::Io(e.into()))
    }
}

impl<W: Write> DocumentWriter for JsonWriter<W> {
    fn start_object(&mut self) -> Result<()> {
        self.before_value()?;
        self.out.write_all(b"{")?;
        self.scopes.push(Scope::Object {
            has_fields: false,
            awaiting_value: false,
        });
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        match self.scopes.last() {
            Some(Scope::Object {
                awaiting_value: false,
                ..
            }) => {
                self.scopes.pop();
                self.out.write_all(b"}")?;
                Ok(())
            }
            Some(Scope::Object { .. }) => Err(Error::Document(
                "object closed while a field awaits its value".to_string(),
            )),
            _ => Err(Error::Document("end_object without open object".to_string())),
        }
    }

    fn field_name(&mut self, name: &str) -> Result<()> {
        match self.scopes.last_mut() {
            Some(Scope::Object {
                has_fields,
                awaiting_value,
            }) if !*awaiting_value => {
                let separator = *has_fields;
                *has_fields = true;
                *awaiting_value = true;
                if separator {
                    self.out.write_all(b",")?;
                }
                self.write_escaped(name)?;
                self.out.write_all(b":")?;
                Ok(())
            }
            Some(Scope::Object { .. }) => Err(Error::Document(format!(
                "field '{}' written while previous field awaits its value",
                name
            ))),
            _ => Err(Error::Document(format!(
                "field '{}' written outside an object",
                name
            ))),
        }
    }

    fn string_value(&mut self, value: &str) -> Result<()> {
        self.before_value()?;
        self.write_escaped(value)
    }

    fn start_array(&mut self) -> Result<()> {
        self.before_value()?;
        self.out.write_all(b"[")?;
        self.scopes.push(Scope::Array { has_items: false });
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        match self.scopes.last() {
            Some(Scope::Array { .. }) => {
                self.scopes.pop();
                self.out.write_all(b"]")?;
                Ok(())
            }
            _ => Err(Error::Document("end_array without open array".to_string())),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
