//! Argument escaping applied when binding values into a template.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// How argument values are rendered into the expanded query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentEscape {
    /// Substitute the value verbatim.
    Raw,
    /// Percent-encode characters that are not allowed inside `<...>` IRIs.
    #[default]
    Iri,
    /// Backslash-escape the value for use inside a quoted string literal.
    Literal,
}

impl ArgumentEscape {
    /// Render `value` into `out` according to this escape mode.
    pub fn write(&self, value: &str, out: &mut String) {
        match self {
            ArgumentEscape::Raw => out.push_str(value),
            ArgumentEscape::Iri => {
                for ch in value.chars() {
                    if is_iri_unsafe(ch) {
                        let mut buf = [0u8; 4];
                        for byte in ch.encode_utf8(&mut buf).bytes() {
                            let _ = write!(out, "%{:02X}", byte);
                        }
                    } else {
                        out.push(ch);
                    }
                }
            }
            ArgumentEscape::Literal => {
                for ch in value.chars() {
                    match ch {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\t' => out.push_str("\\t"),
                        _ => out.push(ch),
                    }
                }
            }
        }
    }

    /// Escape a single value.
    pub fn apply(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        self.write(value, &mut out);
        out
    }
}

fn is_iri_unsafe(ch: char) -> bool {
    matches!(ch, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '\\' | '`')
        || ch.is_whitespace()
        || ch.is_control()
}
