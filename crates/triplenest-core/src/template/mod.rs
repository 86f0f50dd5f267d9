//! Parameterized query templates.
//!
//! A template is a query string with `$name` input placeholders and `?name`
//! output bindings. Placeholders are resolved by token rather than by textual
//! replace, so `$Type` never clobbers part of `$TypeName`.

mod escape;
mod lexer;

use std::fmt;

use crate::cursor::ResultCursor;
use crate::error::{Error, Result};
use crate::executor::QueryExecutor;

pub use escape::ArgumentEscape;
pub use lexer::{tokenize, SpannedToken, Token};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Param(usize),
}

/// An immutable, validated query template.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    template: String,
    in_variables: Vec<String>,
    out_bindings: Vec<String>,
    escape: ArgumentEscape,
    segments: Vec<Segment>,
}

impl QueryTemplate {
    /// Create a template with explicitly declared input variables and output bindings.
    ///
    /// Fails with [`Error::InvalidTemplate`] when a declared variable or binding
    /// does not occur in the template, when a placeholder in the template is not
    /// declared, or when a variable is declared twice.
    pub fn new<I, O>(template: impl Into<String>, in_variables: I, out_bindings: O) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let template = template.into();
        let in_variables: Vec<String> = in_variables.into_iter().map(Into::into).collect();
        let out_bindings: Vec<String> = out_bindings.into_iter().map(Into::into).collect();
        let tokens = tokenize(&template);

        for (i, var) in in_variables.iter().enumerate() {
            if in_variables[..i].contains(var) {
                return Err(Error::InvalidTemplate(format!(
                    "input variable '{}' declared twice",
                    var
                )));
            }
        }

        let placeholders = placeholder_names(&tokens);
        for var in &in_variables {
            if !placeholders.contains(var) {
                return Err(Error::InvalidTemplate(format!(
                    "input variable '{}' does not occur as ${} in '{}'",
                    var, var, template
                )));
            }
        }
        for name in &placeholders {
            if !in_variables.contains(name) {
                return Err(Error::InvalidTemplate(format!(
                    "placeholder ${} is not a declared input variable",
                    name
                )));
            }
        }

        let variables = variable_names(&tokens);
        for binding in &out_bindings {
            if !variables.contains(binding) {
                return Err(Error::InvalidTemplate(format!(
                    "output binding '{}' does not occur as ?{} in '{}'",
                    binding, binding, template
                )));
            }
        }

        let segments = build_segments(&template, &tokens, &in_variables);

        Ok(Self {
            template,
            in_variables,
            out_bindings,
            escape: ArgumentEscape::default(),
            segments,
        })
    }

    /// Create a template, inferring input variables from its `$name`
    /// placeholders and output bindings from its `SELECT` projection.
    pub fn parse(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let tokens = tokenize(&template);
        let in_variables = placeholder_names(&tokens);
        let out_bindings = projected_variables(&tokens);
        Self::new(template, in_variables, out_bindings)
    }

    /// Set the escape mode applied to bound arguments.
    pub fn with_escape(mut self, escape: ArgumentEscape) -> Self {
        self.escape = escape;
        self
    }

    /// The raw template text.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Declared input variables, in argument order.
    pub fn in_variables(&self) -> &[String] {
        &self.in_variables
    }

    /// Declared output bindings. May be empty when not known up front.
    pub fn out_bindings(&self) -> &[String] {
        &self.out_bindings
    }

    /// Escape mode for bound arguments.
    pub fn escape(&self) -> ArgumentEscape {
        self.escape
    }

    /// Expand the template with the given arguments, in `in_variables` order.
    pub fn expand<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        if args.len() != self.in_variables.len() {
            return Err(Error::ArityMismatch {
                expected: self.in_variables.len(),
                actual: args.len(),
            });
        }

        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Param(index) => self.escape.write(args[*index].as_ref(), &mut out),
            }
        }
        Ok(out)
    }

    /// Expand the template and run it on `executor`.
    pub fn perform<'e, E, S>(
        &self,
        executor: &'e E,
        args: &[S],
    ) -> Result<Box<dyn ResultCursor + 'e>>
    where
        E: QueryExecutor + ?Sized,
        S: AsRef<str>,
    {
        let query = self.expand(args)?;
        Ok(executor.execute(&query)?)
    }
}

impl fmt::Display for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in: [{}] out: [{}]",
            self.template,
            self.in_variables.join(", "),
            self.out_bindings.join(", ")
        )
    }
}

fn push_distinct(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn placeholder_names(tokens: &[SpannedToken]) -> Vec<String> {
    let mut names = Vec::new();
    for t in tokens {
        if let Token::Placeholder(name) = &t.token {
            push_distinct(&mut names, name);
        }
    }
    names
}

fn variable_names(tokens: &[SpannedToken]) -> Vec<String> {
    let mut names = Vec::new();
    for t in tokens {
        if let Token::Variable(name) = &t.token {
            push_distinct(&mut names, name);
        }
    }
    names
}

/// Variables projected by the first `SELECT` clause.
///
/// `SELECT *` and templates without a `SELECT` project every variable.
/// Inside parenthesized expressions only the `AS ?alias` target counts.
fn projected_variables(tokens: &[SpannedToken]) -> Vec<String> {
    let Some(start) = tokens.iter().position(|t| t.token == Token::Select) else {
        return variable_names(tokens);
    };

    let mut projected = Vec::new();
    let mut depth = 0usize;
    let mut after_as = false;
    for t in &tokens[start + 1..] {
        match &t.token {
            Token::Star if depth == 0 => return variable_names(&tokens[start + 1..]),
            Token::Where | Token::LBrace if depth == 0 => break,
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::As => {
                after_as = true;
                continue;
            }
            Token::Variable(name) if depth == 0 || after_as => push_distinct(&mut projected, name),
            _ => {}
        }
        after_as = false;
    }
    projected
}

fn build_segments(
    template: &str,
    tokens: &[SpannedToken],
    in_variables: &[String],
) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for t in tokens {
        let Token::Placeholder(name) = &t.token else {
            continue;
        };
        // Validated by the caller.
        let Some(index) = in_variables.iter().position(|v| v == name) else {
            continue;
        };
        if t.span.start > cursor {
            segments.push(Segment::Text(template[cursor..t.span.start].to_string()));
        }
        segments.push(Segment::Param(index));
        cursor = t.span.end;
    }
    if cursor < template.len() {
        segments.push(Segment::Text(template[cursor..].to_string()));
    }
    segments
}
