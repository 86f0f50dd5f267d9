//! Nested query chains and their validation.

use std::collections::HashSet;

use crate::error::{Error, Result};

use super::level::Level;

/// An immutable, validated chain of levels.
///
/// A chain holds no execution state and can be shared between threads and
/// executed concurrently.
#[derive(Debug, Clone)]
pub struct NestedQuery {
    levels: Vec<Level>,
}

impl NestedQuery {
    /// Start building a chain.
    pub fn builder() -> NestedQueryBuilder {
        NestedQueryBuilder::new()
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always false for a built chain.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Level at `index`, if present.
    pub fn level(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }
}

/// Builder for [`NestedQuery`].
#[derive(Debug, Default)]
pub struct NestedQueryBuilder {
    levels: Vec<Level>,
}

impl NestedQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a level to the chain.
    pub fn level(mut self, level: Level) -> Self {
        self.levels.push(level);
        self
    }

    /// Append a level in place.
    pub fn add_level(&mut self, level: Level) -> &mut Self {
        self.levels.push(level);
        self
    }

    /// Validate the chain.
    ///
    /// Checks that only depend on output bindings are skipped for levels
    /// whose template declares none.
    pub fn build(self) -> Result<NestedQuery> {
        let levels = self.levels;
        if levels.is_empty() {
            return Err(invalid(0, "chain has no levels"));
        }

        let mut names = HashSet::new();
        for (index, level) in levels.iter().enumerate() {
            if !names.insert(level.name()) {
                return Err(invalid(
                    index,
                    format!("duplicate level name '{}'", level.name()),
                ));
            }

            let out = level.query().out_bindings();
            let known = |binding: &str| out.is_empty() || out.iter().any(|b| b == binding);

            if !known(level.pivot()) {
                return Err(invalid(
                    index,
                    format!(
                        "pivot '{}' is not an output binding of the query ({})",
                        level.pivot(),
                        out.join(", ")
                    ),
                ));
            }

            if let Some(pp) = level.property_pivot() {
                if index + 1 == levels.len() {
                    return Err(invalid(index, "property pivot on the last level"));
                }
                for binding in [pp.property.as_str(), pp.remap_key.as_str()] {
                    if !known(binding) {
                        return Err(invalid(
                            index,
                            format!(
                                "property pivot binding '{}' is not an output binding of the query",
                                binding
                            ),
                        ));
                    }
                }
            }

            if let Some(next) = levels.get(index + 1) {
                let remap = level.property_pivot().map(|pp| pp.remap.as_str());
                for var in next.query().in_variables() {
                    if Some(var.as_str()) != remap && !known(var.as_str()) {
                        return Err(invalid(
                            index + 1,
                            format!(
                                "input variable '{}' is not produced by level '{}'",
                                var,
                                level.name()
                            ),
                        ));
                    }
                }
            }
        }

        Ok(NestedQuery { levels })
    }
}

fn invalid(level: usize, reason: impl Into<String>) -> Error {
    Error::InvalidChain {
        level,
        reason: reason.into(),
    }
}
