//! Chain levels.

use serde::{Deserialize, Serialize};

use crate::template::QueryTemplate;

/// Secondary trigger of a level.
///
/// When a row has `row[property] == value`, the next level is additionally
/// entered for that row, with an extra binding `remap = row[remap_key]`
/// visible to the argument binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyPivot {
    #[serde(rename = "p")]
    pub property: String,
    #[serde(rename = "v")]
    pub value: String,
    pub remap: String,
    #[serde(rename = "remapKey")]
    pub remap_key: String,
}

impl PropertyPivot {
    pub fn new(
        property: impl Into<String>,
        value: impl Into<String>,
        remap: impl Into<String>,
        remap_key: impl Into<String>,
    ) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            remap: remap.into(),
            remap_key: remap_key.into(),
        }
    }
}

/// One stage of a nested query.
///
/// Rows returned by `query` must be grouped by the `pivot` binding (the query
/// should `ORDER BY` it). Group changes are detected by comparing with the
/// previous row only.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    name: String,
    query: QueryTemplate,
    pivot: String,
    property_pivot: Option<PropertyPivot>,
}

impl Level {
    /// Create a level without property pivot.
    pub fn new(name: impl Into<String>, query: QueryTemplate, pivot: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query,
            pivot: pivot.into(),
            property_pivot: None,
        }
    }

    /// Attach a property pivot.
    pub fn with_property_pivot(mut self, property_pivot: PropertyPivot) -> Self {
        self.property_pivot = Some(property_pivot);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query(&self) -> &QueryTemplate {
        &self.query
    }

    pub fn pivot(&self) -> &str {
        &self.pivot
    }

    pub fn property_pivot(&self) -> Option<&PropertyPivot> {
        self.property_pivot.as_ref()
    }
}
