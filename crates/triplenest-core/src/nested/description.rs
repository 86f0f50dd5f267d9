//! JSON chain descriptions.
//!
//! ```json
//! {"levels": [
//!   {"name": "articles", "query": "SELECT * {?Article a <$Type>}", "pivot": "Article"},
//!   {"name": "agents", "query": "SELECT ?s ?p ?o {<$Article> ?x ?s . ?s ?p ?o}",
//!    "pivot": "s", "escape": "iri"}
//! ]}
//! ```
//!
//! `inVariables` and `outBindings` may be given explicitly; otherwise they
//! are inferred from the query text.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::template::{ArgumentEscape, QueryTemplate};

use super::chain::NestedQuery;
use super::level::{Level, PropertyPivot};

/// Serialized form of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainDescription {
    pub levels: Vec<LevelDescription>,
}

/// Serialized form of a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LevelDescription {
    pub name: String,
    pub query: String,
    pub pivot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_variables: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_bindings: Option<Vec<String>>,
    #[serde(default)]
    pub escape: ArgumentEscape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_pivot: Option<PropertyPivot>,
}

impl LevelDescription {
    /// Build the level, validating its template.
    pub fn to_level(&self) -> Result<Level> {
        let query = match (&self.in_variables, &self.out_bindings) {
            (None, None) => QueryTemplate::parse(self.query.as_str())?,
            (in_variables, out_bindings) => {
                let inferred = QueryTemplate::parse(self.query.as_str())?;
                QueryTemplate::new(
                    self.query.as_str(),
                    in_variables
                        .clone()
                        .unwrap_or_else(|| inferred.in_variables().to_vec()),
                    out_bindings
                        .clone()
                        .unwrap_or_else(|| inferred.out_bindings().to_vec()),
                )?
            }
        };
        let level = Level::new(
            self.name.as_str(),
            query.with_escape(self.escape),
            self.pivot.as_str(),
        );
        Ok(match &self.property_pivot {
            Some(pp) => level.with_property_pivot(pp.clone()),
            None => level,
        })
    }
}

impl ChainDescription {
    /// Build and validate the chain.
    pub fn build(&self) -> Result<NestedQuery> {
        let mut builder = NestedQuery::builder();
        for level in &self.levels {
            builder.add_level(level.to_level()?);
        }
        builder.build()
    }
}

impl From<&NestedQuery> for ChainDescription {
    fn from(chain: &NestedQuery) -> Self {
        let levels = chain
            .levels()
            .iter()
            .map(|level| LevelDescription {
                name: level.name().to_string(),
                query: level.query().template().to_string(),
                pivot: level.pivot().to_string(),
                in_variables: Some(level.query().in_variables().to_vec()),
                out_bindings: Some(level.query().out_bindings().to_vec()),
                escape: level.query().escape(),
                property_pivot: level.property_pivot().cloned(),
            })
            .collect();
        Self { levels }
    }
}

impl NestedQuery {
    /// Build a chain from a JSON description.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let description: ChainDescription = serde_json::from_str(json)?;
        description.build()
    }

    /// Build a chain from a JSON reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let description: ChainDescription = serde_json::from_reader(reader)?;
        description.build()
    }

    /// Build a chain from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Serializable description of this chain, with explicit variables.
    pub fn to_description(&self) -> ChainDescription {
        ChainDescription::from(self)
    }
}
