//! Nested query chains and their execution.
//!
//! A [`NestedQuery`] is an ordered list of [`Level`]s. Level 0 is executed
//! with caller arguments; whenever the pivot value of a level changes, the
//! next level is executed with arguments taken from the current row.

mod chain;
mod description;
mod engine;
mod level;
mod pivot;

pub use chain::{NestedQuery, NestedQueryBuilder};
pub use description::{ChainDescription, LevelDescription};
pub use engine::ExecutionSummary;
pub use level::{Level, PropertyPivot};
