//! Database module: row view models and SQL repositories.
//!
//! - `model`: slices of rows returned by repositories that are not domain
//!   entities on their own.
//! - `repo`: SQL-only functions mapping rows into entities.
//!
//! Callers import everything through `factchecker::db`.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{FeedbackCounts, NewFactCheck, SimilarLink, SourceLink};
