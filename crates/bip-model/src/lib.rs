//! Core data types for the BI pipeline.
//!
//! - [`Dataset`]: an owned, in-memory table threaded through load, normalize
//!   and persist.
//! - [`ColumnKind`]: the declared value kind of a column.
//! - [`IntegerWidth`]: narrowest fixed-width integer for an observed range.
//! - [`ConflictSpec`]: target table plus the uniqueness key used by upserts.
//! - [`ColumnDerivation`]: dataset-level default fills applied before writes.

pub mod column;
pub mod conflict;
pub mod dataset;
pub mod derivation;
pub mod error;
pub mod width;

pub use column::ColumnKind;
pub use conflict::ConflictSpec;
pub use dataset::Dataset;
pub use derivation::ColumnDerivation;
pub use error::{ModelError, Result};
pub use width::IntegerWidth;
