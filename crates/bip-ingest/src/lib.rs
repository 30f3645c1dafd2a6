//! Flat-file ingestion for the BI pipeline.
//!
//! Reads a delimited file with a header row into a [`Dataset`]. Column types
//! are inferred by Polars; normalization decides the final representation.
//!
//! Two entry points:
//!
//! - [`read_dataset`] returns a typed [`IngestError`] for callers that want
//!   to branch on the failure.
//! - [`load_dataset`] logs the failure with a hint and returns `None`, so a
//!   pipeline treats a bad input file as "no data" rather than a fault.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use bip_ingest::load_dataset;
//!
//! let Some(dataset) = load_dataset(Path::new("data/online_retail.csv")) else {
//!     return;
//! };
//! println!("{} rows", dataset.height());
//! ```

mod error;
mod loader;
mod reader;

// === Error Types ===
pub use error::{IngestError, Result};

// === Loading ===
pub use loader::load_dataset;
pub use reader::{MAX_CSV_FILE_SIZE, ReadOptions, read_dataset, read_dataset_with, validate_encoding};

// Re-exported so callers can name the loaded type without another dependency.
pub use bip_model::Dataset;
