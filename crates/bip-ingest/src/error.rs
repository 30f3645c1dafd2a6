//! Error types for flat-file ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading an input file.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Input file not found.
    #[error("CSV file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Failed to read file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File exceeds the configured size limit.
    #[error("CSV file {path} is {size} bytes, limit is {max_size}")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    // === Content Errors ===
    /// File has no bytes, or only whitespace.
    #[error("CSV file is empty: {path}")]
    EmptyCsv { path: PathBuf },

    /// Header parsed but no data rows follow it.
    #[error("CSV file has a header but no records: {path}")]
    NoRecords { path: PathBuf },

    /// Header row is missing or blank.
    #[error("could not detect header row in {path}")]
    NoHeaderDetected { path: PathBuf },

    /// A header cell is blank.
    #[error("CSV file {path} has an empty column name")]
    EmptyColumnName { path: PathBuf },

    /// Byte-order mark of an encoding other than UTF-8.
    #[error("unsupported encoding {encoding} in {path}")]
    UnsupportedEncoding {
        path: PathBuf,
        encoding: &'static str,
    },

    /// Polars could not parse the file.
    #[error("failed to parse CSV {path}: {message}")]
    CsvParse { path: PathBuf, message: String },
}

impl IngestError {
    /// One-line remediation hint shown next to the error.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "check that the path is correct and the file exists",
            Self::FileRead { .. } => "check file permissions",
            Self::FileTooLarge { .. } => "split the file or raise the size limit",
            Self::EmptyCsv { .. } | Self::NoRecords { .. } => "the CSV file contains no data",
            Self::NoHeaderDetected { .. } | Self::EmptyColumnName { .. } => {
                "the first line must name every column"
            }
            Self::UnsupportedEncoding { .. } => "re-save the file as UTF-8",
            Self::CsvParse { .. } => "check that the file is a valid delimited file",
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IngestError::FileNotFound {
            path: PathBuf::from("data/online_retail.csv"),
        };
        assert_eq!(err.to_string(), "CSV file not found: data/online_retail.csv");
        assert!(err.hint().contains("path"));
    }

    #[test]
    fn test_encoding_display() {
        let err = IngestError::UnsupportedEncoding {
            path: PathBuf::from("x.csv"),
            encoding: "UTF-16 LE",
        };
        assert_eq!(err.to_string(), "unsupported encoding UTF-16 LE in x.csv");
    }
}
