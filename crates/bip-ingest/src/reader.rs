//! CSV reading into a [`Dataset`].

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::Path;

use bip_model::Dataset;
use polars::prelude::*;

use crate::error::{IngestError, Result};

/// Maximum file size for CSV loading (500 MB default).
pub const MAX_CSV_FILE_SIZE: u64 = 500 * 1024 * 1024;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Options for [`read_dataset_with`].
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Field separator.
    pub separator: u8,
    /// Rows sampled for type inference; `None` scans the whole file.
    pub infer_schema_length: Option<usize>,
    pub max_file_size: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            infer_schema_length: Some(1000),
            max_file_size: MAX_CSV_FILE_SIZE,
        }
    }
}

/// Reads a CSV file with a header row using default options.
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    read_dataset_with(path, &ReadOptions::default())
}

/// Reads a CSV file with a header row.
///
/// Distinguishes a missing file, an empty file (or a header with no records)
/// and a malformed file. A UTF-8 byte-order mark is stripped; UTF-16 files
/// are rejected.
pub fn read_dataset_with(path: &Path, options: &ReadOptions) -> Result<Dataset> {
    check_file_size(path, options.max_file_size)?;
    let has_bom = validate_encoding(path)?;
    check_header(path)?;

    let read_options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(options.infer_schema_length)
        .map_parse_options(|parse| parse.with_separator(options.separator));

    let parsed = if has_bom {
        let mut bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
        bytes.drain(..UTF8_BOM.len());
        read_options
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
    } else {
        read_options
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
    };

    let df = parsed.map_err(|e| IngestError::CsvParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    validate_dataframe_shape(&df, path)?;

    tracing::debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "parsed CSV"
    );

    Ok(Dataset::new(df))
}

fn io_error(path: &Path, e: std::io::Error) -> IngestError {
    if e.kind() == std::io::ErrorKind::NotFound {
        IngestError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        IngestError::FileRead {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

fn check_file_size(path: &Path, max_size: u64) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| io_error(path, e))?;

    if metadata.is_dir() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    if metadata.len() == 0 {
        return Err(IngestError::EmptyCsv {
            path: path.to_path_buf(),
        });
    }
    if metadata.len() > max_size {
        return Err(IngestError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size,
        });
    }

    Ok(())
}

/// Checks the byte-order mark and rejects UTF-16.
///
/// Returns `true` when the file starts with a UTF-8 BOM.
pub fn validate_encoding(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| io_error(path, e))?;

    let mut buffer = [0u8; 3];
    let bytes_read = file.read(&mut buffer).map_err(|e| io_error(path, e))?;

    if bytes_read >= 2 {
        if buffer[0..2] == [0xFF, 0xFE] {
            return Err(IngestError::UnsupportedEncoding {
                path: path.to_path_buf(),
                encoding: "UTF-16 LE",
            });
        }
        if buffer[0..2] == [0xFE, 0xFF] {
            return Err(IngestError::UnsupportedEncoding {
                path: path.to_path_buf(),
                encoding: "UTF-16 BE",
            });
        }
    }

    Ok(bytes_read == UTF8_BOM.len() && buffer == UTF8_BOM)
}

/// The first line must be a non-blank header.
fn check_header(path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let reader = BufReader::new(file);

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| io_error(path, e))?;
        let cleaned = line.strip_prefix('\u{feff}').unwrap_or(&line);
        if cleaned.trim().is_empty() {
            continue;
        }
        if index > 0 {
            return Err(IngestError::NoHeaderDetected {
                path: path.to_path_buf(),
            });
        }
        return Ok(());
    }

    Err(IngestError::EmptyCsv {
        path: path.to_path_buf(),
    })
}

fn validate_dataframe_shape(df: &DataFrame, path: &Path) -> Result<()> {
    if df.height() == 0 {
        return Err(IngestError::NoRecords {
            path: path.to_path_buf(),
        });
    }

    if df.width() > 500 {
        tracing::warn!(
            path = %path.display(),
            columns = df.width(),
            "dataset has more than 500 columns"
        );
    }

    for name in df.get_column_names() {
        if name.trim().is_empty() {
            return Err(IngestError::EmptyColumnName {
                path: path.to_path_buf(),
            });
        }
    }

    Ok(())
}
