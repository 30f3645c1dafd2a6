//! Recoverable loading: a bad input file means "no data", not a fault.

use std::path::Path;

use bip_model::Dataset;

use crate::reader::read_dataset;

/// Loads a CSV file, logging any failure with a hint and returning `None`.
pub fn load_dataset(path: &Path) -> Option<Dataset> {
    match read_dataset(path) {
        Ok(dataset) => {
            tracing::info!(
                path = %path.display(),
                rows = dataset.height(),
                columns = dataset.width(),
                "loaded dataset"
            );
            Some(dataset)
        }
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, hint = err.hint(), "failed to load dataset");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_returns_none_on_failure() {
        assert!(load_dataset(Path::new("/nonexistent/file.csv")).is_none());

        let empty = NamedTempFile::new().unwrap();
        assert!(load_dataset(empty.path()).is_none());
    }

    #[test]
    fn test_load_returns_dataset() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "Country\nUnited Kingdom\nFrance\n").unwrap();
        let dataset = load_dataset(file.path()).unwrap();
        assert_eq!(dataset.height(), 2);
    }
}
