//! Whole-file persistence of region tables.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::table::{TableError, TimeSeriesTable};

#[derive(thiserror::Error, Debug)]
/// Errors raised while reading or writing a table file.
pub enum StoreError {
    /// Filesystem access failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The file exists but is not a table.
    #[error("could not parse {path}: {source}")]
    Parse {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        source: TableError,
    },
    /// The table could not be encoded for writing.
    #[error("could not encode {path}: {source}")]
    Encode {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        source: TableError,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a table, returning `None` when the file does not exist yet.
///
/// # Errors
///
/// Returns a [`StoreError`] when the file cannot be read or parsed.
pub fn read_table(path: &Path) -> Result<Option<TimeSeriesTable>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_error(path)(err)),
    };

    TimeSeriesTable::parse(&text)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Replace the file at `path` with `table`.
///
/// The table is written to a temporary file in the same directory and renamed
/// over the target, so the previous contents stay intact on failure.
///
/// # Errors
///
/// Returns [`StoreError::Encode`] when the table cannot be rendered, or
/// [`StoreError::Io`] when any filesystem step fails.
pub fn write_table(path: &Path, table: &TimeSeriesTable) -> Result<(), StoreError> {
    let text = table.to_csv().map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
    tmp.write_all(text.as_bytes())
        .map_err(io_error(tmp.path()))?;
    tmp.as_file().sync_all().map_err(io_error(tmp.path()))?;
    tmp.persist(path)
        .map_err(|err| io_error(path)(err.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CaseValue, DateLabel, Observation};
    use crate::table::merge;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent_cases.csv");
        assert!(read_table(&path).expect("read").is_none());
    }

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("region_cases.csv");

        let outcome = merge(
            None,
            &DateLabel("04/16/2020".to_owned()),
            &[Observation::new("68123", CaseValue::Count(5))],
        )
        .expect("merge");
        write_table(&path, &outcome.table).expect("write");

        let text = fs::read_to_string(&path).expect("read raw");
        assert_eq!(text, ",\"04/16/2020\"\n\"68123\",5\n");
        assert_eq!(read_table(&path).expect("read"), Some(outcome.table));

        let leftovers = fs::read_dir(path.parent().expect("parent"))
            .expect("list")
            .count();
        assert_eq!(leftovers, 1, "temporary file should be renamed away");
    }

    #[test]
    fn unparseable_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken_cases.csv");
        fs::write(&path, "\"04/16/2020\"\n").expect("seed");

        let err = read_table(&path).expect_err("header is malformed");
        assert!(
            matches!(err, StoreError::Parse { source: TableError::MalformedHeader, .. }),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn quoted_zip_is_readable_on_the_next_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("quirky_cases.csv");

        let first = merge(
            None,
            &DateLabel("04/16/2020".to_owned()),
            &[Observation::new("68\"123", CaseValue::Count(5))],
        )
        .expect("merge");
        write_table(&path, &first.table).expect("write");

        let existing = read_table(&path).expect("read").expect("file exists");
        let second = merge(
            Some(&existing),
            &DateLabel("04/17/2020".to_owned()),
            &[Observation::new("68\"123", CaseValue::Count(7))],
        )
        .expect("merge again");
        write_table(&path, &second.table).expect("rewrite");

        let text = fs::read_to_string(&path).expect("read raw");
        assert_eq!(text, ",\"04/16/2020\",\"04/17/2020\"\n\"68\"\"123\",5,7\n");
    }
}
