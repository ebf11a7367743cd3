use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{CaptureError, Result};

/// Forward-only cursor over one raw iio-capture CSV
///
/// The reader is positioned on a data row from the moment it is opened. Rows
/// are consumed once; there is no way back. Once the last row has been passed
/// the reader is `finished` but keeps that last row as its current row, so a
/// merge can keep reporting the device's final values.
pub struct StreamReader {
    path: PathBuf,
    records: StringRecordsIntoIter<File>,
    columns: Vec<String>,
    /// Column name -> field position in the artifact header
    positions: HashMap<String, usize>,
    timestamp_position: usize,
    current: StringRecord,
    timestamp: f64,
    finished: bool,
    rows_read: u64,
}

impl StreamReader {
    /// Open `path` and position on its first data row
    ///
    /// # Arguments
    /// * `columns` - Columns the caller will look up; may repeat a name
    /// * `timestamp_column` - Column used as the ordering key
    ///
    /// # Returns
    /// `MalformedArtifact` when the header is missing or lacks a column,
    /// `EmptyArtifact` when the header is followed by no rows.
    pub fn open<P, S>(path: P, columns: &[S], timestamp_column: &str) -> Result<Self>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| csv_error(&path, e))?
            .clone();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(CaptureError::malformed(&path, "missing header row"));
        }

        let find = |name: &str| -> Result<usize> {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                CaptureError::malformed(&path, format!("header has no '{}' column", name))
            })
        };

        let timestamp_position = find(timestamp_column)?;

        let mut positions = HashMap::new();
        for column in columns {
            let column = column.as_ref();
            if !positions.contains_key(column) {
                positions.insert(column.to_string(), find(column)?);
            }
        }

        let mut records = reader.into_records();
        let first = match records.next() {
            Some(record) => record.map_err(|e| csv_error(&path, e))?,
            None => return Err(CaptureError::EmptyArtifact(path)),
        };
        let timestamp = parse_timestamp(&path, &first, timestamp_position, 1)?;

        log::debug!(
            "Opened {} for columns {:?}",
            path.display(),
            columns.iter().map(|c| c.as_ref()).collect::<Vec<_>>()
        );

        Ok(Self {
            path,
            records,
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            positions,
            timestamp_position,
            current: first,
            timestamp,
            finished: false,
            rows_read: 1,
        })
    }

    /// Ordering key of the current row
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Value of one configured column in the current row
    pub fn value(&self, column: &str) -> Result<&str> {
        let position = *self
            .positions
            .get(column)
            .ok_or_else(|| CaptureError::UnknownColumn(column.to_string()))?;

        self.current.get(position).ok_or_else(|| {
            CaptureError::malformed(
                &self.path,
                format!("row {} has no field {}", self.rows_read, position),
            )
        })
    }

    /// Values of `columns` from the current row, in the order given
    pub fn current_row<S: AsRef<str>>(&self, columns: &[S]) -> Result<Vec<&str>> {
        columns.iter().map(|c| self.value(c.as_ref())).collect()
    }

    /// Step to the next row. Calling this on a finished reader does nothing.
    pub fn advance(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }

        match self.records.next() {
            None => {
                self.finished = true;
                log::debug!(
                    "Reached end of {} after {} rows",
                    self.path.display(),
                    self.rows_read
                );
            }
            Some(record) => {
                let record = record.map_err(|e| csv_error(&self.path, e))?;
                let row = self.rows_read + 1;
                self.timestamp = parse_timestamp(&self.path, &record, self.timestamp_position, row)?;
                self.current = record;
                self.rows_read = row;
            }
        }

        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Columns requested at open time, repeats included
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows consumed so far, the current one included
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

fn parse_timestamp(path: &Path, record: &StringRecord, position: usize, row: u64) -> Result<f64> {
    let raw = record
        .get(position)
        .ok_or_else(|| CaptureError::malformed(path, format!("row {} has no timestamp", row)))?;

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(CaptureError::malformed(
            path,
            format!("row {} has invalid timestamp '{}'", row, raw),
        )),
    }
}

fn csv_error(path: &Path, err: csv::Error) -> CaptureError {
    if !err.is_io_error() {
        return CaptureError::malformed(path, err.to_string());
    }
    match err.into_kind() {
        csv::ErrorKind::Io(e) => CaptureError::Io(e),
        kind => CaptureError::malformed(path, format!("{:?}", kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TS: &str = "timestamp ms";

    fn artifact(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_open_positions_on_first_row() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "a.csv", "timestamp ms, vbus mV\n0, 100\n10, 105\n");

        let reader = StreamReader::open(&path, &["vbus mV"], TS).unwrap();
        assert_eq!(reader.timestamp(), 0.0);
        assert_eq!(reader.value("vbus mV").unwrap(), "100");
        assert!(!reader.is_finished());
        assert_eq!(reader.rows_read(), 1);
    }

    #[test]
    fn test_repeated_column_lookup() {
        let dir = TempDir::new().unwrap();
        let path = artifact(
            &dir,
            "a.csv",
            "timestamp ms, vbus mV, power mW\n0, 100, 7.5\n",
        );

        let columns = ["power mW", "vbus mV", "power mW"];
        let reader = StreamReader::open(&path, &columns, TS).unwrap();
        assert_eq!(reader.current_row(&columns).unwrap(), vec!["7.5", "100", "7.5"]);
        assert_eq!(reader.columns().len(), 3);
    }

    #[test]
    fn test_unconfigured_column_rejected() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "a.csv", "timestamp ms, vbus mV, power mW\n0, 100, 7.5\n");

        let reader = StreamReader::open(&path, &["vbus mV"], TS).unwrap();
        assert!(matches!(
            reader.value("power mW"),
            Err(CaptureError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_advance_until_finished_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "a.csv", "timestamp ms, vbus mV\n0, 100\n10, 105\n");

        let mut reader = StreamReader::open(&path, &["vbus mV"], TS).unwrap();
        reader.advance().unwrap();
        assert_eq!(reader.timestamp(), 10.0);
        assert!(!reader.is_finished());

        reader.advance().unwrap();
        assert!(reader.is_finished());
        // last row stays current
        assert_eq!(reader.value("vbus mV").unwrap(), "105");

        reader.advance().unwrap();
        assert!(reader.is_finished());
        assert_eq!(reader.rows_read(), 2);
    }

    #[test]
    fn test_missing_column_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "a.csv", "timestamp ms, vbus mV\n0, 100\n");

        let result = StreamReader::open(&path, &["current mA"], TS);
        assert!(matches!(result, Err(CaptureError::MalformedArtifact { .. })));
    }

    #[test]
    fn test_missing_timestamp_column_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "a.csv", "time, vbus mV\n0, 100\n");

        let result = StreamReader::open(&path, &["vbus mV"], TS);
        assert!(matches!(result, Err(CaptureError::MalformedArtifact { .. })));
    }

    #[test]
    fn test_zero_length_has_no_header() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "a.csv", "");

        let result = StreamReader::open(&path, &["vbus mV"], TS);
        assert!(matches!(result, Err(CaptureError::MalformedArtifact { .. })));
    }

    #[test]
    fn test_header_only_is_empty_artifact() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "a.csv", "timestamp ms, vbus mV\n");

        let result = StreamReader::open(&path, &["vbus mV"], TS);
        assert!(matches!(result, Err(CaptureError::EmptyArtifact(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = StreamReader::open(dir.path().join("nope.csv"), &["vbus mV"], TS);
        assert!(matches!(result, Err(CaptureError::Io(_))));
    }

    #[test]
    fn test_bad_timestamp_on_advance() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "a.csv", "timestamp ms, vbus mV\n0, 100\nsoon, 101\n");

        let mut reader = StreamReader::open(&path, &["vbus mV"], TS).unwrap();
        let err = reader.advance().unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_short_row_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "a.csv", "timestamp ms, vbus mV\n0, 100\n10\n");

        let mut reader = StreamReader::open(&path, &["vbus mV"], TS).unwrap();
        assert!(matches!(
            reader.advance(),
            Err(CaptureError::MalformedArtifact { .. })
        ));
    }
}
