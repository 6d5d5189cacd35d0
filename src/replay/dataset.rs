//! Destructive dataset replay.
//!
//! Each call pops the first data row off a delimited dataset file and
//! rewrites the file without it. The rewrite goes through a temporary
//! file in the same directory followed by a rename, so an interrupted
//! rewrite never corrupts the source.

use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

const QUOTE: char = '"';
const TWO_QUOTES: &str = "\"\"";
const NEW_LINE: &str = "\n";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset {path} has no header row")]
    MissingHeader { path: PathBuf },

    #[error("Failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to rewrite dataset {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Replay record
// ---------------------------------------------------------------------------

/// One dataset row, keyed by header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRecord {
    fields: HashMap<String, String>,
}

impl ReplayRecord {
    fn from_row(header: &StringRecord, row: &StringRecord) -> Self {
        let fields = header
            .iter()
            .zip(row.iter())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for ReplayRecord {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// A finite, ordered, destructively consumed sequence of dataset rows.
#[derive(Debug, Clone)]
pub struct DatasetReplaySource {
    path: PathBuf,
    sep: u8,
}

impl DatasetReplaySource {
    /// `sep` must be a single-byte delimiter (validated by the config layer).
    pub fn new(path: impl Into<PathBuf>, sep: u8) -> Self {
        Self {
            path: path.into(),
            sep,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pop the first data row.
    ///
    /// Returns `Ok(None)` once only the header remains; the file is left
    /// untouched in that case. A missing header is an error and likewise
    /// leaves the file untouched.
    pub fn next_record(&self) -> Result<Option<ReplayRecord>, DatasetError> {
        let read_err = |source| DatasetError::Read {
            path: self.path.clone(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(self.sep)
            .has_headers(true)
            .from_path(&self.path)
            .map_err(read_err)?;

        let header = reader.headers().map_err(read_err)?.clone();
        if header.is_empty() {
            error!(
                path = %self.path.display(),
                "The dataset has no headers! Cannot replay a corrupted dataset file."
            );
            return Err(DatasetError::MissingHeader {
                path: self.path.clone(),
            });
        }

        let mut rows = reader.records();
        let first = match rows.next() {
            Some(row) => row.map_err(read_err)?,
            None => {
                info!(path = %self.path.display(), "Dataset exhausted");
                return Ok(None);
            }
        };
        let record = ReplayRecord::from_row(&header, &first);

        // Serialise into memory first so a malformed later row aborts the
        // read before anything touches the disk.
        let mut remaining = self.serialize_row(&header);
        let mut kept = 0usize;
        for row in rows {
            let row = row.map_err(read_err)?;
            remaining.push_str(&self.serialize_row(&row));
            kept += 1;
        }
        drop(reader);

        self.replace_contents(&remaining)?;
        debug!(path = %self.path.display(), rows_left = kept, "Dataset row consumed");

        Ok(Some(record))
    }

    fn serialize_row(&self, row: &StringRecord) -> String {
        let sep = self.sep as char;
        let fields: Vec<String> = row.iter().map(|f| quote_field(f, sep)).collect();
        let mut line = fields.join(&sep.to_string());
        line.push_str(NEW_LINE);
        line
    }

    fn replace_contents(&self, contents: &str) -> Result<(), DatasetError> {
        let write_err = |source| DatasetError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            writer.write_all(contents.as_bytes()).map_err(write_err)?;
            writer.flush().map_err(write_err)?;
        }
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

/// Re-apply the quoting the reader stripped.
///
/// Quotes inside a field are doubled; a field holding the separator, a
/// doubled quote or a line break is wrapped in quotes.
pub fn quote_field(field: &str, sep: char) -> String {
    let mut field = if field.contains(QUOTE) {
        field.replace(QUOTE, TWO_QUOTES)
    } else {
        field.to_string()
    };

    let needs_wrap = field.contains(sep)
        || field.contains(TWO_QUOTES)
        || field.contains('\n')
        || field.contains('\r');
    if needs_wrap {
        field = format!("{QUOTE}{field}{QUOTE}");
    }
    field
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
