//! Benchmark results log.
//!
//! Every profitable replayed decision is appended as one CSV row so a
//! finished benchmark run can be scored offline.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One row of the benchmark results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResultRecord {
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub question_id: String,
    pub question: String,
    pub answer: String,
    pub p_yes: f64,
    pub p_no: f64,
    pub confidence: f64,
    pub vote: u8,
    /// Stake in wei, kept as text so 128-bit amounts survive the round trip.
    pub bet_amount: String,
}

/// Append-only writer for [`BenchmarkResultRecord`]s.
pub struct BenchmarkResults {
    path: PathBuf,
    writer: csv::Writer<std::fs::File>,
}

impl BenchmarkResults {
    /// Open (or create) the results file. The header is written only
    /// when the file is new or empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create results dir {}", dir.display()))?;
        }

        let file_has_data = fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open results file {}", path.display()))?;

        let writer = WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file);

        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &BenchmarkResultRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .context("Failed to write benchmark result")?;
        self.writer
            .flush()
            .context("Failed to flush benchmark results")?;
        debug!(
            path = %self.path.display(),
            question_id = %record.question_id,
            "Benchmark result recorded"
        );
        Ok(())
    }
}

/// Read every record back from a results file.
pub fn load_results(path: &Path) -> Result<Vec<BenchmarkResultRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open results file {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse results file {}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
