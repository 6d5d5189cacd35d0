//! Persistence layer.
//!
//! Appends each cycle's terminal signal and payload to a JSON-lines file,
//! the hand-off point to the external sequencing layer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::engine::PayloadSink;
use crate::types::{DecisionOutcome, Event};

/// Default payload file path.
const DEFAULT_PAYLOADS_FILE: &str = "payloads.jsonl";

/// One submitted decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadRecord {
    pub timestamp: DateTime<Utc>,
    pub event: Event,
    pub outcome: DecisionOutcome,
}

/// [`PayloadSink`] writing one JSON object per line.
pub struct JsonlPayloadSink {
    path: PathBuf,
}

impl JsonlPayloadSink {
    pub fn new(path: Option<&str>) -> Self {
        Self {
            path: PathBuf::from(path.unwrap_or(DEFAULT_PAYLOADS_FILE)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &PayloadRecord) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create payload dir {}", dir.display()))?;
        }
        let line = serde_json::to_string(record).context("Failed to serialise payload")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open payload file {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("Failed to write payload to {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl PayloadSink for JsonlPayloadSink {
    async fn submit(&self, event: Event, outcome: &DecisionOutcome) -> Result<()> {
        let record = PayloadRecord {
            timestamp: Utc::now(),
            event,
            outcome: outcome.clone(),
        };
        self.append(&record)?;
        debug!(path = %self.path.display(), event = %event, "Payload submitted");
        Ok(())
    }
}

/// Load every submitted payload, oldest first.
/// Returns an empty list if the file doesn't exist.
pub fn load_payloads(path: Option<&str>) -> Result<Vec<PayloadRecord>> {
    let path = path.unwrap_or(DEFAULT_PAYLOADS_FILE);

    if !Path::new(path).exists() {
        info!(path, "No payload file found");
        return Ok(Vec::new());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read payloads from {path}"))?;

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Failed to parse payload {} in {path}", i + 1))
        })
        .collect()
}

/// Delete the payload file (for testing or reset).
pub fn delete_payloads(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_PAYLOADS_FILE);
    if Path::new(path).exists() {
        fs::remove_file(path).with_context(|| format!("Failed to delete payload file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
