//! Confidence-table bet sizing.
//!
//! Maps the oracle's confidence, rounded to one decimal, onto a fixed
//! stake. A confidence with no entry of its own takes the stake of the
//! nearest lower configured decile, or nothing when there is none. The
//! table must be non-decreasing in confidence.

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{BetSizer, SizingRequest};

pub struct ConfidenceTableSizer {
    /// Confidence decile (0..=10) → stake in wei.
    table: BTreeMap<u8, u128>,
}

impl ConfidenceTableSizer {
    /// Build from `"0.7" → stake` pairs as found in the config file.
    pub fn from_thresholds(thresholds: &HashMap<String, u64>) -> Result<Self> {
        let mut table = BTreeMap::new();
        for (key, amount) in thresholds {
            let confidence: f64 = key
                .trim()
                .parse()
                .with_context(|| format!("Invalid confidence threshold: {key}"))?;
            if !(0.0..=1.0).contains(&confidence) {
                bail!("Confidence threshold {key} is outside [0, 1]");
            }
            table.insert(decile(confidence), u128::from(*amount));
        }
        Self::new(table)
    }

    pub fn new(table: BTreeMap<u8, u128>) -> Result<Self> {
        let mut previous: Option<(u8, u128)> = None;
        for (&d, &amount) in &table {
            if let Some((pd, pa)) = previous {
                if amount < pa {
                    bail!(
                        "Stake table decreases from {pa} at {} to {amount} at {}",
                        f64::from(pd) / 10.0,
                        f64::from(d) / 10.0
                    );
                }
            }
            previous = Some((d, amount));
        }
        Ok(Self { table })
    }

    /// Stake for the highest configured decile at or below `confidence`.
    pub fn stake_for(&self, confidence: f64) -> u128 {
        let key = decile(confidence.clamp(0.0, 1.0));
        match self.table.range(..=key).next_back() {
            Some((_, &amount)) => amount,
            None => {
                warn!(confidence, "No stake configured for this confidence; betting nothing");
                0
            }
        }
    }
}

#[async_trait]
impl BetSizer for ConfidenceTableSizer {
    async fn recommend(&self, request: &SizingRequest) -> Result<u128> {
        let stake = self.stake_for(request.confidence);
        debug!(confidence = request.confidence, stake = %stake, "Bet sized from confidence table");
        Ok(stake)
    }
}

/// Confidence rounded to one decimal, as a key in `0..=10`.
fn decile(confidence: f64) -> u8 {
    (confidence * 10.0).round() as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
