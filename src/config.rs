//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! [`AppConfig::validate`] rejects settings the decision core cannot
//! honour before any cycle runs.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::forecast::ReplayFields;
use crate::strategy::{ConfidenceTableSizer, KellyConfig};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub decision: DecisionConfig,
    pub sizing: SizingConfig,
    pub benchmarking: BenchmarkingConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DecisionConfig {
    /// Minimum stake and minimum potential net profit, in wei.
    pub bet_threshold: i64,
    /// Oracle tool whose forecasts are evaluated.
    pub tool: String,
    /// JSON-lines file receiving every cycle's signal and payload.
    pub payloads_path: String,
}

/// Which bet-sizing strategy to use.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SizingStrategy {
    KellyCriterion,
    BetAmountPerThreshold,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SizingConfig {
    pub strategy: SizingStrategy,
    /// Native units available for betting.
    pub bankroll: f64,
    pub kelly_multiplier: f64,
    pub max_bet_pct: f64,
    pub min_bet_size: f64,
    /// Confidence (`"0.0"`..`"1.0"`) → stake in wei.
    #[serde(default)]
    pub bet_amount_per_threshold: HashMap<String, u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BenchmarkingConfig {
    pub enabled: bool,
    pub store_path: String,
    pub dataset_filename: String,
    pub results_filename: String,
    pub sep: char,
    pub question_id_field: String,
    pub question_field: String,
    pub answer_field: String,
    pub p_yes_field_part: String,
    pub p_no_field_part: String,
    pub confidence_field_part: String,
    pub part_prefix_mode: bool,
    pub pool_fee: f64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LiveConfig {
    /// JSON array of oracle responses for the current cycle.
    #[serde(default)]
    pub responses_path: Option<String>,
    /// JSON pool snapshot for the market being decided on.
    #[serde(default)]
    pub pool_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the decision core cannot work with.
    pub fn validate(&self) -> Result<()> {
        let bench = &self.benchmarking;
        if !bench.sep.is_ascii() {
            bail!("Dataset separator {:?} must be a single ASCII character", bench.sep);
        }
        if !(0.0..1.0).contains(&bench.pool_fee) {
            bail!("Benchmark pool fee {} must lie in [0, 1)", bench.pool_fee);
        }

        let sizing = &self.sizing;
        if !(sizing.kelly_multiplier > 0.0 && sizing.kelly_multiplier <= 1.0) {
            bail!(
                "Kelly multiplier {} must lie in (0, 1]",
                sizing.kelly_multiplier
            );
        }
        if !(0.0..=1.0).contains(&sizing.max_bet_pct) {
            bail!("max_bet_pct {} must lie in [0, 1]", sizing.max_bet_pct);
        }
        if sizing.strategy == SizingStrategy::BetAmountPerThreshold {
            if sizing.bet_amount_per_threshold.is_empty() {
                bail!("bet_amount_per_threshold strategy selected but no table configured");
            }
            ConfidenceTableSizer::from_thresholds(&sizing.bet_amount_per_threshold)
                .context("Invalid bet_amount_per_threshold table")?;
        }

        if !bench.enabled && (self.live.responses_path.is_none() || self.live.pool_path.is_none())
        {
            bail!("Live mode requires live.responses_path and live.pool_path");
        }
        Ok(())
    }

    /// Dataset separator as a byte. Only meaningful after [`validate`](Self::validate).
    pub fn separator(&self) -> u8 {
        self.benchmarking.sep as u8
    }

    pub fn dataset_path(&self) -> PathBuf {
        Path::new(&self.benchmarking.store_path).join(&self.benchmarking.dataset_filename)
    }

    pub fn results_path(&self) -> PathBuf {
        Path::new(&self.benchmarking.store_path).join(&self.benchmarking.results_filename)
    }

    pub fn replay_fields(&self) -> ReplayFields {
        let bench = &self.benchmarking;
        ReplayFields {
            question_id_field: bench.question_id_field.clone(),
            question_field: bench.question_field.clone(),
            answer_field: bench.answer_field.clone(),
            p_yes_field_part: bench.p_yes_field_part.clone(),
            p_no_field_part: bench.p_no_field_part.clone(),
            confidence_field_part: bench.confidence_field_part.clone(),
            part_prefix_mode: bench.part_prefix_mode,
        }
    }

    pub fn kelly(&self) -> KellyConfig {
        KellyConfig {
            multiplier: self.sizing.kelly_multiplier,
            max_bet_pct: self.sizing.max_bet_pct,
            min_bet_size: self.sizing.min_bet_size,
            bankroll: self.sizing.bankroll,
        }
    }
}
