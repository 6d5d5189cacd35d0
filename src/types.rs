//! Shared types for the decision core.
//!
//! Pool snapshots, oracle responses, forecasts, outcome payloads and the
//! terminal event taxonomy. Every other module depends on these; they
//! depend on nothing else in the crate.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of outcome slots in a binary market.
pub const BINARY_N_SLOTS: usize = 2;

/// Fixed-point scale of on-chain token amounts (18 decimals).
pub const WEI_DECIMALS: u32 = 18;

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Read-only snapshot of a constant-product liquidity pool for one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub id: String,
    pub title: String,
    /// Fraction of every stake retained by the pool (0.0–1.0).
    pub fee: f64,
    pub outcome_slot_count: usize,
    /// Outcome token reserves, in wei.
    pub outcome_token_amounts: Vec<u128>,
    /// Marginal price per outcome (0.0–1.0]. Missing on freshly created markets.
    #[serde(default)]
    pub outcome_token_marginal_prices: Option<Vec<f64>>,
    pub outcomes: Vec<String>,
    pub scaled_liquidity_measure: f64,
}

impl Pool {
    /// Synthetic pool used while replaying a benchmark dataset.
    pub fn benchmark(fee: f64) -> Self {
        Pool {
            id: String::new(),
            title: String::new(),
            fee,
            outcome_slot_count: BINARY_N_SLOTS,
            outcome_token_amounts: vec![10_000_000_000_000_000_000; BINARY_N_SLOTS],
            outcome_token_marginal_prices: Some(vec![0.5; BINARY_N_SLOTS]),
            outcomes: vec!["Yes".to_string(), "No".to_string()],
            scaled_liquidity_measure: 10.0,
        }
    }

    /// Whether this pool describes a two-outcome market.
    pub fn is_binary(&self) -> bool {
        self.outcome_slot_count == BINARY_N_SLOTS
            && self.outcome_token_amounts.len() == BINARY_N_SLOTS
    }

    /// Label of the outcome at `index`, or `"unknown"`.
    pub fn outcome_label(&self, index: u8) -> &str {
        self.outcomes
            .get(index as usize)
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}

// ---------------------------------------------------------------------------
// Oracle intake
// ---------------------------------------------------------------------------

/// One response delivered by the external oracle interaction layer.
/// Exactly one of `result` / `error` is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MechResponse {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MechResponse {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            result: Some(result.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }
}

impl fmt::Display for MechResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.result, &self.error) {
            (Some(r), _) => write!(f, "result: {r}"),
            (None, Some(e)) => write!(f, "error: {e}"),
            (None, None) => write!(f, "empty response"),
        }
    }
}

/// Mock market data carried by a replayed dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkingMockData {
    pub question_id: String,
    pub question: String,
    pub answer: String,
}

// ---------------------------------------------------------------------------
// Forecast
// ---------------------------------------------------------------------------

/// A parsed oracle forecast for a binary market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Outcome index the oracle votes for. `None` when `p_yes == p_no`.
    pub vote: Option<u8>,
    pub p_yes: f64,
    pub p_no: f64,
    pub win_probability: f64,
    pub confidence: f64,
    pub info_utility: f64,
}

// ---------------------------------------------------------------------------
// Outcome payload and events
// ---------------------------------------------------------------------------

/// Payload handed to the external sequencing layer after each cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub is_profitable: Option<bool>,
    pub vote: Option<u8>,
    pub confidence: Option<f64>,
    pub bet_amount: Option<u128>,
}

impl DecisionOutcome {
    /// Payload for a cycle that could not reach a decision.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Terminal signal emitted once per decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Event {
    /// Profitable: the payload carries stake and vote.
    Done,
    /// No forecast available (exhausted, missing, erroring or malformed).
    NoData,
    Unprofitable,
    /// The oracle found both outcomes equally likely.
    Tie,
    /// The forecast or pool violates the binary-market guarantee.
    ResponseError,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Done => write!(f, "done"),
            Event::NoData => write!(f, "no-data"),
            Event::Unprofitable => write!(f, "unprofitable"),
            Event::Tie => write!(f, "tie"),
            Event::ResponseError => write!(f, "response-error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit conversion
// ---------------------------------------------------------------------------

/// Convert a signed wei amount to native units for logging.
pub fn wei_to_native(amount: i128) -> Decimal {
    Decimal::try_from_i128_with_scale(amount, WEI_DECIMALS)
        .map(|d| d.normalize())
        .unwrap_or_default()
}

/// Convert a native amount to wei, truncating sub-wei dust.
/// Negative, non-finite or unrepresentable inputs yield zero.
pub fn native_to_wei(amount: f64) -> u128 {
    let Some(native) = Decimal::from_f64(amount) else {
        return 0;
    };
    let scale = Decimal::from(10u64.pow(WEI_DECIMALS));
    native
        .checked_mul(scale)
        .and_then(|wei| wei.trunc().to_u128())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
