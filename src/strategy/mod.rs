//! Strategy engine: bet sizing and AMM profitability.
//!
//! The calculator in [`amm`] clamps whatever a [`BetSizer`] recommends,
//! simulates the trade against the pool and returns a verdict.

pub mod amm;
pub mod kelly;
pub mod threshold;

use anyhow::Result;
use async_trait::async_trait;

pub use amm::{
    AmmCalculator, AmmConfig, AmmError, EvaluationError, ShareQuote, Verdict, VerdictBasis,
};
pub use kelly::{KellyConfig, KellySizer};
pub use threshold::ConfidenceTableSizer;

/// Inputs to a stake recommendation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingRequest {
    pub win_probability: f64,
    pub confidence: f64,
    /// Pool reserve of the outcome being bought, in wei.
    pub selected_reserve: u128,
    /// Pool reserve of the opposite outcome, in wei.
    pub other_reserve: u128,
    pub fee: f64,
}

/// External bet-sizing service.
///
/// Contract: holding the pool fixed, a higher `confidence` or
/// `win_probability` never yields a smaller stake.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BetSizer: Send + Sync {
    /// Recommended stake in wei.
    async fn recommend(&self, request: &SizingRequest) -> Result<u128>;
}
