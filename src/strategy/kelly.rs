//! Kelly criterion bet sizing.
//!
//! Sizes a stake using fractional Kelly against the price implied by the
//! pool reserves, scaled by the oracle's confidence and capped at a
//! fraction of the bankroll.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{BetSizer, SizingRequest};
use crate::types::native_to_wei;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Kelly sizing configuration. Amounts are in native units.
#[derive(Debug, Clone)]
pub struct KellyConfig {
    /// Fractional Kelly multiplier (0.25 = quarter-Kelly). Lower = more conservative.
    pub multiplier: f64,
    /// Maximum bet as a fraction of bankroll.
    pub max_bet_pct: f64,
    /// Minimum bet size (below this, don't bother).
    pub min_bet_size: f64,
    /// Bankroll available for betting.
    pub bankroll: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            multiplier: 0.25,   // Quarter-Kelly: conservative
            max_bet_pct: 0.06,  // Max 6% of bankroll per bet
            min_bet_size: 0.01,
            bankroll: 10.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Kelly sizer
// ---------------------------------------------------------------------------

pub struct KellySizer {
    config: KellyConfig,
}

impl KellySizer {
    pub fn new(config: KellyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KellyConfig {
        &self.config
    }

    /// Fraction of the bankroll to stake.
    ///
    /// Kelly formula: f* = (bp - q) / b
    /// where:
    ///   b = net odds at the fee-adjusted pool price
    ///   p = win probability
    ///   q = 1 - p
    pub fn bet_fraction(&self, request: &SizingRequest) -> f64 {
        let total = request.selected_reserve as f64 + request.other_reserve as f64;
        if total <= 0.0 || self.config.bankroll <= 0.0 {
            return 0.0;
        }

        // In a constant-product pool the selected outcome is priced by the
        // share of the opposite reserve.
        let market_price = request.other_reserve as f64 / total;
        let keep = 1.0 - request.fee;
        if keep <= 0.0 || market_price <= 0.0 {
            return 0.0;
        }
        let effective_price = (market_price / keep).min(0.99);

        let payout_ratio = (1.0 - effective_price) / effective_price;
        let win_prob = request.win_probability;
        let kelly = (payout_ratio * win_prob - (1.0 - win_prob)) / payout_ratio;

        if kelly <= 0.0 {
            debug!(kelly, market_price, "Negative Kelly, no bet");
            return 0.0;
        }

        let fraction = kelly * self.config.multiplier * request.confidence.clamp(0.0, 1.0);
        fraction.min(self.config.max_bet_pct)
    }
}

#[async_trait]
impl BetSizer for KellySizer {
    async fn recommend(&self, request: &SizingRequest) -> Result<u128> {
        let fraction = self.bet_fraction(request);
        let amount = fraction * self.config.bankroll;

        if amount < self.config.min_bet_size {
            debug!(
                amount,
                min = self.config.min_bet_size,
                "Bet below minimum size"
            );
            return Ok(0);
        }

        debug!(
            fraction = format!("{:.2}%", fraction * 100.0),
            amount,
            "Bet sized"
        );
        Ok(native_to_wei(amount))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
