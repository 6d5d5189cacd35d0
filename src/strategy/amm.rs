//! Constant-product AMM profitability.
//!
//! Simulates buying one outcome of a binary fixed-product market maker:
//! the net stake is split evenly across both outcome tokens, the opposite
//! side's tokens are swapped back into the pool, and the selected side
//! releases whatever keeps `reserve[0] * reserve[1]` constant.
//!
//! Token quantities are wei-scaled integers. Every division truncates, so
//! the share estimate is biased low, never high. The invariant `k` of a
//! liquid pool exceeds 128 bits and is held in a `BigUint`.

use num_bigint::BigUint;
use rust_decimal::prelude::*;
use tracing::{debug, info, warn};

use super::{BetSizer, SizingRequest};
use crate::types::{wei_to_native, Forecast, Pool, BINARY_N_SLOTS};

/// Tolerated excess of obtained shares over the liquidity-adjusted ceiling.
pub const SLIPPAGE: f64 = 1.05;

// ---------------------------------------------------------------------------
// Configuration and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AmmConfig {
    /// Minimum stake and minimum potential net profit, in wei.
    /// Non-positive values disable the profit threshold.
    pub bet_threshold: i128,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AmmError {
    #[error("Market has {slots} outcome slots; only binary markets are supported")]
    NonBinary { slots: usize },

    #[error("Vote {0} is not a binary outcome index")]
    InvalidVote(u8),

    #[error("Forecast carries no vote")]
    Undecided,

    #[error("Pool fee {0} is outside [0, 1]")]
    InvalidFee(f64),

    #[error("Pool has {reserves} reserves but {prices} marginal prices")]
    MismatchedPrices { reserves: usize, prices: usize },

    #[error("Marginal price {0} is outside (0, 1]")]
    InvalidPrice(f64),

    #[error("Pool has no liquidity on the opposite side")]
    EmptyPool,

    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Amm(#[from] AmmError),

    #[error("Bet sizing failed: {0:#}")]
    Sizing(anyhow::Error),
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Every intermediate quantity of a simulated trade, for auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareQuote {
    pub selected_reserve: u128,
    pub other_reserve: u128,
    /// Pool invariant before the trade.
    pub k: BigUint,
    pub per_token: u128,
    pub tokens_traded: [u128; BINARY_N_SLOTS],
    pub selected_shares: u128,
    pub other_shares: u128,
    /// Opposite-side tokens left in the pool after the swap.
    pub remaining: u128,
    pub swapped_shares: u128,
    pub num_shares: u128,
    pub available_shares: u128,
}

/// How a verdict was reached.
#[derive(Debug, Clone, PartialEq)]
pub enum VerdictBasis {
    /// The trade was simulated against the pool.
    Quoted,
    /// The pool carries no marginal prices.
    Unpriced,
    /// The sizing service failed; nothing is staked.
    SizingFailed(String),
    /// The pool could not be evaluated.
    Rejected(AmmError),
}

/// Profitability verdict for one candidate bet.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub is_profitable: bool,
    /// Pre-fee stake to place, in wei.
    pub stake: u128,
    pub net_stake: u128,
    /// Effective profit threshold (never negative).
    pub threshold: i128,
    pub potential_net_profit: i128,
    pub low_liquidity: bool,
    /// `None` when the pool could not price the trade.
    pub quote: Option<ShareQuote>,
    pub basis: VerdictBasis,
}

impl Verdict {
    /// Conservative verdict for a pool without marginal prices.
    pub fn unpriced() -> Self {
        Self::declined(VerdictBasis::Unpriced)
    }

    /// Not profitable, nothing staked, for the given reason.
    pub fn declined(basis: VerdictBasis) -> Self {
        Self {
            is_profitable: false,
            stake: 0,
            net_stake: 0,
            threshold: 0,
            potential_net_profit: 0,
            low_liquidity: false,
            quote: None,
            basis,
        }
    }

    /// Whether the verdict comes from a simulated trade.
    pub fn is_quoted(&self) -> bool {
        self.basis == VerdictBasis::Quoted
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

pub struct AmmCalculator {
    config: AmmConfig,
}

impl AmmCalculator {
    pub fn new(config: AmmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AmmConfig {
        &self.config
    }

    /// Size, clamp and assess a bet on the forecast's vote.
    ///
    /// The sizing service is only consulted once the pool is known to be
    /// binary and priced.
    pub async fn evaluate(
        &self,
        pool: &Pool,
        forecast: &Forecast,
        sizer: &dyn BetSizer,
    ) -> Result<Verdict, EvaluationError> {
        let vote = forecast.vote.ok_or(AmmError::Undecided)?;
        let (selected_reserve, other_reserve) = binary_reserves(pool, vote)?;

        if pool.outcome_token_marginal_prices.is_none() {
            warn!(market = %pool.id, "Pool has no marginal prices; the bet cannot be priced");
            return Ok(Verdict::unpriced());
        }

        let request = SizingRequest {
            win_probability: forecast.win_probability,
            confidence: forecast.confidence,
            selected_reserve,
            other_reserve,
            fee: pool.fee,
        };
        let recommended = sizer
            .recommend(&request)
            .await
            .map_err(EvaluationError::Sizing)?;
        let stake = self.clamp_stake(recommended);
        info!(
            recommended = %recommended,
            floor = %self.config.bet_threshold,
            stake = %stake,
            "Bet amount"
        );

        Ok(self.assess(pool, vote, stake)?)
    }

    /// Raise a recommendation to the configured minimum stake.
    pub fn clamp_stake(&self, recommended: u128) -> u128 {
        let floor = u128::try_from(self.config.bet_threshold).unwrap_or(0);
        recommended.max(floor)
    }

    /// Threshold actually applied to the potential profit.
    pub fn effective_threshold(&self) -> i128 {
        let threshold = self.config.bet_threshold;
        if threshold <= 0 {
            warn!(
                threshold = %threshold,
                "A non-positive bet threshold was given. The threshold will be disabled, \
                 which means that any non-negative potential profit will be considered profitable!"
            );
            return 0;
        }
        threshold
    }

    /// Assess a fixed stake against the pool.
    pub fn assess(&self, pool: &Pool, vote: u8, stake: u128) -> Result<Verdict, AmmError> {
        let net_stake = net_stake(stake, pool.fee)?;
        info!(stake = %stake, fee = pool.fee, net_stake = %net_stake, "Net bet amount");

        let Some(quote) = quote_shares(pool, vote, net_stake)? else {
            warn!(market = %pool.id, "Pool has no marginal prices; the bet cannot be priced");
            return Ok(Verdict::unpriced());
        };

        let low_liquidity = quote.num_shares as f64 > quote.available_shares as f64 * SLIPPAGE;
        if low_liquidity {
            warn!(
                num_shares = %quote.num_shares,
                available_shares = %quote.available_shares,
                "Kindly contemplate reducing your bet amount, as the pool's liquidity is low \
                 compared to your bet. The obtained number of shares, and therefore the \
                 potential net profit, will be lower than if the pool had higher liquidity!"
            );
        }

        let threshold = self.effective_threshold();
        let num_shares = to_signed(quote.num_shares, "potential net profit")?;
        let net = to_signed(net_stake, "potential net profit")?;
        let potential_net_profit = num_shares
            .checked_sub(net)
            .and_then(|p| p.checked_sub(threshold))
            .ok_or(AmmError::Overflow("potential net profit"))?;
        let is_profitable = potential_net_profit >= 0;

        info!(
            liquidity = pool.scaled_liquidity_measure,
            potential_net_profit = %wei_to_native(potential_net_profit),
            num_shares = %wei_to_native(num_shares),
            outcome = pool.outcome_label(vote),
            is_profitable,
            "Decision for profitability of this market"
        );

        Ok(Verdict {
            is_profitable,
            stake,
            net_stake,
            threshold,
            potential_net_profit,
            low_liquidity,
            quote: Some(quote),
            basis: VerdictBasis::Quoted,
        })
    }
}

// ---------------------------------------------------------------------------
// Trade simulation
// ---------------------------------------------------------------------------

/// `(reserve[vote], reserve[opposite])` of a binary pool.
pub fn binary_reserves(pool: &Pool, vote: u8) -> Result<(u128, u128), AmmError> {
    if !pool.is_binary() {
        return Err(AmmError::NonBinary {
            slots: pool.outcome_slot_count.max(pool.outcome_token_amounts.len()),
        });
    }
    if vote as usize >= BINARY_N_SLOTS {
        return Err(AmmError::InvalidVote(vote));
    }
    let amounts = &pool.outcome_token_amounts;
    Ok((amounts[vote as usize], amounts[opposite(vote) as usize]))
}

/// The other outcome of a binary market.
pub fn opposite(vote: u8) -> u8 {
    vote ^ 1
}

/// Stake left after the pool keeps its fee; the fee part is truncated.
pub fn net_stake(stake: u128, fee: f64) -> Result<u128, AmmError> {
    if !(0.0..=1.0).contains(&fee) {
        return Err(AmmError::InvalidFee(fee));
    }
    let fee_dec = Decimal::from_f64(fee).ok_or(AmmError::InvalidFee(fee))?;
    let stake_dec = Decimal::from_u128(stake).ok_or(AmmError::Overflow("net stake"))?;
    let fee_part = stake_dec
        .checked_mul(fee_dec)
        .and_then(|f| f.floor().to_u128())
        .ok_or(AmmError::Overflow("net stake"))?;
    Ok(stake - fee_part)
}

/// Simulate the trade. `Ok(None)` when the pool has no marginal prices.
pub fn quote_shares(pool: &Pool, vote: u8, net_stake: u128) -> Result<Option<ShareQuote>, AmmError> {
    let (selected_reserve, other_reserve) = binary_reserves(pool, vote)?;

    let k = BigUint::from(selected_reserve) * BigUint::from(other_reserve);
    debug!(
        reserves = ?pool.outcome_token_amounts,
        k = %k,
        "Pool invariant"
    );

    // The market maker invests an equal share of the stake in every outcome.
    let per_token = net_stake / BINARY_N_SLOTS as u128;

    let Some(prices) = pool.outcome_token_marginal_prices.as_deref() else {
        return Ok(None);
    };
    if prices.len() != BINARY_N_SLOTS {
        return Err(AmmError::MismatchedPrices {
            reserves: pool.outcome_token_amounts.len(),
            prices: prices.len(),
        });
    }
    if let Some(&bad) = prices.iter().find(|p| !(**p > 0.0 && **p <= 1.0)) {
        return Err(AmmError::InvalidPrice(bad));
    }

    let mut tokens_traded = [0u128; BINARY_N_SLOTS];
    for (traded, price) in tokens_traded.iter_mut().zip(prices) {
        *traded = (per_token as f64 / price).floor() as u128;
    }
    let selected_shares = tokens_traded[vote as usize];
    let other_shares = tokens_traded[opposite(vote) as usize];

    // Swap the opposite tokens back in, keeping x * y = k.
    let denominator = other_reserve
        .checked_add(other_shares)
        .ok_or(AmmError::Overflow("remaining tokens"))?;
    if denominator == 0 {
        return Err(AmmError::EmptyPool);
    }
    // remaining <= selected_reserve whenever the opposite side has liquidity.
    let remaining = u128::try_from(&k / BigUint::from(denominator))
        .map_err(|_| AmmError::Overflow("remaining tokens"))?;
    let swapped_shares = selected_reserve.saturating_sub(remaining);
    let num_shares = selected_shares
        .checked_add(swapped_shares)
        .ok_or(AmmError::Overflow("number of shares"))?;

    let available_shares = (selected_reserve as f64 * prices[vote as usize]).floor() as u128;

    info!(
        per_token = %per_token,
        prices = ?prices,
        tokens_traded = ?tokens_traded,
        selected_shares = %selected_shares,
        other_shares = %other_shares,
        selected_reserve = %selected_reserve,
        other_reserve = %other_reserve,
        remaining = %remaining,
        swapped_shares = %swapped_shares,
        num_shares = %num_shares,
        available_shares = %available_shares,
        "Simulated AMM trade"
    );

    Ok(Some(ShareQuote {
        selected_reserve,
        other_reserve,
        k,
        per_token,
        tokens_traded,
        selected_shares,
        other_shares,
        remaining,
        swapped_shares,
        num_shares,
        available_shares,
    }))
}

fn to_signed(value: u128, what: &'static str) -> Result<i128, AmmError> {
    i128::try_from(value).map_err(|_| AmmError::Overflow(what))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
