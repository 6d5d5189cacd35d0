//! Oracle payload parsing.
//!
//! Decodes the oracle's free-text result into a [`Forecast`]. Required
//! fields are `p_yes`, `p_no` and `confidence`; `vote` and
//! `win_probability` are derived from the probabilities when absent.

use serde::Deserialize;

use crate::types::{Forecast, BINARY_N_SLOTS};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed forecast: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Malformed forecast: {field} = {value} is outside [0, 1]")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("Non-binary vote {0}")]
    NonBinaryVote(i64),
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    p_yes: f64,
    p_no: f64,
    confidence: f64,
    #[serde(default)]
    info_utility: f64,
    #[serde(default)]
    vote: Option<i64>,
    #[serde(default)]
    win_probability: Option<f64>,
}

/// Parse a raw oracle result.
pub fn parse_prediction(raw: &str) -> Result<Forecast, ParseError> {
    let raw: RawPrediction = serde_json::from_str(raw)?;

    for (field, value) in [
        ("p_yes", raw.p_yes),
        ("p_no", raw.p_no),
        ("confidence", raw.confidence),
    ] {
        check_probability(field, value)?;
    }
    if let Some(w) = raw.win_probability {
        check_probability("win_probability", w)?;
    }

    let vote = match raw.vote {
        Some(v) if (0..BINARY_N_SLOTS as i64).contains(&v) => Some(v as u8),
        Some(v) => return Err(ParseError::NonBinaryVote(v)),
        None => derive_vote(raw.p_yes, raw.p_no),
    };

    Ok(Forecast {
        vote,
        p_yes: raw.p_yes,
        p_no: raw.p_no,
        win_probability: raw.win_probability.unwrap_or(raw.p_yes.max(raw.p_no)),
        confidence: raw.confidence,
        info_utility: raw.info_utility,
    })
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ParseError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParseError::OutOfRange { field, value })
    }
}

/// `0` (yes) when `p_yes` wins, `1` (no) when `p_no` wins, `None` on a tie.
fn derive_vote(p_yes: f64, p_no: f64) -> Option<u8> {
    if p_yes == p_no {
        None
    } else {
        Some(u8::from(p_no > p_yes))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
