//! Forecast resolution.
//!
//! Picks the oracle payload for the current cycle: the first live
//! response delivered by the interaction layer, or, in benchmarking
//! mode, a payload synthesised from the next replayed dataset row.

pub mod parser;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::replay::{DatasetError, DatasetReplaySource, ReplayRecord};
use crate::types::{BenchmarkingMockData, MechResponse};

pub use parser::{parse_prediction, ParseError};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What the resolver produced for this cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The replay dataset has no rows left; the benchmark run is complete.
    Exhausted,
    /// A raw oracle payload ready for [`parse_prediction`].
    Payload {
        raw: String,
        /// Market data of the replayed row (benchmarking mode only).
        mock: Option<BenchmarkingMockData>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("No oracle responses available")]
    NoResponse,

    #[error("Oracle response error: {0}")]
    Oracle(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Replayed row has no field `{0}`")]
    MissingField(String),
}

impl ResolutionError {
    /// Fatal errors need operator intervention; the rest end the cycle
    /// with a no-data signal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Dataset(_) | Self::MissingField(_))
    }
}

// ---------------------------------------------------------------------------
// Replay field mapping
// ---------------------------------------------------------------------------

/// How dataset columns map onto forecast attributes.
///
/// Probability columns are named after the oracle tool: either
/// `<part><tool>` (prefix mode) or `<tool><part>`.
#[derive(Debug, Clone)]
pub struct ReplayFields {
    pub question_id_field: String,
    pub question_field: String,
    pub answer_field: String,
    pub p_yes_field_part: String,
    pub p_no_field_part: String,
    pub confidence_field_part: String,
    pub part_prefix_mode: bool,
}

impl ReplayFields {
    fn column(&self, part: &str, tool: &str) -> String {
        if self.part_prefix_mode {
            format!("{part}{tool}")
        } else {
            format!("{tool}{part}")
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

pub struct ReplayResolver {
    source: DatasetReplaySource,
    fields: ReplayFields,
    tool: String,
}

impl ReplayResolver {
    pub fn new(source: DatasetReplaySource, fields: ReplayFields, tool: impl Into<String>) -> Self {
        Self {
            source,
            fields,
            tool: tool.into(),
        }
    }

    fn resolve(&self) -> Result<Resolution, ResolutionError> {
        let Some(record) = self.source.next_record()? else {
            return Ok(Resolution::Exhausted);
        };
        let (raw, mock) = self.mock_payload(&record)?;
        debug!(question_id = %mock.question_id, raw = %raw, "Mocked oracle response");
        Ok(Resolution::Payload {
            raw,
            mock: Some(mock),
        })
    }

    fn mock_payload(
        &self,
        record: &ReplayRecord,
    ) -> Result<(String, BenchmarkingMockData), ResolutionError> {
        let field = |name: &str| {
            record
                .get(name)
                .map(str::to_string)
                .ok_or_else(|| ResolutionError::MissingField(name.to_string()))
        };

        let mock = BenchmarkingMockData {
            question_id: field(self.fields.question_id_field.as_str())?,
            question: field(self.fields.question_field.as_str())?,
            answer: field(self.fields.answer_field.as_str())?,
        };

        let mut payload = Map::new();
        for (attribute, part) in [
            ("p_yes", &self.fields.p_yes_field_part),
            ("p_no", &self.fields.p_no_field_part),
            ("confidence", &self.fields.confidence_field_part),
        ] {
            let column = self.fields.column(part, &self.tool);
            let value = field(column.as_str())?;
            payload.insert(attribute.to_string(), numeric_or_text(&value));
        }
        // Irrelevant when benchmarking.
        payload.insert("info_utility".to_string(), Value::from(0.0));

        Ok((Value::Object(payload).to_string(), mock))
    }
}

/// Keep numeric cells numeric; anything else stays text so the parser
/// rejects it instead of silently coercing.
fn numeric_or_text(value: &str) -> Value {
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Value::from(n),
        _ => Value::String(value.to_string()),
    }
}

/// Live oracle responses or a replayed dataset.
pub enum ForecastResolver {
    Live,
    Replay(ReplayResolver),
}

impl ForecastResolver {
    pub fn is_replay(&self) -> bool {
        matches!(self, Self::Replay(_))
    }

    /// Resolve this cycle's oracle payload. `responses` is ignored when
    /// replaying.
    pub fn resolve(&self, responses: &[MechResponse]) -> Result<Resolution, ResolutionError> {
        match self {
            Self::Replay(replay) => replay.resolve(),
            Self::Live => {
                let response = responses.first().ok_or(ResolutionError::NoResponse)?;
                match &response.result {
                    Some(raw) => Ok(Resolution::Payload {
                        raw: raw.clone(),
                        mock: None,
                    }),
                    None => {
                        let message = response
                            .error
                            .clone()
                            .unwrap_or_else(|| "empty response".to_string());
                        error!(error = %message, "There was an error on the oracle's response");
                        Err(ResolutionError::Oracle(message))
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
