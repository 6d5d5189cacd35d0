//! Decision orchestrator.
//!
//! Sequences forecast resolution, prediction parsing and the AMM
//! profitability check, then maps the result onto exactly one terminal
//! [`Event`]. Only fatal conditions (a corrupted or misconfigured replay
//! dataset, an unwritable results file, a failing sink) escape as errors.

use chrono::Utc;
use tracing::{error, info, warn};

use super::PayloadSink;
use crate::forecast::{parse_prediction, ForecastResolver, ParseError, Resolution, ResolutionError};
use crate::replay::{BenchmarkResultRecord, BenchmarkResults};
use crate::strategy::{AmmCalculator, AmmError, BetSizer, EvaluationError, Verdict, VerdictBasis};
use crate::types::{BenchmarkingMockData, DecisionOutcome, Event, Forecast, MechResponse, Pool};

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("Fatal forecast resolution error: {0}")]
    Resolution(#[source] ResolutionError),

    #[error("Failed to record benchmark result: {0:#}")]
    Results(anyhow::Error),

    #[error("Failed to submit decision payload: {0:#}")]
    Sink(anyhow::Error),
}

/// Inputs supplied by the interaction layer for one cycle.
#[derive(Debug, Clone, Default)]
pub struct DecisionContext {
    pub responses: Vec<MechResponse>,
    /// Sampled market pool. Ignored when replaying a benchmark dataset.
    pub pool: Option<Pool>,
}

/// Everything a single cycle decided.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionReport {
    pub event: Event,
    pub outcome: DecisionOutcome,
    pub forecast: Option<Forecast>,
    pub verdict: Option<Verdict>,
    /// Market data of the replayed row, when benchmarking.
    pub benchmark: Option<BenchmarkingMockData>,
    /// The replay dataset is exhausted; the benchmark run is over.
    pub finished: bool,
}

impl DecisionReport {
    fn no_data() -> Self {
        Self::bare(Event::NoData)
    }

    fn bare(event: Event) -> Self {
        Self {
            event,
            outcome: DecisionOutcome::empty(),
            forecast: None,
            verdict: None,
            benchmark: None,
            finished: false,
        }
    }
}

pub struct DecisionOrchestrator {
    resolver: ForecastResolver,
    calculator: AmmCalculator,
    sizer: Box<dyn BetSizer>,
    results: Option<BenchmarkResults>,
    pool_fee: f64,
    tool: String,
}

impl DecisionOrchestrator {
    pub fn new(
        resolver: ForecastResolver,
        calculator: AmmCalculator,
        sizer: Box<dyn BetSizer>,
        pool_fee: f64,
        tool: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            calculator,
            sizer,
            results: None,
            pool_fee,
            tool: tool.into(),
        }
    }

    /// Record profitable replayed decisions to `results`.
    pub fn with_results(mut self, results: BenchmarkResults) -> Self {
        self.results = Some(results);
        self
    }

    pub fn is_benchmarking(&self) -> bool {
        self.resolver.is_replay()
    }

    /// Run one decision and hand its signal to `sink`.
    pub async fn run_cycle(
        &mut self,
        ctx: &DecisionContext,
        sink: &dyn PayloadSink,
    ) -> Result<DecisionReport, DecisionError> {
        let report = self.decide(ctx).await?;
        sink.submit(report.event, &report.outcome)
            .await
            .map_err(DecisionError::Sink)?;
        info!(event = %report.event, "Decision cycle complete");
        Ok(report)
    }

    /// Decide on this cycle's forecast without emitting anything.
    pub async fn decide(&mut self, ctx: &DecisionContext) -> Result<DecisionReport, DecisionError> {
        // -- Resolve -----------------------------------------------------

        let (raw, benchmark) = match self.resolver.resolve(&ctx.responses) {
            Ok(Resolution::Payload { raw, mock }) => (raw, mock),
            Ok(Resolution::Exhausted) => {
                info!("No more markets to bet on; the benchmark dataset is exhausted");
                return Ok(DecisionReport {
                    finished: true,
                    ..DecisionReport::no_data()
                });
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Forecast resolution failed fatally");
                return Err(DecisionError::Resolution(e));
            }
            Err(e) => {
                warn!(error = %e, "No forecast available for this cycle");
                return Ok(DecisionReport::no_data());
            }
        };
        info!(raw = %raw, "Oracle response");

        // -- Parse -------------------------------------------------------

        let forecast = match parse_prediction(&raw) {
            Ok(f) => f,
            Err(ParseError::NonBinaryVote(vote)) => {
                error!(vote, "Oracle voted for a non-binary outcome");
                return Ok(DecisionReport {
                    benchmark,
                    ..DecisionReport::bare(Event::ResponseError)
                });
            }
            Err(e) => {
                warn!(error = %e, raw = %raw, "Could not parse the oracle's response");
                return Ok(DecisionReport {
                    benchmark,
                    ..DecisionReport::no_data()
                });
            }
        };
        info!(
            vote = ?forecast.vote,
            p_yes = forecast.p_yes,
            p_no = forecast.p_no,
            win_probability = forecast.win_probability,
            confidence = forecast.confidence,
            info_utility = forecast.info_utility,
            "Parsed forecast"
        );

        let Some(vote) = forecast.vote else {
            info!(
                p_yes = forecast.p_yes,
                p_no = forecast.p_no,
                "The oracle found both outcomes equally likely"
            );
            return Ok(DecisionReport {
                event: Event::Tie,
                outcome: DecisionOutcome {
                    confidence: Some(forecast.confidence),
                    ..DecisionOutcome::empty()
                },
                forecast: Some(forecast),
                benchmark,
                ..DecisionReport::no_data()
            });
        };

        // -- Evaluate ----------------------------------------------------

        let pool = if self.resolver.is_replay() {
            Pool::benchmark(self.pool_fee)
        } else if let Some(pool) = &ctx.pool {
            pool.clone()
        } else {
            warn!("No pool was sampled for this cycle");
            return Ok(DecisionReport {
                forecast: Some(forecast),
                ..DecisionReport::no_data()
            });
        };

        let verdict = match self
            .calculator
            .evaluate(&pool, &forecast, self.sizer.as_ref())
            .await
        {
            Ok(v) => v,
            Err(EvaluationError::Amm(AmmError::NonBinary { slots })) => {
                error!(market = %pool.id, slots, "Only binary markets are supported");
                return Ok(DecisionReport {
                    forecast: Some(forecast),
                    benchmark,
                    ..DecisionReport::bare(Event::ResponseError)
                });
            }
            Err(EvaluationError::Sizing(e)) => {
                error!(market = %pool.id, error = %format!("{e:#}"), "Bet sizing failed; not betting");
                Verdict::declined(VerdictBasis::SizingFailed(format!("{e:#}")))
            }
            Err(EvaluationError::Amm(e)) => {
                error!(market = %pool.id, error = %e, "Could not evaluate the bet; not betting");
                Verdict::declined(VerdictBasis::Rejected(e))
            }
        };

        let event = if verdict.is_profitable {
            Event::Done
        } else {
            Event::Unprofitable
        };
        let outcome = DecisionOutcome {
            is_profitable: Some(verdict.is_profitable),
            vote: Some(vote),
            confidence: Some(forecast.confidence),
            bet_amount: Some(verdict.stake),
        };
        info!(
            event = %event,
            vote,
            stake = %verdict.stake,
            is_profitable = verdict.is_profitable,
            basis = ?verdict.basis,
            "Decision"
        );

        if verdict.is_profitable {
            if let (Some(results), Some(mock)) = (self.results.as_mut(), benchmark.as_ref()) {
                let record = BenchmarkResultRecord {
                    timestamp: Utc::now(),
                    tool: self.tool.clone(),
                    question_id: mock.question_id.clone(),
                    question: mock.question.clone(),
                    answer: mock.answer.clone(),
                    p_yes: forecast.p_yes,
                    p_no: forecast.p_no,
                    confidence: forecast.confidence,
                    vote,
                    bet_amount: verdict.stake.to_string(),
                };
                results.append(&record).map_err(DecisionError::Results)?;
            }
        }

        Ok(DecisionReport {
            event,
            outcome,
            forecast: Some(forecast),
            verdict: Some(verdict),
            benchmark,
            finished: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
