//! Decision maker: AMM bet profitability for binary prediction markets.
//!
//! Entry point. Loads configuration, initialises structured logging and
//! either replays a benchmark dataset to exhaustion or decides once on a
//! live oracle response and pool snapshot.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info};

use decision_maker::config::{self, SizingStrategy};
use decision_maker::engine::{DecisionContext, DecisionOrchestrator, PayloadSink};
use decision_maker::forecast::{ForecastResolver, ReplayResolver};
use decision_maker::replay::{BenchmarkResults, DatasetReplaySource};
use decision_maker::storage::JsonlPayloadSink;
use decision_maker::strategy::{AmmCalculator, AmmConfig, BetSizer, ConfidenceTableSizer, KellySizer};
use decision_maker::types::{Event, MechResponse, Pool};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    info!(
        agent_name = %cfg.agent.name,
        tool = %cfg.decision.tool,
        benchmarking = cfg.benchmarking.enabled,
        bet_threshold = cfg.decision.bet_threshold,
        "Decision maker starting up"
    );

    // -- Initialise components -------------------------------------------

    let sizer: Box<dyn BetSizer> = match cfg.sizing.strategy {
        SizingStrategy::KellyCriterion => Box::new(KellySizer::new(cfg.kelly())),
        SizingStrategy::BetAmountPerThreshold => Box::new(ConfidenceTableSizer::from_thresholds(
            &cfg.sizing.bet_amount_per_threshold,
        )?),
    };
    let calculator = AmmCalculator::new(AmmConfig {
        bet_threshold: i128::from(cfg.decision.bet_threshold),
    });
    let sink = JsonlPayloadSink::new(Some(&cfg.decision.payloads_path));

    if cfg.benchmarking.enabled {
        let resolver = ForecastResolver::Replay(ReplayResolver::new(
            DatasetReplaySource::new(cfg.dataset_path(), cfg.separator()),
            cfg.replay_fields(),
            cfg.decision.tool.clone(),
        ));
        let results = BenchmarkResults::open(cfg.results_path())?;
        let mut orchestrator = DecisionOrchestrator::new(
            resolver,
            calculator,
            sizer,
            cfg.benchmarking.pool_fee,
            cfg.decision.tool.clone(),
        )
        .with_results(results);
        run_benchmark(&mut orchestrator, &sink).await
    } else {
        let context = live_context(&cfg.live)?;
        let mut orchestrator = DecisionOrchestrator::new(
            ForecastResolver::Live,
            calculator,
            sizer,
            cfg.benchmarking.pool_fee,
            cfg.decision.tool.clone(),
        );
        let report = orchestrator.run_cycle(&context, &sink).await?;
        info!(
            event = %report.event,
            vote = ?report.outcome.vote,
            bet_amount = ?report.outcome.bet_amount,
            "Live decision complete"
        );
        Ok(())
    }
}

/// Tally of a benchmark run.
#[derive(Debug, Default)]
struct RunSummary {
    cycles: u64,
    done: u64,
    unprofitable: u64,
    no_data: u64,
    tie: u64,
    response_error: u64,
}

impl RunSummary {
    fn record(&mut self, event: Event) {
        self.cycles += 1;
        match event {
            Event::Done => self.done += 1,
            Event::Unprofitable => self.unprofitable += 1,
            Event::NoData => self.no_data += 1,
            Event::Tie => self.tie += 1,
            Event::ResponseError => self.response_error += 1,
        }
    }
}

/// Replay the dataset one cycle at a time until it runs dry or Ctrl+C.
async fn run_benchmark(
    orchestrator: &mut DecisionOrchestrator,
    sink: &dyn PayloadSink,
) -> Result<()> {
    let context = DecisionContext::default();
    let mut summary = RunSummary::default();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Replaying benchmark dataset. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            result = orchestrator.run_cycle(&context, sink) => {
                match result {
                    Ok(report) => {
                        if report.finished {
                            break;
                        }
                        summary.record(report.event);
                    }
                    Err(e) => {
                        error!(error = %e, "Benchmark run aborted");
                        return Err(e.into());
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(
        cycles = summary.cycles,
        done = summary.done,
        unprofitable = summary.unprofitable,
        no_data = summary.no_data,
        tie = summary.tie,
        response_error = summary.response_error,
        "Benchmark run finished"
    );
    Ok(())
}

/// Read the live cycle's oracle responses and pool snapshot.
fn live_context(live: &config::LiveConfig) -> Result<DecisionContext> {
    let responses: Vec<MechResponse> = match live.responses_path.as_deref() {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let pool: Option<Pool> = live.pool_path.as_deref().map(read_json::<Pool>).transpose()?;
    Ok(DecisionContext { responses, pool })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let json = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {path}"))
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("decision_maker=info"));

    let json_logging = std::env::var("DECISION_MAKER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
