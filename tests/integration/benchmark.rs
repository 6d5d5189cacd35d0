//! Full benchmark replays over temporary datasets.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use decision_maker::engine::{DecisionContext, DecisionError, DecisionOrchestrator};
use decision_maker::forecast::{ForecastResolver, ReplayFields, ReplayResolver};
use decision_maker::replay::results::load_results;
use decision_maker::replay::{BenchmarkResults, DatasetReplaySource};
use decision_maker::strategy::{AmmCalculator, AmmConfig, BetSizer};
use decision_maker::types::{DecisionOutcome, Event};

use crate::stubs::{FailingSizer, RecordingSink, StubSizer, WEI};

const HEADER: &str = "question_id,question,answer,p_yes_tool,p_no_tool,confidence_tool\n";

const ROWS: &str = "\
q1,\"Rain, or shine?\",yes,0.8,0.2,0.9
q2,Coin flip?,no,0.5,0.5,0.3
q3,Garbled?,yes,abc,0.2,0.9
q4,Snow?,no,0.1,0.9,0.7
q5,Close call?,no,0.45,0.55,0.5
";

fn fields() -> ReplayFields {
    ReplayFields {
        question_id_field: "question_id".into(),
        question_field: "question".into(),
        answer_field: "answer".into(),
        p_yes_field_part: "p_yes_".into(),
        p_no_field_part: "p_no_".into(),
        confidence_field_part: "confidence_".into(),
        part_prefix_mode: true,
    }
}

fn write_dataset(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("benchmark_data.csv");
    fs::write(&path, contents).unwrap();
    path
}

fn orchestrator(dataset: &Path, results: &Path, sizer: Box<dyn BetSizer>) -> DecisionOrchestrator {
    DecisionOrchestrator::new(
        ForecastResolver::Replay(ReplayResolver::new(
            DatasetReplaySource::new(dataset, b','),
            fields(),
            "tool",
        )),
        AmmCalculator::new(AmmConfig {
            bet_threshold: (WEI / 10) as i128,
        }),
        sizer,
        0.02,
        "tool",
    )
    .with_results(BenchmarkResults::open(results).unwrap())
}

fn stub_sizer() -> StubSizer {
    StubSizer::new(WEI / 2, WEI).with_min_win_probability(0.6)
}

/// Run cycles until the dataset is exhausted, returning every signal.
async fn run_to_exhaustion(
    orchestrator: &mut DecisionOrchestrator,
    sink: &RecordingSink,
) -> Vec<(Event, DecisionOutcome)> {
    let context = DecisionContext::default();
    for _ in 0..100 {
        let report = orchestrator.run_cycle(&context, sink).await.unwrap();
        if report.finished {
            return sink.submitted();
        }
    }
    panic!("benchmark run did not terminate");
}

#[tokio::test]
async fn test_benchmark_run_end_to_end() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), &format!("{HEADER}{ROWS}"));
    let results = dir.path().join("benchmark_results.csv");
    let sink = RecordingSink::default();
    let mut orch = orchestrator(&dataset, &results, Box::new(stub_sizer()));

    let submitted = run_to_exhaustion(&mut orch, &sink).await;
    let events: Vec<Event> = submitted.iter().map(|(e, _)| *e).collect();
    assert_eq!(
        events,
        vec![
            Event::Done,
            Event::Tie,
            Event::NoData,
            Event::Done,
            Event::Unprofitable,
            Event::NoData,
        ]
    );

    // q1: vote yes, staked base + 0.9 * slope.
    let (_, q1) = &submitted[0];
    assert_eq!(q1.vote, Some(0));
    assert_eq!(q1.is_profitable, Some(true));
    assert_eq!(q1.confidence, Some(0.9));
    assert!(q1.bet_amount.unwrap() > WEI);

    // q2: tie carries the confidence only.
    assert_eq!(
        submitted[1].1,
        DecisionOutcome {
            confidence: Some(0.3),
            ..DecisionOutcome::empty()
        }
    );

    // q5: the sizer declined, so the stake was raised to the floor.
    let (_, q5) = &submitted[4];
    assert_eq!(q5.vote, Some(1));
    assert_eq!(q5.bet_amount, Some(WEI / 10));

    // Only the header survives.
    assert_eq!(fs::read_to_string(&dataset).unwrap(), HEADER);

    let rows = load_results(&results).unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.question_id.as_str()).collect();
    assert_eq!(ids, vec!["q1", "q4"]);
    assert_eq!(rows[0].question, "Rain, or shine?");
    assert_eq!(rows[1].vote, 1);
    assert_eq!(rows[1].tool, "tool");
}

#[tokio::test]
async fn test_sizing_requests_use_benchmark_pool() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), &format!("{HEADER}q1,Rain?,yes,0.8,0.2,0.9\n"));
    let sizer = stub_sizer();
    let calls = sizer.calls();
    let sink = RecordingSink::default();
    let mut orch = orchestrator(&dataset, &dir.path().join("results.csv"), Box::new(sizer));

    run_to_exhaustion(&mut orch, &sink).await;

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].selected_reserve, 10 * WEI);
    assert_eq!(calls[0].other_reserve, 10 * WEI);
    assert_eq!(calls[0].fee, 0.02);
    assert_eq!(calls[0].win_probability, 0.8);
}

#[tokio::test]
async fn test_replay_is_deterministic() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let contents = format!("{HEADER}{ROWS}");

    let mut a = orchestrator(
        &write_dataset(first.path(), &contents),
        &first.path().join("results.csv"),
        Box::new(stub_sizer()),
    );
    let mut b = orchestrator(
        &write_dataset(second.path(), &contents),
        &second.path().join("results.csv"),
        Box::new(stub_sizer()),
    );

    let sink_a = RecordingSink::default();
    let sink_b = RecordingSink::default();
    let run_a = run_to_exhaustion(&mut a, &sink_a).await;
    let run_b = run_to_exhaustion(&mut b, &sink_b).await;

    assert_eq!(run_a, run_b);
    assert_eq!(
        fs::read_to_string(first.path().join("benchmark_data.csv")).unwrap(),
        fs::read_to_string(second.path().join("benchmark_data.csv")).unwrap()
    );
}

#[tokio::test]
async fn test_interrupted_run_resumes_where_it_left_off() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), &format!("{HEADER}{ROWS}"));
    let results = dir.path().join("results.csv");
    let context = DecisionContext::default();

    let sink = RecordingSink::default();
    let mut orch = orchestrator(&dataset, &results, Box::new(stub_sizer()));
    orch.run_cycle(&context, &sink).await.unwrap();
    orch.run_cycle(&context, &sink).await.unwrap();
    drop(orch);

    // A fresh process picks up at q3.
    let resumed = RecordingSink::default();
    let mut orch = orchestrator(&dataset, &results, Box::new(stub_sizer()));
    let report = orch.run_cycle(&context, &resumed).await.unwrap();
    assert_eq!(report.event, Event::NoData);
    assert_eq!(report.benchmark.unwrap().question_id, "q3");
}

#[tokio::test]
async fn test_sizing_outage_never_bets() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), &format!("{HEADER}{ROWS}"));
    let results = dir.path().join("results.csv");
    let sink = RecordingSink::default();
    let mut orch = orchestrator(&dataset, &results, Box::new(FailingSizer));

    let submitted = run_to_exhaustion(&mut orch, &sink).await;
    assert!(submitted.iter().all(|(e, _)| *e != Event::Done));
    assert!(submitted
        .iter()
        .filter(|(e, _)| *e == Event::Unprofitable)
        .all(|(_, o)| o.bet_amount == Some(0)));
    assert!(load_results(&results).unwrap().is_empty());
}

#[tokio::test]
async fn test_headerless_dataset_is_fatal() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), "");
    let sink = RecordingSink::default();
    let mut orch = orchestrator(&dataset, &dir.path().join("results.csv"), Box::new(stub_sizer()));

    let err = orch
        .run_cycle(&DecisionContext::default(), &sink)
        .await
        .unwrap_err();
    assert!(matches!(err, DecisionError::Resolution(_)));
    assert!(sink.events().is_empty());
    assert_eq!(fs::read_to_string(&dataset).unwrap(), "");
}
