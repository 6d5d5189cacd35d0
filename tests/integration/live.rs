//! Live decisions on delivered oracle responses and sampled pools.

use decision_maker::engine::{DecisionContext, DecisionOrchestrator};
use decision_maker::forecast::ForecastResolver;
use decision_maker::storage::{delete_payloads, load_payloads, JsonlPayloadSink};
use decision_maker::strategy::{AmmCalculator, AmmConfig, BetSizer, KellyConfig, KellySizer};
use decision_maker::types::{DecisionOutcome, Event, MechResponse, Pool};

use crate::stubs::{RecordingSink, StubSizer, WEI};

fn live(sizer: Box<dyn BetSizer>) -> DecisionOrchestrator {
    DecisionOrchestrator::new(
        ForecastResolver::Live,
        AmmCalculator::new(AmmConfig {
            bet_threshold: (WEI / 10) as i128,
        }),
        sizer,
        0.0,
        "prediction-online",
    )
}

fn pool(reserves: [u128; 2], prices: Option<[f64; 2]>) -> Pool {
    let json = serde_json::json!({
        "id": "0xmarket",
        "title": "Will it rain tomorrow?",
        "fee": 0.02,
        "outcomeSlotCount": 2,
        "outcomeTokenAmounts": [0, 0],
        "outcomes": ["Yes", "No"],
        "scaledLiquidityMeasure": 15.0
    });
    let mut pool: Pool = serde_json::from_value(json).unwrap();
    pool.outcome_token_amounts = reserves.to_vec();
    pool.outcome_token_marginal_prices = prices.map(|p| p.to_vec());
    pool
}

fn context(result: &str, pool: Option<Pool>) -> DecisionContext {
    DecisionContext {
        responses: vec![MechResponse::ok(result)],
        pool,
    }
}

#[tokio::test]
async fn test_live_decision_done() {
    let sink = RecordingSink::default();
    let mut orch = live(Box::new(StubSizer::new(WEI, 0)));
    let raw = r#"{"vote": 1, "p_yes": 0.25, "p_no": 0.75, "win_probability": 0.75, "confidence": 0.8, "info_utility": 0.4}"#;

    let report = orch
        .run_cycle(
            &context(raw, Some(pool([20 * WEI, 5 * WEI], Some([0.2, 0.8])))),
            &sink,
        )
        .await
        .unwrap();

    // Selected side is the thin reserve; the swap still clears the threshold.
    assert_eq!(report.event, Event::Done);
    assert_eq!(
        sink.submitted(),
        vec![(
            Event::Done,
            DecisionOutcome {
                is_profitable: Some(true),
                vote: Some(1),
                confidence: Some(0.8),
                bet_amount: Some(WEI),
            }
        )]
    );
    let quote = report.verdict.unwrap().quote.unwrap();
    assert_eq!(quote.selected_reserve, 5 * WEI);
    assert_eq!(quote.other_reserve, 20 * WEI);
}

#[tokio::test]
async fn test_live_unpriced_pool_is_unprofitable() {
    let sink = RecordingSink::default();
    let mut orch = live(Box::new(StubSizer::new(WEI, 0)));
    let raw = r#"{"p_yes": 0.9, "p_no": 0.1, "confidence": 0.9}"#;

    orch.run_cycle(&context(raw, Some(pool([WEI, WEI], None))), &sink)
        .await
        .unwrap();
    assert_eq!(
        sink.submitted(),
        vec![(
            Event::Unprofitable,
            DecisionOutcome {
                is_profitable: Some(false),
                vote: Some(0),
                confidence: Some(0.9),
                bet_amount: Some(0),
            }
        )]
    );
}

#[tokio::test]
async fn test_live_failures_become_no_data() {
    let sink = RecordingSink::default();
    let mut orch = live(Box::new(StubSizer::new(WEI, 0)));
    let priced = || Some(pool([WEI, WEI], Some([0.5, 0.5])));

    orch.run_cycle(&context("not json", priced()), &sink).await.unwrap();
    orch.run_cycle(
        &DecisionContext {
            responses: vec![MechResponse::err("tool timed out")],
            pool: priced(),
        },
        &sink,
    )
    .await
    .unwrap();
    orch.run_cycle(
        &DecisionContext {
            responses: Vec::new(),
            pool: priced(),
        },
        &sink,
    )
    .await
    .unwrap();

    assert_eq!(sink.events(), vec![Event::NoData; 3]);
    assert!(sink
        .submitted()
        .iter()
        .all(|(_, outcome)| *outcome == DecisionOutcome::empty()));
}

#[tokio::test]
async fn test_stake_never_decreases_with_confidence() {
    let raw = |confidence: f64| {
        format!(r#"{{"p_yes": 0.9, "p_no": 0.1, "confidence": {confidence}}}"#)
    };
    let mut last = 0u128;
    for step in 0..=10 {
        let sink = RecordingSink::default();
        let mut orch = live(Box::new(StubSizer::new(WEI / 20, 2 * WEI)));
        let report = orch
            .run_cycle(
                &context(&raw(f64::from(step) / 10.0), Some(pool([10 * WEI, 10 * WEI], Some([0.5, 0.5])))),
                &sink,
            )
            .await
            .unwrap();
        let stake = report.outcome.bet_amount.unwrap();
        assert!(stake >= last, "stake fell at confidence step {step}");
        assert!(stake >= WEI / 10);
        last = stake;
    }
}

#[tokio::test]
async fn test_kelly_sized_decision_persisted() {
    let path = std::env::temp_dir()
        .join(format!("decision_maker_it_payloads_{}.jsonl", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string();
    let sink = JsonlPayloadSink::new(Some(&path));
    let sizer = KellySizer::new(KellyConfig {
        multiplier: 0.25,
        max_bet_pct: 0.2,
        min_bet_size: 0.01,
        bankroll: 10.0,
    });
    let mut orch = live(Box::new(sizer));
    let raw = r#"{"p_yes": 0.85, "p_no": 0.15, "confidence": 1.0}"#;

    let report = orch
        .run_cycle(
            &context(raw, Some(pool([10 * WEI, 10 * WEI], Some([0.5, 0.5])))),
            &sink,
        )
        .await
        .unwrap();

    let saved = load_payloads(Some(&path)).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].event, report.event);
    assert_eq!(saved[0].outcome, report.outcome);
    assert_eq!(saved[0].outcome.vote, Some(0));
    assert!(saved[0].outcome.bet_amount.unwrap() > WEI / 10);

    delete_payloads(Some(&path)).unwrap();
}
