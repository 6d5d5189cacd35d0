//! Hand-written collaborators for integration testing.
//!
//! Deterministic, in-memory stand-ins for the bet-sizing service and the
//! sequencing layer.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use decision_maker::engine::PayloadSink;
use decision_maker::strategy::{BetSizer, SizingRequest};
use decision_maker::types::{DecisionOutcome, Event};

pub const WEI: u128 = 1_000_000_000_000_000_000;

/// Sizer that stakes `base + confidence * slope` when the win
/// probability beats `min_win_probability`, zero otherwise.
pub struct StubSizer {
    pub base: u128,
    pub slope: u128,
    pub min_win_probability: f64,
    calls: Arc<Mutex<Vec<SizingRequest>>>,
}

impl StubSizer {
    pub fn new(base: u128, slope: u128) -> Self {
        Self {
            base,
            slope,
            min_win_probability: 0.5,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_min_win_probability(mut self, min_win_probability: f64) -> Self {
        self.min_win_probability = min_win_probability;
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<SizingRequest>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl BetSizer for StubSizer {
    async fn recommend(&self, request: &SizingRequest) -> Result<u128> {
        self.calls.lock().unwrap().push(*request);
        if request.win_probability <= self.min_win_probability {
            return Ok(0);
        }
        let scaled = (self.slope as f64 * request.confidence.clamp(0.0, 1.0)) as u128;
        Ok(self.base + scaled)
    }
}

/// Sizer whose backing service is always down.
pub struct FailingSizer;

#[async_trait]
impl BetSizer for FailingSizer {
    async fn recommend(&self, _request: &SizingRequest) -> Result<u128> {
        Err(anyhow!("sizing service unavailable"))
    }
}

/// Sink recording every submitted signal in order.
#[derive(Clone, Default)]
pub struct RecordingSink {
    submitted: Arc<Mutex<Vec<(Event, DecisionOutcome)>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
        self.submitted.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }

    pub fn submitted(&self) -> Vec<(Event, DecisionOutcome)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl PayloadSink for RecordingSink {
    async fn submit(&self, event: Event, outcome: &DecisionOutcome) -> Result<()> {
        self.submitted.lock().unwrap().push((event, outcome.clone()));
        Ok(())
    }
}
