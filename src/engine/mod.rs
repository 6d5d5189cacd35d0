//! Core engine: one resolve → parse → evaluate → signal cycle.

pub mod decision;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{DecisionOutcome, Event};

pub use decision::{DecisionContext, DecisionError, DecisionOrchestrator, DecisionReport};

/// External sequencing layer receiving each cycle's terminal signal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PayloadSink: Send + Sync {
    async fn submit(&self, event: Event, outcome: &DecisionOutcome) -> Result<()>;
}
