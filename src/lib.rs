//! Decision maker: AMM bet profitability for binary prediction markets.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod replay;
pub mod forecast;
pub mod strategy;
pub mod engine;
pub mod storage;
