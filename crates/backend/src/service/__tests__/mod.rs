//! Scenario tests for the marker, run against `MemoryStore` through a full engine.

mod cache_coherence;
mod fanout_scenarios;
pub mod helpers;
