//! Post-processing of the agent's findings.

pub mod aggregator;

pub use aggregator::*;
