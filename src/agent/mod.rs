//! The agentic exploration engine.
//!
//! The model explores the repository through tools and reports its findings
//! with `finish_analysis`, within a token and round budget.

pub mod budget;
pub mod conversation;
pub mod engine;
pub mod prompts;
pub mod tools;

pub use budget::ModelRates;
pub use engine::{AnalysisEngine, EngineConfig};
pub use tools::ToolDispatcher;
