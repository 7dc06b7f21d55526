//! Data models for the design-system auditor.
//!
//! This module contains the core data structures shared by the engine,
//! the report generator and the CLI: findings, pattern summaries, usage
//! metrics and the final engine result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Priority of an adoption opportunity. Parsed case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Cosmetic drift, low payoff
    Low,
    /// Noticeable inconsistency worth fixing
    Medium,
    /// Duplicated component or broken design contract
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(serde::de::Error::unknown_variant(
                &raw,
                &["low", "medium", "high"],
            )),
        }
    }
}

impl Priority {
    /// Returns an emoji representation of the priority.
    pub fn emoji(&self) -> &'static str {
        match self {
            Priority::Low => "🟢",
            Priority::Medium => "🟡",
            Priority::High => "🔴",
        }
    }
}

/// A single place where the codebase could adopt the design system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Path to the file (relative to repo root).
    pub file: String,
    /// Line or line range, e.g. `"42"` or `"10-18"`.
    #[serde(deserialize_with = "string_or_number")]
    pub lines: String,
    /// Free-form category, e.g. "component", "token", "typography".
    pub category: String,
    /// What is wrong with the current code.
    pub description: String,
    /// The code or approach in use today.
    pub current: String,
    /// The design-system replacement.
    pub suggested: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

/// A recurring pattern observed across the codebase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub pattern: String,
    pub occurrences: u32,
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Final payload supplied by the model through `finish_analysis`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
    #[serde(default)]
    pub patterns: Vec<PatternSummary>,
    pub summary: String,
}

impl AnalysisPayload {
    /// True when the payload carries no findings and no summary.
    pub fn is_empty(&self) -> bool {
        self.opportunities.is_empty() && self.patterns.is_empty() && self.summary.is_empty()
    }
}

/// Token and cost accounting for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Estimated cost in USD.
    pub estimated_cost: f64,
    pub rounds: u32,
}

/// Terminal status of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// A `finish_analysis` payload was accepted.
    Complete,
    /// Budget or rounds ran out and the forcing round produced no payload.
    Incomplete,
    /// Configuration or protocol failure.
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Complete => write!(f, "complete"),
            RunStatus::Incomplete => write!(f, "incomplete"),
            RunStatus::Error => write!(f, "error"),
        }
    }
}

/// Result of one engine run. Built once, when the round loop exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    pub payload: AnalysisPayload,
    pub usage: UsageMetrics,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl EngineResult {
    pub fn complete(payload: AnalysisPayload, usage: UsageMetrics) -> Self {
        Self {
            payload,
            usage,
            status: RunStatus::Complete,
            error_detail: None,
        }
    }

    /// No finish payload was obtained, even after forcing.
    pub fn incomplete(usage: UsageMetrics) -> Self {
        Self {
            payload: AnalysisPayload::default(),
            usage,
            status: RunStatus::Incomplete,
            error_detail: None,
        }
    }

    pub fn error(usage: UsageMetrics, detail: impl Into<String>) -> Self {
        Self {
            payload: AnalysisPayload::default(),
            usage,
            status: RunStatus::Error,
            error_detail: Some(detail.into()),
        }
    }
}

/// Metadata about the audit report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// URL or local path of the analyzed repository.
    pub repo: String,
    /// Short commit hash of the analyzed checkout, when it is a git repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Name of the LLM model used.
    pub model_used: String,
    /// Design system the audit measured adoption against.
    pub design_system: String,
    /// Duration of the analysis in seconds.
    pub duration_seconds: f64,
}

/// The complete design-system audit report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub result: EngineResult,
}

/// Accepts either a JSON string or number and yields a string.
///
/// Models frequently send `"lines": 42` even when the schema says string.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
    }

    #[test]
    fn test_priority_parses_any_case() {
        let parsed: Vec<Priority> =
            serde_json::from_value(json!(["High", "MEDIUM", " low "])).unwrap();
        assert_eq!(parsed, vec![Priority::High, Priority::Medium, Priority::Low]);
        assert!(serde_json::from_value::<Priority>(json!("urgent")).is_err());
        assert_eq!(serde_json::to_value(Priority::High).unwrap(), json!("high"));
    }

    #[test]
    fn test_capitalized_priority_keeps_payload_valid() {
        let payload: AnalysisPayload = serde_json::from_value(json!({
            "opportunities": [{
                "file": "src/pages/Home.tsx",
                "lines": "4-9",
                "category": "component",
                "description": "Raw button",
                "current": "<button>",
                "suggested": "<Button>",
                "priority": "High"
            }],
            "summary": "done"
        }))
        .unwrap();
        assert_eq!(payload.opportunities[0].priority, Some(Priority::High));
    }

    #[test]
    fn test_priority_emoji() {
        assert_eq!(Priority::High.emoji(), "🔴");
        assert_eq!(Priority::Medium.emoji(), "🟡");
        assert_eq!(Priority::Low.emoji(), "🟢");
    }

    #[test]
    fn test_opportunity_accepts_numeric_lines() {
        let opp: Opportunity = serde_json::from_value(json!({
            "file": "src/Button.tsx",
            "lines": 12,
            "category": "component",
            "description": "Hand-rolled button",
            "current": "<button className=\"btn\">",
            "suggested": "<Button variant=\"primary\">",
            "priority": "high"
        }))
        .unwrap();
        assert_eq!(opp.lines, "12");
        assert_eq!(opp.priority, Some(Priority::High));
    }

    #[test]
    fn test_opportunity_priority_optional() {
        let opp: Opportunity = serde_json::from_value(json!({
            "file": "a.tsx",
            "lines": "3-5",
            "category": "color",
            "description": "d",
            "current": "#fff",
            "suggested": "tokens.white"
        }))
        .unwrap();
        assert_eq!(opp.lines, "3-5");
        assert!(opp.priority.is_none());
    }

    #[test]
    fn test_payload_is_empty() {
        assert!(AnalysisPayload::default().is_empty());
        let payload = AnalysisPayload {
            summary: "ok".to_string(),
            ..Default::default()
        };
        assert!(!payload.is_empty());
    }

    #[test]
    fn test_engine_result_constructors() {
        let usage = UsageMetrics {
            rounds: 3,
            ..Default::default()
        };
        let incomplete = EngineResult::incomplete(usage);
        assert_eq!(incomplete.status, RunStatus::Incomplete);
        assert!(incomplete.payload.is_empty());
        assert!(incomplete.error_detail.is_none());

        let error = EngineResult::error(usage, "boom");
        assert_eq!(error.status, RunStatus::Error);
        assert_eq!(error.error_detail.as_deref(), Some("boom"));
        assert_eq!(error.usage.rounds, 3);
    }

    #[test]
    fn test_run_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Incomplete).unwrap(),
            "\"incomplete\""
        );
    }
}
