//! Opportunity aggregation and statistics.
//!
//! Groups and counts the findings from an analysis payload for the report.

use crate::models::{Opportunity, PatternSummary, Priority};
use std::collections::BTreeMap;

/// Counts of opportunities by priority and category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpportunitySummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Opportunities without a priority.
    pub unranked: usize,
    pub by_category: BTreeMap<String, usize>,
}

impl OpportunitySummary {
    pub fn from_opportunities(opportunities: &[Opportunity]) -> Self {
        let mut summary = Self {
            total: opportunities.len(),
            ..Self::default()
        };

        for opportunity in opportunities {
            match opportunity.priority {
                Some(Priority::High) => summary.high += 1,
                Some(Priority::Medium) => summary.medium += 1,
                Some(Priority::Low) => summary.low += 1,
                None => summary.unranked += 1,
            }

            *summary
                .by_category
                .entry(opportunity.category.to_lowercase())
                .or_insert(0) += 1;
        }

        summary
    }
}

/// Group opportunities by file, each group ordered by starting line.
pub fn group_by_file(opportunities: &[Opportunity]) -> BTreeMap<String, Vec<Opportunity>> {
    let mut grouped: BTreeMap<String, Vec<Opportunity>> = BTreeMap::new();

    for opportunity in opportunities {
        grouped
            .entry(opportunity.file.clone())
            .or_default()
            .push(opportunity.clone());
    }

    for group in grouped.values_mut() {
        group.sort_by_key(|o| first_line(&o.lines));
    }

    grouped
}

/// Patterns ordered by occurrence count, most frequent first.
pub fn rank_patterns(patterns: &[PatternSummary]) -> Vec<PatternSummary> {
    let mut ranked = patterns.to_vec();
    ranked.sort_by(|a, b| {
        b.occurrences
            .cmp(&a.occurrences)
            .then_with(|| a.pattern.cmp(&b.pattern))
    });
    ranked
}

/// Whether any opportunity is at or above `threshold`.
pub fn any_at_or_above(opportunities: &[Opportunity], threshold: Priority) -> bool {
    opportunities
        .iter()
        .filter_map(|o| o.priority)
        .any(|p| p >= threshold)
}

/// First line number of a `"12"` / `"12-18"` range; unparsable ranges sort last.
fn first_line(lines: &str) -> usize {
    lines
        .split(|c: char| c == '-' || c == ',')
        .next()
        .and_then(|start| start.trim().parse().ok())
        .unwrap_or(usize::MAX)
}
