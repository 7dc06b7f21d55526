//! Markdown report generation.
//!
//! This module renders the engine result as a Markdown adoption report,
//! or as pretty JSON.

use crate::analysis::{group_by_file, rank_patterns, OpportunitySummary};
use crate::models::{
    EngineResult, Opportunity, PatternSummary, Priority, Report, ReportMetadata, RunStatus,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Design System Adoption Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata, &report.result));

    if let Some(notice) = generate_status_notice(&report.result) {
        output.push_str(&notice);
    }

    output.push_str(&generate_overview_section(&report.result.payload.summary));

    let summary = OpportunitySummary::from_opportunities(&report.result.payload.opportunities);
    output.push_str(&generate_summary_section(&summary));

    output.push_str(&generate_patterns_section(&report.result.payload.patterns));

    output.push_str(&generate_opportunities_section(
        &report.result.payload.opportunities,
    ));

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata, result: &EngineResult) -> String {
    let mut section = String::new();
    let usage = &result.usage;

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Repository:** {}\n", metadata.repo));
    if let Some(ref commit) = metadata.commit {
        section.push_str(&format!("- **Commit:** `{}`\n", commit));
    }
    section.push_str(&format!("- **Design System:** {}\n", metadata.design_system));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!("- **Status:** {}\n", result.status));
    section.push_str(&format!("- **Rounds:** {}\n", usage.rounds));
    section.push_str(&format!(
        "- **Tokens:** {} ({} prompt / {} completion)\n",
        usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
    ));
    section.push_str(&format!(
        "- **Estimated Cost:** ${:.4}\n",
        usage.estimated_cost
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Banner shown when the run did not complete.
fn generate_status_notice(result: &EngineResult) -> Option<String> {
    match result.status {
        RunStatus::Complete => None,
        RunStatus::Incomplete => Some(
            "> ⚠️ **Incomplete:** the agent ran out of budget before submitting its findings.\n\n"
                .to_string(),
        ),
        RunStatus::Error => Some(format!(
            "> ❌ **Error:** {}\n\n",
            result.error_detail.as_deref().unwrap_or("analysis failed")
        )),
    }
}

/// Generate the overview section from the model's summary.
fn generate_overview_section(summary: &str) -> String {
    if summary.trim().is_empty() {
        return String::new();
    }

    format!("## Overview\n\n{}\n\n", summary.trim())
}

/// Generate the summary section.
fn generate_summary_section(summary: &OpportunitySummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    section.push_str(&format!(
        "| {} High | {} Medium | {} Low | Unranked | **Total** |\n",
        Priority::High.emoji(),
        Priority::Medium.emoji(),
        Priority::Low.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | **{}** |\n\n",
        summary.high, summary.medium, summary.low, summary.unranked, summary.total
    ));

    if !summary.by_category.is_empty() {
        section.push_str("### Opportunities by Category\n\n");
        section.push_str("| Category | Count |\n");
        section.push_str("|:---|:---:|\n");

        let mut categories: Vec<_> = summary.by_category.iter().collect();
        categories.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

        for (category, count) in categories {
            section.push_str(&format!("| {} | {} |\n", category, count));
        }
        section.push('\n');
    }

    section
}

/// Generate the recurring patterns table.
fn generate_patterns_section(patterns: &[PatternSummary]) -> String {
    if patterns.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Recurring Patterns\n\n");
    section.push_str("| Pattern | Occurrences | Category | Files |\n");
    section.push_str("|:---|:---:|:---|:---|\n");

    for pattern in rank_patterns(patterns) {
        let files = pattern
            .files
            .iter()
            .map(|f| format!("`{}`", f))
            .collect::<Vec<_>>()
            .join(", ");
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            escape_cell(&pattern.pattern),
            pattern.occurrences,
            pattern.category.as_deref().unwrap_or("-"),
            files
        ));
    }
    section.push('\n');

    section
}

/// Generate the opportunities section, grouped by file.
fn generate_opportunities_section(opportunities: &[Opportunity]) -> String {
    let mut section = String::new();

    section.push_str("## Opportunities by File\n\n");

    if opportunities.is_empty() {
        section.push_str("No adoption opportunities were reported.\n\n");
        return section;
    }

    for (file, group) in group_by_file(opportunities) {
        section.push_str(&format!("### `{}`\n\n", file));
        for opportunity in &group {
            section.push_str(&generate_opportunity_block(opportunity));
        }
    }

    section
}

/// Generate a single opportunity block.
fn generate_opportunity_block(opportunity: &Opportunity) -> String {
    let mut block = String::new();

    let badge = match opportunity.priority {
        Some(Priority::High) => "🔴 **HIGH**",
        Some(Priority::Medium) => "🟡 **MEDIUM**",
        Some(Priority::Low) => "🟢 **LOW**",
        None => "⚪ **UNRANKED**",
    };

    block.push_str(&format!(
        "#### {} {} (lines {})\n\n",
        badge, opportunity.category, opportunity.lines
    ));

    if !opportunity.description.is_empty() {
        block.push_str(&format!("{}\n\n", opportunity.description));
    }

    if !opportunity.current.is_empty() {
        block.push_str("**Current:**\n\n```\n");
        block.push_str(&opportunity.current);
        block.push_str("\n```\n\n");
    }

    if !opportunity.suggested.is_empty() {
        block.push_str(&format!("> 💡 **Suggested:** {}\n\n", opportunity.suggested));
    }

    block.push_str("---\n\n");

    block
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by dsauditor*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
