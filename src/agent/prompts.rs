//! Prompts for the exploration agent.

use crate::config::AuditConfig;

/// Sent as a user message at the start of the forcing round.
pub const FORCE_FINISH_PROMPT: &str = "You have reached the exploration budget. Stop exploring now \
and call finish_analysis with everything you have found so far. Partial results are fine; \
do not call any other tool.";

const SYSTEM_PROMPT: &str = r#"You are a senior front-end engineer auditing a codebase for design-system adoption.

## Available Tools

- `list_files(pattern)` - List files matching a glob
- `read_files(paths)` - Read several files at once
- `search_code(pattern, file_pattern?)` - Regex search across files
- `get_dependencies()` - Declared dependencies from the manifest
{docs_tools}- `finish_analysis(opportunities, patterns, summary)` - Submit the final audit

## Your Process

1. Check dependencies to confirm how the design system is installed
2. Explore the file structure and find UI code
3. Search for hand-rolled components, raw colors, spacing and typography values
4. Read the most relevant files to confirm each finding
5. Call finish_analysis exactly once with all findings

## What Counts as an Opportunity

- A local component duplicating one the design system provides
- Hard-coded colors, spacing, radii or fonts where tokens exist
- Direct use of native elements (`<button>`, `<input>`) instead of design-system components
- Styling overrides that fight the design system

Report real findings with file paths and line numbers. Be economical: you have a limited token budget."#;

/// Build the system prompt.
pub fn system_prompt(has_docs: bool) -> String {
    let docs_tools = if has_docs {
        "- `list_context_docs()` - List design-system documentation\n\
         - `read_context_doc(path)` - Read one documentation file\n"
    } else {
        ""
    };
    SYSTEM_PROMPT.replace("{docs_tools}", docs_tools)
}

/// Build the opening user message from the audit settings.
pub fn user_prompt(audit: &AuditConfig, has_docs: bool) -> String {
    let mut prompt = format!(
        "Audit this repository for adoption of the {} design system.",
        audit.design_system
    );

    if !audit.packages.is_empty() {
        prompt.push_str(&format!(
            " Its components and tokens are published as: {}.",
            audit.packages.join(", ")
        ));
    }

    if has_docs {
        prompt.push_str(" Design-system documentation is available through list_context_docs.");
    }

    if let Some(ref focus) = audit.focus {
        prompt.push_str(&format!("\n\nFocus: {}", focus));
    }

    prompt.push_str(
        "\n\nFind places where the codebase could use the design system instead of custom code, \
         and patterns that repeat across files. When you are done, call finish_analysis.",
    );

    prompt
}
