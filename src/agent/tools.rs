//! Tool definitions and dispatch for the exploration agent.
//!
//! Every tool the model may call is a variant of [`ToolName`]. Arguments are
//! decoded into a per-tool struct before anything runs, and every call ends in
//! exactly one [`ToolOutcome`]. Failures never escape [`ToolDispatcher::dispatch`].

use crate::docs::DocumentSource;
use crate::llm::{FunctionDefinition, ToolCallRequest, ToolDefinition};
use crate::models::AnalysisPayload;
use crate::repo::CodeRepository;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on paths accepted by a single `read_files` call.
pub const MAX_FILES_PER_READ: usize = 20;

/// The fixed set of tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ListFiles,
    ReadFiles,
    SearchCode,
    GetDependencies,
    ListContextDocs,
    ReadContextDoc,
    FinishAnalysis,
}

impl ToolName {
    pub const ALL: [ToolName; 7] = [
        ToolName::ListFiles,
        ToolName::ReadFiles,
        ToolName::SearchCode,
        ToolName::GetDependencies,
        ToolName::ListContextDocs,
        ToolName::ReadContextDoc,
        ToolName::FinishAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ListFiles => "list_files",
            ToolName::ReadFiles => "read_files",
            ToolName::SearchCode => "search_code",
            ToolName::GetDependencies => "get_dependencies",
            ToolName::ListContextDocs => "list_context_docs",
            ToolName::ReadContextDoc => "read_context_doc",
            ToolName::FinishAnalysis => "finish_analysis",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    /// Whether this tool needs the documentation collaborator.
    pub fn needs_docs(&self) -> bool {
        matches!(self, ToolName::ListContextDocs | ToolName::ReadContextDoc)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListFilesArgs {
    #[serde(default = "default_list_pattern")]
    pub pattern: String,
}

fn default_list_pattern() -> String {
    "**/*".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadFilesArgs {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchCodeArgs {
    pub pattern: String,
    #[serde(default)]
    pub file_pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadContextDocArgs {
    pub path: String,
}

/// A tool call whose arguments passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    ListFiles(ListFilesArgs),
    ReadFiles(ReadFilesArgs),
    SearchCode(SearchCodeArgs),
    GetDependencies,
    ListContextDocs,
    ReadContextDoc(ReadContextDocArgs),
    FinishAnalysis(AnalysisPayload),
}

impl ToolInvocation {
    /// Decode and validate raw JSON-encoded arguments for `tool`.
    pub fn parse(tool: ToolName, raw_arguments: &str) -> Result<Self, ToolError> {
        let raw = raw_arguments.trim();
        let args: Value = if raw.is_empty() {
            json!({})
        } else {
            serde_json::from_str(raw).map_err(|e| ToolError::MalformedArguments(e.to_string()))?
        };
        if !args.is_object() {
            return Err(ToolError::MalformedArguments(
                "expected a JSON object".to_string(),
            ));
        }

        let invocation = match tool {
            ToolName::ListFiles => ToolInvocation::ListFiles(decode(tool, args)?),
            ToolName::ReadFiles => {
                let args: ReadFilesArgs = decode(tool, args)?;
                if args.paths.is_empty() {
                    return Err(invalid(tool, "paths must not be empty"));
                }
                if args.paths.len() > MAX_FILES_PER_READ {
                    return Err(invalid(
                        tool,
                        format!("at most {} paths per call", MAX_FILES_PER_READ),
                    ));
                }
                ToolInvocation::ReadFiles(args)
            }
            ToolName::SearchCode => {
                let args: SearchCodeArgs = decode(tool, args)?;
                if args.pattern.is_empty() {
                    return Err(invalid(tool, "pattern must not be empty"));
                }
                ToolInvocation::SearchCode(args)
            }
            ToolName::GetDependencies => ToolInvocation::GetDependencies,
            ToolName::ListContextDocs => ToolInvocation::ListContextDocs,
            ToolName::ReadContextDoc => ToolInvocation::ReadContextDoc(decode(tool, args)?),
            ToolName::FinishAnalysis => ToolInvocation::FinishAnalysis(decode(tool, args)?),
        };

        Ok(invocation)
    }
}

fn decode<T: DeserializeOwned>(tool: ToolName, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| invalid(tool, e.to_string()))
}

fn invalid(tool: ToolName, reason: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments {
        tool,
        reason: reason.into(),
    }
}

/// Why a tool call failed. Rendered into the tool-result message.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("malformed arguments: {0}")]
    MalformedArguments(String),
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: ToolName, reason: String },
    #[error("{0}")]
    Execution(String),
}

/// Result of dispatching one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Output to hand back to the model.
    Continue(String),
    /// Terminal payload from `finish_analysis`.
    Finish(AnalysisPayload),
    /// Error text to hand back to the model.
    Failed(String),
}

impl ToolOutcome {
    /// Content of the tool-result message acknowledging this call.
    pub fn message_content(&self) -> String {
        match self {
            ToolOutcome::Continue(output) => output.clone(),
            ToolOutcome::Finish(payload) => format!(
                "Analysis received: {} opportunities, {} patterns.",
                payload.opportunities.len(),
                payload.patterns.len()
            ),
            ToolOutcome::Failed(error) => format!("Error: {}", error),
        }
    }
}

/// Routes tool calls to the repository and documentation collaborators.
pub struct ToolDispatcher {
    repository: Arc<dyn CodeRepository>,
    docs: Option<Arc<dyn DocumentSource>>,
}

impl ToolDispatcher {
    pub fn new(repository: Arc<dyn CodeRepository>, docs: Option<Arc<dyn DocumentSource>>) -> Self {
        Self { repository, docs }
    }

    pub fn has_docs(&self) -> bool {
        self.docs.is_some()
    }

    /// Tool schema for this dispatcher; documentation tools only when docs exist.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        get_tool_definitions(self.has_docs())
    }

    fn resolve(&self, name: &str) -> Option<ToolName> {
        ToolName::parse(name).filter(|tool| !tool.needs_docs() || self.has_docs())
    }

    /// Execute one tool call and classify its outcome.
    pub fn dispatch(&self, request: &ToolCallRequest) -> ToolOutcome {
        debug!(
            "Dispatching tool {} ({}) with args: {}",
            request.name, request.id, request.raw_arguments
        );

        let result = self
            .resolve(&request.name)
            .ok_or_else(|| ToolError::UnknownTool(request.name.clone()))
            .and_then(|tool| ToolInvocation::parse(tool, &request.raw_arguments))
            .and_then(|invocation| {
                std::panic::catch_unwind(AssertUnwindSafe(|| self.execute(invocation)))
                    .unwrap_or_else(|_| {
                        Err(ToolError::Execution(format!("tool {} panicked", request.name)))
                    })
            });

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Tool {} failed: {}", request.name, e);
                ToolOutcome::Failed(e.to_string())
            }
        }
    }

    fn execute(&self, invocation: ToolInvocation) -> Result<ToolOutcome, ToolError> {
        let output = match invocation {
            ToolInvocation::ListFiles(args) => {
                let files = self.repository.list_files(&args.pattern).map_err(execution)?;
                if files.is_empty() {
                    format!("No files match {}", args.pattern)
                } else {
                    files.join("\n")
                }
            }
            ToolInvocation::ReadFiles(args) => {
                let files = self.repository.read_files(&args.paths);
                let mut output = String::new();
                for (path, content) in files {
                    output.push_str(&format!("### FILE: {}\n{}\n\n", path, content));
                }
                output
            }
            ToolInvocation::SearchCode(args) => {
                let matches = self
                    .repository
                    .search_code(&args.pattern, args.file_pattern.as_deref())
                    .map_err(execution)?;
                if matches.is_empty() {
                    format!("No matches for {}", args.pattern)
                } else {
                    matches
                        .iter()
                        .map(|m| format!("{}:{}: {}", m.file, m.line, m.content))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            ToolInvocation::GetDependencies => {
                let deps = self.repository.get_dependencies().map_err(execution)?;
                to_json(&deps)?
            }
            ToolInvocation::ListContextDocs => {
                let docs = self.docs_source()?.list_documents().map_err(execution)?;
                to_json(&docs)?
            }
            ToolInvocation::ReadContextDoc(args) => self
                .docs_source()?
                .read_document(&args.path)
                .map_err(|e| ToolError::Execution(e.to_string()))?,
            ToolInvocation::FinishAnalysis(payload) => return Ok(ToolOutcome::Finish(payload)),
        };

        Ok(ToolOutcome::Continue(output))
    }

    fn docs_source(&self) -> Result<&dyn DocumentSource, ToolError> {
        self.docs
            .as_deref()
            .ok_or_else(|| ToolError::Execution("no documentation sources configured".to_string()))
    }
}

fn execution(e: anyhow::Error) -> ToolError {
    ToolError::Execution(format!("{:#}", e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ToolError> {
    serde_json::to_string_pretty(value).map_err(|e| ToolError::Execution(e.to_string()))
}

fn function(name: ToolName, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: name.as_str().to_string(),
            description: description.to_string(),
            parameters,
        },
    }
}

/// Get the tool definitions advertised to the model.
pub fn get_tool_definitions(include_docs: bool) -> Vec<ToolDefinition> {
    let mut tools = vec![
        function(
            ToolName::ListFiles,
            "List repository files matching a glob pattern. Paths are relative to the repository root.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Glob pattern, e.g. 'src/**/*.tsx'. Defaults to all files."
                    }
                },
                "required": ["pattern"]
            }),
        ),
        function(
            ToolName::ReadFiles,
            "Read several source files at once. Missing files are reported inline.",
            json!({
                "type": "object",
                "properties": {
                    "paths": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": format!("Relative file paths (at most {})", MAX_FILES_PER_READ)
                    }
                },
                "required": ["paths"]
            }),
        ),
        function(
            ToolName::SearchCode,
            "Search file contents with a regular expression. Returns file:line: content.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Regular expression, e.g. '<button' or '#[0-9a-f]{6}'"
                    },
                    "file_pattern": {
                        "type": "string",
                        "description": "Optional glob restricting which files are searched"
                    }
                },
                "required": ["pattern"]
            }),
        ),
        function(
            ToolName::GetDependencies,
            "Get the project's declared dependencies and devDependencies.",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        ),
    ];

    if include_docs {
        tools.push(function(
            ToolName::ListContextDocs,
            "List the design-system documentation available for reference.",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        ));
        tools.push(function(
            ToolName::ReadContextDoc,
            "Read one design-system document by the path returned from list_context_docs.",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Document path"}
                },
                "required": ["path"]
            }),
        ));
    }

    tools.push(function(
        ToolName::FinishAnalysis,
        "Submit the final audit. Call exactly once when you are done exploring.",
        json!({
            "type": "object",
            "properties": {
                "opportunities": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "file": {"type": "string"},
                            "lines": {"type": "string", "description": "Line or range, e.g. '12-18'"},
                            "category": {"type": "string"},
                            "description": {"type": "string"},
                            "current": {"type": "string", "description": "Code in use today"},
                            "suggested": {"type": "string", "description": "Design-system replacement"},
                            "priority": {"type": "string", "enum": ["high", "medium", "low"]}
                        },
                        "required": ["file", "lines", "category", "description", "current", "suggested"]
                    }
                },
                "patterns": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "pattern": {"type": "string"},
                            "occurrences": {"type": "integer"},
                            "files": {"type": "array", "items": {"type": "string"}},
                            "category": {"type": "string"}
                        },
                        "required": ["pattern", "occurrences", "files"]
                    }
                },
                "summary": {"type": "string"}
            },
            "required": ["opportunities", "patterns", "summary"]
        }),
    ));

    tools
}
