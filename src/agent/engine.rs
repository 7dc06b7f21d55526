//! Round loop for tool-based design-system exploration.
//!
//! Each round sends the full conversation plus the tool schema to the model,
//! records token usage, dispatches any requested tools in order, and then
//! decides whether to keep exploring, force a final answer, or stop.
//!
//! ```text
//! EXPLORING --finish--------------------------------> DONE (complete)
//! EXPLORING --threshold or max rounds--> FORCING ----> DONE (complete | incomplete)
//! any round --transport/protocol failure-----------> ERROR
//! ```

use crate::agent::budget::{BudgetTracker, ModelRates};
use crate::agent::conversation::ConversationState;
use crate::agent::prompts::FORCE_FINISH_PROMPT;
use crate::agent::tools::{ToolDispatcher, ToolName, ToolOutcome};
use crate::llm::{ChatModel, ChatRequest, ChatResponse, Message, ToolCallRequest, ToolChoice};
use crate::models::{AnalysisPayload, EngineResult, UsageMetrics};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Sent when the model answers in free text without calling a tool.
const CONTINUE_PROMPT: &str = "Please continue exploring, or call finish_analysis if you're done.";

/// Immutable settings for one analysis run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: String,
    pub token_budget: u64,
    pub max_rounds: u32,
    /// Fraction of `token_budget` after which the forcing round starts.
    pub force_threshold_ratio: f64,
    pub temperature: Option<f32>,
    pub rates: ModelRates,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            token_budget: 200_000,
            max_rounds: 25,
            force_threshold_ratio: 0.8,
            temperature: Some(0.1),
            rates: ModelRates::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name must not be empty".to_string());
        }
        if self.token_budget == 0 {
            return Err("Token budget must be at least 1".to_string());
        }
        if self.max_rounds == 0 {
            return Err("Max rounds must be at least 1".to_string());
        }
        if !(self.force_threshold_ratio > 0.0 && self.force_threshold_ratio <= 1.0) {
            return Err("Force threshold ratio must be in (0, 1]".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Exploring,
    Forcing,
}

/// Outcome of [`AnalysisEngine::run`]: the result plus the full transcript.
#[derive(Debug, Clone)]
pub struct EngineRun {
    pub result: EngineResult,
    pub conversation: ConversationState,
}

/// Drives the model through bounded exploration rounds.
///
/// Conversation and budget are created per run, so one engine can serve
/// several runs one after another.
pub struct AnalysisEngine {
    config: EngineConfig,
    model: Arc<dyn ChatModel>,
    dispatcher: ToolDispatcher,
}

impl AnalysisEngine {
    pub fn new(config: EngineConfig, model: Arc<dyn ChatModel>, dispatcher: ToolDispatcher) -> Self {
        info!(
            "Initializing engine with model {} (budget {} tokens, {} rounds)",
            config.model, config.token_budget, config.max_rounds
        );
        Self {
            config,
            model,
            dispatcher,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one analysis to completion. Always yields a result; failures are
    /// reported through its status.
    pub async fn run(&self, system_prompt: &str, user_prompt: &str) -> EngineRun {
        let mut conversation = ConversationState::seed(system_prompt, user_prompt);

        if let Err(detail) = self.preflight() {
            error!("Analysis not started: {}", detail);
            return EngineRun {
                result: EngineResult::error(UsageMetrics::default(), detail),
                conversation,
            };
        }

        let result = self.drive(&mut conversation).await;
        info!(
            "Analysis {} after {} rounds ({} tokens, ${:.4})",
            result.status, result.usage.rounds, result.usage.total_tokens, result.usage.estimated_cost
        );

        EngineRun {
            result,
            conversation,
        }
    }

    fn preflight(&self) -> Result<(), String> {
        self.config.validate()?;
        self.model.check_ready().map_err(|e| e.to_string())
    }

    async fn drive(&self, conversation: &mut ConversationState) -> EngineResult {
        let mut budget = BudgetTracker::new(
            self.config.token_budget,
            self.config.force_threshold_ratio,
            self.config.max_rounds,
            self.config.rates,
        );
        let tools = self.dispatcher.definitions();
        let mut phase = Phase::Exploring;

        loop {
            let forcing = phase == Phase::Forcing;
            if forcing {
                conversation.append(Message::user(FORCE_FINISH_PROMPT));
            }

            budget.increment_round();
            let round = budget.rounds();
            debug!(
                "Round {} ({:?}), {} messages",
                round,
                phase,
                conversation.message_count()
            );

            let request = ChatRequest {
                model: self.config.model.clone(),
                messages: conversation.snapshot(),
                tools: tools.clone(),
                tool_choice: if forcing {
                    ToolChoice::Function(ToolName::FinishAnalysis.as_str().to_string())
                } else {
                    ToolChoice::Auto
                },
                temperature: self.config.temperature,
            };

            let reply = self
                .model
                .complete(&request)
                .await
                .and_then(ChatResponse::into_reply);
            let (message, usage) = match reply {
                Ok(reply) => reply,
                Err(e) => {
                    error!("Round {} aborted: {}", round, e);
                    return EngineResult::error(budget.usage(), e.to_string());
                }
            };

            match usage {
                Some(usage) => budget.record(usage.prompt_tokens, usage.completion_tokens),
                None => warn!("Round {} response carried no usage; counting 0 tokens", round),
            }

            let tool_calls = message.tool_calls.unwrap_or_default();
            let has_tool_calls = !tool_calls.is_empty();
            let content = match message.content {
                None if !has_tool_calls => Some(String::new()),
                other => other,
            };
            conversation.append(Message::assistant(content, tool_calls.clone()));

            if let Some(payload) = self.process_tool_calls(&tool_calls, conversation) {
                info!("Finish received in round {}", round);
                return EngineResult::complete(payload, budget.usage());
            }

            if forcing {
                warn!("Forcing round produced no finish payload; result is incomplete");
                return EngineResult::incomplete(budget.usage());
            }

            if !has_tool_calls {
                debug!("Round {} was free text, nudging the model", round);
                conversation.append(Message::user(CONTINUE_PROMPT));
            }

            if budget.is_over_threshold() {
                warn!(
                    "Token usage {} crossed {:.0}% of budget {}; forcing finish",
                    budget.total_tokens(),
                    self.config.force_threshold_ratio * 100.0,
                    self.config.token_budget
                );
                phase = Phase::Forcing;
            } else if budget.rounds_exhausted() {
                warn!("Reached max rounds ({}); forcing finish", self.config.max_rounds);
                phase = Phase::Forcing;
            }
        }
    }

    /// Dispatch every call in order, acknowledging each with a tool message.
    ///
    /// Returns the payload of the last `finish_analysis` in the batch.
    fn process_tool_calls(
        &self,
        calls: &[ToolCallRequest],
        conversation: &mut ConversationState,
    ) -> Option<AnalysisPayload> {
        let mut finish = None;

        for call in calls {
            let outcome = self.dispatcher.dispatch(call);
            conversation.append(Message::tool(call.id.clone(), outcome.message_content()));

            match outcome {
                ToolOutcome::Finish(payload) => {
                    if finish.is_some() {
                        warn!("Multiple finish_analysis calls in one response; keeping the last");
                    }
                    finish = Some(payload);
                }
                ToolOutcome::Continue(_) => info!("Tool {} executed", call.name),
                ToolOutcome::Failed(_) => {}
            }
        }

        finish
    }
}
