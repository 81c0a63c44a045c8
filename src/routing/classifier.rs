//! LLM-backed route classification with a deterministic fallback.
//!
//! The primary path asks the model for a strict-JSON route decision. Any
//! failure on that path (unreachable backend, timeout, output that does not
//! parse against the schema) degrades to the keyword heuristic, which cannot
//! fail: classification always produces a decision.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::capability::Capability;
use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::routing::keywords;

/// Rationale carried by every heuristic decision.
pub const FALLBACK_RATIONALE: &str = "fallback_heuristic";

/// Result of classifying a query.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    /// Chosen capability.
    pub capability: Capability,
    /// Model confidence in [0, 1]; 0.0 for heuristic decisions.
    pub confidence: f32,
    /// Human-readable reason for this decision.
    pub rationale: String,
    /// Classifier metadata: router version, model, contributing domains.
    pub metadata: HashMap<String, Value>,
}

impl RouteDecision {
    /// Contributing-domain hints recorded under the `domains` metadata key.
    pub fn domain_hints(&self) -> Vec<Capability> {
        self.metadata
            .get("domains")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(Capability::from_wire)
                    .filter(|c| Capability::DOMAINS.contains(c))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether this decision came from the keyword heuristic.
    pub fn used_fallback(&self) -> bool {
        self.rationale == FALLBACK_RATIONALE
    }
}

/// Maps a query (plus history) to a capability, confidence, and rationale.
pub struct RouteClassifier {
    llm: Arc<dyn LlmProvider>,
    config: ClassifierConfig,
}

impl RouteClassifier {
    /// Create a classifier backed by the given model.
    pub fn new(llm: Arc<dyn LlmProvider>, config: ClassifierConfig) -> Self {
        Self { llm, config }
    }

    /// Classify a query. Never fails: model-path errors degrade to the
    /// keyword heuristic with confidence 0.0.
    pub async fn classify(
        &self,
        query: &str,
        chat_history: &[ChatMessage],
        allow_orchestration: bool,
    ) -> RouteDecision {
        match self
            .classify_with_model(query, chat_history, allow_orchestration)
            .await
        {
            Ok(decision) => decision,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "model classification failed, using keyword heuristic"
                );
                heuristic_route(query)
            }
        }
    }

    async fn classify_with_model(
        &self,
        query: &str,
        chat_history: &[ChatMessage],
        allow_orchestration: bool,
    ) -> Result<RouteDecision, ClassifierError> {
        let messages = vec![
            ChatMessage::system(self.system_prompt(allow_orchestration)),
            ChatMessage::user(self.user_prompt(query, chat_history)),
        ];

        let response = self
            .llm
            .complete(
                CompletionRequest::new(messages)
                    .with_temperature(self.config.temperature)
                    .with_max_tokens(300),
            )
            .await?;

        let mut decision = parse_decision(&response.content, allow_orchestration)?;
        decision
            .metadata
            .insert("model".to_string(), Value::from(self.llm.model_name()));
        Ok(decision)
    }

    fn system_prompt(&self, allow_orchestration: bool) -> String {
        let mut prompt = String::from(
            "You route user queries for a student career assistant. Pick the one \
             capability best suited to answer the query:\n\
             - curriculum: courses, modules, subjects, prerequisites, study programs\n\
             - job_market: job listings, hiring trends, career opportunities\n\
             - skill_mapping: comparing taught skills against job requirements, gap analysis\n\
             - books: book and learning resource recommendations\n\
             - papers: academic papers and publications\n\
             - fallback: anything outside these domains\n",
        );
        if allow_orchestration {
            prompt.push_str(
                "- orchestrator: the query genuinely spans two or more of the domains \
                 above (for example study choices driven by job prospects)\n",
            );
        }
        prompt.push_str(
            "\nRespond with strict JSON only, no prose and no code fences:\n\
             {\"agent\": \"<capability>\", \"confidence\": <0.0-1.0>, \
             \"reasoning\": \"<one sentence>\", \"domains\": [\"<contributing domains>\"]}",
        );
        prompt
    }

    fn user_prompt(&self, query: &str, chat_history: &[ChatMessage]) -> String {
        let tail = history_tail(chat_history, self.config.max_history_chars);
        if tail.is_empty() {
            format!("Query: {query}")
        } else {
            format!("Recent conversation:\n{tail}\n\nQuery: {query}")
        }
    }
}

/// Deterministic keyword routing: first matching domain in the fixed
/// priority order, else fallback. Confidence is always 0.0.
pub fn heuristic_route(query: &str) -> RouteDecision {
    let capability =
        keywords::first_matching_domain(query).unwrap_or(Capability::Fallback);

    let mut metadata = HashMap::new();
    metadata.insert("router".to_string(), Value::from("heuristic"));

    RouteDecision {
        capability,
        confidence: 0.0,
        rationale: FALLBACK_RATIONALE.to_string(),
        metadata,
    }
}

/// Wire shape of the model's route decision.
#[derive(Debug, Deserialize)]
struct WireDecision {
    agent: String,
    confidence: f32,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    domains: Vec<String>,
}

/// Parse and validate the model's output into a [`RouteDecision`].
fn parse_decision(
    content: &str,
    allow_orchestration: bool,
) -> Result<RouteDecision, ClassifierError> {
    let raw = strip_code_fences(content);
    let wire: WireDecision =
        serde_json::from_str(raw).map_err(|e| ClassifierError::MalformedDecision {
            reason: format!("not valid decision JSON: {e}"),
        })?;

    let label = Capability::from_wire(&wire.agent).ok_or(ClassifierError::UnknownLabel {
        label: wire.agent.clone(),
    })?;

    let domains: Vec<Capability> = wire
        .domains
        .iter()
        .filter_map(|d| Capability::from_wire(d))
        .filter(|c| Capability::DOMAINS.contains(c))
        .collect();

    // Tie-break: comparable weight on several domains routes to the
    // orchestrator when permitted, otherwise the highest-weight domain
    // (the model lists domains in weight order).
    let capability = if allow_orchestration && domains.len() >= 2 {
        Capability::Orchestrator
    } else if label == Capability::Orchestrator {
        if allow_orchestration {
            Capability::Orchestrator
        } else {
            domains
                .first()
                .copied()
                .ok_or(ClassifierError::MalformedDecision {
                    reason: "orchestrator label without contributing domains".to_string(),
                })?
        }
    } else {
        label
    };

    let mut metadata = HashMap::new();
    metadata.insert("router".to_string(), Value::from("llm_v1"));
    metadata.insert(
        "domains".to_string(),
        Value::from(
            domains
                .iter()
                .map(|d| d.as_str())
                .collect::<Vec<_>>(),
        ),
    );

    Ok(RouteDecision {
        capability,
        confidence: wire.confidence.clamp(0.0, 1.0),
        rationale: wire.reasoning,
        metadata,
    })
}

/// Remove a surrounding Markdown code fence, if present.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Render the most recent portion of the chat history, bounded by
/// `max_chars`, oldest surviving turn first.
fn history_tail(chat_history: &[ChatMessage], max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut used = 0usize;
    for message in chat_history.iter().rev() {
        let role = match message.role {
            crate::llm::Role::System => "system",
            crate::llm::Role::User => "user",
            crate::llm::Role::Assistant => "assistant",
        };
        let line = format!("{role}: {}", message.content);
        let cost = line.chars().count() + 1;
        if used + cost > max_chars && !lines.is_empty() {
            break;
        }
        used += cost;
        lines.push(line);
        if used >= max_chars {
            break;
        }
    }
    lines.reverse();
    lines.join("\n")
}
