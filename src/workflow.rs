//! Finite-state workflow: router, one capability node, END.
//!
//! ```text
//!             ┌─────────┐
//!  query ───► │ router  │──► curriculum ──┐
//!             └─────────┘    job_market   │
//!                            skill_mapping├──► END
//!                            books        │
//!                            papers       │
//!                            orchestrator │
//!                            fallback   ──┘
//! ```
//!
//! Every execution is exactly two hops: the router picks one node, the node
//! produces a result, the workflow terminates. There are no cycles and the
//! router is never revisited. Each node emits a partial state update that a
//! pure reducer folds into the prior state.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::capability::{Capability, CapabilityRegistry};
use crate::error::CapabilityError;
use crate::llm::ChatMessage;
use crate::orchestrator::Orchestrator;
use crate::routing::RouteClassifier;

/// User-safe message returned when a capability handler fails.
pub const ERROR_RESULT: &str =
    "Sorry, something went wrong while answering your question. Please try again.";

/// The working record threaded through one workflow execution.
///
/// Lives for exactly one request. Nodes never mutate it: they produce a
/// [`StateUpdate`] that [`reduce`] folds into a new state.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub query: String,
    pub chat_history: Vec<ChatMessage>,
    /// Current capability label; the router overwrites the initial value.
    pub capability: Capability,
    /// Answer text, absent until a node produces it.
    pub result: Option<String>,
    pub confidence: Option<f32>,
    pub rationale: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl ExecutionState {
    /// Fresh state at request start: no result, no decision yet.
    pub fn new(query: impl Into<String>, chat_history: &[ChatMessage]) -> Self {
        Self {
            query: query.into(),
            chat_history: chat_history.to_vec(),
            capability: Capability::Fallback,
            result: None,
            confidence: None,
            rationale: None,
            metadata: HashMap::new(),
        }
    }
}

/// Partial update emitted by a workflow node.
///
/// Fields left `None` keep their prior value; metadata is merged key-wise.
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub capability: Option<Capability>,
    pub result: Option<String>,
    pub confidence: Option<f32>,
    pub rationale: Option<String>,
    pub metadata: HashMap<String, Value>,
}

/// Fold a partial update into the prior state.
///
/// Pure: consumes both inputs and returns the merged state, preserving every
/// field the update did not touch.
pub fn reduce(prior: ExecutionState, update: StateUpdate) -> ExecutionState {
    let mut metadata = prior.metadata;
    metadata.extend(update.metadata);

    ExecutionState {
        query: prior.query,
        chat_history: prior.chat_history,
        capability: update.capability.unwrap_or(prior.capability),
        result: update.result.or(prior.result),
        confidence: update.confidence.or(prior.confidence),
        rationale: update.rationale.or(prior.rationale),
        metadata,
    }
}

/// Executes the router -> capability -> END state machine.
pub struct WorkflowExecutor {
    classifier: RouteClassifier,
    registry: Arc<CapabilityRegistry>,
    orchestrator: Orchestrator,
}

impl WorkflowExecutor {
    /// Create an executor over the given classifier, registry, and
    /// orchestrator.
    pub fn new(
        classifier: RouteClassifier,
        registry: Arc<CapabilityRegistry>,
        orchestrator: Orchestrator,
    ) -> Self {
        Self {
            classifier,
            registry,
            orchestrator,
        }
    }

    /// Run one query through the workflow.
    ///
    /// Never fails: handler errors are absorbed at the node boundary and
    /// surface as a state with the `error` sentinel label, a user-safe
    /// result, and the original failure preserved in metadata.
    pub async fn run(
        &self,
        query: &str,
        chat_history: &[ChatMessage],
        allow_orchestration: bool,
    ) -> ExecutionState {
        let state = ExecutionState::new(query, chat_history);

        // Router node.
        let decision = self
            .classifier
            .classify(query, chat_history, allow_orchestration)
            .await;
        tracing::info!(
            capability = %decision.capability,
            confidence = decision.confidence,
            rationale = %decision.rationale,
            "routed query"
        );
        let domain_hints = decision.domain_hints();
        let state = reduce(
            state,
            StateUpdate {
                capability: Some(decision.capability),
                confidence: Some(decision.confidence),
                rationale: Some(decision.rationale),
                metadata: decision.metadata,
                ..Default::default()
            },
        );

        // Capability node, then END.
        let update = match self
            .dispatch(state.capability, query, chat_history, &domain_hints)
            .await
        {
            Ok(text) if !text.trim().is_empty() => StateUpdate {
                result: Some(text),
                ..Default::default()
            },
            Ok(_) => self.error_update(CapabilityError::EmptyResponse {
                capability: state.capability,
            }),
            Err(err) => self.error_update(err),
        };

        reduce(state, update)
    }

    /// Exhaustive dispatch table from capability label to handler.
    async fn dispatch(
        &self,
        capability: Capability,
        query: &str,
        chat_history: &[ChatMessage],
        domain_hints: &[Capability],
    ) -> Result<String, CapabilityError> {
        match capability {
            Capability::Orchestrator => {
                self.orchestrator
                    .process(query, chat_history, domain_hints)
                    .await
            }
            Capability::Curriculum
            | Capability::JobMarket
            | Capability::SkillMapping
            | Capability::Books
            | Capability::Papers
            | Capability::Fallback => match self.registry.domain_handler(capability) {
                Some(handler) => handler.process(query, chat_history).await,
                None => Err(CapabilityError::Search {
                    capability,
                    reason: "no handler registered".to_string(),
                }),
            },
            // The classifier never emits the error sentinel; if it ever
            // appears, answer via the fallback handler rather than panic.
            Capability::Error => self.registry.fallback().process(query, chat_history).await,
        }
    }

    /// Update that converts a node failure into a user-safe terminal state.
    fn error_update(&self, err: CapabilityError) -> StateUpdate {
        tracing::warn!(
            capability = %err.capability(),
            error = %err,
            "capability handler failed"
        );
        let mut metadata = HashMap::new();
        metadata.insert("error".to_string(), Value::from(err.to_string()));
        StateUpdate {
            capability: Some(Capability::Error),
            result: Some(ERROR_RESULT.to_string()),
            metadata,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierConfig, OrchestratorConfig};
    use crate::testing::{StubCapability, StubLlm, stub_registry};
    use pretty_assertions::assert_eq;

    fn executor_with(llm: Arc<StubLlm>, registry: Arc<CapabilityRegistry>) -> WorkflowExecutor {
        WorkflowExecutor::new(
            RouteClassifier::new(llm, ClassifierConfig::default()),
            Arc::clone(&registry),
            Orchestrator::new(registry, OrchestratorConfig::default()),
        )
    }

    #[test]
    fn reducer_preserves_untouched_fields() {
        let mut state = ExecutionState::new("q", &[]);
        state.confidence = Some(0.9);
        state.metadata.insert("router".to_string(), Value::from("llm_v1"));

        let merged = reduce(
            state,
            StateUpdate {
                result: Some("answer".to_string()),
                metadata: HashMap::from([("node".to_string(), Value::from("books"))]),
                ..Default::default()
            },
        );

        assert_eq!(merged.confidence, Some(0.9));
        assert_eq!(merged.result.as_deref(), Some("answer"));
        assert_eq!(merged.metadata.get("router"), Some(&Value::from("llm_v1")));
        assert_eq!(merged.metadata.get("node"), Some(&Value::from("books")));
    }

    #[test]
    fn reducer_does_not_clear_result_with_empty_update() {
        let mut state = ExecutionState::new("q", &[]);
        state.result = Some("kept".to_string());
        let merged = reduce(state, StateUpdate::default());
        assert_eq!(merged.result.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn routes_to_the_classified_capability() {
        let llm = Arc::new(StubLlm::new(
            r#"{"agent": "books", "confidence": 0.85, "reasoning": "book request"}"#,
        ));
        let registry = stub_registry("stub answer");
        let executor = executor_with(llm, registry);

        let state = executor
            .run("Recommend books on Python programming", &[], true)
            .await;

        assert_eq!(state.capability, Capability::Books);
        assert_eq!(state.result.as_deref(), Some("stub answer"));
        assert_eq!(state.confidence, Some(0.85));
        assert_eq!(state.rationale.as_deref(), Some("book request"));
    }

    #[tokio::test]
    async fn handler_failure_becomes_safe_error_state() {
        let llm = Arc::new(StubLlm::new(
            r#"{"agent": "papers", "confidence": 0.9, "reasoning": "paper request"}"#,
        ));
        let registry = Arc::new(
            crate::testing::stub_registry_builder("ok")
                .register(Arc::new(StubCapability::failing(
                    Capability::Papers,
                    "upstream search exploded",
                )))
                .build()
                .unwrap(),
        );
        let executor = executor_with(llm, registry);

        let state = executor.run("find papers on transformers", &[], true).await;

        assert_eq!(state.capability, Capability::Error);
        assert_eq!(state.result.as_deref(), Some(ERROR_RESULT));
        let recorded = state.metadata.get("error").and_then(Value::as_str).unwrap();
        assert!(recorded.contains("papers"), "metadata keeps origin: {recorded}");
        // The routing decision survives the error update.
        assert_eq!(state.confidence, Some(0.9));
    }

    #[tokio::test]
    async fn empty_handler_output_is_treated_as_failure() {
        let llm = Arc::new(StubLlm::new(
            r#"{"agent": "curriculum", "confidence": 0.8, "reasoning": "course question"}"#,
        ));
        let registry = Arc::new(
            crate::testing::stub_registry_builder("ok")
                .register(Arc::new(StubCapability::new(Capability::Curriculum, "   ")))
                .build()
                .unwrap(),
        );
        let executor = executor_with(llm, registry);

        let state = executor.run("What courses cover ML?", &[], true).await;
        assert_eq!(state.capability, Capability::Error);
        assert_eq!(state.result.as_deref(), Some(ERROR_RESULT));
    }

    #[tokio::test]
    async fn every_execution_terminates_with_result_text() {
        let llm = Arc::new(StubLlm::new("not json at all"));
        let registry = stub_registry("stub answer");
        let executor = executor_with(llm, registry);

        for query in [
            "Find Python developer jobs in Berlin",
            "What's the weather today?",
            "recommend textbooks for machine learning",
        ] {
            let state = executor.run(query, &[], true).await;
            let result = state.result.expect("workflow always produces a result");
            assert!(!result.trim().is_empty());
        }
    }

    #[tokio::test]
    async fn off_topic_query_lands_on_fallback_handler() {
        let llm = Arc::new(StubLlm::new("{broken"));
        let registry = stub_registry("general answer");
        let executor = executor_with(llm, registry);

        let state = executor.run("What's the weather today?", &[], true).await;
        assert_eq!(state.capability, Capability::Fallback);
        assert_eq!(state.result.as_deref(), Some("general answer"));
        assert_eq!(state.confidence, Some(0.0));
    }
}
