//! Capability set, handler contract, and registry.
//!
//! Capabilities are a closed enum rather than free-form strings, so the
//! dispatch table in the workflow executor is an exhaustive match checked by
//! the compiler. Adding or removing a capability is a single enum change.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CapabilityError, ConfigError, LlmError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// The set of capabilities a query can be routed to.
///
/// `Error` is the executor's failure sentinel: it appears on responses whose
/// handler failed, and is never produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Curriculum,
    JobMarket,
    SkillMapping,
    Books,
    Papers,
    Orchestrator,
    Fallback,
    Error,
}

impl Capability {
    /// The concrete query domains the orchestrator can fan out to.
    ///
    /// Order matters: it is the fixed priority order of the keyword
    /// heuristic and the presentation order of orchestrated answers.
    pub const DOMAINS: [Capability; 5] = [
        Capability::Curriculum,
        Capability::JobMarket,
        Capability::SkillMapping,
        Capability::Books,
        Capability::Papers,
    ];

    /// Stable wire name, used in model prompts, cache entries, and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Curriculum => "curriculum",
            Capability::JobMarket => "job_market",
            Capability::SkillMapping => "skill_mapping",
            Capability::Books => "books",
            Capability::Papers => "papers",
            Capability::Orchestrator => "orchestrator",
            Capability::Fallback => "fallback",
            Capability::Error => "error",
        }
    }

    /// Human-readable section title for synthesized answers.
    pub fn title(&self) -> &'static str {
        match self {
            Capability::Curriculum => "Curriculum",
            Capability::JobMarket => "Job market",
            Capability::SkillMapping => "Skill mapping",
            Capability::Books => "Books",
            Capability::Papers => "Papers",
            Capability::Orchestrator => "Combined analysis",
            Capability::Fallback => "General",
            Capability::Error => "Error",
        }
    }

    /// Parse a wire name into a routable capability.
    ///
    /// Returns `None` for unknown labels and for the `error` sentinel, which
    /// no classifier output may carry.
    pub fn from_wire(label: &str) -> Option<Capability> {
        match label.trim() {
            "curriculum" => Some(Capability::Curriculum),
            "job_market" => Some(Capability::JobMarket),
            "skill_mapping" => Some(Capability::SkillMapping),
            "books" => Some(Capability::Books),
            "papers" => Some(Capability::Papers),
            "orchestrator" => Some(Capability::Orchestrator),
            "fallback" => Some(Capability::Fallback),
            _ => None,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Contract every specialist capability implements.
///
/// Handlers receive the query and the caller-owned chat history and return
/// answer text. Failures cross this boundary only as [`CapabilityError`];
/// the workflow executor converts them into a user-safe error response.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// The capability this handler serves.
    fn capability(&self) -> Capability;

    /// Answer a query. The history slice is read-only to the handler.
    async fn process(
        &self,
        query: &str,
        chat_history: &[ChatMessage],
    ) -> Result<String, CapabilityError>;
}

/// Registry mapping each routable capability to its handler.
///
/// One handler per domain plus the fallback, all required at construction.
/// A missing handler is a startup configuration error, never a runtime one.
pub struct CapabilityRegistry {
    curriculum: Arc<dyn CapabilityHandler>,
    job_market: Arc<dyn CapabilityHandler>,
    skill_mapping: Arc<dyn CapabilityHandler>,
    books: Arc<dyn CapabilityHandler>,
    papers: Arc<dyn CapabilityHandler>,
    fallback: Arc<dyn CapabilityHandler>,
}

impl CapabilityRegistry {
    /// Start building a registry.
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::default()
    }

    /// Handler for a concrete domain capability.
    ///
    /// `Orchestrator` and `Error` have no registered handler: the executor
    /// dispatches the orchestrator directly, and the sentinel is never
    /// dispatched at all.
    pub fn domain_handler(&self, capability: Capability) -> Option<Arc<dyn CapabilityHandler>> {
        match capability {
            Capability::Curriculum => Some(Arc::clone(&self.curriculum)),
            Capability::JobMarket => Some(Arc::clone(&self.job_market)),
            Capability::SkillMapping => Some(Arc::clone(&self.skill_mapping)),
            Capability::Books => Some(Arc::clone(&self.books)),
            Capability::Papers => Some(Arc::clone(&self.papers)),
            Capability::Fallback => Some(Arc::clone(&self.fallback)),
            Capability::Orchestrator | Capability::Error => None,
        }
    }

    /// The fallback handler, which must always be able to answer.
    pub fn fallback(&self) -> Arc<dyn CapabilityHandler> {
        Arc::clone(&self.fallback)
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry").finish_non_exhaustive()
    }
}

/// Builder for [`CapabilityRegistry`].
#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    curriculum: Option<Arc<dyn CapabilityHandler>>,
    job_market: Option<Arc<dyn CapabilityHandler>>,
    skill_mapping: Option<Arc<dyn CapabilityHandler>>,
    books: Option<Arc<dyn CapabilityHandler>>,
    papers: Option<Arc<dyn CapabilityHandler>>,
    fallback: Option<Arc<dyn CapabilityHandler>>,
}

impl CapabilityRegistryBuilder {
    /// Register a handler under the capability it reports.
    ///
    /// Registering `Orchestrator` or `Error` is a configuration mistake and
    /// is rejected at `build()` time by the corresponding slot staying empty.
    pub fn register(mut self, handler: Arc<dyn CapabilityHandler>) -> Self {
        match handler.capability() {
            Capability::Curriculum => self.curriculum = Some(handler),
            Capability::JobMarket => self.job_market = Some(handler),
            Capability::SkillMapping => self.skill_mapping = Some(handler),
            Capability::Books => self.books = Some(handler),
            Capability::Papers => self.papers = Some(handler),
            Capability::Fallback => self.fallback = Some(handler),
            Capability::Orchestrator | Capability::Error => {
                tracing::warn!(
                    capability = %handler.capability(),
                    "ignoring handler registration for non-registrable capability"
                );
            }
        }
        self
    }

    /// Finish the registry. Errors if any required slot is unfilled.
    pub fn build(self) -> Result<CapabilityRegistry, ConfigError> {
        fn required(
            slot: Option<Arc<dyn CapabilityHandler>>,
            capability: Capability,
        ) -> Result<Arc<dyn CapabilityHandler>, ConfigError> {
            slot.ok_or(ConfigError::MissingCapability { capability })
        }

        Ok(CapabilityRegistry {
            curriculum: required(self.curriculum, Capability::Curriculum)?,
            job_market: required(self.job_market, Capability::JobMarket)?,
            skill_mapping: required(self.skill_mapping, Capability::SkillMapping)?,
            books: required(self.books, Capability::Books)?,
            papers: required(self.papers, Capability::Papers)?,
            fallback: required(self.fallback, Capability::Fallback)?,
        })
    }
}

/// LLM-prompt-backed capability handler.
///
/// The single authoritative handler shape for capabilities that answer by
/// prompting the model with a domain system prompt. Production deployments
/// swap in handlers with real retrieval behind the same trait.
pub struct PromptCapability {
    capability: Capability,
    system_prompt: String,
    llm: Arc<dyn LlmProvider>,
}

impl PromptCapability {
    /// Create a handler for `capability` with an explicit system prompt.
    pub fn new(
        capability: Capability,
        system_prompt: impl Into<String>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            capability,
            system_prompt: system_prompt.into(),
            llm,
        }
    }

    /// Create a handler using the built-in prompt for `capability`.
    pub fn with_default_prompt(capability: Capability, llm: Arc<dyn LlmProvider>) -> Self {
        Self::new(capability, default_system_prompt(capability), llm)
    }
}

#[async_trait]
impl CapabilityHandler for PromptCapability {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn process(
        &self,
        query: &str,
        chat_history: &[ChatMessage],
    ) -> Result<String, CapabilityError> {
        let mut messages = Vec::with_capacity(chat_history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend_from_slice(chat_history);
        messages.push(ChatMessage::user(query));

        let response = self
            .llm
            .complete(CompletionRequest::new(messages).with_temperature(0.3))
            .await
            .map_err(|e| match e {
                LlmError::Timeout { timeout, .. } => CapabilityError::Timeout {
                    capability: self.capability,
                    timeout,
                },
                other => CapabilityError::Search {
                    capability: self.capability,
                    reason: other.to_string(),
                },
            })?;

        if response.content.trim().is_empty() {
            return Err(CapabilityError::EmptyResponse {
                capability: self.capability,
            });
        }

        Ok(response.content)
    }
}

/// Built-in system prompt for each capability.
pub fn default_system_prompt(capability: Capability) -> String {
    let body = match capability {
        Capability::Curriculum => {
            "You are a university curriculum assistant. Answer questions about \
             courses, modules, subjects, and prerequisites based on the study \
             program context provided in the conversation."
        }
        Capability::JobMarket => {
            "You are a job market assistant. Answer questions about job \
             listings, hiring trends, and career opportunities. When the query \
             names a location or technology, keep your answer specific to it."
        }
        Capability::SkillMapping => {
            "You are a skill gap analyst. Compare what a study program teaches \
             with what employers ask for, and point out matches and gaps."
        }
        Capability::Books => {
            "You are a learning resource assistant. Recommend books, textbooks, \
             and references suited to the topic and level the user asks about."
        }
        Capability::Papers => {
            "You are a research assistant. Recommend academic papers and \
             publications relevant to the topic the user asks about."
        }
        Capability::Fallback => {
            "You are a helpful university assistant chatbot. The user's \
             question does not match any known category like curriculum, jobs, \
             skill matching, books, or papers. Either answer it with general \
             knowledge, or politely explain that the system cannot help with \
             that yet."
        }
        Capability::Orchestrator | Capability::Error => {
            "You are a helpful university assistant chatbot."
        }
    };
    body.to_string()
}
