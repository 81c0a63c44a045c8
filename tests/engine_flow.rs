//! End-to-end tests: request in, response out, with stubbed model and
//! capability collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;

use wayfinder::cache::{CacheBackend, MemoryCache};
use wayfinder::capability::{Capability, CapabilityHandler, CapabilityRegistry};
use wayfinder::config::{CacheConfig, ClassifierConfig, OrchestratorConfig};
use wayfinder::engine::{Engine, Request};
use wayfinder::error::{CapabilityError, LlmError};
use wayfinder::llm::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};
use wayfinder::orchestrator::Orchestrator;
use wayfinder::routing::RouteClassifier;
use wayfinder::workflow::WorkflowExecutor;

/// Model stub replaying one fixed completion.
struct ScriptedModel {
    reply: String,
    failing: AtomicBool,
}

impl ScriptedModel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            failing: AtomicBool::new(false),
        })
    }

    fn offline() -> Arc<Self> {
        let model = Self::new("unused");
        model.failing.store(true, Ordering::Relaxed);
        model
    }
}

#[async_trait]
impl LlmProvider for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                reason: "offline".to_string(),
            });
        }
        Ok(CompletionResponse {
            content: self.reply.clone(),
            input_tokens: 1,
            output_tokens: 1,
            finish_reason: FinishReason::Stop,
        })
    }
}

/// Counting capability handler.
struct CountingHandler {
    capability: Capability,
    reply: String,
    fail: bool,
    calls: AtomicU32,
}

impl CountingHandler {
    fn new(capability: Capability, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            capability,
            reply: reply.to_string(),
            fail: false,
            calls: AtomicU32::new(0),
        })
    }

    fn failing(capability: Capability) -> Arc<Self> {
        Arc::new(Self {
            capability,
            reply: String::new(),
            fail: true,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CapabilityHandler for CountingHandler {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn process(
        &self,
        _query: &str,
        _chat_history: &[ChatMessage],
    ) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(CapabilityError::Search {
                capability: self.capability,
                reason: "collaborator down".to_string(),
            });
        }
        Ok(self.reply.clone())
    }
}

struct Handlers {
    curriculum: Arc<CountingHandler>,
    job_market: Arc<CountingHandler>,
    books: Arc<CountingHandler>,
    fallback: Arc<CountingHandler>,
}

fn build_engine(model: Arc<ScriptedModel>, books_failing: bool) -> (Engine, Handlers) {
    let curriculum = CountingHandler::new(Capability::Curriculum, "curriculum answer");
    let job_market = CountingHandler::new(Capability::JobMarket, "job market answer");
    let books = if books_failing {
        CountingHandler::failing(Capability::Books)
    } else {
        CountingHandler::new(Capability::Books, "books answer")
    };
    let fallback = CountingHandler::new(Capability::Fallback, "fallback answer");

    let registry = Arc::new(
        CapabilityRegistry::builder()
            .register(Arc::clone(&curriculum) as Arc<dyn CapabilityHandler>)
            .register(Arc::clone(&job_market) as Arc<dyn CapabilityHandler>)
            .register(Arc::clone(&books) as Arc<dyn CapabilityHandler>)
            .register(CountingHandler::new(Capability::SkillMapping, "skills answer")
                as Arc<dyn CapabilityHandler>)
            .register(CountingHandler::new(Capability::Papers, "papers answer")
                as Arc<dyn CapabilityHandler>)
            .register(Arc::clone(&fallback) as Arc<dyn CapabilityHandler>)
            .build()
            .expect("complete registry"),
    );

    let executor = WorkflowExecutor::new(
        RouteClassifier::new(model, ClassifierConfig::default()),
        Arc::clone(&registry),
        Orchestrator::new(registry, OrchestratorConfig::default()),
    );

    (
        Engine::new(executor),
        Handlers {
            curriculum,
            job_market,
            books,
            fallback,
        },
    )
}

#[tokio::test]
async fn location_bearing_job_query_routes_to_job_market() {
    let model = ScriptedModel::new(
        r#"{"agent": "job_market", "confidence": 0.93, "reasoning": "job search with location", "domains": ["job_market"]}"#,
    );
    let (engine, handlers) = build_engine(model, false);

    let response = engine
        .handle(Request::new("Find Python developer jobs in Berlin"))
        .await;

    assert_eq!(response.capability, Capability::JobMarket);
    assert_eq!(response.result, "job market answer");
    assert_eq!(response.confidence, Some(0.93));
    assert_eq!(handlers.job_market.calls(), 1);
    assert_eq!(handlers.fallback.calls(), 0);
}

#[tokio::test]
async fn multi_domain_query_is_orchestrated_with_partial_failure_noted() {
    let model = ScriptedModel::new(
        r#"{"agent": "orchestrator", "confidence": 0.8, "reasoning": "study and career", "domains": ["curriculum", "job_market", "books"]}"#,
    );
    let (engine, handlers) = build_engine(model, true);

    let response = engine
        .handle(Request::new(
            "What should I study to get an AI job, and which books help?",
        ))
        .await;

    assert_eq!(response.capability, Capability::Orchestrator);
    assert!(response.result.contains("curriculum answer"));
    assert!(response.result.contains("job market answer"));
    assert!(
        response.result.contains("Books analysis was unavailable"),
        "failed domain is named: {}",
        response.result
    );
    assert_eq!(handlers.curriculum.calls(), 1);
    assert_eq!(handlers.job_market.calls(), 1);
    assert_eq!(handlers.books.calls(), 1);
}

#[tokio::test]
async fn orchestration_can_be_disabled_per_request() {
    let model = ScriptedModel::new(
        r#"{"agent": "orchestrator", "confidence": 0.8, "reasoning": "study and career", "domains": ["curriculum", "job_market"]}"#,
    );
    let (engine, handlers) = build_engine(model, false);

    let response = engine
        .handle(Request::new("What should I study to get an AI job?").without_orchestration())
        .await;

    assert_eq!(response.capability, Capability::Curriculum);
    assert_eq!(handlers.curriculum.calls(), 1);
    assert_eq!(handlers.job_market.calls(), 0);
}

#[tokio::test]
async fn offline_model_degrades_to_deterministic_keyword_routing() {
    let model = ScriptedModel::offline();
    let (engine, handlers) = build_engine(model, false);

    let jobs = engine
        .handle(Request::new("Find Python developer jobs in Berlin"))
        .await;
    assert_eq!(jobs.capability, Capability::JobMarket);
    assert_eq!(jobs.confidence, Some(0.0));
    assert_eq!(jobs.rationale.as_deref(), Some("fallback_heuristic"));

    let weather = engine.handle(Request::new("What's the weather today?")).await;
    assert_eq!(weather.capability, Capability::Fallback);
    assert_eq!(weather.result, "fallback answer");
    assert_eq!(handlers.fallback.calls(), 1);
}

#[tokio::test]
async fn identical_query_within_ttl_is_answered_from_cache() {
    let model = ScriptedModel::new(
        r#"{"agent": "books", "confidence": 0.9, "reasoning": "book request", "domains": ["books"]}"#,
    );
    let (engine, handlers) = build_engine(model, false);
    let cache = Arc::new(MemoryCache::new(CacheConfig::default()));
    let engine = engine.with_cache(Arc::clone(&cache) as Arc<dyn CacheBackend>);

    let first = engine
        .handle(Request::new("Recommend books on Python programming"))
        .await;
    assert_eq!(first.capability, Capability::Books);
    assert_eq!(first.confidence, Some(0.9));

    let second = engine
        .handle(Request::new("Recommend books on Python programming"))
        .await;
    assert_eq!(second.capability, Capability::Books);
    assert_eq!(second.result, "books answer");
    assert_eq!(second.confidence, None);
    assert_eq!(handlers.books.calls(), 1, "second answer came from the cache");

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn chat_history_flows_to_the_engine_unchanged() {
    let model = ScriptedModel::new(
        r#"{"agent": "curriculum", "confidence": 0.7, "reasoning": "follow-up about courses"}"#,
    );
    let (engine, handlers) = build_engine(model, false);

    let response = engine
        .handle(
            Request::new("and what are its prerequisites?").with_history(vec![
                ChatMessage::user("Tell me about the data science program"),
                ChatMessage::assistant("It covers statistics and ML."),
            ]),
        )
        .await;

    assert_eq!(response.capability, Capability::Curriculum);
    assert_eq!(handlers.curriculum.calls(), 1);
}
