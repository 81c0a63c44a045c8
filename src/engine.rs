//! Request/response boundary around the workflow.
//!
//! Composes the response cache in front of the workflow executor: a cache
//! hit returns the prior answer without routing or invoking any capability.
//! Telemetry is emitted fire-and-forget after the response exists, so a
//! failing sink can never affect what the caller receives.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::cache::CacheBackend;
use crate::capability::Capability;
use crate::observability::{NoopSink, QueryRecord, TelemetrySink};
use crate::routing::FALLBACK_RATIONALE;
use crate::workflow::{ERROR_RESULT, WorkflowExecutor};

/// Cache scope for whole-workflow answers.
const CACHE_SCOPE: &str = "workflow";

/// One incoming query.
#[derive(Debug, Clone)]
pub struct Request {
    pub query: String,
    pub chat_history: Vec<crate::llm::ChatMessage>,
    pub allow_orchestration: bool,
}

impl Request {
    /// Request with empty history and orchestration allowed.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            chat_history: Vec::new(),
            allow_orchestration: true,
        }
    }

    /// Attach chat history.
    pub fn with_history(mut self, chat_history: Vec<crate::llm::ChatMessage>) -> Self {
        self.chat_history = chat_history;
        self
    }

    /// Disallow routing to the orchestrator.
    pub fn without_orchestration(mut self) -> Self {
        self.allow_orchestration = false;
        self
    }
}

/// The answer returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub capability: Capability,
    pub result: String,
    /// Absent on cache hits, where no classification ran.
    pub confidence: Option<f32>,
    pub rationale: Option<String>,
    pub metadata: HashMap<String, Value>,
    pub latency_seconds: f64,
}

/// Top-level entry point: cache, workflow, telemetry.
pub struct Engine {
    executor: WorkflowExecutor,
    cache: Option<Arc<dyn CacheBackend>>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Engine {
    /// Engine without cache and with telemetry discarded.
    pub fn new(executor: WorkflowExecutor) -> Self {
        Self {
            executor,
            cache: None,
            telemetry: Arc::new(NoopSink),
        }
    }

    /// Attach a response cache.
    pub fn with_cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attach a telemetry sink.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Answer one request. Infallible: every failure mode inside degrades
    /// to a usable response rather than an error.
    pub async fn handle(&self, request: Request) -> Response {
        let started = Instant::now();

        if let Some(cache) = &self.cache {
            match cache.get(CACHE_SCOPE, &request.query).await {
                Ok(Some(hit)) => {
                    let latency = started.elapsed();
                    tracing::info!(capability = %hit.capability, "answered from cache");
                    let response = Response {
                        capability: hit.capability,
                        result: hit.response,
                        confidence: None,
                        rationale: None,
                        metadata: HashMap::from([(
                            "cache".to_string(),
                            Value::from("hit"),
                        )]),
                        latency_seconds: latency.as_secs_f64(),
                    };
                    self.emit(&request.query, &response, latency, false, true);
                    return response;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "cache unavailable, proceeding uncached");
                }
            }
        }

        let state = self
            .executor
            .run(
                &request.query,
                &request.chat_history,
                request.allow_orchestration,
            )
            .await;

        // Error results are never cached; everything else is.
        if state.capability != Capability::Error {
            if let (Some(cache), Some(result)) = (&self.cache, state.result.as_ref()) {
                if let Err(err) = cache
                    .set(CACHE_SCOPE, &request.query, result, state.capability)
                    .await
                {
                    tracing::warn!(error = %err, "cache store failed");
                }
            }
        }

        let latency = started.elapsed();
        let used_fallback = state.rationale.as_deref() == Some(FALLBACK_RATIONALE);
        let response = Response {
            capability: state.capability,
            result: state.result.unwrap_or_else(|| ERROR_RESULT.to_string()),
            confidence: state.confidence,
            rationale: state.rationale,
            metadata: state.metadata,
            latency_seconds: latency.as_secs_f64(),
        };
        self.emit(&request.query, &response, latency, used_fallback, false);
        response
    }

    /// Emit the telemetry record on a detached task.
    fn emit(
        &self,
        query: &str,
        response: &Response,
        latency: Duration,
        used_fallback: bool,
        cache_hit: bool,
    ) {
        let record = QueryRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            query: query.to_string(),
            capability: response.capability,
            confidence: response.confidence,
            rationale: response.rationale.clone(),
            latency,
            used_fallback,
            cache_hit,
        };
        let sink = Arc::clone(&self.telemetry);
        tokio::spawn(async move {
            sink.record(&record);
        });
    }
}
