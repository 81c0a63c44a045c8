//! Test doubles shared across unit tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::capability::{
    Capability, CapabilityHandler, CapabilityRegistry, CapabilityRegistryBuilder,
};
use crate::error::{CapabilityError, LlmError};
use crate::llm::{ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use crate::observability::{QueryRecord, TelemetrySink};

/// LLM provider stub that replays a fixed response.
pub struct StubLlm {
    reply: String,
    calls: AtomicU32,
    failing: AtomicBool,
}

impl StubLlm {
    /// Stub that answers every completion with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicU32::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Number of `complete()` calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Make subsequent calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub-model"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing.load(Ordering::Relaxed) {
            return Err(LlmError::RequestFailed {
                provider: "stub".to_string(),
                reason: "stub offline".to_string(),
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

/// Capability handler stub with scriptable behavior.
pub struct StubCapability {
    capability: Capability,
    reply: String,
    fail_reason: Option<String>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl StubCapability {
    /// Handler that answers every query with `reply`.
    pub fn new(capability: Capability, reply: impl Into<String>) -> Self {
        Self {
            capability,
            reply: reply.into(),
            fail_reason: None,
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Handler that fails every query with a search error.
    pub fn failing(capability: Capability, reason: impl Into<String>) -> Self {
        Self {
            capability,
            reply: String::new(),
            fail_reason: Some(reason.into()),
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Delay each call, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `process()` calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CapabilityHandler for StubCapability {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn process(
        &self,
        _query: &str,
        _chat_history: &[ChatMessage],
    ) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.fail_reason {
            return Err(CapabilityError::Search {
                capability: self.capability,
                reason: reason.clone(),
            });
        }
        Ok(self.reply.clone())
    }
}

/// Registry builder pre-populated with stubs for every domain and the
/// fallback, each answering with `reply`. Individual slots can be
/// overridden by further `register` calls.
pub fn stub_registry_builder(reply: &str) -> CapabilityRegistryBuilder {
    let mut builder = CapabilityRegistry::builder();
    for capability in Capability::DOMAINS {
        builder = builder.register(Arc::new(StubCapability::new(capability, reply)));
    }
    builder.register(Arc::new(StubCapability::new(Capability::Fallback, reply)))
}

/// Fully stubbed registry, every handler answering with `reply`.
pub fn stub_registry(reply: &str) -> Arc<CapabilityRegistry> {
    Arc::new(
        stub_registry_builder(reply)
            .build()
            .expect("stub registry is complete"),
    )
}

/// Telemetry sink that stores every record.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<QueryRecord>>,
}

impl RecordingSink {
    /// Snapshot of all records seen so far.
    pub fn records(&self) -> Vec<QueryRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn record(&self, record: &QueryRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
    }

    fn name(&self) -> &str {
        "recording"
    }
}
