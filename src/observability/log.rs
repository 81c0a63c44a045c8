//! Tracing-based telemetry sink.
//!
//! Uses the existing `tracing` infrastructure so query records appear
//! alongside normal application logs, with no extra dependencies. Good for
//! local development and debugging.

use crate::observability::traits::{QueryRecord, TelemetrySink};

/// Sink that logs query records via `tracing`.
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn record(&self, record: &QueryRecord) {
        tracing::info!(
            id = %record.id,
            timestamp = %record.timestamp.to_rfc3339(),
            query = %record.query,
            capability = %record.capability,
            confidence = record.confidence.unwrap_or(0.0),
            rationale = record.rationale.as_deref().unwrap_or(""),
            latency_ms = record.latency.as_millis() as u64,
            used_fallback = record.used_fallback,
            cache_hit = record.cache_hit,
            "telemetry: query.answered"
        );
    }

    fn name(&self) -> &str {
        "log"
    }
}
