//! Telemetry sink trait and record type.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::capability::Capability;

/// Backend-agnostic sink for per-query telemetry.
///
/// The engine invokes the sink fire-and-forget after a response has already
/// been produced; a panicking or slow sink can never affect that response.
/// Thread-safe behind `Arc<dyn TelemetrySink>`.
pub trait TelemetrySink: Send + Sync {
    /// Record one answered query.
    fn record(&self, record: &QueryRecord);

    /// Human-readable backend name (e.g. "noop", "log").
    fn name(&self) -> &str;
}

/// Structured record of one answered query.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub capability: Capability,
    /// Absent on cache hits, where no classification ran.
    pub confidence: Option<f32>,
    pub rationale: Option<String>,
    pub latency: Duration,
    /// Whether the deterministic keyword fallback produced the route.
    pub used_fallback: bool,
    /// Whether the response was served from the cache.
    pub cache_hit: bool,
}

/// Sink that discards every record.
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn record(&self, _record: &QueryRecord) {}

    fn name(&self) -> &str {
        "noop"
    }
}
