//! Telemetry for answered queries.

mod log;
mod traits;

pub use log::LogSink;
pub use traits::{NoopSink, QueryRecord, TelemetrySink};
