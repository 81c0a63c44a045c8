//! Query routing: LLM-backed classification plus keyword fallback.

mod classifier;
pub mod keywords;

pub use classifier::{FALLBACK_RATIONALE, RouteClassifier, RouteDecision, heuristic_route};
