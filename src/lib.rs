//! Query orchestration engine for a student career assistant.
//!
//! Answers free-text queries by deciding which specialist capability should
//! handle them, executing that decision through a small deterministic
//! workflow, and short-circuiting repeated work through a response cache.
//!
//! ```text
//!            ┌───────────────┐  miss   ┌──────────────────┐
//!  Request ─►│ ResponseCache │───────► │ WorkflowExecutor │
//!            └──────┬────────┘         │  router ─► node  │
//!                hit│                  │        ─► END    │
//!                   ▼                  └────────┬─────────┘
//!               Response ◄──────────────────────┘
//! ```
//!
//! Domain capabilities (job search, book recommendations, ...) are external
//! collaborators behind [`capability::CapabilityHandler`]; the engine owns
//! routing, dispatch, failure recovery, fan-out, and caching.

pub mod cache;
pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod observability;
pub mod orchestrator;
pub mod routing;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use capability::{Capability, CapabilityHandler, CapabilityRegistry, PromptCapability};
pub use config::Config;
pub use engine::{Engine, Request, Response};
pub use error::{Error, Result};
