//! Multi-domain orchestration.
//!
//! Invoked when the classifier decides a query spans several capability
//! domains. Decomposes the query into contributing domains, fans out to each
//! domain handler concurrently, and synthesizes one answer from the
//! sub-results. One level of fan-out only: sub-calls go straight to domain
//! handlers, never back through the router.

use std::sync::Arc;

use futures::future::join_all;
use tokio::time::timeout;

use crate::capability::{Capability, CapabilityRegistry};
use crate::config::OrchestratorConfig;
use crate::error::CapabilityError;
use crate::llm::ChatMessage;
use crate::routing::keywords;

/// Fans out a multi-domain query and synthesizes a single answer.
pub struct Orchestrator {
    registry: Arc<CapabilityRegistry>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator over the given registry.
    pub fn new(registry: Arc<CapabilityRegistry>, config: OrchestratorConfig) -> Self {
        Self { registry, config }
    }

    /// Answer a query spanning several domains.
    ///
    /// A failed or timed-out sub-call excludes that domain from synthesis
    /// and the final answer names it as missing; the request as a whole
    /// still succeeds. Only when every domain fails does the answer degrade
    /// to the fallback handler's output.
    pub async fn process(
        &self,
        query: &str,
        chat_history: &[ChatMessage],
        domain_hints: &[Capability],
    ) -> Result<String, CapabilityError> {
        let domains = self.contributing_domains(query, domain_hints);
        if domains.is_empty() {
            tracing::debug!("no contributing domains, answering via fallback");
            return self.registry.fallback().process(query, chat_history).await;
        }

        tracing::info!(
            domains = ?domains.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
            "orchestrating multi-domain query"
        );

        let results = join_all(
            domains
                .iter()
                .map(|&domain| self.run_domain(domain, query, chat_history)),
        )
        .await;

        let mut sections: Vec<String> = Vec::new();
        let mut missing: Vec<Capability> = Vec::new();
        for (domain, outcome) in results {
            match outcome {
                Ok(text) => {
                    sections.push(format!("## {}\n{}", domain.title(), text.trim()));
                }
                Err(err) => {
                    tracing::warn!(
                        domain = %domain,
                        error = %err,
                        "orchestrated sub-call failed, excluding from synthesis"
                    );
                    missing.push(domain);
                }
            }
        }

        if sections.is_empty() {
            tracing::warn!("all orchestrated domains failed, degrading to fallback");
            return self.registry.fallback().process(query, chat_history).await;
        }

        let mut answer = sections.join("\n\n");
        for domain in &missing {
            answer.push_str(&format!(
                "\n\nNote: the {} analysis was unavailable and is not included.",
                domain.title()
            ));
        }
        Ok(answer)
    }

    /// Decide which domains contribute to the query.
    ///
    /// Prefers the classifier's hints; with fewer than two usable hints,
    /// re-derives membership from the domains' keyword signatures. The
    /// result is normalized to the fixed domain order with duplicates
    /// removed.
    fn contributing_domains(
        &self,
        query: &str,
        domain_hints: &[Capability],
    ) -> Vec<Capability> {
        let hinted: Vec<Capability> = Capability::DOMAINS
            .into_iter()
            .filter(|d| domain_hints.contains(d))
            .collect();
        if hinted.len() >= 2 {
            hinted
        } else {
            keywords::matching_domains(query)
        }
    }

    /// Run one domain handler under the sub-call timeout.
    async fn run_domain(
        &self,
        domain: Capability,
        query: &str,
        chat_history: &[ChatMessage],
    ) -> (Capability, Result<String, CapabilityError>) {
        let Some(handler) = self.registry.domain_handler(domain) else {
            return (
                domain,
                Err(CapabilityError::Search {
                    capability: domain,
                    reason: "no handler registered".to_string(),
                }),
            );
        };

        let outcome = match timeout(
            self.config.subcall_timeout,
            handler.process(query, chat_history),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout {
                capability: domain,
                timeout: self.config.subcall_timeout,
            }),
        };

        (domain, outcome)
    }
}
