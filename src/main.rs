//! Command-line entry point.
//!
//! Wires the engine against an OpenAI-compatible backend with prompt-backed
//! capability handlers, answers one query, and prints the result.

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wayfinder::cache::{CacheBackend, MemoryCache};
use wayfinder::capability::{Capability, CapabilityRegistry, PromptCapability};
use wayfinder::config::Config;
use wayfinder::engine::{Engine, Request};
use wayfinder::llm::create_llm_provider;
use wayfinder::observability::{LogSink, TelemetrySink};
use wayfinder::orchestrator::Orchestrator;
use wayfinder::routing::RouteClassifier;
use wayfinder::workflow::WorkflowExecutor;

#[derive(Parser)]
#[command(name = "wayfinder", version, about)]
struct Cli {
    /// The query to answer. Reads stdin when omitted.
    query: Vec<String>,

    /// Never route to the orchestrator, even for multi-domain queries.
    #[arg(long)]
    no_orchestration: bool,

    /// Skip the response cache for this run.
    #[arg(long)]
    no_cache: bool,

    /// Print the full response as JSON instead of plain text.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("loading configuration")?;

    let query = if cli.query.is_empty() {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading query from stdin")?;
        buffer.trim().to_string()
    } else {
        cli.query.join(" ")
    };
    if query.is_empty() {
        anyhow::bail!("no query given");
    }

    let llm = create_llm_provider(&config.llm).context("creating LLM provider")?;

    let mut registry = CapabilityRegistry::builder();
    for capability in Capability::DOMAINS {
        registry = registry.register(Arc::new(PromptCapability::with_default_prompt(
            capability,
            Arc::clone(&llm),
        )));
    }
    let registry = Arc::new(
        registry
            .register(Arc::new(PromptCapability::with_default_prompt(
                Capability::Fallback,
                Arc::clone(&llm),
            )))
            .build()
            .context("building capability registry")?,
    );

    let executor = WorkflowExecutor::new(
        RouteClassifier::new(Arc::clone(&llm), config.classifier.clone()),
        Arc::clone(&registry),
        Orchestrator::new(registry, config.orchestrator.clone()),
    );

    let mut engine =
        Engine::new(executor).with_telemetry(Arc::new(LogSink) as Arc<dyn TelemetrySink>);
    if config.cache.enabled && !cli.no_cache {
        engine = engine
            .with_cache(Arc::new(MemoryCache::new(config.cache.clone())) as Arc<dyn CacheBackend>);
    }

    let mut request = Request::new(query);
    if cli.no_orchestration {
        request = request.without_orchestration();
    }

    let response = engine.handle(request).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("[{}] {}", response.capability, response.result);
    }

    Ok(())
}
