//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the runtime HTTP surface with process-local stores.
//!
//! ## Intended use
//! This binary is useful for development and debugging when no AWS account is at hand: cases
//! live in memory (seeded from `KYC_SEED_CASES` if set) and reports are kept in memory. API
//! keys come from `OPENAI_API_KEY` and `TAVILY_API_KEY` only. The workspace's main `kyc-run`
//! binary adds the AWS backend and parameter-store secrets.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use kyc_core::config::{env, string_from_env_value, DEFAULT_ADDR};
use kyc_core::{CoreConfig, InMemoryCaseStore, InMemoryObjectStore, SecretsLoader};

/// Main entry point for the KYC REST API server
///
/// # Environment Variables
/// - `KYC_ADDR`: Server address (default: "0.0.0.0:8080")
/// - `KYC_SEED_CASES`: Optional path to a JSON array of case records keyed by `CaseId`
/// - `KYC_*`: see `CoreConfig::from_lookup`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration or seed file is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("kyc_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = string_from_env_value(std::env::var(env::ADDR).ok(), DEFAULT_ADDR);
    let cfg = Arc::new(CoreConfig::from_lookup(|name| std::env::var(name).ok())?);

    let cases = match std::env::var(env::SEED_CASES) {
        Ok(path) => {
            tracing::info!("seeding cases from {}", path);
            seed_cases(&path)?
        }
        Err(_) => InMemoryCaseStore::new(),
    };

    let (secrets, report) = SecretsLoader::new(&cfg)
        .with_explicit(
            std::env::var(env::OPENAI_API_KEY).ok(),
            std::env::var(env::TAVILY_API_KEY).ok(),
        )
        .load()
        .await;
    report.log();

    let state = AppState::build(
        cfg,
        Arc::new(cases),
        Arc::new(InMemoryObjectStore::new()),
        &secrets,
    );

    tracing::info!("-- Starting KYC REST API on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Loads case records from a JSON array file.
fn seed_cases(path: &str) -> anyhow::Result<InMemoryCaseStore> {
    let text = std::fs::read_to_string(path)?;
    let records: Vec<serde_json::Value> = serde_json::from_str(&text)?;
    Ok(InMemoryCaseStore::from_records(records)?)
}
