use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use kyc_aws::AwsStores;
use kyc_core::config::{DEFAULT_ADDR, env, parse_from_env_value, string_from_env_value};
use kyc_core::{
    Backend, CaseStore, CoreConfig, InMemoryCaseStore, InMemoryObjectStore, ObjectStore,
    SecretsLoader,
};

/// Main entry point for the KYC screening runtime
///
/// Resolves configuration, loads API keys, wires the case and report stores for the selected
/// backend and serves the runtime HTTP contract (`/invocations`, `/ping`).
///
/// # Environment Variables
/// - `KYC_ADDR`: listen address (default: "0.0.0.0:8080")
/// - `KYC_BACKEND`: `aws` (default) or `memory`
/// - `KYC_SEED_CASES`: JSON array of case records for the `memory` backend
/// - `OPENAI_API_KEY`, `TAVILY_API_KEY`: explicit keys; otherwise read from SSM on `aws`
/// - `KYC_*`: see `CoreConfig::from_lookup`
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration is invalid or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kyc_run=info".parse()?)
                .add_directive("kyc_core=info".parse()?)
                .add_directive("kyc_aws=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = string_from_env_value(std::env::var(env::ADDR).ok(), DEFAULT_ADDR);
    let backend: Backend = parse_from_env_value(std::env::var(env::BACKEND).ok())?;
    let cfg = Arc::new(CoreConfig::from_lookup(|name| std::env::var(name).ok())?);
    tracing::info!(
        ?backend,
        classifier = ?cfg.classifier(),
        mode = ?cfg.agent_mode(),
        "++ KYC runtime configuration resolved"
    );

    let mut secrets = SecretsLoader::new(&cfg).with_explicit(
        std::env::var(env::OPENAI_API_KEY).ok(),
        std::env::var(env::TAVILY_API_KEY).ok(),
    );

    let (cases, objects): (Arc<dyn CaseStore>, Arc<dyn ObjectStore>) = match backend {
        Backend::Aws => {
            let aws = AwsStores::from_env(&cfg).await;
            secrets = secrets.with_parameter_store(Arc::new(aws.parameters));
            (Arc::new(aws.cases), Arc::new(aws.objects))
        }
        Backend::Memory => {
            let cases = match std::env::var(env::SEED_CASES) {
                Ok(path) => {
                    let records: Vec<serde_json::Value> =
                        serde_json::from_str(&std::fs::read_to_string(&path)?)?;
                    tracing::info!("seeding {} cases from {}", records.len(), path);
                    InMemoryCaseStore::from_records(records)?
                }
                Err(_) => InMemoryCaseStore::new(),
            };
            (Arc::new(cases), Arc::new(InMemoryObjectStore::new()))
        }
    };

    let (secrets, report) = secrets.load().await;
    report.log();

    let state = AppState::build(cfg, cases, objects, &secrets);

    tracing::info!("++ Starting KYC runtime on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
