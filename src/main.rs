//! # memoq
//!
//! Process entrypoint. Loads configuration, wires the domain store, the
//! event bus, the LLM generator, and the `Runner` together, then waits for
//! Ctrl+C/SIGTERM and shuts the runner down gracefully.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use memoq_domain::{CardService, DomainStore, MemoService};
use memoq_runtime::runner::TaskRehydrator;
use memoq_runtime::store::{InMemoryTaskStore, PostgresTaskStore, TaskStore};
use memoq_runtime::{EventBus, Runner};
use memoq_shared::config::MemoqConfig;
use memoq_shared::events::EventPublisher;
use memoq_worker::{
    Generator, HttpLlmClient, LlmGenerator, MemoGenerationEventHandler, MemoGenerationTaskFactory,
    RetryConfig, MEMO_GENERATION_TASK_TYPE,
};

/// How long the shutdown sequence waits for in-flight tasks to drain
/// before giving up and exiting anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "memoq", about = "Turns memos into flashcards via an LLM, durably")]
struct Cli {
    /// Path to a TOML configuration file. Environment variables
    /// (`MEMOQ_...`) always take precedence over file values.
    #[arg(long, env = "MEMOQ_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = MemoqConfig::load(cli.config.as_deref())?;

    memoq_shared::telemetry::init_tracing(config.json_logs);

    info!(version = env!("CARGO_PKG_VERSION"), "starting memoq");

    config.llm.validate()?;

    let runner = bootstrap(&config).await?;

    info!("memoq started, press Ctrl+C to shut down gracefully");
    shutdown_signal().await;
    info!("shutdown signal received, stopping runner");

    runner.stop();
    match tokio::time::timeout(SHUTDOWN_GRACE, runner.join()).await {
        Ok(()) => info!("runner stopped cleanly"),
        Err(_) => error!(
            grace_seconds = SHUTDOWN_GRACE.as_secs(),
            "graceful shutdown timed out, exiting anyway"
        ),
    }

    Ok(())
}

/// Build every collaborator and start the `Runner`. Split out of `main` so
/// the wiring order — store, services, generator, factory, runner, event
/// bus subscription — is easy to read top to bottom.
async fn bootstrap(config: &MemoqConfig) -> anyhow::Result<Arc<Runner>> {
    let domain_store = Arc::new(build_domain_store(config).await?);
    let task_store: Arc<dyn TaskStore> = build_task_store(config).await?;

    let event_bus = Arc::new(EventBus::new());
    let memo_service = Arc::new(MemoService::new(
        Arc::clone(&domain_store),
        event_bus.clone() as Arc<dyn EventPublisher>,
    ));
    let card_service = Arc::new(CardService::new(Arc::clone(&domain_store)));

    let generator = build_generator(config)?;

    let factory = Arc::new(MemoGenerationTaskFactory::new(
        Arc::clone(&memo_service),
        card_service,
        generator,
    ));

    let runner = Arc::new(
        Runner::start(
            task_store,
            factory.clone() as Arc<dyn TaskRehydrator>,
            config.runner.clamped_worker_count(),
            config.runner.queue_size,
            config.runner.stuck_task_age(),
            config.runner.stuck_check_interval(),
        )
        .await?,
    );

    let handler = Arc::new(MemoGenerationEventHandler::new(factory, Arc::clone(&runner)));
    event_bus.subscribe(MEMO_GENERATION_TASK_TYPE, handler).await;

    // `event_bus` now lives only inside `memo_service`'s `Arc<dyn
    // EventPublisher>` clone and the handler registered on it; both outlive
    // this function, keeping future `create_memo` calls routed to the
    // runner for the life of the process.

    Ok(runner)
}

async fn build_domain_store(config: &MemoqConfig) -> anyhow::Result<DomainStore> {
    if config.database.dsn.trim().is_empty() {
        info!("database.dsn not set, using the in-memory domain store");
        return Ok(DomainStore::in_memory());
    }

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.dsn)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(DomainStore::postgres(pool))
}

async fn build_task_store(config: &MemoqConfig) -> anyhow::Result<Arc<dyn TaskStore>> {
    if config.database.dsn.trim().is_empty() {
        return Ok(Arc::new(InMemoryTaskStore::new()));
    }

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.dsn)
        .await?;
    Ok(Arc::new(PostgresTaskStore::new(pool)))
}

fn build_generator(config: &MemoqConfig) -> anyhow::Result<Arc<dyn Generator>> {
    let client = Box::new(HttpLlmClient::new(
        config.llm.endpoint.clone(),
        config.llm.api_key.clone(),
        config.llm.model_name.clone(),
    ));
    let retry_cfg = RetryConfig {
        max_retries: config.llm.clamped_max_retries(),
        base_delay: config.llm.clamped_base_delay(),
    };
    let generator = LlmGenerator::new(client, &config.llm.prompt_template_path, retry_cfg)?;
    Ok(Arc::new(generator))
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
