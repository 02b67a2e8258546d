//! Generation worker process.
//!
//! Leases queued generations from Postgres, renders them with Veo and
//! uploads the clips to the configured artifact store. Ctrl-C or SIGTERM
//! stops leasing; a job caught mid-backoff is redelivered once its lease
//! expires.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use veostudio_cloud::{build_store, StorageConfig};
use veostudio_events::{EventBus, EventPersistence};
use veostudio_pipeline::ledger::LedgerDefaults;
use veostudio_pipeline::{GenerationWorker, PipelineConfig, Stores, WorkerPool};
use veostudio_veo::{VeoClient, VeoConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = PipelineConfig::from_env()?;
    let veo = VeoConfig::from_env()?;
    let storage = StorageConfig::from_env()?;
    tracing::info!(
        concurrency = config.worker_concurrency,
        max_attempts = config.retry.max_attempts,
        attempt_timeout_secs = config.attempt_timeout.as_secs(),
        "Loaded worker configuration",
    );

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = veostudio_db::create_pool(&database_url)
        .await
        .context("failed to connect to database")?;
    veostudio_db::run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;

    let event_bus = Arc::new(EventBus::default());
    let persistence_handle = tokio::spawn(EventPersistence::run(pool.clone(), event_bus.subscribe()));

    let stores = Stores::postgres(
        pool,
        LedgerDefaults {
            limit: config.default_budget_limit,
            period_days: config.budget_period_days,
        },
    );
    let provider = Arc::new(VeoClient::new(&veo)?);
    let artifacts = build_store(&storage).await;
    tracing::info!(store = artifacts.name(), model = %veo.model, "Provider and artifact store ready");

    let worker = GenerationWorker::new(
        // Pid alone repeats across containers.
        format!("worker-{}-{}", std::process::id(), Uuid::new_v4().simple()),
        stores,
        provider,
        artifacts,
        Arc::clone(&event_bus),
        &config,
    );
    let workers = WorkerPool::new(&worker, config.worker_concurrency, config.poll_interval);
    drop(worker);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    workers.run(cancel).await;

    // Workers held the remaining bus handles; closing it lets persistence
    // drain and exit.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), persistence_handle).await;
    tracing::info!("Worker shut down");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "veostudio_worker=debug,veostudio_pipeline=debug,veostudio_veo=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), stopping workers"),
        () = terminate => tracing::info!("Received SIGTERM, stopping workers"),
    }
}
