use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use veostudio_api::config::ServerConfig;
use veostudio_api::router::build_app_router;
use veostudio_api::state::AppState;
use veostudio_core::pricing::PricingTable;
use veostudio_events::{EventBus, EventPersistence};
use veostudio_pipeline::ledger::LedgerDefaults;
use veostudio_pipeline::{AdmissionService, PipelineConfig, Stores, TemplateLibrary};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let pipeline = PipelineConfig::from_env()?;
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = veostudio_db::create_pool(&database_url)
        .await
        .context("failed to connect to database")?;
    veostudio_db::health_check(&pool)
        .await
        .context("database health check failed")?;
    veostudio_db::run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;
    tracing::info!("Database ready, migrations applied");

    let event_bus = Arc::new(EventBus::default());
    let persistence_handle = tokio::spawn(EventPersistence::run(pool.clone(), event_bus.subscribe()));

    let stores = Stores::postgres(
        pool,
        LedgerDefaults {
            limit: pipeline.default_budget_limit,
            period_days: pipeline.budget_period_days,
        },
    );
    let templates = TemplateLibrary::new(Arc::clone(&stores.templates));
    let admission = AdmissionService::new(
        stores,
        PricingTable::default(),
        Arc::clone(&event_bus),
        &pipeline,
    );

    let state = AppState {
        admission: Arc::new(admission),
        templates: Arc::new(templates),
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    let host = config
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped accepting connections, cleaning up");

    // The app (and its admission service) is gone; dropping the last bus
    // handle closes the channel so persistence drains and exits.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), persistence_handle).await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "veostudio_api=debug,veostudio_pipeline=debug,tower_http=debug".into());
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
