use std::sync::Arc;

use anyhow::Context;
use loyalty_accrual::{HttpAccrualGateway, Reconciler, ReconcilerConfig, ReconcilerHandle};
use loyalty_api::{app, AppState, AuthConfig};
use loyalty_core::{LedgerRepository, OrderStore, UserRepository};
use loyalty_store::app_config::Config;
use loyalty_store::{DbClient, MemoryStore, PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loyalty_api=debug,loyalty_accrual=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting loyalty API on {}", config.server.address);

    let (state, reconciler) = if config.database.is_in_memory() {
        tracing::warn!("Using in-memory store, nothing survives a restart");
        wire(Arc::new(MemoryStore::new()), &config)?
    } else {
        let db = DbClient::new(&config.database)
            .await
            .context("Failed to connect to Postgres")?;
        db.migrate().await.context("Failed to run migrations")?;
        wire(Arc::new(PgStore::new(db.pool.clone())), &config)?
    };

    let listener = tokio::net::TcpListener::bind(&config.server.address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.address))?;
    tracing::info!("Listening on {}", config.server.address);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    let outcome = reconciler.shutdown_and_join().await;
    tracing::info!(?outcome, "Accrual reconciliation stopped");
    Ok(())
}

fn wire<S>(store: Arc<S>, config: &Config) -> anyhow::Result<(AppState, ReconcilerHandle)>
where
    S: OrderStore + UserRepository + LedgerRepository + 'static,
{
    let accrual = &config.accrual;
    let gateway = HttpAccrualGateway::new(&accrual.base_url, accrual.request_timeout())
        .context("Failed to build accrual client")?;

    let reconciler = Reconciler::new(
        store.clone(),
        Arc::new(gateway),
        ReconcilerConfig {
            dispatch_interval: accrual.dispatch_interval(),
            flush_interval: accrual.flush_interval(),
            workers: accrual.workers,
            queue_capacity: accrual.queue_capacity,
            request_timeout: accrual.request_timeout(),
            store_timeout: accrual.store_timeout(),
        },
    )
    .spawn();
    tracing::info!(
        "Accrual reconciliation against {} with {} workers",
        accrual.base_url,
        accrual.workers
    );

    let state = AppState::new(
        store,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    );
    Ok((state, reconciler))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
