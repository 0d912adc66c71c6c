//! Process bootstrap: configuration, logging, store connections, the
//! scheduler/worker pool core, and the HTTP ingress adapter.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tickr_core::worker::SchedulerHandoff;
use tickr_core::{DurableStore, FastStore, Scheduler, WorkerPool, WorkerPoolConfig};
use tickr_queue_redis::RedisFastStore;
use tickr_server::config::Config;
use tickr_server::ingress::IngressAdapter;
use tickr_server::routes::AppState;
use tickr_server::{app, handlers};
use tickr_store_postgres::PgDurableStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tickr_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(listen_addr = %config.listen_addr, worker_count = config.worker_count, "starting tickr-server");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to postgres")?;
    let durable_store = PgDurableStore::new(pool);
    durable_store.migrate().await.context("failed to run migrations")?;
    let durable: Arc<dyn DurableStore> = Arc::new(durable_store);

    let fast_store = RedisFastStore::connect(&config.redis_url)
        .await
        .context("failed to connect to redis")?;
    let fast: Arc<dyn FastStore> = Arc::new(fast_store);

    let (scheduler, handoff_rx) = Scheduler::new(durable.clone(), fast.clone());
    let (timer_handle, ready_pop_handle) = scheduler
        .start()
        .await
        .context("failed to start scheduler (recovery failed)")?;

    let registry = Arc::new(handlers::build_registry());
    let worker_pool = WorkerPool::new(
        durable.clone(),
        registry,
        Arc::new(SchedulerHandoff::new(scheduler.clone())),
        handoff_rx,
        scheduler.shutdown_token(),
        WorkerPoolConfig {
            worker_count: config.worker_count,
            retry_base_delay: config.retry_base_delay,
        },
    );
    let worker_handles = worker_pool.spawn();

    let ingress = Arc::new(IngressAdapter::new(durable, scheduler.clone(), config.max_attempts));
    let state = AppState { ingress };
    let app = app::build_app(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind listen address")?;
    tracing::info!(addr = %addr, "listening");

    let (http_shutdown_tx, http_shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = http_shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    tracing::info!("shutdown signal received, draining http, scheduler, and worker pool");
    let _ = http_shutdown_tx.send(());
    scheduler.shutdown();

    // 5s bound on HTTP shutdown (spec.md §5); no bound on the scheduler-loop
    // or worker-pool drain below.
    match tokio::time::timeout(Duration::from_secs(5), server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "http server returned an error"),
        Ok(Err(e)) => tracing::error!(error = %e, "http server task panicked"),
        Err(_) => tracing::warn!("http server did not finish draining within the 5s grace period"),
    }

    let _ = timer_handle.await;
    let _ = ready_pop_handle.await;
    for handle in worker_handles {
        let _ = handle.await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
