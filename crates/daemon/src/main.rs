//! molecq - Main Entry Point
//! Queue service host running against the in-memory engine

mod config;
mod handlers;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use molecq_core::application::{QueueService, ShutdownReport};
use molecq_core::domain::{ConnectionParams, JobOptions};
use molecq_infra_memory::MemoryEngine;

use crate::handlers::{declarations, AppContext};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_JOB_PREFIX: &str = "local";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("MOLECQ_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("molecq=info"))?;

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("molecq v{} starting...", VERSION);

    // 2. Load configuration
    let mut service_config = config::load()?;

    // The in-memory engine never dials out, so local runs get working defaults
    if service_config.job_prefix.is_none() {
        service_config.job_prefix = Some(DEFAULT_JOB_PREFIX.to_string());
    }
    if service_config.connection.is_none() {
        service_config.connection = Some(ConnectionParams::default());
    }

    info!(
        job_name = %service_config.job_name,
        job_prefix = ?service_config.job_prefix,
        shutdown = ?service_config.shutdown,
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let engine = Arc::new(MemoryEngine::new());
    let context = Arc::new(AppContext::new());
    let service = QueueService::new(
        service_config,
        engine.clone(),
        context.clone(),
        declarations(),
    );

    // 4. Bind handlers
    service
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Queue service start failed: {}", e))?;

    // 5. Seed a few jobs
    for (queue, payload) in handlers::demo_jobs() {
        match service
            .add_job_queue(queue, payload, JobOptions::default())
            .await?
        {
            Some(job) => info!(queue = %queue, job_id = %job.id, "Demo job submitted"),
            None => warn!(queue = %queue, "Demo queue not registered"),
        }
    }

    info!("System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    match service.stop().await? {
        ShutdownReport::Detached { requested } => {
            info!(requested, "Queue drains requested");
        }
        ShutdownReport::Completed { drained, failed } => {
            info!(drained = drained.len(), failed = failed.len(), "Queue drains finished");
        }
    }

    info!(
        emails = context.emails_sent(),
        reports = context.reports_built(),
        "Shutdown complete."
    );

    Ok(())
}
