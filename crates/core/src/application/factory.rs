// Queue Factory
// Builds backing-engine queues from the service configuration

use crate::domain::ServiceConfig;
use crate::error::{AppError, Result};
use crate::port::{ConnectionErrorCallback, EngineError, EngineQueue, QueueEngine};
use std::sync::Arc;
use tracing::{error, info};

/// Creates engine queues with the service-wide connection and queue options
pub struct QueueFactory {
    engine: Arc<dyn QueueEngine>,
    config: ServiceConfig,
}

impl QueueFactory {
    pub fn new(engine: Arc<dyn QueueEngine>, config: ServiceConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Create a new engine queue named `name`
    ///
    /// The connection is passed to the engine separately from the queue
    /// options. A connection-error observer is attached before the queue is
    /// returned; it only logs.
    ///
    /// # Errors
    /// - AppError::Config if the configuration is incomplete
    /// - AppError::QueueCreation if the engine rejects construction (not retried)
    pub async fn create(&self, name: &str) -> Result<Arc<dyn EngineQueue>> {
        let resolved = self.config.resolve()?;

        let queue = self
            .engine
            .create_queue(name, &resolved.connection, &resolved.queue_options)
            .await
            .map_err(|source| {
                error!(queue = %name, error = %source, "Queue construction rejected by engine");
                AppError::QueueCreation {
                    queue: name.to_string(),
                    source,
                }
            })?;

        queue.on_connection_error(connection_observer(name));

        info!(
            queue = %name,
            prefix = %resolved.queue_options.prefix,
            "Queue created"
        );

        Ok(queue)
    }
}

fn connection_observer(name: &str) -> ConnectionErrorCallback {
    let queue = name.to_string();
    Arc::new(move |err: &EngineError| {
        error!(queue = %queue, error = %err, "Backing store connection error");
    })
}
