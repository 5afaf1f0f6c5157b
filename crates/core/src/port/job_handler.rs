// Job Handler Port
// Host-supplied consumer logic, bound to an explicit context object

use crate::domain::Job;
use crate::port::queue_engine::JobConsumer;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a handler back to the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Job failed: {0}")]
    Failed(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::InvalidPayload(err.to_string())
    }
}

/// Job handler with access to the owning service's context `C`
#[async_trait]
pub trait JobHandler<C>: Send + Sync {
    async fn handle(&self, ctx: Arc<C>, job: Job) -> Result<(), HandlerError>;
}

/// Handler backed by a closure
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<C, F, Fut> JobHandler<C> for FnHandler<F>
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Job) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, ctx: Arc<C>, job: Job) -> Result<(), HandlerError> {
        (self.f)(ctx, job).await
    }
}

/// Wrap a closure as a shareable handler
///
/// # Example
/// ```text
/// let handler = handler_fn(|ctx: Arc<AppContext>, job: Job| async move {
///     ctx.mailer.send(job.payload.as_value()).await?;
///     Ok(())
/// });
/// ```
pub fn handler_fn<C, F, Fut>(f: F) -> Arc<dyn JobHandler<C>>
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// A handler paired with the context it runs against.
///
/// This is what gets registered with the engine: every delivered job reaches
/// the handler together with the same `Arc<C>`.
pub struct BoundHandler<C> {
    handler: Arc<dyn JobHandler<C>>,
    context: Arc<C>,
}

impl<C> BoundHandler<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(handler: Arc<dyn JobHandler<C>>, context: Arc<C>) -> Self {
        Self { handler, context }
    }
}

#[async_trait]
impl<C> JobConsumer for BoundHandler<C>
where
    C: Send + Sync + 'static,
{
    async fn consume(&self, job: Job) -> Result<(), HandlerError> {
        self.handler.handle(Arc::clone(&self.context), job).await
    }
}
