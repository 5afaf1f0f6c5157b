// Dispatch Controller
// Lifecycle orchestration: validate, bind declared handlers, drain on stop

use crate::application::factory::QueueFactory;
use crate::application::handle::{QueueDeclaration, QueueHandle};
use crate::application::registry::QueueRegistry;
use crate::application::submit;
use crate::domain::{EnqueuedJob, JobOptions, JobPayload, ServiceConfig, ShutdownStrategy};
use crate::error::{AppError, Result};
use crate::port::{BoundHandler, EngineQueue, JobConsumer, QueueEngine};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Service lifecycle: Created -> Started -> Stopped (terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Started,
    Stopped,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Created => write!(f, "CREATED"),
            ServiceState::Started => write!(f, "STARTED"),
            ServiceState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// A drain that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainFailure {
    pub queue: String,
    pub error: String,
}

/// Outcome of `stop`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReport {
    /// Drains were spawned and may still be running
    Detached { requested: usize },
    /// Every drain finished; failures are listed, never escalated
    Completed {
        drained: Vec<String>,
        failed: Vec<DrainFailure>,
    },
}

/// Queue service: owns the registry, binds declared handlers on start and
/// drains every registered queue on stop.
///
/// `C` is the explicit context handed to every bound handler.
pub struct QueueService<C> {
    registry: QueueRegistry<C>,
    declarations: Vec<QueueDeclaration<C>>,
    context: Arc<C>,
    state: watch::Sender<ServiceState>,
    bound: Mutex<HashSet<String>>,
    // Serializes start/stop
    lifecycle: Mutex<()>,
}

impl<C> QueueService<C>
where
    C: Send + Sync + 'static,
{
    /// Create the service with an empty registry (no queue is built yet)
    ///
    /// # Arguments
    /// * `config` - Service configuration (validated on `start`)
    /// * `engine` - Backing queue engine
    /// * `context` - Context passed to every handler
    /// * `declarations` - Host-declared queues, processed in order on `start`
    pub fn new(
        config: ServiceConfig,
        engine: Arc<dyn QueueEngine>,
        context: Arc<C>,
        declarations: Vec<QueueDeclaration<C>>,
    ) -> Self {
        let (state, _) = watch::channel(ServiceState::Created);
        debug!(
            job_name = %config.job_name,
            declarations = declarations.len(),
            "Queue service created"
        );

        Self {
            registry: QueueRegistry::new(QueueFactory::new(engine, config)),
            declarations,
            context,
            state,
            bound: Mutex::new(HashSet::new()),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn state(&self) -> ServiceState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ServiceState> {
        self.state.subscribe()
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    pub fn registry(&self) -> &QueueRegistry<C> {
        &self.registry
    }

    pub fn config(&self) -> &ServiceConfig {
        self.registry.factory().config()
    }

    /// Validate configuration and bind every declared handler.
    ///
    /// Declarations without a name or a handler are skipped silently, as are
    /// repeated names (the first declaration wins). Completes once every
    /// binding is registered; it does not wait for any job.
    ///
    /// # Errors
    /// - AppError::InvalidState if the service is not in `Created`
    /// - AppError::Config before any queue is created, if configuration is incomplete
    /// - AppError::QueueCreation / AppError::Engine abort the whole start (no rollback)
    pub async fn start(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        self.expect_state(ServiceState::Created, "start")?;

        self.config().resolve()?;

        let mut bound = self.bound.lock().await;
        for (index, declaration) in self.declarations.iter().enumerate() {
            let (name, handler) = match (declaration.valid_name(), declaration.handler.as_ref()) {
                (Some(name), Some(handler)) => (name, handler),
                _ => {
                    debug!(index, "Skipping incomplete queue declaration");
                    continue;
                }
            };

            if bound.contains(name) {
                debug!(index, queue = %name, "Skipping duplicate queue declaration");
                continue;
            }

            let queue = self.registry.get_or_create(name).await?;

            let consumer: Arc<dyn JobConsumer> = Arc::new(BoundHandler::new(
                Arc::clone(handler),
                Arc::clone(&self.context),
            ));
            queue.process(consumer).await?;
            self.registry.bind_handler(name, Arc::clone(handler)).await;
            bound.insert(name.to_string());

            info!(queue = %name, prefix = %queue.prefix(), "Handler bound");
        }

        self.state.send_replace(ServiceState::Started);
        info!(queues = bound.len(), "Queue service started");
        Ok(())
    }

    /// Drain and destroy every registered queue, declared or not.
    ///
    /// A failed drain never blocks the others and is never fatal. With
    /// `ShutdownStrategy::FireAndForget` the drains are spawned and this
    /// returns before they finish.
    ///
    /// # Errors
    /// - AppError::InvalidState if the service is already stopped
    pub async fn stop(&self) -> Result<ShutdownReport> {
        let _guard = self.lifecycle.lock().await;
        if self.state() == ServiceState::Stopped {
            return Err(AppError::InvalidState(
                "queue service already stopped".to_string(),
            ));
        }
        self.state.send_replace(ServiceState::Stopped);

        let handles = self.registry.close().await;
        let report = match self.config().shutdown {
            ShutdownStrategy::FireAndForget => detach_drains(handles),
            ShutdownStrategy::AwaitAll => await_drains(handles).await,
        };

        info!(report = ?report, "Queue service stopped");
        Ok(report)
    }

    /// Registered handle for `name`, if any
    pub async fn get_job_queue(&self, name: &str) -> Option<QueueHandle<C>> {
        self.registry.find(name).await
    }

    /// Submit a job to an existing queue.
    ///
    /// Returns `Ok(None)` when no queue named `name` exists; callers must
    /// check. Caller options override `removeOnComplete`/`removeOnFail`
    /// defaults key by key.
    pub async fn add_job_queue(
        &self,
        name: &str,
        payload: impl Into<JobPayload>,
        options: JobOptions,
    ) -> Result<Option<EnqueuedJob>> {
        self.reject_when_stopped("submit a job")?;
        submit::execute(&self.registry, name, payload.into(), options).await
    }

    /// Return the queue for `declaration`, creating it if needed.
    ///
    /// No consumer is bound here and the declaration's handler is not
    /// recorded; only `start` binds handlers.
    ///
    /// # Errors
    /// - AppError::Validation if the declaration has no name
    /// - AppError::InvalidState once `stop` has begun
    pub async fn get_queue(
        &self,
        declaration: &QueueDeclaration<C>,
    ) -> Result<Arc<dyn EngineQueue>> {
        self.reject_when_stopped("create a queue")?;
        let name = declaration.valid_name().ok_or_else(|| {
            AppError::Validation("queue declaration requires a name".to_string())
        })?;

        self.registry.get_or_create(name).await
    }

    fn expect_state(&self, expected: ServiceState, action: &str) -> Result<()> {
        let current = self.state();
        if current != expected {
            return Err(AppError::InvalidState(format!(
                "cannot {} queue service in state {}",
                action, current
            )));
        }
        Ok(())
    }

    fn reject_when_stopped(&self, action: &str) -> Result<()> {
        if self.state() == ServiceState::Stopped {
            return Err(AppError::InvalidState(format!(
                "cannot {} after the queue service stopped",
                action
            )));
        }
        Ok(())
    }
}

fn detach_drains<C>(handles: Vec<QueueHandle<C>>) -> ShutdownReport {
    let requested = handles.len();
    for handle in handles {
        let name = handle.name().to_string();
        let queue = Arc::clone(handle.queue());
        tokio::spawn(async move {
            match queue.obliterate().await {
                Ok(()) => info!(queue = %name, "Queue removed"),
                Err(e) => warn!(queue = %name, error = %e, "Queue drain failed"),
            }
        });
    }
    ShutdownReport::Detached { requested }
}

async fn await_drains<C>(handles: Vec<QueueHandle<C>>) -> ShutdownReport {
    let results = join_all(handles.iter().map(|handle| async move {
        (handle.name().to_string(), handle.queue().obliterate().await)
    }))
    .await;

    let mut drained = Vec::new();
    let mut failed = Vec::new();
    for (name, result) in results {
        match result {
            Ok(()) => {
                info!(queue = %name, "Queue removed");
                drained.push(name);
            }
            Err(e) => {
                warn!(queue = %name, error = %e, "Queue drain failed");
                failed.push(DrainFailure {
                    queue: name,
                    error: e.to_string(),
                });
            }
        }
    }

    ShutdownReport::Completed { drained, failed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionParams, Job, RemovePolicy};
    use crate::port::handler_fn;
    use crate::port::queue_engine::mocks::MockQueueEngine;
    use crate::port::JobHandler;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct AppContext {
        handled: AtomicUsize,
    }

    fn counting_handler() -> Arc<dyn JobHandler<AppContext>> {
        handler_fn(|ctx: Arc<AppContext>, _job: Job| async move {
            ctx.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn config() -> ServiceConfig {
        ServiceConfig::new("orders", ConnectionParams::default())
    }

    fn service(
        engine: Arc<MockQueueEngine>,
        config: ServiceConfig,
        declarations: Vec<QueueDeclaration<AppContext>>,
    ) -> QueueService<AppContext> {
        QueueService::new(config, engine, Arc::new(AppContext::default()), declarations)
    }

    fn job(queue: &str) -> Job {
        Job {
            id: "job-1".to_string(),
            queue: queue.to_string(),
            payload: JobPayload::new(json!({})),
            options: JobOptions::default(),
            attempts_made: 0,
        }
    }

    #[tokio::test]
    async fn test_created_state_has_empty_registry() {
        let engine = Arc::new(MockQueueEngine::new());
        let service = service(engine.clone(), config(), vec![]);

        assert_eq!(service.state(), ServiceState::Created);
        assert!(service.registry().is_empty().await);
        assert_eq!(engine.create_count(), 0);
    }

    #[tokio::test]
    async fn test_start_without_prefix_fails_before_any_queue() {
        let engine = Arc::new(MockQueueEngine::new());
        let config = ServiceConfig {
            connection: Some(ConnectionParams::default()),
            ..Default::default()
        };
        let service = service(
            engine.clone(),
            config,
            vec![QueueDeclaration::new("emails", counting_handler())],
        );

        let err = service.start().await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(engine.create_count(), 0);
        assert_eq!(service.state(), ServiceState::Created);
    }

    #[tokio::test]
    async fn test_start_without_connection_fails_before_any_queue() {
        let engine = Arc::new(MockQueueEngine::new());
        let config = ServiceConfig {
            job_prefix: Some("orders".to_string()),
            ..Default::default()
        };
        let service = service(
            engine.clone(),
            config,
            vec![QueueDeclaration::new("emails", counting_handler())],
        );

        let err = service.start().await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(engine.create_count(), 0);
    }

    #[tokio::test]
    async fn test_start_skips_incomplete_declarations() {
        let engine = Arc::new(MockQueueEngine::new());
        let declarations = vec![
            QueueDeclaration {
                name: None,
                handler: Some(counting_handler()),
            },
            QueueDeclaration::named("no-handler"),
            QueueDeclaration {
                name: Some(String::new()),
                handler: Some(counting_handler()),
            },
            QueueDeclaration::new("emails", counting_handler()),
        ];
        let service = service(engine.clone(), config(), declarations);

        service.start().await.unwrap();

        assert_eq!(service.state(), ServiceState::Started);
        assert_eq!(engine.create_count(), 1);
        assert!(engine.queue("emails").unwrap().has_consumer());
        assert!(service.get_job_queue("no-handler").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_declaration_reuses_handle() {
        let engine = Arc::new(MockQueueEngine::new());
        let first = counting_handler();
        let declarations = vec![
            QueueDeclaration::new("emails", Arc::clone(&first)),
            QueueDeclaration::new("emails", counting_handler()),
        ];
        let service = service(engine.clone(), config(), declarations);

        service.start().await.unwrap();

        assert_eq!(engine.create_count(), 1);
        let handle = service.get_job_queue("emails").await.unwrap();
        assert!(Arc::ptr_eq(handle.handler().unwrap(), &first));
    }

    #[tokio::test]
    async fn test_bound_handler_runs_against_service_context() {
        let engine = Arc::new(MockQueueEngine::new());
        let service = service(
            engine.clone(),
            config(),
            vec![QueueDeclaration::new("emails", counting_handler())],
        );
        service.start().await.unwrap();

        let mock = engine.queue("emails").unwrap();
        mock.deliver(job("emails")).await.unwrap().unwrap();
        mock.deliver(job("emails")).await.unwrap().unwrap();

        assert_eq!(service.context().handled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_creation_failure_aborts_start() {
        let engine = Arc::new(MockQueueEngine::new());
        engine.reject("broken");
        let declarations = vec![
            QueueDeclaration::new("emails", counting_handler()),
            QueueDeclaration::new("broken", counting_handler()),
            QueueDeclaration::new("reports", counting_handler()),
        ];
        let service = service(engine.clone(), config(), declarations);

        let err = service.start().await.unwrap_err();
        assert_eq!(err.to_string(), "Task can't start broken");
        assert!(engine.queue("reports").is_none());
        assert_eq!(service.state(), ServiceState::Created);
    }

    #[tokio::test]
    async fn test_start_twice_is_invalid() {
        let engine = Arc::new(MockQueueEngine::new());
        let service = service(engine, config(), vec![]);

        tokio_test::assert_ok!(service.start().await);
        assert!(matches!(
            service.start().await,
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_get_queue_creates_without_binding() {
        let engine = Arc::new(MockQueueEngine::new());
        let service = service(engine.clone(), config(), vec![]);
        service.start().await.unwrap();

        let queue = service
            .get_queue(&QueueDeclaration::named("adhoc"))
            .await
            .unwrap();
        let again = service
            .get_queue(&QueueDeclaration::named("adhoc"))
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&queue, &again));
        assert_eq!(engine.create_count(), 1);
        assert!(!engine.queue("adhoc").unwrap().has_consumer());
    }

    #[tokio::test]
    async fn test_get_queue_requires_name() {
        let engine = Arc::new(MockQueueEngine::new());
        let service = service(engine, config(), vec![]);

        let declaration = QueueDeclaration {
            name: None,
            handler: Some(counting_handler()),
        };
        assert!(matches!(
            service.get_queue(&declaration).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_queue_created_before_start_gets_bound() {
        let engine = Arc::new(MockQueueEngine::new());
        let service = service(
            engine.clone(),
            config(),
            vec![QueueDeclaration::new("emails", counting_handler())],
        );

        service
            .get_queue(&QueueDeclaration::named("emails"))
            .await
            .unwrap();
        service.start().await.unwrap();

        assert_eq!(engine.create_count(), 1);
        assert!(engine.queue("emails").unwrap().has_consumer());
        let handle = service.get_job_queue("emails").await.unwrap();
        assert!(handle.handler().is_some());
    }

    #[tokio::test]
    async fn test_handle_reports_the_bound_handler() {
        let engine = Arc::new(MockQueueEngine::new());
        let declared = counting_handler();
        let bound = counting_handler();
        let service = service(
            engine.clone(),
            config(),
            vec![QueueDeclaration::new("emails", Arc::clone(&bound))],
        );

        service
            .get_queue(&QueueDeclaration::new("emails", Arc::clone(&declared)))
            .await
            .unwrap();
        let handle = service.get_job_queue("emails").await.unwrap();
        assert!(handle.handler().is_none());

        service.start().await.unwrap();

        let handle = service.get_job_queue("emails").await.unwrap();
        assert!(Arc::ptr_eq(handle.handler().unwrap(), &bound));
        engine
            .queue("emails")
            .unwrap()
            .deliver(job("emails"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(service.context().handled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_state_transitions_are_observable() {
        let engine = Arc::new(MockQueueEngine::new());
        let service = service(engine, config(), vec![]);
        let mut states = service.subscribe_state();
        assert_eq!(*states.borrow(), ServiceState::Created);

        service.start().await.unwrap();
        tokio_test::assert_ok!(states.changed().await);
        assert_eq!(*states.borrow_and_update(), ServiceState::Started);

        service.stop().await.unwrap();
        tokio_test::assert_ok!(states.changed().await);
        assert_eq!(*states.borrow_and_update(), ServiceState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_get_queue_racing_stop_is_drained_or_refused() {
        let engine = Arc::new(MockQueueEngine::with_create_delay(Duration::from_millis(5)));
        let service = Arc::new(service(
            engine.clone(),
            config().with_shutdown(ShutdownStrategy::AwaitAll),
            vec![],
        ));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let service = Arc::clone(&service);
            tasks.push(tokio::spawn(async move {
                service
                    .get_queue(&QueueDeclaration::named(format!("adhoc-{}", i)))
                    .await
            }));
        }
        tokio::time::sleep(Duration::from_millis(12)).await;
        let report = service.stop().await.unwrap();

        let mut created = Vec::new();
        for (i, task) in tasks.into_iter().enumerate() {
            match task.await.unwrap() {
                Ok(_) => created.push(format!("adhoc-{}", i)),
                Err(e) => assert!(matches!(e, AppError::InvalidState(_))),
            }
        }

        match report {
            ShutdownReport::Completed { mut drained, failed } => {
                drained.sort();
                created.sort();
                assert_eq!(drained, created);
                assert!(failed.is_empty());
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_add_job_queue_merges_defaults() {
        let engine = Arc::new(MockQueueEngine::new());
        let service = service(
            engine.clone(),
            config(),
            vec![QueueDeclaration::new("emails", counting_handler())],
        );
        service.start().await.unwrap();

        let job = service
            .add_job_queue("emails", json!({"to": "a@b.com"}), JobOptions::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(job.options.remove_on_complete, Some(RemovePolicy::Remove(true)));
        assert_eq!(job.options.remove_on_fail, Some(RemovePolicy::Remove(true)));
        assert!(service
            .add_job_queue("missing", json!({}), JobOptions::new())
            .await
            .unwrap()
            .is_none());
        assert_eq!(engine.total_adds(), 1);
    }

    #[tokio::test]
    async fn test_stop_await_all_drains_every_queue() {
        let engine = Arc::new(MockQueueEngine::new());
        let config = config().with_shutdown(ShutdownStrategy::AwaitAll);
        let service = service(
            engine.clone(),
            config,
            vec![
                QueueDeclaration::new("emails", counting_handler()),
                QueueDeclaration::new("reports", counting_handler()),
            ],
        );
        service.start().await.unwrap();
        service
            .get_queue(&QueueDeclaration::named("adhoc"))
            .await
            .unwrap();

        let report = service.stop().await.unwrap();

        assert_eq!(
            report,
            ShutdownReport::Completed {
                drained: vec!["emails".into(), "reports".into(), "adhoc".into()],
                failed: vec![],
            }
        );
        for name in ["emails", "reports", "adhoc"] {
            assert_eq!(engine.queue(name).unwrap().obliterate_count(), 1);
        }
        assert_eq!(service.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_failed_drain_does_not_block_others() {
        let engine = Arc::new(MockQueueEngine::new());
        engine.fail_obliterate("emails");
        let config = config().with_shutdown(ShutdownStrategy::AwaitAll);
        let service = service(
            engine.clone(),
            config,
            vec![
                QueueDeclaration::new("emails", counting_handler()),
                QueueDeclaration::new("reports", counting_handler()),
            ],
        );
        service.start().await.unwrap();

        let report = service.stop().await.unwrap();

        match report {
            ShutdownReport::Completed { drained, failed } => {
                assert_eq!(drained, vec!["reports".to_string()]);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].queue, "emails");
            }
            other => panic!("unexpected report: {:?}", other),
        }
        assert_eq!(engine.queue("reports").unwrap().obliterate_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_fire_and_forget_detaches() {
        let engine = Arc::new(MockQueueEngine::new());
        let service = service(
            engine.clone(),
            config(),
            vec![QueueDeclaration::new("emails", counting_handler())],
        );
        service.start().await.unwrap();

        let report = service.stop().await.unwrap();
        assert_eq!(report, ShutdownReport::Detached { requested: 1 });

        // Let the spawned drain run
        for _ in 0..10 {
            if engine.queue("emails").unwrap().obliterate_count() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.queue("emails").unwrap().obliterate_count(), 1);
    }

    #[tokio::test]
    async fn test_after_stop_submission_and_creation_rejected() {
        let engine = Arc::new(MockQueueEngine::new());
        let service = service(
            engine.clone(),
            config().with_shutdown(ShutdownStrategy::AwaitAll),
            vec![QueueDeclaration::new("emails", counting_handler())],
        );
        service.start().await.unwrap();
        service.stop().await.unwrap();

        assert!(matches!(
            service
                .add_job_queue("emails", json!({}), JobOptions::new())
                .await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            service.get_queue(&QueueDeclaration::named("late")).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(service.stop().await, Err(AppError::InvalidState(_))));
        assert_eq!(engine.total_adds(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_start_drains_adhoc_queues() {
        let engine = Arc::new(MockQueueEngine::new());
        let service = service(
            engine.clone(),
            config().with_shutdown(ShutdownStrategy::AwaitAll),
            vec![],
        );
        service
            .get_queue(&QueueDeclaration::named("adhoc"))
            .await
            .unwrap();

        service.stop().await.unwrap();
        assert_eq!(engine.queue("adhoc").unwrap().obliterate_count(), 1);
    }
}
