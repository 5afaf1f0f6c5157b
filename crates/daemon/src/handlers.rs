// Demo queue handlers and the context they share

use molecq_core::application::QueueDeclaration;
use molecq_core::domain::Job;
use molecq_core::port::{handler_fn, HandlerError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

pub const EMAILS_QUEUE: &str = "emails";
pub const REPORTS_QUEUE: &str = "reports";

/// State every handler runs against
#[derive(Debug, Default)]
pub struct AppContext {
    emails_sent: AtomicUsize,
    reports_built: AtomicUsize,
}

impl AppContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emails_sent(&self) -> usize {
        self.emails_sent.load(Ordering::SeqCst)
    }

    pub fn reports_built(&self) -> usize {
        self.reports_built.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Deserialize)]
struct EmailPayload {
    to: String,
    #[serde(default)]
    subject: String,
}

#[derive(Debug, Deserialize)]
struct ReportPayload {
    report: String,
}

pub fn declarations() -> Vec<QueueDeclaration<AppContext>> {
    vec![
        QueueDeclaration::new(
            EMAILS_QUEUE,
            handler_fn(|ctx: Arc<AppContext>, job: Job| async move {
                let email: EmailPayload = serde_json::from_value(job.payload.into_value())?;
                if email.to.is_empty() {
                    return Err(HandlerError::failed("missing recipient"));
                }
                ctx.emails_sent.fetch_add(1, Ordering::SeqCst);
                info!(job_id = %job.id, to = %email.to, subject = %email.subject, "Email sent");
                Ok(())
            }),
        ),
        QueueDeclaration::new(
            REPORTS_QUEUE,
            handler_fn(|ctx: Arc<AppContext>, job: Job| async move {
                let report: ReportPayload = serde_json::from_value(job.payload.into_value())?;
                ctx.reports_built.fetch_add(1, Ordering::SeqCst);
                info!(job_id = %job.id, report = %report.report, "Report built");
                Ok::<(), HandlerError>(())
            }),
        ),
    ]
}

pub fn demo_jobs() -> Vec<(&'static str, Value)> {
    vec![
        (EMAILS_QUEUE, json!({ "to": "ops@example.com", "subject": "molecq is up" })),
        (REPORTS_QUEUE, json!({ "report": "daily" })),
    ]
}
