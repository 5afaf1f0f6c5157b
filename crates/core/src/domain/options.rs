// Job Submission Options

use serde::{Deserialize, Serialize};

/// What the backing engine does with a job record once it reaches a terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemovePolicy {
    /// `true` purges the record, `false` keeps every record
    Remove(bool),
    /// Keep only the N most recent records
    KeepLast(u64),
}

/// Backoff strategy kind, interpreted by the backing engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

/// Backoff settings (nested option, merged field by field)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backoff {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub kind: Option<BackoffKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl Backoff {
    fn with_defaults(self, defaults: &Backoff) -> Backoff {
        Backoff {
            kind: self.kind.or(defaults.kind),
            delay_ms: self.delay_ms.or(defaults.delay_ms),
        }
    }
}

/// Options for a single job submission.
///
/// Every field is optional so a caller-set value can always be told apart
/// from an inherited default. Retry, delay and removal semantics belong to
/// the backing engine; these values are forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<Backoff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_on_complete: Option<RemovePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_on_fail: Option<RemovePolicy>,
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn lifo(mut self, lifo: bool) -> Self {
        self.lifo = Some(lifo);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn remove_on_complete(mut self, policy: RemovePolicy) -> Self {
        self.remove_on_complete = Some(policy);
        self
    }

    pub fn remove_on_fail(mut self, policy: RemovePolicy) -> Self {
        self.remove_on_fail = Some(policy);
        self
    }

    /// Deep-merge `defaults` under `self`.
    ///
    /// Fields set on `self` always win; unset fields are filled from
    /// `defaults`. Nested `backoff` is merged per field, so a caller that
    /// only sets `backoff.delay_ms` still inherits the default kind.
    pub fn with_defaults(self, defaults: &JobOptions) -> JobOptions {
        let backoff = match (self.backoff, &defaults.backoff) {
            (Some(own), Some(fallback)) => Some(own.with_defaults(fallback)),
            (Some(own), None) => Some(own),
            (None, fallback) => fallback.clone(),
        };

        JobOptions {
            priority: self.priority.or(defaults.priority),
            delay_ms: self.delay_ms.or(defaults.delay_ms),
            attempts: self.attempts.or(defaults.attempts),
            backoff,
            lifo: self.lifo.or(defaults.lifo),
            timeout_ms: self.timeout_ms.or(defaults.timeout_ms),
            job_id: self.job_id.or_else(|| defaults.job_id.clone()),
            remove_on_complete: self.remove_on_complete.or(defaults.remove_on_complete),
            remove_on_fail: self.remove_on_fail.or(defaults.remove_on_fail),
        }
    }
}
