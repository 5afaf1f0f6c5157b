// Job Domain Model

use crate::domain::options::JobOptions;
use serde::{Deserialize, Serialize};

/// Job ID as assigned by the backing engine
pub type JobId = String;

/// Job Payload (JSON serializable, opaque to this layer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for JobPayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// A dequeued job as handed to a consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: String,
    pub payload: JobPayload,
    pub options: JobOptions,
    /// Attempts the engine has already made before this delivery
    pub attempts_made: u32,
}

/// Pending-job handle returned by the engine's add operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnqueuedJob {
    pub id: JobId,
    pub queue: String,
    pub options: JobOptions,
    pub timestamp_ms: i64, // epoch ms
}
