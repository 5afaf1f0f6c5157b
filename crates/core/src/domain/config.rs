// Service Configuration

use crate::domain::options::JobOptions;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Default job name, first segment of every queue prefix
pub const DEFAULT_JOB_NAME: &str = "molecQueues";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 6379;

/// Backing-store connection parameters
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub db: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            db: 0,
            password: None,
        }
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

// Password never reaches the logs
impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Queue rate limiter, enforced by the backing engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub max: u32,
    pub duration_ms: u64,
}

/// Queue-level defaults supplied by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Overrides the composed `<job_name>:<job_prefix>` prefix when set
    pub prefix: Option<String>,
    pub default_job_options: JobOptions,
    pub limiter: Option<RateLimit>,
    pub stalled_interval_ms: Option<u64>,
    pub max_stalled_count: Option<u32>,
}

/// Queue configuration handed to the engine (connection excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueOptions {
    pub prefix: String,
    pub default_job_options: JobOptions,
    pub limiter: Option<RateLimit>,
    pub stalled_interval_ms: Option<u64>,
    pub max_stalled_count: Option<u32>,
}

/// How `stop` treats the per-queue drain requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownStrategy {
    /// Spawn every drain and return immediately
    #[default]
    FireAndForget,
    /// Wait for every drain and report the outcome
    AwaitAll,
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub job_name: String,
    pub job_prefix: Option<String>,
    pub connection: Option<ConnectionParams>,
    pub queue: QueueSettings,
    pub shutdown: ShutdownStrategy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            job_name: DEFAULT_JOB_NAME.to_string(),
            job_prefix: None,
            connection: None,
            queue: QueueSettings::default(),
            shutdown: ShutdownStrategy::default(),
        }
    }
}

/// Configuration after startup validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub connection: ConnectionParams,
    pub queue_options: QueueOptions,
}

impl ServiceConfig {
    pub fn new(job_prefix: impl Into<String>, connection: ConnectionParams) -> Self {
        Self {
            job_prefix: Some(job_prefix.into()),
            connection: Some(connection),
            ..Default::default()
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownStrategy) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Validate required fields and split the connection from queue options
    ///
    /// # Errors
    /// `AppError::Config` when the job prefix is missing or blank, or when no
    /// connection parameters are configured.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let job_prefix = self
            .job_prefix
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AppError::Config("molecq required a prefix name".to_string()))?;

        let connection = self
            .connection
            .clone()
            .ok_or_else(|| AppError::Config("molecq required a connection to work".to_string()))?;

        let prefix = self
            .queue
            .prefix
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.job_name, job_prefix));

        Ok(ResolvedConfig {
            connection,
            queue_options: QueueOptions {
                prefix,
                default_job_options: self.queue.default_job_options.clone(),
                limiter: self.queue.limiter.clone(),
                stalled_interval_ms: self.queue.stalled_interval_ms,
                max_stalled_count: self.queue.max_stalled_count,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_composes_prefix() {
        let config = ServiceConfig::new("orders", ConnectionParams::default());
        let resolved = config.resolve().unwrap();

        assert_eq!(resolved.queue_options.prefix, "molecQueues:orders");
        assert_eq!(resolved.connection.port, 6379);
    }

    #[test]
    fn test_resolve_queue_prefix_override() {
        let mut config = ServiceConfig::new("orders", ConnectionParams::default());
        config.job_name = "billing".to_string();
        config.queue.prefix = Some("custom".to_string());

        assert_eq!(config.resolve().unwrap().queue_options.prefix, "custom");
    }

    #[test]
    fn test_resolve_missing_prefix() {
        let config = ServiceConfig {
            connection: Some(ConnectionParams::default()),
            ..Default::default()
        };

        let err = config.resolve().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("prefix"));
    }

    #[test]
    fn test_resolve_blank_prefix() {
        let config = ServiceConfig::new("   ", ConnectionParams::default());
        assert!(matches!(config.resolve(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_resolve_keeps_prefix_verbatim() {
        let config = ServiceConfig::new(" orders ", ConnectionParams::default());
        let resolved = config.resolve().unwrap();

        assert_eq!(resolved.queue_options.prefix, "molecQueues: orders ");
    }

    #[test]
    fn test_resolve_missing_connection() {
        let config = ServiceConfig {
            job_prefix: Some("orders".to_string()),
            ..Default::default()
        };

        let err = config.resolve().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("connection"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut params = ConnectionParams::new("redis.internal", 6380);
        params.password = Some("hunter2".to_string());

        let printed = format!("{:?}", params);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{"job_prefix": "orders", "connection": {"host": "cache"}, "shutdown": "await_all"}"#,
        )
        .unwrap();

        assert_eq!(config.job_name, DEFAULT_JOB_NAME);
        assert_eq!(config.connection.unwrap().port, DEFAULT_PORT);
        assert_eq!(config.shutdown, ShutdownStrategy::AwaitAll);
    }
}
