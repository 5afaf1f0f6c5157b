//! Configuration loading
//!
//! Layers, lowest precedence first: built-in defaults, an optional
//! `molecq.toml` (or the file named by `MOLECQ_CONFIG`), then `MOLECQ_*`
//! environment variables with `__` separating nested keys.
//!
//! ```text
//! MOLECQ_JOB_PREFIX=orders \
//! MOLECQ_CONNECTION__HOST=localhost \
//! MOLECQ_SHUTDOWN=await_all \
//!     ./molecq
//! ```

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use molecq_core::domain::{ServiceConfig, DEFAULT_JOB_NAME};

const DEFAULT_CONFIG_FILE: &str = "molecq";

pub fn load() -> Result<ServiceConfig> {
    let file = std::env::var("MOLECQ_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

    let settings = Config::builder()
        .set_default("job_name", DEFAULT_JOB_NAME)?
        .add_source(File::with_name(&file).required(false))
        .add_source(
            Environment::with_prefix("MOLECQ")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to read configuration")?;

    parse(settings)
}

fn parse(settings: Config) -> Result<ServiceConfig> {
    settings
        .try_deserialize::<ServiceConfig>()
        .context("invalid configuration")
}
