use std::{env, str::FromStr, time::Duration};

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|val| val.parse::<T>().ok())
        .unwrap_or(default)
}

/// A config of [`CascadeExecutor`](crate::CascadeExecutor).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadeConfig {
    /// 10 passes by default.
    pub max_passes: usize,
    /// 3 seconds by default.
    pub script_timeout: Duration,
    /// 1 hour by default.
    pub error_retention: Duration,
    /// 25 entities per cascade by default.
    pub max_created_entities: usize,
}

impl CascadeConfig {
    pub fn new() -> Self {
        let defaults = Self::default();

        Self {
            max_passes: env_or("CASCADE_MAX_PASSES", defaults.max_passes),
            script_timeout: Duration::from_millis(env_or(
                "CASCADE_SCRIPT_TIMEOUT_MS",
                defaults.script_timeout.as_millis() as u64,
            )),
            error_retention: Duration::from_secs(env_or(
                "CASCADE_ERROR_RETENTION_SECS",
                defaults.error_retention.as_secs(),
            )),
            max_created_entities: env_or(
                "CASCADE_MAX_CREATED_ENTITIES",
                defaults.max_created_entities,
            ),
        }
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_passes: 10,
            script_timeout: Duration::from_millis(3000),
            error_retention: Duration::from_secs(3600),
            max_created_entities: 25,
        }
    }
}
