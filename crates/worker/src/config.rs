use std::time::Duration;

use quire_core::HistoryConfig;

use crate::error::WorkerError;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// PostgreSQL connection string (required).
    pub database_url: String,
    /// Maximum pool connections (default: `10`).
    pub max_connections: u32,
    /// Merge and creation grace window in seconds (default: `300`).
    pub edit_grace_secs: i64,
    /// Delay between outbox polls in seconds (default: `5`).
    pub poll_interval_secs: u64,
    /// Maximum batches drained per poll (default: `50`).
    pub batch_limit: i64,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var              | Default    |
    /// |----------------------|------------|
    /// | `DATABASE_URL`       | (required) |
    /// | `DB_MAX_CONNECTIONS` | `10`       |
    /// | `EDIT_GRACE_SECS`    | `300`      |
    /// | `POLL_INTERVAL_SECS` | `5`        |
    /// | `BATCH_LIMIT`        | `50`       |
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| WorkerError::Config("DATABASE_URL must be set".into()))?;

        let edit_grace_secs: i64 = parse_or(&lookup, "EDIT_GRACE_SECS", 300)?;
        if edit_grace_secs < 0 {
            return Err(WorkerError::Config(
                "EDIT_GRACE_SECS must not be negative".into(),
            ));
        }

        let poll_interval_secs: u64 = parse_or(&lookup, "POLL_INTERVAL_SECS", 5)?;
        if poll_interval_secs == 0 {
            return Err(WorkerError::Config(
                "POLL_INTERVAL_SECS must be at least 1".into(),
            ));
        }

        let batch_limit: i64 = parse_or(&lookup, "BATCH_LIMIT", 50)?;
        if batch_limit < 1 {
            return Err(WorkerError::Config("BATCH_LIMIT must be at least 1".into()));
        }

        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            edit_grace_secs,
            poll_interval_secs,
            batch_limit,
        })
    }

    pub fn history(&self) -> HistoryConfig {
        HistoryConfig::with_grace_secs(self.edit_grace_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, WorkerError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| WorkerError::Config(format!("{key} has invalid value '{raw}'"))),
    }
}
