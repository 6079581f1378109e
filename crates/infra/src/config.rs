//! Environment-driven infrastructure configuration.

use tracing::warn;

use crate::command_dispatcher::DEFAULT_MAX_COMMIT_ATTEMPTS;

/// Storage and concurrency settings.
///
/// | Variable | Default |
/// |---|---|
/// | `USE_PERSISTENT_STORES` | `false` |
/// | `DATABASE_URL` | unset |
/// | `LEDGER_MAX_COMMIT_ATTEMPTS` | `5` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub max_commit_attempts: u32,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            use_persistent_stores: false,
            database_url: None,
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }
}

impl InfraConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Invalid values fall back to the
    /// default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let use_persistent_stores = lookup("USE_PERSISTENT_STORES")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(defaults.use_persistent_stores);

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let max_commit_attempts = match lookup("LEDGER_MAX_COMMIT_ATTEMPTS") {
            None => defaults.max_commit_attempts,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!(value = %raw, "invalid LEDGER_MAX_COMMIT_ATTEMPTS, using default");
                    defaults.max_commit_attempts
                }
            },
        };

        Self {
            use_persistent_stores,
            database_url,
            max_commit_attempts,
        }
    }
}
