//! Store configuration for the SQLite entity store.

use serde::Deserialize;

/// Store configuration loaded from environment variables.
///
/// Environment variables are prefixed with `KBI_STORE_`:
/// - `KBI_STORE_MAX_CONNECTIONS`: Pool size (default: 4)
/// - `KBI_STORE_BUSY_TIMEOUT`: Seconds to wait on a locked database (default: 5)
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Maximum connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Busy timeout in seconds
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout: u64,
}

fn default_max_connections() -> u32 {
    4
}

fn default_busy_timeout() -> u64 {
    5
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `KBI_STORE_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("KBI_STORE_").from_env::<StoreConfig>()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            busy_timeout: default_busy_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.busy_timeout, 5);
    }
}
