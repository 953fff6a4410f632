use once_cell::sync::Lazy;
use std::{env, time::Duration};

/// Tunables for a cloud connection, read-once from ENV with fallbacks.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// A token is "usable" while it stays valid longer than this buffer.
    pub token_expiry_buffer: Duration,
    /// Wait between repeated near-expiry notifications while a usable
    /// token keeps failing to arrive.
    pub token_retry_wait: Duration,
    /// Capacity of the status broadcast channel.
    pub status_buffer_capacity: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            token_expiry_buffer: Duration::from_secs(5 * 60),
            token_retry_wait: Duration::from_secs(20),
            status_buffer_capacity: 100,
        }
    }
}

impl ConnectionSettings {
    pub fn from_env() -> Self {
        // optionally load .env
        let _ = dotenvy::dotenv();

        // helper to parse usize
        fn parse_usize(var: &str, default: usize) -> usize {
            env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        // helper to parse seconds into Duration
        fn parse_secs(var: &str, default_secs: u64) -> Duration {
            env::var(var)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(default_secs))
        }

        ConnectionSettings {
            token_expiry_buffer: parse_secs("TOKEN_EXPIRY_BUFFER_SECS", 5 * 60),
            token_retry_wait: parse_secs("TOKEN_RETRY_WAIT_SECS", 20),
            status_buffer_capacity: parse_usize("STATUS_BUFFER_CAPACITY", 100),
        }
    }
}

/// Process-wide defaults, used when a manager is built without explicit
/// settings.
pub static SETTINGS: Lazy<ConnectionSettings> = Lazy::new(ConnectionSettings::from_env);
