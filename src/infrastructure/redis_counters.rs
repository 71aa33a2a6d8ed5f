//! Redis-backed counter store.
//!
//! Shares retry counters across cooperating kernel processes so the global
//! ceiling holds fleet-wide. Keys follow the `signal_retry:{scope}:minute`
//! convention; windowing uses Redis key expiry, armed by the first
//! increment of a fresh window (`INCR` returning 1 triggers `EXPIRE`).
//!
//! ## Error handling
//!
//! Every Redis failure maps to a [`CounterError`]. The throttle treats any
//! such error as "store unreachable" and degrades to its local fallback, so
//! this adapter never needs to mask failures itself.
//!
//! ## Sync bridging
//!
//! The `CounterStore` port is synchronous while the `redis` client is
//! async. Calls run on the current tokio runtime via `block_in_place`, or
//! on a throwaway runtime when invoked outside tokio, the same bridging the
//! rest of the crate's sync surface uses.

use crate::application::ports::{CounterError, CounterStore};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Configuration for the Redis counter store.
#[derive(Debug, Clone)]
pub struct RedisCounterConfig {
    /// Key prefix for counter keys (default: "signal_retry:")
    pub key_prefix: String,
    /// Per-operation timeout (default: 1s)
    pub op_timeout: Duration,
}

impl Default for RedisCounterConfig {
    fn default() -> Self {
        Self {
            key_prefix: "signal_retry:".to_string(),
            op_timeout: Duration::from_secs(1),
        }
    }
}

/// Redis-backed windowed counters for distributed retry throttling.
pub struct RedisCounterStore {
    connection: Arc<RwLock<ConnectionManager>>,
    config: RedisCounterConfig,
}

impl fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Clone for RedisCounterStore {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            config: self.config.clone(),
        }
    }
}

impl RedisCounterStore {
    /// Connect to Redis with default configuration.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        Self::connect_with_config(url, RedisCounterConfig::default()).await
    }

    /// Connect to Redis with custom configuration.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn connect_with_config(
        url: &str,
        config: RedisCounterConfig,
    ) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self {
            connection: Arc::new(RwLock::new(connection)),
            config,
        })
    }

    fn key(&self, scope: &str) -> String {
        format!("{}{}:minute", self.config.key_prefix, scope)
    }

    async fn increment_async(&self, scope: &str, window: Duration) -> Result<u64, RedisError> {
        let key = self.key(scope);
        let mut conn = self.connection.write().await;

        let count: u64 = conn.incr(&key, 1u64).await?;
        if count == 1 {
            // First increment of a fresh window arms the expiry
            let ttl = window.as_secs().max(1);
            let _: () = conn.expire(&key, ttl as i64).await?;
        }
        Ok(count)
    }

    async fn get_async(&self, scope: &str) -> Result<u64, RedisError> {
        let key = self.key(scope);
        let mut conn = self.connection.write().await;

        let count: Option<u64> = conn.get(&key).await?;
        Ok(count.unwrap_or(0))
    }

    /// Run an async Redis operation from the sync port, bounded by the
    /// configured timeout.
    fn block_on<F, T>(&self, fut: F) -> Result<T, CounterError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        let timeout = self.config.op_timeout;
        let bounded = async {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result.map_err(|e| CounterError::new(e.to_string())),
                Err(_) => Err(CounterError::new(format!(
                    "redis operation timed out after {timeout:?}"
                ))),
            }
        };

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(bounded))
        } else {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| CounterError::new(format!("failed to create tokio runtime: {e}")))?;
            rt.block_on(bounded)
        }
    }
}

impl CounterStore for RedisCounterStore {
    fn increment(&self, scope: &str, window: Duration) -> Result<u64, CounterError> {
        self.block_on(self.increment_async(scope, window))
    }

    fn get(&self, scope: &str, _window: Duration) -> Result<u64, CounterError> {
        // Windowing is enforced by key expiry on the Redis side
        self.block_on(self.get_async(scope))
    }
}
