//! `Dragonfly` (Redis-compatible) poll record backend.
//!
//! Each poll is a hash holding the record JSON and its version. Every
//! mutation is a single Lua script so the existence and version checks run
//! atomically with the write.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Fields |
//! |---------|------|--------|
//! | `poll:{id}` | Hash | `version` (integer text), `record` (JSON) |

use std::time::Duration;

use fred::prelude::*;

use crate::error::StoreError;
use crate::store::SwapOutcome;

/// Hash field holding the record version.
const VERSION_FIELD: &str = "version";

/// Hash field holding the record JSON.
const RECORD_FIELD: &str = "record";

/// `KEYS[1]` = poll key, `ARGV[1]` = version, `ARGV[2]` = record.
/// Returns 1 when written, 0 when the key already exists.
const INSERT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], 'version', ARGV[1], 'record', ARGV[2])
return 1
";

/// `KEYS[1]` = poll key, `ARGV[1]` = expected version, `ARGV[2]` = new
/// version, `ARGV[3]` = record. Returns 0 when swapped, -1 when the key is
/// missing, otherwise the stored version (always >= 1).
const SWAP_SCRIPT: &str = r"
local current = redis.call('HGET', KEYS[1], 'version')
if not current then
  return -1
end
if current ~= ARGV[1] then
  return tonumber(current)
end
redis.call('HSET', KEYS[1], 'version', ARGV[2], 'record', ARGV[3])
return 0
";

/// Connection settings for [`DragonflyStore::connect`].
#[derive(Debug, Clone)]
pub struct DragonflyOptions {
    /// Redis-scheme URL: `redis://host:port` or `redis://host:port/db`.
    pub url: String,
    /// Timeout for establishing each connection.
    pub connect_timeout: Duration,
    /// Delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Reconnection attempts before giving up (0 = never stop).
    pub max_reconnects: u32,
}

impl Default for DragonflyOptions {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_owned(),
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(1),
            max_reconnects: 10,
        }
    }
}

/// Connection handle to a `Dragonfly` instance holding poll records.
///
/// Wraps a [`fred::prelude::Client`]; cloning is cheap and shares the
/// underlying connection.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
}

impl DragonflyStore {
    /// Connect to `Dragonfly` with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Dragonfly`] if the connection fails.
    pub async fn connect(options: &DragonflyOptions) -> Result<Self, StoreError> {
        let config = Config::from_url(&options.url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let connect_timeout = options.connect_timeout;
        let delay_ms = u32::try_from(options.reconnect_delay.as_millis()).unwrap_or(u32::MAX);
        let policy = ReconnectPolicy::new_constant(options.max_reconnects, delay_ms);

        let client = Builder::from_config(config)
            .with_connection_config(|conn| {
                conn.connection_timeout = connect_timeout;
            })
            .set_policy(policy)
            .build()?;
        client.init().await?;

        tracing::info!(url = %options.url, "Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Write a new record unless `key` already exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the script fails.
    pub async fn insert(&self, key: &str, version: u64, body: &str) -> Result<bool, StoreError> {
        let reply: i64 = self
            .client
            .eval(
                INSERT_SCRIPT,
                vec![key.to_owned()],
                vec![version.to_string(), body.to_owned()],
            )
            .await?;
        match reply {
            1 => Ok(true),
            0 => Ok(false),
            other => Err(StoreError::UnexpectedReply(other)),
        }
    }

    /// Read the record JSON under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the read fails.
    pub async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let body: Option<String> = self.client.hget(key, RECORD_FIELD).await?;
        Ok(body)
    }

    /// Read the stored version under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the read fails.
    pub async fn version(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let version: Option<u64> = self.client.hget(key, VERSION_FIELD).await?;
        Ok(version)
    }

    /// Replace the record under `key` if its version equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the script fails.
    pub async fn swap(
        &self,
        key: &str,
        expected: u64,
        version: u64,
        body: &str,
    ) -> Result<SwapOutcome, StoreError> {
        let reply: i64 = self
            .client
            .eval(
                SWAP_SCRIPT,
                vec![key.to_owned()],
                vec![expected.to_string(), version.to_string(), body.to_owned()],
            )
            .await?;
        match reply {
            0 => Ok(SwapOutcome::Swapped),
            -1 => Ok(SwapOutcome::Missing),
            stored if stored > 0 => Ok(SwapOutcome::Stale {
                stored: u64::try_from(stored).unwrap_or_default(),
            }),
            other => Err(StoreError::UnexpectedReply(other)),
        }
    }

    /// Delete the record under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the delete fails.
    pub async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let removed: u32 = self.client.del(key).await?;
        Ok(removed > 0)
    }
}
