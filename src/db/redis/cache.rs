use chrono::NaiveDate;
use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Pool of matches dated on or after the given day
    UpcomingMatches(NaiveDate),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::UpcomingMatches(from) => {
                write!(f, "matches:upcoming:{}", from.format("%Y-%m-%d"))
            }
        }
    }
}

/// Creates a Redis client for caching
///
/// Establishes a connection to Redis for fast data caching.
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
///
/// Sets and evictions share one channel so they apply in send order. An
/// eviction reports back once Redis has answered.
#[derive(Debug)]
enum CacheWriteMessage {
    Set {
        key: String,
        value: String,
        ttl: u64,
    },
    Evict {
        key: String,
        done: oneshot::Sender<AppResult<()>>,
    },
}

/// Cache handler for storing and retrieving data from Redis
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Initiates a graceful shutdown of the cache writer
    ///
    /// Sends a shutdown signal to the writer task and waits until it has
    /// flushed pending writes and exited.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");

        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task failed");
        }
    }
}

impl Cache {
    /// Creates a new Cache instance with an async write background task
    ///
    /// Writes are handed to a background task so cache updates never block
    /// API responses.
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        let task = tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        let handle = CacheWriterHandle { shutdown_tx, task };

        (cache, handle)
    }

    /// Background task that applies cache write messages
    ///
    /// On shutdown signal, drains whatever is already queued and exits.
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => Self::apply(&client, msg).await,
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cache writer shutting down, flushing remaining writes");

                    while let Ok(msg) = write_rx.try_recv() {
                        Self::apply(&client, msg).await;
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn apply(client: &Client, msg: CacheWriteMessage) {
        match msg {
            CacheWriteMessage::Set { key, value, ttl } => {
                if let Err(e) = Self::set(client, key, value, ttl).await {
                    tracing::error!(error = %e, "Failed to write to Redis cache");
                }
            }
            CacheWriteMessage::Evict { key, done } => {
                let result = Self::delete(client, key).await;
                // The caller may have given up waiting
                let _ = done.send(result);
            }
        }
    }

    async fn set(client: &Client, key: String, value: String, ttl: u64) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, value, ttl).await?;
        Ok(())
    }

    async fn delete(client: &Client, key: String) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    /// Retrieves a value from the cache by key
    ///
    /// Returns `None` when the key is absent.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Stores a value in the cache without waiting for Redis
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        self.send(CacheWriteMessage::Set {
            key: key.to_string(),
            value: json,
            ttl,
        });
    }

    /// Removes a key and waits until Redis has done so.
    ///
    /// The eviction goes through the writer queue, so any set queued before
    /// it is applied first and cannot outlive it. Deletes directly when the
    /// writer is gone.
    pub async fn evict(&self, key: &CacheKey) -> AppResult<()> {
        let (done, applied) = oneshot::channel();
        let queued = self.write_tx.send(CacheWriteMessage::Evict {
            key: key.to_string(),
            done,
        });

        if queued.is_ok() {
            if let Ok(result) = applied.await {
                return result;
            }
        }

        tracing::warn!(key = %key, "Cache writer unavailable, evicting directly");
        Self::delete(&self.redis_client, key.to_string()).await
    }

    fn send(&self, msg: CacheWriteMessage) {
        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }
}
