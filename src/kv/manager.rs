//! Role-partitioned Redis client management and typed operations.
//!
//! One client exists per (role, kind) pair: publish/subscribe traffic must
//! not share a connection with request/response commands. Clients are created
//! on first use from environment-derived URLs and connect lazily; the first
//! command establishes the multiplexed connection, later commands reuse it.
//!
//! Reads conventionally run under [`Role::Polling`] and writes under
//! [`Role::Push`] so read replicas stay separate from the write path; the
//! `READ_ROLE`/`WRITE_ROLE` constants carry that convention.

use crate::config;
use crate::error::{DataError, DataResult};
use crate::models::{Kind, Role};
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Default entry count for a consumer-group read.
pub const DEFAULT_STREAM_READ_COUNT: usize = 10;
/// Default block timeout for a consumer-group read, in milliseconds.
pub const DEFAULT_STREAM_BLOCK_MS: usize = 5000;

/// One entry read from a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: HashMap<String, String>,
}

/// A cached client: the configured handle plus its lazily-established
/// multiplexed connection. `OnceCell` makes "connect if not already
/// connected" idempotent.
struct ClientEntry {
    client: Client,
    conn: OnceCell<ConnectionManager>,
}

impl ClientEntry {
    async fn connection(&self) -> DataResult<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|e| DataError::connection(format!("Failed to connect to Redis: {e}")))
            })
            .await?;
        Ok(conn.clone())
    }
}

/// Handle to an active channel subscription. The listener task runs until
/// `unsubscribe` is called or the handle is dropped.
pub struct Subscription {
    channel: String,
    task: JoinHandle<()>,
}

impl Subscription {
    /// The subscribed channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Stop the listener and drop the subscription connection.
    pub fn unsubscribe(self) {
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// (Role, kind)-partitioned Redis client registry with typed operations.
pub struct RedisManager {
    clients: RwLock<HashMap<(Role, Kind), Arc<ClientEntry>>>,
}

impl RedisManager {
    /// Conventional role for read operations.
    pub const READ_ROLE: Role = Role::Polling;
    /// Conventional role for write operations.
    pub const WRITE_ROLE: Role = Role::Push;

    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the client entry for a (role, kind) pair.
    async fn entry(&self, role: Role, kind: Kind) -> DataResult<Arc<ClientEntry>> {
        {
            let clients = self.clients.read().await;
            if let Some(entry) = clients.get(&(role, kind)) {
                return Ok(Arc::clone(entry));
            }
        }

        let mut clients = self.clients.write().await;
        if let Some(entry) = clients.get(&(role, kind)) {
            return Ok(Arc::clone(entry));
        }

        let url = config::redis_url(role)?;
        let client = Client::open(url.as_str())
            .map_err(|e| DataError::connection(format!("Failed to create Redis client: {e}")))?;
        info!(role = %role, kind = %kind, "Creating Redis client");

        let entry = Arc::new(ClientEntry {
            client,
            conn: OnceCell::new(),
        });
        clients.insert((role, kind), Arc::clone(&entry));
        Ok(entry)
    }

    async fn connection(&self, role: Role, kind: Kind) -> DataResult<ConnectionManager> {
        self.entry(role, kind).await?.connection().await
    }

    // =========================================================================
    // Scalar operations
    // =========================================================================

    /// Get a value, JSON-decoding it when possible and falling back to the
    /// raw string. A stored string that happens to be valid JSON comes back
    /// decoded; callers depending on verbatim strings must wrap them.
    pub async fn get(&self, key: &str, role: Role) -> DataResult<Option<JsonValue>> {
        let mut conn = self.connection(role, Kind::General).await?;
        let raw: Option<String> = conn.get(key).await?;
        Ok(raw.map(decode_cached_value))
    }

    /// Set a value with an optional TTL in seconds. String values are stored
    /// verbatim, everything else is JSON-encoded. A TTL of zero or less (or
    /// `None`) stores without expiry.
    pub async fn set(
        &self,
        key: &str,
        value: &JsonValue,
        ttl_seconds: Option<i64>,
        role: Role,
    ) -> DataResult<()> {
        let payload = encode_cache_payload(value)?;
        let mut conn = self.connection(role, Kind::General).await?;
        match ttl_seconds {
            Some(ttl) if ttl > 0 => {
                let _: () = conn.set_ex(key, payload, ttl as u64).await?;
            }
            _ => {
                let _: () = conn.set(key, payload).await?;
            }
        }
        Ok(())
    }

    /// Delete a key; returns the number of keys removed.
    pub async fn del(&self, key: &str, role: Role) -> DataResult<u64> {
        let mut conn = self.connection(role, Kind::General).await?;
        Ok(conn.del(key).await?)
    }

    /// Connectivity probe.
    pub async fn ping(&self, role: Role) -> DataResult<()> {
        let mut conn = self.connection(role, Kind::General).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    // =========================================================================
    // Pub/sub
    // =========================================================================

    /// Publish a message; returns the number of receivers.
    pub async fn publish(&self, channel: &str, message: &str, role: Role) -> DataResult<u64> {
        let mut conn = self.connection(role, Kind::Pub).await?;
        Ok(conn.publish(channel, message).await?)
    }

    /// Subscribe to a channel. The handler is invoked with
    /// `(message, channel)` for every published message until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    pub async fn subscribe<F>(
        &self,
        channel: &str,
        handler: F,
        role: Role,
    ) -> DataResult<Subscription>
    where
        F: Fn(String, String) + Send + 'static,
    {
        let entry = self.entry(role, Kind::Sub).await?;
        let mut pubsub = entry
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| DataError::connection(format!("Failed to open pubsub: {e}")))?;
        pubsub.subscribe(channel).await?;

        let channel_name = channel.to_string();
        let task = tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(msg) = messages.next().await {
                let channel = msg.get_channel_name().to_string();
                match msg.get_payload::<String>() {
                    Ok(payload) => handler(payload, channel),
                    Err(e) => warn!(channel = %channel, error = %e, "Undecodable pubsub payload"),
                }
            }
        });

        Ok(Subscription {
            channel: channel_name,
            task,
        })
    }

    // =========================================================================
    // Streams
    // =========================================================================

    /// Append an entry to a stream. `id` defaults to `*` (server-assigned);
    /// `maxlen` applies approximate trimming. Returns the assigned entry id.
    pub async fn stream_add(
        &self,
        stream: &str,
        fields: &[(String, String)],
        id: Option<&str>,
        maxlen: Option<usize>,
        role: Role,
    ) -> DataResult<String> {
        let mut conn = self.connection(role, Kind::General).await?;
        let id = id.unwrap_or("*");
        let assigned: String = match maxlen {
            Some(n) => {
                conn.xadd_maxlen(stream, StreamMaxlen::Approx(n), id, fields)
                    .await?
            }
            None => conn.xadd(stream, id, fields).await?,
        };
        Ok(assigned)
    }

    /// Create a consumer group, creating the stream if missing (MKSTREAM).
    /// `start_id` defaults to `$` (new entries only).
    pub async fn stream_group_create(
        &self,
        stream: &str,
        group: &str,
        start_id: Option<&str>,
        role: Role,
    ) -> DataResult<()> {
        let mut conn = self.connection(role, Kind::General).await?;
        let _: () = conn
            .xgroup_create_mkstream(stream, group, start_id.unwrap_or("$"))
            .await?;
        Ok(())
    }

    /// Blocking consumer-group read. `id` defaults to `>` (undelivered
    /// entries); count and block timeout default to 10 entries / 5000 ms.
    pub async fn stream_group_read(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        id: Option<&str>,
        count: Option<usize>,
        block_ms: Option<usize>,
        role: Role,
    ) -> DataResult<Vec<StreamEntry>> {
        let mut conn = self.connection(role, Kind::General).await?;
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count.unwrap_or(DEFAULT_STREAM_READ_COUNT))
            .block(block_ms.unwrap_or(DEFAULT_STREAM_BLOCK_MS));
        let reply: StreamReadReply = conn
            .xread_options(&[stream], &[id.unwrap_or(">")], &options)
            .await?;

        let entries = reply
            .keys
            .into_iter()
            .flat_map(|key| key.ids)
            .map(|entry| StreamEntry {
                id: entry.id,
                fields: entry
                    .map
                    .into_iter()
                    .map(|(field, value)| {
                        (field, redis::from_redis_value(&value).unwrap_or_default())
                    })
                    .collect(),
            })
            .collect();
        Ok(entries)
    }

    /// Acknowledge a processed entry; returns the number acknowledged.
    pub async fn stream_ack(
        &self,
        stream: &str,
        group: &str,
        id: &str,
        role: Role,
    ) -> DataResult<u64> {
        let mut conn = self.connection(role, Kind::General).await?;
        Ok(conn.xack(stream, group, &[id]).await?)
    }

    // =========================================================================
    // Hashes
    // =========================================================================

    /// Set one or more hash fields.
    pub async fn hash_set(
        &self,
        key: &str,
        fields: &[(String, String)],
        role: Role,
    ) -> DataResult<()> {
        let mut conn = self.connection(role, Kind::General).await?;
        let _: () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }

    /// Get a single hash field.
    pub async fn hash_get(&self, key: &str, field: &str, role: Role) -> DataResult<Option<String>> {
        let mut conn = self.connection(role, Kind::General).await?;
        Ok(conn.hget(key, field).await?)
    }

    /// Get every field of a hash.
    pub async fn hash_get_all(&self, key: &str, role: Role) -> DataResult<HashMap<String, String>> {
        let mut conn = self.connection(role, Kind::General).await?;
        Ok(conn.hgetall(key).await?)
    }

    /// Delete a hash field; returns the number of fields removed.
    pub async fn hash_del(&self, key: &str, field: &str, role: Role) -> DataResult<u64> {
        let mut conn = self.connection(role, Kind::General).await?;
        Ok(conn.hdel(key, field).await?)
    }

    // =========================================================================
    // Sets
    // =========================================================================

    /// Add members to a set; returns the number newly added.
    pub async fn set_add(&self, key: &str, members: &[String], role: Role) -> DataResult<u64> {
        let mut conn = self.connection(role, Kind::General).await?;
        Ok(conn.sadd(key, members).await?)
    }

    /// Remove members from a set; returns the number removed.
    pub async fn set_remove(&self, key: &str, members: &[String], role: Role) -> DataResult<u64> {
        let mut conn = self.connection(role, Kind::General).await?;
        Ok(conn.srem(key, members).await?)
    }

    /// List every member of a set.
    pub async fn set_members(&self, key: &str, role: Role) -> DataResult<Vec<String>> {
        let mut conn = self.connection(role, Kind::General).await?;
        Ok(conn.smembers(key).await?)
    }

    /// Membership test.
    pub async fn set_is_member(&self, key: &str, member: &str, role: Role) -> DataResult<bool> {
        let mut conn = self.connection(role, Kind::General).await?;
        Ok(conn.sismember(key, member).await?)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Evict one (role, kind) client. Dropping the entry closes its
    /// connection; in-flight operations on clones complete independently.
    pub async fn close(&self, role: Role, kind: Kind) {
        if self.clients.write().await.remove(&(role, kind)).is_some() {
            info!(role = %role, kind = %kind, "Closing Redis client");
        }
    }

    /// Evict every client.
    pub async fn close_all(&self) {
        let mut clients = self.clients.write().await;
        clients.clear();
        info!("All Redis clients closed");
    }

    /// Number of live clients.
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for RedisManager {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON-decode a cached value, falling back to the raw string.
fn decode_cached_value(raw: String) -> JsonValue {
    serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw))
}

/// Serialize a cache payload: strings verbatim, everything else as JSON.
fn encode_cache_payload(value: &JsonValue) -> DataResult<String> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_json_value() {
        assert_eq!(
            decode_cached_value("{\"x\":1}".to_string()),
            json!({"x": 1})
        );
        assert_eq!(decode_cached_value("123".to_string()), json!(123));
    }

    #[test]
    fn test_decode_falls_back_to_raw_string() {
        assert_eq!(decode_cached_value("hello".to_string()), json!("hello"));
        assert_eq!(
            decode_cached_value("not {json".to_string()),
            json!("not {json")
        );
    }

    #[test]
    fn test_encode_string_verbatim() {
        assert_eq!(
            encode_cache_payload(&json!("hello")).unwrap(),
            "hello".to_string()
        );
    }

    #[test]
    fn test_encode_structured_as_json() {
        assert_eq!(
            encode_cache_payload(&json!({"x": 1})).unwrap(),
            "{\"x\":1}".to_string()
        );
        assert_eq!(encode_cache_payload(&json!(7)).unwrap(), "7".to_string());
    }

    #[tokio::test]
    async fn test_registry_caches_clients_per_role_and_kind() {
        let manager = RedisManager::new();
        manager.entry(Role::Polling, Kind::General).await.unwrap();
        manager.entry(Role::Polling, Kind::General).await.unwrap();
        manager.entry(Role::Polling, Kind::Sub).await.unwrap();
        manager.entry(Role::Push, Kind::General).await.unwrap();
        assert_eq!(manager.client_count().await, 3);
    }

    #[tokio::test]
    async fn test_close_evicts_single_entry() {
        let manager = RedisManager::new();
        manager.entry(Role::Push, Kind::General).await.unwrap();
        manager.entry(Role::Polling, Kind::General).await.unwrap();
        manager.close(Role::Push, Kind::General).await;
        assert_eq!(manager.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_close_all_drains_registry() {
        let manager = RedisManager::new();
        manager.entry(Role::Push, Kind::Pub).await.unwrap();
        manager.entry(Role::Polling, Kind::Sub).await.unwrap();
        manager.close_all().await;
        assert_eq!(manager.client_count().await, 0);
    }
}
