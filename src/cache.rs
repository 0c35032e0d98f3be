//! Cache-aside orchestration over the pool and client managers.
//!
//! The cache is purely a performance layer: every path that reads the
//! database stays correct when the key-value subsystem is unavailable. Cache
//! read and write failures are logged and absorbed; only database errors
//! reach the caller (and in lazy mode not even those).

use crate::db::MysqlManager;
use crate::error::DataResult;
use crate::kv::RedisManager;
use crate::models::{QuerySpec, Role};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_CACHE_TTL_SECONDS: i64 = 60;

/// One cache-aside read request.
#[derive(Debug, Clone)]
pub struct CachedQuery {
    pub cache_key: String,
    pub ttl_seconds: i64,
    pub spec: QuerySpec,
    pub db_role: Role,
    pub cache_role: Role,
    /// When set, a miss returns `None` immediately and the load-and-cache
    /// step runs in the background.
    pub lazy: bool,
}

impl CachedQuery {
    pub fn new(cache_key: impl Into<String>, spec: QuerySpec) -> Self {
        Self {
            cache_key: cache_key.into(),
            ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            spec,
            db_role: Role::Polling,
            cache_role: Role::Polling,
            lazy: false,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn with_db_role(mut self, role: Role) -> Self {
        self.db_role = role;
        self
    }

    pub fn with_cache_role(mut self, role: Role) -> Self {
        self.cache_role = role;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }
}

/// Read-through cache composing the relational and key-value managers.
#[derive(Clone)]
pub struct CacheLayer {
    db: Arc<MysqlManager>,
    kv: Arc<RedisManager>,
}

impl CacheLayer {
    pub fn new(db: Arc<MysqlManager>, kv: Arc<RedisManager>) -> Self {
        Self { db, kv }
    }

    /// The relational manager backing this layer.
    pub fn db(&self) -> &Arc<MysqlManager> {
        &self.db
    }

    /// The key-value manager backing this layer.
    pub fn kv(&self) -> &Arc<RedisManager> {
        &self.kv
    }

    /// Cache-aside read.
    ///
    /// A cache hit returns the cached value without consulting the database.
    /// On a miss (or unreadable cache) the query runs and its rows are
    /// written back with the requested TTL, best effort. In lazy mode the
    /// load runs in the background and the call returns `None` immediately.
    pub async fn cached_query(&self, request: CachedQuery) -> DataResult<Option<JsonValue>> {
        match self.kv.get(&request.cache_key, request.cache_role).await {
            Ok(Some(cached)) => {
                info!(cache_key = %request.cache_key, "cache hit");
                return Ok(Some(cached));
            }
            Ok(None) => info!(cache_key = %request.cache_key, "cache miss"),
            Err(err) => warn!(error = %err, "cache read failed"),
        }

        if request.lazy {
            info!(cache_key = %request.cache_key, "lazy cache load");
            let db = Arc::clone(&self.db);
            let kv = Arc::clone(&self.kv);
            tokio::spawn(async move {
                if let Err(err) = load_and_cache(&db, &kv, request).await {
                    warn!(error = %err, "lazy cache load failed");
                }
            });
            return Ok(None);
        }

        load_and_cache(&self.db, &self.kv, request).await.map(Some)
    }
}

/// Run the query and write the result back to the cache. The write is best
/// effort; a failure never affects the returned value.
async fn load_and_cache(
    db: &MysqlManager,
    kv: &RedisManager,
    request: CachedQuery,
) -> DataResult<JsonValue> {
    let rows = db.execute(request.spec, request.db_role).await?;
    let value = JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect());

    if let Err(err) = kv
        .set(
            &request.cache_key,
            &value,
            Some(request.ttl_seconds),
            request.cache_role,
        )
        .await
    {
        warn!(error = %err, "cache write failed");
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = CachedQuery::new("users:all", QuerySpec::select("users"));
        assert_eq!(request.ttl_seconds, DEFAULT_CACHE_TTL_SECONDS);
        assert_eq!(request.db_role, Role::Polling);
        assert_eq!(request.cache_role, Role::Polling);
        assert!(!request.lazy);
    }

    #[test]
    fn test_request_builders() {
        let request = CachedQuery::new("k", QuerySpec::select("t"))
            .with_ttl(5)
            .with_db_role(Role::Push)
            .with_cache_role(Role::Default)
            .lazy();
        assert_eq!(request.ttl_seconds, 5);
        assert_eq!(request.db_role, Role::Push);
        assert_eq!(request.cache_role, Role::Default);
        assert!(request.lazy);
    }
}
