//! Role-partitioned MySQL connection pool management.
//!
//! One pool exists per [`Role`], created on first use from environment-derived
//! settings and cached until explicitly closed. Statement execution goes
//! through the query builder, is timed for slow-query logging, and returns
//! schema-less JSON rows.

use crate::config::{self, MysqlSettings};
use crate::db::builder::build_query;
use crate::db::types::row_to_map;
use crate::error::DataResult;
use crate::models::{QueryDescriptor, QueryParam, QuerySpec, Role};
use serde_json::Value as JsonValue;
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// A single result row: ordered mapping from column name to JSON value.
pub type RowMap = serde_json::Map<String, JsonValue>;

/// Role-partitioned MySQL pool registry and query executor.
pub struct MysqlManager {
    pools: RwLock<HashMap<Role, MySqlPool>>,
    slow_threshold: Duration,
}

impl MysqlManager {
    /// Create a manager with the slow-query threshold taken from
    /// `MYSQL_SLOW_MS` (default 300 ms).
    pub fn new() -> Self {
        Self::with_slow_threshold(config::slow_query_threshold())
    }

    /// Create a manager with an explicit slow-query threshold.
    pub fn with_slow_threshold(slow_threshold: Duration) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            slow_threshold,
        }
    }

    /// Get or create the pool for a role.
    ///
    /// Pools are lazy: creation registers the pool without touching the
    /// server, and physical connections are opened on first statement. The
    /// write lock makes first-use registration race-free.
    async fn pool(&self, role: Role) -> MySqlPool {
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(&role) {
                return pool.clone();
            }
        }
        let mut pools = self.pools.write().await;
        pools
            .entry(role)
            .or_insert_with(|| create_pool(role))
            .clone()
    }

    /// Execute a query spec under a role and return its rows.
    ///
    /// Non-SELECT statements return a single synthetic row carrying
    /// `affected_rows` and `last_insert_id`. Failures are logged with the
    /// call duration and role, never with parameter values, and propagated.
    pub async fn execute(&self, spec: QuerySpec, role: Role) -> DataResult<Vec<RowMap>> {
        let wants_rows = spec.returns_rows();
        let (statement, params) = build_query(spec)?;
        let pool = self.pool(role).await;

        let start = Instant::now();
        let outcome = run_statement(&pool, &statement, &params, wants_rows).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(rows) => {
                if start.elapsed() >= self.slow_threshold {
                    warn!(duration_ms, role = %role, "slow query");
                }
                Ok(rows)
            }
            Err(err) => {
                error!(duration_ms, role = %role, error = %err, "query failed");
                Err(err)
            }
        }
    }

    /// Execute a dynamic descriptor (operation inferred from its fields).
    pub async fn execute_descriptor(
        &self,
        descriptor: QueryDescriptor,
        role: Role,
    ) -> DataResult<Vec<RowMap>> {
        self.execute(descriptor.into_spec()?, role).await
    }

    /// Execute under the write-path role.
    pub async fn push(&self, spec: QuerySpec) -> DataResult<Vec<RowMap>> {
        self.execute(spec, Role::Push).await
    }

    /// Execute under the read-path role.
    pub async fn poll(&self, spec: QuerySpec) -> DataResult<Vec<RowMap>> {
        self.execute(spec, Role::Polling).await
    }

    /// Close and evict one role's pool. A later call under the same role
    /// creates a fresh pool.
    pub async fn close(&self, role: Role) {
        let pool = self.pools.write().await.remove(&role);
        if let Some(pool) = pool {
            info!(role = %role, "Closing MySQL pool");
            pool.close().await;
        }
    }

    /// Close and evict every pool. Every close is attempted.
    pub async fn close_all(&self) {
        let drained: Vec<(Role, MySqlPool)> = self.pools.write().await.drain().collect();
        for (role, pool) in drained {
            info!(role = %role, "Closing MySQL pool");
            pool.close().await;
        }
        info!("All MySQL pools closed");
    }

    /// Number of live pools.
    pub async fn pool_count(&self) -> usize {
        self.pools.read().await.len()
    }
}

impl Default for MysqlManager {
    fn default() -> Self {
        Self::new()
    }
}

fn create_pool(role: Role) -> MySqlPool {
    let settings = MysqlSettings::from_env(role);
    let mut options = MySqlConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.user)
        .charset("utf8mb4");
    if !settings.password.is_empty() {
        options = options.password(&settings.password);
    }
    if !settings.database.is_empty() {
        options = options.database(&settings.database);
    }

    info!(
        role = %role,
        host = %settings.host,
        port = settings.port,
        pool_limit = settings.pool_limit,
        "Creating MySQL pool"
    );

    MySqlPoolOptions::new()
        .max_connections(settings.pool_limit)
        .connect_lazy_with(options)
}

async fn run_statement(
    pool: &MySqlPool,
    statement: &str,
    params: &[QueryParam],
    wants_rows: bool,
) -> DataResult<Vec<RowMap>> {
    let mut query = sqlx::query(statement);
    for param in params {
        query = bind_param(query, param);
    }

    if wants_rows {
        let rows = query.fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_map).collect())
    } else {
        let result = query.execute(pool).await?;
        let mut row = RowMap::new();
        row.insert(
            "affected_rows".to_string(),
            JsonValue::from(result.rows_affected()),
        );
        row.insert(
            "last_insert_id".to_string(),
            JsonValue::from(result.last_insert_id()),
        );
        Ok(vec![row])
    }
}

/// Bind a parameter to a MySQL query.
fn bind_param<'q>(
    query: sqlx::query::Query<'q, sqlx::MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, sqlx::MySql, MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::Str(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(sqlx::types::Json(v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manager_starts_empty() {
        let manager = MysqlManager::new();
        assert_eq!(manager.pool_count().await, 0);
    }

    #[tokio::test]
    async fn test_pool_created_once_per_role() {
        let manager = MysqlManager::new();
        manager.pool(Role::Polling).await;
        manager.pool(Role::Polling).await;
        assert_eq!(manager.pool_count().await, 1);
    }

    #[tokio::test]
    async fn test_roles_get_distinct_pools() {
        let manager = MysqlManager::new();
        manager.pool(Role::Push).await;
        manager.pool(Role::Polling).await;
        assert_eq!(manager.pool_count().await, 2);
    }

    #[tokio::test]
    async fn test_close_evicts_only_that_role() {
        let manager = MysqlManager::new();
        manager.pool(Role::Push).await;
        manager.pool(Role::Polling).await;
        manager.close(Role::Push).await;
        assert_eq!(manager.pool_count().await, 1);
    }

    #[tokio::test]
    async fn test_close_all_drains_registry() {
        let manager = MysqlManager::new();
        manager.pool(Role::Default).await;
        manager.pool(Role::Push).await;
        manager.close_all().await;
        assert_eq!(manager.pool_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_spec_fails_before_touching_pool() {
        let manager = MysqlManager::new();
        let result = manager.execute(QuerySpec::select(""), Role::Polling).await;
        assert!(result.is_err());
        assert_eq!(manager.pool_count().await, 0);
    }
}
