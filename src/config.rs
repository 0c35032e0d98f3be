//! Environment-derived configuration.
//!
//! Settings resolve through a two-level hierarchy read at pool/client
//! creation time: the role-specific variable (`MYSQL_PUSH_HOST`) wins, then
//! the base variable (`MYSQL_HOST`), then a hardcoded default. Blank values
//! count as unset and unparseable numbers fall back to the default.

use crate::error::{DataError, DataResult};
use crate::models::Role;
use std::time::Duration;
use url::Url;

pub const DEFAULT_MYSQL_HOST: &str = "127.0.0.1";
pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_MYSQL_USER: &str = "root";
pub const DEFAULT_MYSQL_POOL_LIMIT: u32 = 10;
pub const DEFAULT_SLOW_QUERY_MS: u64 = 300;

pub const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_REDIS_DB: u32 = 0;

/// Environment lookup used by the resolvers. Injected so tests can resolve
/// against a fixture map instead of mutating process state.
pub(crate) type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read a process environment variable, treating blank values as unset.
fn process_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Role-specific value first, base-prefix value second.
fn layered(env: EnvLookup<'_>, role_prefix: &str, base_prefix: &str, setting: &str) -> Option<String> {
    env(&format!("{role_prefix}_{setting}")).or_else(|| env(&format!("{base_prefix}_{setting}")))
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, fallback: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(fallback)
}

/// Connection settings for one relational role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub pool_limit: u32,
}

impl MysqlSettings {
    /// Resolve settings for a role from the process environment.
    pub fn from_env(role: Role) -> Self {
        Self::resolve(role, &process_env)
    }

    pub(crate) fn resolve(role: Role, env: EnvLookup<'_>) -> Self {
        let role_prefix = role.mysql_prefix();
        let base = Role::Default.mysql_prefix();
        let get = |setting: &str| layered(env, role_prefix, base, setting);

        Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_MYSQL_HOST.to_string()),
            port: parse_or(get("PORT"), DEFAULT_MYSQL_PORT),
            user: get("USER").unwrap_or_else(|| DEFAULT_MYSQL_USER.to_string()),
            password: get("PASSWORD").unwrap_or_default(),
            database: get("DATABASE").unwrap_or_default(),
            pool_limit: parse_or(get("POOL_LIMIT"), DEFAULT_MYSQL_POOL_LIMIT),
        }
    }
}

/// Threshold above which a completed query is logged as slow.
/// Not role-partitioned; read from `MYSQL_SLOW_MS`.
pub fn slow_query_threshold() -> Duration {
    Duration::from_millis(parse_or(process_env("MYSQL_SLOW_MS"), DEFAULT_SLOW_QUERY_MS))
}

/// Resolve the key-value connection URL for a role.
///
/// An explicit `{PREFIX}_URL` (or global `REDIS_URL`) wins; otherwise the URL
/// is assembled from individually overridable host/port/db/password settings,
/// with the password percent-encoded into the credential segment.
pub fn redis_url(role: Role) -> DataResult<String> {
    resolve_redis_url(role, &process_env)
}

pub(crate) fn resolve_redis_url(role: Role, env: EnvLookup<'_>) -> DataResult<String> {
    let role_prefix = role.redis_prefix();
    let base = Role::Default.redis_prefix();

    if let Some(url) = layered(env, role_prefix, base, "URL") {
        return Ok(url);
    }

    let host = layered(env, role_prefix, base, "HOST")
        .unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string());
    let port: u16 = parse_or(layered(env, role_prefix, base, "PORT"), DEFAULT_REDIS_PORT);
    let db: u32 = parse_or(layered(env, role_prefix, base, "DB"), DEFAULT_REDIS_DB);
    let password = layered(env, role_prefix, base, "PASSWORD").unwrap_or_default();

    let mut url = Url::parse(&format!("redis://{host}:{port}/{db}"))
        .map_err(|e| DataError::connection(format!("Invalid Redis address: {e}")))?;
    if !password.is_empty() {
        url.set_password(Some(&password))
            .map_err(|_| DataError::connection("Invalid Redis password"))?;
    }
    Ok(url.to_string())
}
