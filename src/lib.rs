//! Role-partitioned MySQL/Redis data-access layer.
//!
//! This library provides lazily-created, role-partitioned connection pools
//! and key-value clients, a declarative query builder, and a cache-aside
//! orchestrator composing the two.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod kv;
pub mod models;

pub use cache::{CacheLayer, CachedQuery};
pub use db::{MysqlManager, RowMap, build_query};
pub use error::{DataError, DataResult};
pub use kv::{RedisManager, StreamEntry, Subscription};
pub use models::{Kind, QueryDescriptor, QueryParam, QuerySpec, Role, WhereClause};
