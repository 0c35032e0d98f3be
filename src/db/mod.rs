//! Relational access layer.
//!
//! This module provides:
//! - Statement synthesis from declarative query specs
//! - Role-partitioned connection pool management
//! - MySQL-to-JSON type mappings

pub mod builder;
pub mod pool;
pub mod types;

pub use builder::build_query;
pub use pool::{MysqlManager, RowMap};
