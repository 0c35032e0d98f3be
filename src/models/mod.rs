//! Data models for the data-access layer.
//!
//! This module re-exports all model types used throughout the crate.

pub mod query;
pub mod role;

// Re-export commonly used types
pub use query::{
    ColumnsInput, JoinClause, JoinInput, JoinItemInput, JoinSpec, QueryDescriptor, QueryParam,
    QuerySpec, WhereClause, WhereInput,
};
pub use role::{Kind, Role};
