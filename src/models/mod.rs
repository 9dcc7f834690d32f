//! Data models for sqlbatis.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod statement;

use std::collections::HashMap;

/// Free-form key/value property bag attached to a configuration.
pub type Properties = HashMap<String, String>;

// Re-export commonly used types
pub use connection::{DataSource, DatabaseType};
pub use query::{QueryOutput, SqlParam};
pub use statement::{MappedStatement, SqlCommandType, SqlTemplate};
