//! Database access layer.
//!
//! This module provides the collaborators a configuration hands work to:
//! - Connection pool handle
//! - The executor capability set and the base executor
//! - The caching decorator
//! - Parameter binding and row decoding

pub mod caching;
pub mod executor;
pub mod params;
pub mod pool;
pub mod types;

pub use caching::CachingExecutor;
pub use executor::{CacheStats, Executor, SimpleExecutor, StatementCache};
pub use pool::ConnectionPool;
