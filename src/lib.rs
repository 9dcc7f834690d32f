//! sqlbatis
//!
//! Configuration hub for a SQL-mapping layer: a registry of named statements and
//! mapper types, global settings, a pluggable statement log, an interceptor
//! chain, and a factory that assembles executor pipelines over an `sqlx` pool.
//!
//! ```no_run
//! use sqlbatis::{ConfigurationBuilder, ConnectionPool, DataSource, PoolOptions, SqlTemplate};
//!
//! # async fn run() -> sqlbatis::BatisResult<()> {
//! let pool = ConnectionPool::connect(&DataSource::new("sqlite::memory:"), &PoolOptions::default()).await?;
//!
//! let mut builder = ConfigurationBuilder::new();
//! builder
//!     .set_connection_pool(pool)
//!     .add_sql_mapping("user.findById", SqlTemplate::new("SELECT * FROM users WHERE id = ?"));
//! builder.set_setting("cacheEnabled", "true")?;
//! builder.set_log_impl("TRACING");
//!
//! let config = builder.freeze()?;
//! let mut executor = config.new_executor(true)?;
//! # let _ = &mut executor;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod plugin;
pub mod session;

pub use config::{PoolOptions, Settings, Toggle};
pub use db::{CachingExecutor, ConnectionPool, Executor, SimpleExecutor, StatementCache};
pub use error::{BatisError, BatisResult};
pub use logging::{Log, LogRegistry};
pub use models::{DataSource, MappedStatement, Properties, QueryOutput, SqlParam, SqlTemplate};
pub use plugin::{Interceptor, InterceptorChain};
pub use session::{Configuration, ConfigurationBuilder, MapperType};
