//! Connection pool handle.
//!
//! The configuration treats the pool as opaque: it stores one handle and gives a
//! clone to every executor it builds. The handle wraps an `sqlx` [`AnyPool`] so one
//! executor implementation serves PostgreSQL, MySQL and SQLite alike.

use crate::config::PoolOptions;
use crate::error::{BatisError, BatisResult};
use crate::models::{DataSource, DatabaseType};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ConnectionPool {
    pool: AnyPool,
    db_type: DatabaseType,
}

impl ConnectionPool {
    /// Wrap an existing pool.
    pub fn from_pool(pool: AnyPool, db_type: DatabaseType) -> Self {
        Self { pool, db_type }
    }

    /// Connect to the data source and open the pool.
    pub async fn connect(data_source: &DataSource, options: &PoolOptions) -> BatisResult<Self> {
        let (pool_options, url, db_type) = Self::prepare(data_source, options)?;

        info!(
            url = %data_source.masked_url(),
            db_type = %db_type,
            "Connecting to database"
        );

        let pool = pool_options.connect(&url).await?;

        info!(db_type = %db_type, "Connected successfully");
        Ok(Self { pool, db_type })
    }

    /// Create the pool without opening any connection.
    ///
    /// Connections are established on first use.
    pub fn connect_lazy(data_source: &DataSource, options: &PoolOptions) -> BatisResult<Self> {
        let (pool_options, url, db_type) = Self::prepare(data_source, options)?;
        let pool = pool_options.connect_lazy(&url)?;
        Ok(Self { pool, db_type })
    }

    fn prepare(
        data_source: &DataSource,
        options: &PoolOptions,
    ) -> BatisResult<(AnyPoolOptions, String, DatabaseType)> {
        options.validate().map_err(|reason| {
            BatisError::setup_usage(
                format!("Invalid pool options: {}", reason),
                "Adjust max_connections/min_connections",
            )
        })?;

        let db_type = data_source.database_type().ok_or_else(|| {
            BatisError::connection(
                format!("Unknown database type in URL: {}", data_source.masked_url()),
                "Use a postgres://, mysql:// or sqlite: URL",
            )
        })?;
        let url = data_source.connection_url()?;

        sqlx::any::install_default_drivers();

        let is_sqlite = db_type == DatabaseType::SQLite;
        let pool_options = AnyPoolOptions::new()
            .max_connections(options.max_connections_or_default(is_sqlite))
            .min_connections(options.min_connections_or_default())
            .idle_timeout(Duration::from_secs(options.idle_timeout_or_default()))
            .acquire_timeout(Duration::from_secs(options.acquire_timeout_or_default()))
            .test_before_acquire(options.test_before_acquire_or_default());

        Ok((pool_options, url, db_type))
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Borrow the underlying sqlx pool.
    pub fn inner(&self) -> &AnyPool {
        &self.pool
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
