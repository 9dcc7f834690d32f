//! Statement execution.
//!
//! This module defines the [`Executor`] capability set shared by every layer of an
//! execution pipeline, and [`SimpleExecutor`], the base layer that runs statements
//! on the configured connection pool.
//!
//! # Pipeline
//!
//! ```text
//! SimpleExecutor -> [CachingExecutor] -> interceptor 1 -> ... -> interceptor n
//! ```
//!
//! Every layer is a `Box<dyn Executor>`; callers never see the concrete shape.

use crate::db::params::{bound_query, describe_params};
use crate::db::pool::ConnectionPool;
use crate::db::types::{column_names, row_to_json};
use crate::error::{BatisError, BatisResult};
use crate::logging::Log;
use crate::models::{MappedStatement, QueryOutput, SqlParam};
use async_trait::async_trait;
use sqlx::{Any, Transaction};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

/// Hit/miss counters of a result cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Cache-specific operations, reachable through [`Executor::cache`] when the
/// pipeline contains a caching layer.
pub trait StatementCache: Send {
    /// Number of query results currently held.
    fn cached_entries(&self) -> usize;

    /// Drop every cached result.
    fn clear(&mut self);

    fn stats(&self) -> CacheStats;
}

/// The executor capability set.
///
/// # Forwarding contract
///
/// Interceptors wrap an executor in another executor. A wrapper must delegate
/// every operation it does not specifically intercept to the wrapped value with
/// identical arguments and return its result unchanged. That includes the probes
/// [`id`](Executor::id), [`auto_commit`](Executor::auto_commit),
/// [`is_closed`](Executor::is_closed) and [`cache`](Executor::cache).
/// None of the methods have default bodies, so a wrapper has to spell out each
/// delegation. The interceptor chain re-checks the probes after every wrap and
/// rejects a wrapper whose probes disagree with its input.
#[async_trait]
pub trait Executor: Send {
    /// Identity of the pipeline; shared by every layer that wraps the same base.
    fn id(&self) -> Uuid;

    fn auto_commit(&self) -> bool;

    /// Run a query statement and return its rows.
    async fn query(
        &mut self,
        statement: &MappedStatement,
        params: &[SqlParam],
    ) -> BatisResult<QueryOutput>;

    /// Run an INSERT/UPDATE/DELETE statement and return the affected row count.
    async fn update(&mut self, statement: &MappedStatement, params: &[SqlParam])
    -> BatisResult<u64>;

    async fn commit(&mut self) -> BatisResult<()>;

    async fn rollback(&mut self) -> BatisResult<()>;

    /// End the unit of work. Uncommitted work is rolled back.
    async fn close(&mut self) -> BatisResult<()>;

    fn is_closed(&self) -> bool;

    /// Cache capability probe; `None` when no caching layer is present.
    fn cache(&mut self) -> Option<&mut dyn StatementCache>;
}

/// Base executor bound to one pool handle and one auto-commit mode.
///
/// With auto-commit off, the first statement opens a transaction that lives until
/// `commit`, `rollback` or `close`.
pub struct SimpleExecutor {
    id: Uuid,
    pool: ConnectionPool,
    auto_commit: bool,
    transaction: Option<Transaction<'static, Any>>,
    statement_timeout: Option<Duration>,
    log: Option<Arc<dyn Log>>,
    closed: bool,
}

impl SimpleExecutor {
    pub fn new(pool: ConnectionPool, auto_commit: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            pool,
            auto_commit,
            transaction: None,
            statement_timeout: None,
            log: None,
            closed: false,
        }
    }

    /// Apply a timeout to every statement.
    pub fn with_statement_timeout(mut self, statement_timeout: Option<Duration>) -> Self {
        self.statement_timeout = statement_timeout;
        self
    }

    /// Send statement logs to `log`.
    pub fn with_log(mut self, log: Option<Arc<dyn Log>>) -> Self {
        self.log = log;
        self
    }

    /// Whether a transaction is currently open.
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    fn ensure_open(&self) -> BatisResult<()> {
        if self.closed {
            return Err(BatisError::executor_closed(self.id));
        }
        Ok(())
    }

    async fn transaction(&mut self) -> BatisResult<&mut Transaction<'static, Any>> {
        if self.transaction.is_none() {
            let tx = self.pool.inner().begin().await?;
            debug!(executor_id = %self.id, "Transaction started");
            self.transaction = Some(tx);
        }
        self.transaction
            .as_mut()
            .ok_or_else(|| BatisError::internal("transaction missing after begin"))
    }

    fn log_statement(&self, statement: &MappedStatement, params: &[SqlParam]) {
        if let Some(log) = &self.log {
            if log.is_debug_enabled() {
                log.debug(&format!("==>  Preparing: {}", statement.sql()));
                log.debug(&format!("==> Parameters: {}", describe_params(params)));
            }
        }
    }

    fn log_outcome(&self, label: &str, count: u64) {
        if let Some(log) = &self.log {
            if log.is_debug_enabled() {
                log.debug(&format!("<==      {}: {}", label, count));
            }
        }
    }
}

#[async_trait]
impl Executor for SimpleExecutor {
    fn id(&self) -> Uuid {
        self.id
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn query(
        &mut self,
        statement: &MappedStatement,
        params: &[SqlParam],
    ) -> BatisResult<QueryOutput> {
        self.ensure_open()?;
        self.log_statement(statement, params);

        let start = Instant::now();
        let limit = self.statement_timeout;
        let rows = if self.auto_commit {
            let query = bound_query(statement.sql(), params);
            with_timeout(limit, statement.id(), query.fetch_all(self.pool.inner())).await?
        } else {
            let tx = self.transaction().await?;
            let query = bound_query(statement.sql(), params);
            with_timeout(limit, statement.id(), query.fetch_all(&mut **tx)).await?
        };

        debug!(
            executor_id = %self.id,
            statement_id = %statement.id(),
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query executed"
        );
        self.log_outcome("Total", rows.len() as u64);

        Ok(QueryOutput {
            columns: rows.first().map(column_names).unwrap_or_default(),
            rows: rows.iter().map(row_to_json).collect(),
        })
    }

    async fn update(
        &mut self,
        statement: &MappedStatement,
        params: &[SqlParam],
    ) -> BatisResult<u64> {
        self.ensure_open()?;
        self.log_statement(statement, params);

        let start = Instant::now();
        let limit = self.statement_timeout;
        let result = if self.auto_commit {
            let query = bound_query(statement.sql(), params);
            with_timeout(limit, statement.id(), query.execute(self.pool.inner())).await?
        } else {
            let tx = self.transaction().await?;
            let query = bound_query(statement.sql(), params);
            with_timeout(limit, statement.id(), query.execute(&mut **tx)).await?
        };
        let rows_affected = result.rows_affected();

        debug!(
            executor_id = %self.id,
            statement_id = %statement.id(),
            rows_affected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Update executed"
        );
        self.log_outcome("Updates", rows_affected);

        Ok(rows_affected)
    }

    async fn commit(&mut self) -> BatisResult<()> {
        self.ensure_open()?;
        if let Some(tx) = self.transaction.take() {
            tx.commit().await?;
            debug!(executor_id = %self.id, "Transaction committed");
        }
        Ok(())
    }

    async fn rollback(&mut self) -> BatisResult<()> {
        self.ensure_open()?;
        if let Some(tx) = self.transaction.take() {
            tx.rollback().await?;
            debug!(executor_id = %self.id, "Transaction rolled back");
        }
        Ok(())
    }

    async fn close(&mut self) -> BatisResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(tx) = self.transaction.take() {
            debug!(executor_id = %self.id, "Rolling back uncommitted work on close");
            tx.rollback().await?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn cache(&mut self) -> Option<&mut dyn StatementCache> {
        None
    }
}

/// Await a driver future, bounded by `limit` when one is configured.
async fn with_timeout<T, F>(limit: Option<Duration>, operation: &str, fut: F) -> BatisResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match limit {
        Some(limit) => timeout(limit, fut)
            .await
            .map_err(|_| BatisError::timeout(operation, limit.as_secs()))?
            .map_err(BatisError::from),
        None => fut.await.map_err(BatisError::from),
    }
}
