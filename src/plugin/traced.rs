//! Statement timing interceptor.
//!
//! Emits a `tracing` event for every statement that passes through the pipeline,
//! and a warning when a statement runs longer than the slow threshold.

use crate::db::{Executor, StatementCache};
use crate::error::BatisResult;
use crate::models::{MappedStatement, QueryOutput, SqlParam};
use crate::plugin::Interceptor;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_SLOW_STATEMENT_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct TracingInterceptor {
    slow_threshold: Duration,
}

impl TracingInterceptor {
    pub fn new() -> Self {
        Self {
            slow_threshold: Duration::from_millis(DEFAULT_SLOW_STATEMENT_MS),
        }
    }

    pub fn with_slow_threshold(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }
}

impl Default for TracingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for TracingInterceptor {
    fn name(&self) -> &str {
        "tracing"
    }

    fn wrap(&self, target: Box<dyn Executor>) -> BatisResult<Box<dyn Executor>> {
        Ok(Box::new(TracedExecutor {
            inner: target,
            slow_threshold: self.slow_threshold,
            statements: 0,
        }))
    }
}

/// Executor wrapper produced by [`TracingInterceptor`].
pub struct TracedExecutor {
    inner: Box<dyn Executor>,
    slow_threshold: Duration,
    statements: u64,
}

impl TracedExecutor {
    /// Statements run through this wrapper so far.
    pub fn statements(&self) -> u64 {
        self.statements
    }

    fn record(&mut self, statement: &MappedStatement, kind: &str, elapsed: Duration, ok: bool) {
        self.statements += 1;
        let elapsed_ms = elapsed.as_millis() as u64;
        if elapsed > self.slow_threshold {
            warn!(
                executor_id = %self.inner.id(),
                statement_id = %statement.id(),
                kind,
                elapsed_ms,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "Slow statement"
            );
        } else {
            debug!(
                executor_id = %self.inner.id(),
                statement_id = %statement.id(),
                kind,
                elapsed_ms,
                ok,
                "Statement finished"
            );
        }
    }
}

#[async_trait]
impl Executor for TracedExecutor {
    fn id(&self) -> Uuid {
        self.inner.id()
    }

    fn auto_commit(&self) -> bool {
        self.inner.auto_commit()
    }

    async fn query(
        &mut self,
        statement: &MappedStatement,
        params: &[SqlParam],
    ) -> BatisResult<QueryOutput> {
        let start = Instant::now();
        let result = self.inner.query(statement, params).await;
        self.record(statement, "query", start.elapsed(), result.is_ok());
        result
    }

    async fn update(
        &mut self,
        statement: &MappedStatement,
        params: &[SqlParam],
    ) -> BatisResult<u64> {
        let start = Instant::now();
        let result = self.inner.update(statement, params).await;
        self.record(statement, "update", start.elapsed(), result.is_ok());
        result
    }

    async fn commit(&mut self) -> BatisResult<()> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> BatisResult<()> {
        self.inner.rollback().await
    }

    async fn close(&mut self) -> BatisResult<()> {
        debug!(
            executor_id = %self.inner.id(),
            statements = self.statements,
            "Closing traced executor"
        );
        self.inner.close().await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn cache(&mut self) -> Option<&mut dyn StatementCache> {
        self.inner.cache()
    }
}
