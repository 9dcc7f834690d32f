//! Caching decorator for executors.
//!
//! [`CachingExecutor`] wraps another executor and keeps query results in a bounded
//! LRU cache keyed by statement id, SQL text and bound parameters. Any update or
//! rollback flushes the cache, so a unit of work never reads results that predate
//! its own writes.

use crate::db::executor::{CacheStats, Executor, StatementCache};
use crate::error::BatisResult;
use crate::models::{MappedStatement, QueryOutput, SqlParam};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::{debug, trace};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    statement_id: String,
    sql: String,
    params: Vec<ParamKey>,
}

/// Hashable form of a [`SqlParam`]. Keeps the variant, so values that render
/// alike (bytes vs. their base64 text, NaN vs. NULL) stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ParamKey {
    Null,
    Bool(bool),
    Int(i64),
    /// Bit pattern of the float
    Float(u64),
    String(String),
    Bytes(Vec<u8>),
}

impl From<&SqlParam> for ParamKey {
    fn from(param: &SqlParam) -> Self {
        match param {
            SqlParam::Null => Self::Null,
            SqlParam::Bool(v) => Self::Bool(*v),
            SqlParam::Int(v) => Self::Int(*v),
            SqlParam::Float(v) => Self::Float(v.to_bits()),
            SqlParam::String(v) => Self::String(v.clone()),
            SqlParam::Bytes(v) => Self::Bytes(v.clone()),
        }
    }
}

impl CacheKey {
    fn new(statement: &MappedStatement, params: &[SqlParam]) -> Self {
        Self {
            statement_id: statement.id().to_string(),
            sql: statement.sql().to_string(),
            params: params.iter().map(ParamKey::from).collect(),
        }
    }
}

pub struct CachingExecutor {
    delegate: Box<dyn Executor>,
    entries: LruCache<CacheKey, QueryOutput>,
    stats: CacheStats,
}

impl CachingExecutor {
    /// Wrap `delegate`, holding at most `capacity` results (minimum 1).
    pub fn new(delegate: Box<dyn Executor>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            delegate,
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    fn flush(&mut self, reason: &str) {
        if !self.entries.is_empty() {
            debug!(
                executor_id = %self.delegate.id(),
                entries = self.entries.len(),
                reason,
                "Flushing result cache"
            );
            self.entries.clear();
        }
    }
}

#[async_trait]
impl Executor for CachingExecutor {
    fn id(&self) -> Uuid {
        self.delegate.id()
    }

    fn auto_commit(&self) -> bool {
        self.delegate.auto_commit()
    }

    async fn query(
        &mut self,
        statement: &MappedStatement,
        params: &[SqlParam],
    ) -> BatisResult<QueryOutput> {
        if !statement.template().use_cache() || self.delegate.is_closed() {
            return self.delegate.query(statement, params).await;
        }

        let key = CacheKey::new(statement, params);
        if let Some(hit) = self.entries.get(&key) {
            self.stats.hits += 1;
            trace!(statement_id = %statement.id(), "Cache hit");
            return Ok(hit.clone());
        }

        self.stats.misses += 1;
        let output = self.delegate.query(statement, params).await?;
        self.entries.put(key, output.clone());
        Ok(output)
    }

    async fn update(
        &mut self,
        statement: &MappedStatement,
        params: &[SqlParam],
    ) -> BatisResult<u64> {
        self.flush("update");
        self.delegate.update(statement, params).await
    }

    async fn commit(&mut self) -> BatisResult<()> {
        self.delegate.commit().await
    }

    async fn rollback(&mut self) -> BatisResult<()> {
        self.flush("rollback");
        self.delegate.rollback().await
    }

    async fn close(&mut self) -> BatisResult<()> {
        self.flush("close");
        self.delegate.close().await
    }

    fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }

    fn cache(&mut self) -> Option<&mut dyn StatementCache> {
        Some(self)
    }
}

impl StatementCache for CachingExecutor {
    fn cached_entries(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SqlTemplate;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Executor that answers every query with its call count.
    struct CountingExecutor {
        id: Uuid,
        queries: Arc<AtomicUsize>,
        closed: bool,
    }

    #[async_trait]
    impl Executor for CountingExecutor {
        fn id(&self) -> Uuid {
            self.id
        }

        fn auto_commit(&self) -> bool {
            true
        }

        async fn query(
            &mut self,
            _statement: &MappedStatement,
            _params: &[SqlParam],
        ) -> BatisResult<QueryOutput> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
            let mut row = serde_json::Map::new();
            row.insert("n".to_string(), serde_json::Value::from(n as u64));
            Ok(QueryOutput {
                columns: vec!["n".to_string()],
                rows: vec![row],
            })
        }

        async fn update(
            &mut self,
            _statement: &MappedStatement,
            _params: &[SqlParam],
        ) -> BatisResult<u64> {
            Ok(1)
        }

        async fn commit(&mut self) -> BatisResult<()> {
            Ok(())
        }

        async fn rollback(&mut self) -> BatisResult<()> {
            Ok(())
        }

        async fn close(&mut self) -> BatisResult<()> {
            self.closed = true;
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed
        }

        fn cache(&mut self) -> Option<&mut dyn StatementCache> {
            None
        }
    }

    fn caching(capacity: usize) -> (CachingExecutor, Arc<AtomicUsize>) {
        let queries = Arc::new(AtomicUsize::new(0));
        let inner = CountingExecutor {
            id: Uuid::new_v4(),
            queries: queries.clone(),
            closed: false,
        };
        (CachingExecutor::new(Box::new(inner), capacity), queries)
    }

    fn select(id: &str) -> MappedStatement {
        MappedStatement::new(id, SqlTemplate::new("SELECT n FROM counter WHERE id = ?"))
    }

    #[tokio::test]
    async fn test_repeated_query_served_from_cache() {
        let (mut exec, queries) = caching(8);
        let stmt = select("counter.get");

        let first = exec.query(&stmt, &[SqlParam::Int(1)]).await.unwrap();
        let second = exec.query(&stmt, &[SqlParam::Int(1)]).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(queries.load(Ordering::SeqCst), 1);
        assert_eq!(exec.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn test_different_params_miss() {
        let (mut exec, queries) = caching(8);
        let stmt = select("counter.get");

        exec.query(&stmt, &[SqlParam::Int(1)]).await.unwrap();
        exec.query(&stmt, &[SqlParam::Int(2)]).await.unwrap();

        assert_eq!(queries.load(Ordering::SeqCst), 2);
        assert_eq!(exec.cached_entries(), 2);
    }

    #[tokio::test]
    async fn test_params_that_serialize_alike_still_miss() {
        let (mut exec, queries) = caching(8);
        let stmt = select("counter.get");

        let bytes = exec
            .query(&stmt, &[SqlParam::Bytes(b"hi".to_vec())])
            .await
            .unwrap();
        let text = exec
            .query(&stmt, &[SqlParam::String("aGk=".to_string())])
            .await
            .unwrap();
        assert_ne!(bytes, text);

        let null = exec.query(&stmt, &[SqlParam::Null]).await.unwrap();
        let nan = exec.query(&stmt, &[SqlParam::Float(f64::NAN)]).await.unwrap();
        let inf = exec
            .query(&stmt, &[SqlParam::Float(f64::INFINITY)])
            .await
            .unwrap();
        assert_ne!(null, nan);
        assert_ne!(nan, inf);

        assert_eq!(queries.load(Ordering::SeqCst), 5);
        assert_eq!(exec.stats(), CacheStats { hits: 0, misses: 5 });

        // NaN keys by bit pattern, so the same NaN is still a hit
        exec.query(&stmt, &[SqlParam::Float(f64::NAN)]).await.unwrap();
        assert_eq!(exec.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_update_flushes_cache() {
        let (mut exec, queries) = caching(8);
        let stmt = select("counter.get");
        let bump = MappedStatement::new(
            "counter.bump",
            SqlTemplate::new("UPDATE counter SET n = n + 1"),
        );

        exec.query(&stmt, &[]).await.unwrap();
        exec.update(&bump, &[]).await.unwrap();
        assert_eq!(exec.cached_entries(), 0);

        exec.query(&stmt, &[]).await.unwrap();
        assert_eq!(queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_commit_keeps_and_rollback_flushes() {
        let (mut exec, _) = caching(8);
        let stmt = select("counter.get");

        exec.query(&stmt, &[]).await.unwrap();
        exec.commit().await.unwrap();
        assert_eq!(exec.cached_entries(), 1);

        exec.rollback().await.unwrap();
        assert_eq!(exec.cached_entries(), 0);
    }

    #[tokio::test]
    async fn test_uncacheable_template_bypasses_cache() {
        let (mut exec, queries) = caching(8);
        let stmt = MappedStatement::new(
            "counter.live",
            SqlTemplate::new("SELECT n FROM counter").with_cache(false),
        );

        exec.query(&stmt, &[]).await.unwrap();
        exec.query(&stmt, &[]).await.unwrap();

        assert_eq!(queries.load(Ordering::SeqCst), 2);
        assert_eq!(exec.cached_entries(), 0);
    }

    #[tokio::test]
    async fn test_capacity_bounds_entries() {
        let (mut exec, _) = caching(2);
        let stmt = select("counter.get");
        for i in 0..5 {
            exec.query(&stmt, &[SqlParam::Int(i)]).await.unwrap();
        }
        assert_eq!(exec.cached_entries(), 2);
    }

    #[tokio::test]
    async fn test_probes_forward_to_delegate() {
        let (mut exec, _) = caching(0);
        let inner_id = exec.delegate.id();
        assert_eq!(exec.id(), inner_id);
        assert!(exec.auto_commit());
        assert!(exec.cache().is_some());

        exec.close().await.unwrap();
        assert!(exec.is_closed());
    }
}
