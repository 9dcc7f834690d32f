//! Interceptors and the chain that applies them.
//!
//! An [`Interceptor`] wraps an executor in a decorator that adds cross-cutting
//! behavior. The [`InterceptorChain`] applies interceptors strictly in registration
//! order, so with `i1..in` registered the pipeline is
//! `in.wrap(... i1.wrap(target) ...)`.
//!
//! Wrappers must honor the forwarding contract documented on
//! [`Executor`](crate::db::Executor).

pub mod traced;

use crate::db::Executor;
use crate::error::{BatisError, BatisResult};
use std::sync::Arc;
use uuid::Uuid;

pub use traced::{TracedExecutor, TracingInterceptor};

pub trait Interceptor: Send + Sync {
    /// Name used in diagnostics and assembly errors.
    fn name(&self) -> &str;

    /// Wrap `target`, returning an executor with the same capability set.
    fn wrap(&self, target: Box<dyn Executor>) -> BatisResult<Box<dyn Executor>>;
}

/// Capability probe values that every wrapper must pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Probe {
    id: Uuid,
    auto_commit: bool,
    caching: bool,
}

impl Probe {
    fn of(executor: &mut dyn Executor) -> Self {
        Self {
            id: executor.id(),
            auto_commit: executor.auto_commit(),
            caching: executor.cache().is_some(),
        }
    }

    /// Describe how `after` breaks the forwarding contract, if it does.
    fn violation(&self, after: &Probe) -> Option<String> {
        if self.id != after.id {
            return Some(format!(
                "executor id changed from {} to {}",
                self.id, after.id
            ));
        }
        if self.auto_commit != after.auto_commit {
            return Some(format!(
                "auto_commit changed from {} to {}",
                self.auto_commit, after.auto_commit
            ));
        }
        if self.caching != after.caching {
            return Some(if self.caching {
                "the cache capability was dropped".to_string()
            } else {
                "a cache capability appeared that the wrapped executor does not have".to_string()
            });
        }
        None
    }
}

/// Ordered interceptors; append-only.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor. No deduplication.
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) {
        tracing::debug!(
            interceptor = interceptor.name(),
            position = self.interceptors.len(),
            "Interceptor registered"
        );
        self.interceptors.push(interceptor);
    }

    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Apply every interceptor in registration order.
    ///
    /// Fails with [`BatisError::ExecutorAssembly`] when an interceptor's `wrap`
    /// fails or when the wrapper's probes disagree with its input.
    pub fn wrap_all(&self, target: Box<dyn Executor>) -> BatisResult<Box<dyn Executor>> {
        let mut target = target;
        for interceptor in &self.interceptors {
            let before = Probe::of(target.as_mut());
            let mut wrapped = interceptor.wrap(target).map_err(|e| match e {
                BatisError::ExecutorAssembly { .. } => e,
                other => BatisError::executor_assembly(interceptor.name(), other.to_string()),
            })?;

            let after = Probe::of(wrapped.as_mut());
            if let Some(reason) = before.violation(&after) {
                return Err(BatisError::executor_assembly(interceptor.name(), reason));
            }
            target = wrapped;
        }
        Ok(target)
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.interceptors.iter().map(|i| i.name()).collect();
        f.debug_struct("InterceptorChain")
            .field("interceptors", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StatementCache;
    use crate::models::{MappedStatement, QueryOutput, SqlParam, SqlTemplate};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Bare executor recording nothing; enough for probing.
    struct StubExecutor {
        id: Uuid,
    }

    #[async_trait]
    impl Executor for StubExecutor {
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
            Ok(QueryOutput::default())
        }

        async fn update(
            &mut self,
            _statement: &MappedStatement,
            _params: &[SqlParam],
        ) -> BatisResult<u64> {
            Ok(0)
        }

        async fn commit(&mut self) -> BatisResult<()> {
            Ok(())
        }

        async fn rollback(&mut self) -> BatisResult<()> {
            Ok(())
        }

        async fn close(&mut self) -> BatisResult<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }

        fn cache(&mut self) -> Option<&mut dyn StatementCache> {
            None
        }
    }

    /// Records the order in which it was asked to wrap.
    struct Recording {
        name: String,
        order: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        fn wrap(&self, target: Box<dyn Executor>) -> BatisResult<Box<dyn Executor>> {
            self.order
                .lock()
                .map_err(|_| BatisError::internal("poisoned"))?
                .push(self.name.clone());
            Ok(target)
        }
    }

    struct Failing;

    impl Interceptor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn wrap(&self, _target: Box<dyn Executor>) -> BatisResult<Box<dyn Executor>> {
            Err(BatisError::internal("plugin misconfigured"))
        }
    }

    /// Replaces the target with an unrelated executor.
    struct Hijacking;

    impl Interceptor for Hijacking {
        fn name(&self) -> &str {
            "hijacking"
        }

        fn wrap(&self, _target: Box<dyn Executor>) -> BatisResult<Box<dyn Executor>> {
            Ok(Box::new(StubExecutor { id: Uuid::new_v4() }))
        }
    }

    fn stub() -> Box<dyn Executor> {
        Box::new(StubExecutor { id: Uuid::new_v4() })
    }

    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Innermost executor: logs "base" on query and owns an empty cache.
    struct LoggedBase {
        id: Uuid,
        calls: CallLog,
    }

    impl StatementCache for LoggedBase {
        fn cached_entries(&self) -> usize {
            0
        }

        fn clear(&mut self) {}

        fn stats(&self) -> crate::db::CacheStats {
            crate::db::CacheStats::default()
        }
    }

    #[async_trait]
    impl Executor for LoggedBase {
        fn id(&self) -> Uuid {
            self.id
        }

        fn auto_commit(&self) -> bool {
            false
        }

        async fn query(
            &mut self,
            _statement: &MappedStatement,
            _params: &[SqlParam],
        ) -> BatisResult<QueryOutput> {
            self.calls.lock().unwrap().push("base".to_string());
            Ok(QueryOutput::default())
        }

        async fn update(
            &mut self,
            _statement: &MappedStatement,
            _params: &[SqlParam],
        ) -> BatisResult<u64> {
            Ok(0)
        }

        async fn commit(&mut self) -> BatisResult<()> {
            Ok(())
        }

        async fn rollback(&mut self) -> BatisResult<()> {
            Ok(())
        }

        async fn close(&mut self) -> BatisResult<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }

        fn cache(&mut self) -> Option<&mut dyn StatementCache> {
            Some(self)
        }
    }

    /// Wraps its target in a [`Layer`] carrying the interceptor's name.
    struct Layering {
        name: String,
        calls: CallLog,
        own_cache: bool,
    }

    impl Interceptor for Layering {
        fn name(&self) -> &str {
            &self.name
        }

        fn wrap(&self, target: Box<dyn Executor>) -> BatisResult<Box<dyn Executor>> {
            Ok(Box::new(Layer {
                name: self.name.clone(),
                calls: self.calls.clone(),
                own_cache: self.own_cache,
                inner: target,
            }))
        }
    }

    /// Logs its name on query, then delegates. With `own_cache` it answers the
    /// cache probe itself instead of forwarding.
    struct Layer {
        name: String,
        calls: CallLog,
        own_cache: bool,
        inner: Box<dyn Executor>,
    }

    impl StatementCache for Layer {
        fn cached_entries(&self) -> usize {
            0
        }

        fn clear(&mut self) {}

        fn stats(&self) -> crate::db::CacheStats {
            crate::db::CacheStats::default()
        }
    }

    #[async_trait]
    impl Executor for Layer {
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
            self.calls.lock().unwrap().push(self.name.clone());
            self.inner.query(statement, params).await
        }

        async fn update(
            &mut self,
            statement: &MappedStatement,
            params: &[SqlParam],
        ) -> BatisResult<u64> {
            self.inner.update(statement, params).await
        }

        async fn commit(&mut self) -> BatisResult<()> {
            self.inner.commit().await
        }

        async fn rollback(&mut self) -> BatisResult<()> {
            self.inner.rollback().await
        }

        async fn close(&mut self) -> BatisResult<()> {
            self.inner.close().await
        }

        fn is_closed(&self) -> bool {
            self.inner.is_closed()
        }

        fn cache(&mut self) -> Option<&mut dyn StatementCache> {
            if self.own_cache {
                Some(self)
            } else {
                self.inner.cache()
            }
        }
    }

    fn layering(name: &str, calls: &CallLog, own_cache: bool) -> Arc<dyn Interceptor> {
        Arc::new(Layering {
            name: name.to_string(),
            calls: calls.clone(),
            own_cache,
        })
    }

    #[test]
    fn test_empty_chain_returns_target() {
        let chain = InterceptorChain::new();
        let target = stub();
        let id = target.id();
        let wrapped = chain.wrap_all(target).unwrap();
        assert_eq!(wrapped.id(), id);
        assert!(chain.is_empty());
    }

    #[test]
    fn test_wrap_follows_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        for name in ["first", "second", "third"] {
            chain.add_interceptor(Arc::new(Recording {
                name: name.to_string(),
                order: order.clone(),
            }));
        }

        chain.wrap_all(stub()).unwrap();
        chain.wrap_all(stub()).unwrap();

        let order = order.lock().unwrap();
        assert_eq!(
            *order,
            vec!["first", "second", "third", "first", "second", "third"]
        );
    }

    #[tokio::test]
    async fn test_wrappers_nest_last_registered_outermost() {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        for name in ["i1", "i2", "i3"] {
            chain.add_interceptor(layering(name, &calls, false));
        }

        let base_id = Uuid::new_v4();
        let base = Box::new(LoggedBase {
            id: base_id,
            calls: calls.clone(),
        });
        let mut executor = chain.wrap_all(base).unwrap();

        let statement = MappedStatement::new("t.select", SqlTemplate::new("SELECT 1"));
        executor.query(&statement, &[]).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["i3", "i2", "i1", "base"]);
        assert_eq!(executor.id(), base_id);
        assert!(!executor.auto_commit());
        assert!(executor.cache().is_some());
    }

    #[test]
    fn test_wrapper_adding_cache_rejected() {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        chain.add_interceptor(layering("cache-adding", &calls, true));

        let err = chain.wrap_all(stub()).err().unwrap();
        assert!(
            matches!(err, BatisError::ExecutorAssembly { ref interceptor, .. } if interceptor == "cache-adding")
        );
        assert!(err.to_string().contains("a cache capability appeared"));
    }

    #[test]
    fn test_failing_wrap_is_assembly_error() {
        let mut chain = InterceptorChain::new();
        chain.add_interceptor(Arc::new(Failing));
        let err = chain.wrap_all(stub()).err().unwrap();
        assert!(
            matches!(err, BatisError::ExecutorAssembly { ref interceptor, .. } if interceptor == "failing")
        );
        assert!(err.to_string().contains("plugin misconfigured"));
    }

    #[test]
    fn test_non_conforming_wrapper_rejected() {
        let mut chain = InterceptorChain::new();
        chain.add_interceptor(Arc::new(Hijacking));
        let err = chain.wrap_all(stub()).err().unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("executor id changed"));
    }

    #[test]
    fn test_debug_lists_names() {
        let mut chain = InterceptorChain::new();
        chain.add_interceptor(Arc::new(Failing));
        chain.add_interceptor(Arc::new(Failing));
        assert_eq!(chain.len(), 2);
        assert!(format!("{:?}", chain).contains("failing"));
    }
}
