//! Configuration store and executor factory.
//!
//! Setup happens on a [`ConfigurationBuilder`]. [`ConfigurationBuilder::freeze`]
//! consumes the builder and returns an immutable [`Configuration`] that can be
//! shared across threads behind an `Arc` and hands out executors.
//!
//! ```text
//! ConfigurationBuilder --freeze()--> Configuration --new_executor()--> Box<dyn Executor>
//! ```

use crate::config::Settings;
use crate::db::{CachingExecutor, ConnectionPool, Executor, SimpleExecutor};
use crate::error::{BatisError, BatisResult};
use crate::logging::{DEFAULT_LOG_TAG, Log, LogRegistry};
use crate::models::{DataSource, MappedStatement, Properties, SqlTemplate};
use crate::plugin::{Interceptor, InterceptorChain};
use crate::session::mappers::{MapperRegistry, MapperType};
use crate::session::statements::StatementRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Mutable setup phase of a configuration.
#[derive(Default)]
pub struct ConfigurationBuilder {
    settings: Settings,
    log_registry: LogRegistry,
    logger: Option<Arc<dyn Log>>,
    data_source: Option<DataSource>,
    properties: Properties,
    pool: Option<ConnectionPool>,
    interceptor_chain: InterceptorChain,
    statements: StatementRegistry,
    mappers: MapperRegistry,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor; interceptors wrap executors in the order added.
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.interceptor_chain.add_interceptor(interceptor);
        self
    }

    /// Register a statement template under `id`, replacing any previous one.
    pub fn add_sql_mapping(&mut self, id: impl Into<String>, template: SqlTemplate) -> &mut Self {
        self.statements.insert(id, template);
        self
    }

    pub fn add_mapper<T: ?Sized + 'static>(&mut self) -> BatisResult<&mut Self> {
        self.add_mapper_type(MapperType::of::<T>())
    }

    pub fn add_mapper_type(&mut self, mapper: MapperType) -> BatisResult<&mut Self> {
        self.mappers.add_mapper(mapper)?;
        Ok(self)
    }

    pub fn has_mapper<T: ?Sized + 'static>(&self) -> bool {
        self.has_mapper_type(MapperType::of::<T>())
    }

    pub fn has_mapper_type(&self, mapper: MapperType) -> bool {
        self.mappers.has_mapper(mapper)
    }

    pub fn has_statement(&self, id: &str) -> bool {
        self.statements.contains(id)
    }

    pub fn get_mapped_statement(&self, id: &str) -> Option<Arc<MappedStatement>> {
        self.statements.get(id)
    }

    pub fn set_data_source(&mut self, data_source: DataSource) -> &mut Self {
        debug!(url = %data_source.masked_url(), "Data source set");
        self.data_source = Some(data_source);
        self
    }

    pub fn set_connection_pool(&mut self, pool: ConnectionPool) -> &mut Self {
        debug!(db_type = %pool.db_type(), "Connection pool set");
        self.pool = Some(pool);
        self
    }

    pub fn set_properties(&mut self, properties: Properties) -> &mut Self {
        debug!(count = properties.len(), "Properties set");
        self.properties = properties;
        self
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) -> &mut Self {
        self.settings.cache_enabled = enabled.into();
        self
    }

    pub fn set_lazy_loading_enabled(&mut self, enabled: bool) -> &mut Self {
        self.settings.lazy_loading_enabled = enabled.into();
        self
    }

    pub fn set_default_statement_timeout(&mut self, timeout: Duration) -> &mut Self {
        // whole seconds, rounded up
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.settings.default_statement_timeout_secs = Some(secs.max(1));
        self
    }

    pub fn set_local_cache_size(&mut self, size: usize) -> &mut Self {
        self.settings.local_cache_size = Some(size.max(1));
        self
    }

    /// Apply a setting by its string key, e.g. `("cacheEnabled", "true")`.
    ///
    /// A malformed value is rejected and the setting keeps its previous value.
    /// Toggles accept exactly `"true"` and `"false"`: after `cacheEnabled=true`,
    /// a rejected `"TRUE"` leaves caching on, so callers must not ignore the error.
    pub fn set_setting(&mut self, key: &str, value: &str) -> BatisResult<&mut Self> {
        self.settings.apply(key, value)?;
        debug!(key, value, "Setting applied");
        Ok(self)
    }

    /// Select the statement log implementation by name.
    ///
    /// An empty name leaves the current logger in place. A name that cannot be
    /// resolved is reported as a warning and leaves the configuration without a
    /// logger; setup carries on.
    pub fn set_log_impl(&mut self, name: &str) -> &mut Self {
        if name.trim().is_empty() {
            return self;
        }
        match self.log_registry.create(name, DEFAULT_LOG_TAG) {
            Ok(log) => {
                debug!(log_impl = name, tag = log.tag(), "Log implementation selected");
                self.logger = Some(log);
            }
            Err(e) => {
                warn!(log_impl = name, error = %e, "Could not resolve log implementation, statement logging disabled");
                self.logger = None;
            }
        }
        self
    }

    /// Make a custom log implementation selectable through [`set_log_impl`](Self::set_log_impl).
    pub fn register_log_impl<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&str) -> BatisResult<Arc<dyn Log>> + Send + Sync + 'static,
    {
        self.log_registry.register(name, factory);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn logger(&self) -> Option<&Arc<dyn Log>> {
        self.logger.as_ref()
    }

    /// End the setup phase.
    pub fn freeze(self) -> BatisResult<Configuration> {
        let pool = self.pool.ok_or_else(|| {
            BatisError::setup_usage(
                "Cannot freeze a configuration without a connection pool",
                "Call set_connection_pool before freeze",
            )
        })?;

        info!(
            db_type = %pool.db_type(),
            statements = self.statements.len(),
            mappers = self.mappers.len(),
            interceptors = self.interceptor_chain.len(),
            cache_enabled = %self.settings.cache_enabled,
            "Configuration frozen"
        );

        Ok(Configuration {
            settings: self.settings,
            logger: self.logger,
            data_source: self.data_source,
            properties: self.properties,
            pool,
            interceptor_chain: self.interceptor_chain,
            statements: self.statements,
            mappers: self.mappers,
        })
    }
}

impl std::fmt::Debug for ConfigurationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationBuilder")
            .field("settings", &self.settings)
            .field("logger", &self.logger.as_ref().map(|l| l.tag().to_string()))
            .field("data_source", &self.data_source)
            .field("pool", &self.pool)
            .field("interceptor_chain", &self.interceptor_chain)
            .field("statements", &self.statements.len())
            .field("mappers", &self.mappers.len())
            .finish()
    }
}

/// Frozen configuration. Immutable, `Send + Sync`.
pub struct Configuration {
    settings: Settings,
    logger: Option<Arc<dyn Log>>,
    data_source: Option<DataSource>,
    properties: Properties,
    pool: ConnectionPool,
    interceptor_chain: InterceptorChain,
    statements: StatementRegistry,
    mappers: MapperRegistry,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// Build a fresh executor pipeline for one unit of work.
    ///
    /// The base executor is wrapped in the caching decorator when caching is
    /// enabled, then passed through every interceptor in registration order.
    pub fn new_executor(&self, auto_commit: bool) -> BatisResult<Box<dyn Executor>> {
        let base = SimpleExecutor::new(self.pool.clone(), auto_commit)
            .with_statement_timeout(self.settings.default_statement_timeout())
            .with_log(self.logger.clone());

        let executor: Box<dyn Executor> = if self.settings.cache_enabled.is_enabled() {
            Box::new(CachingExecutor::new(
                Box::new(base),
                self.settings.local_cache_size_or_default(),
            ))
        } else {
            Box::new(base)
        };

        let executor = self.interceptor_chain.wrap_all(executor)?;

        debug!(
            executor_id = %executor.id(),
            auto_commit,
            caching = self.settings.cache_enabled.is_enabled(),
            interceptors = self.interceptor_chain.len(),
            "Executor created"
        );
        Ok(executor)
    }

    pub fn has_statement(&self, id: &str) -> bool {
        self.statements.contains(id)
    }

    pub fn get_mapped_statement(&self, id: &str) -> Option<Arc<MappedStatement>> {
        self.statements.get(id)
    }

    /// Registered statement ids, sorted.
    pub fn statement_ids(&self) -> Vec<&str> {
        self.statements.ids()
    }

    pub fn has_mapper<T: ?Sized + 'static>(&self) -> bool {
        self.has_mapper_type(MapperType::of::<T>())
    }

    pub fn has_mapper_type(&self, mapper: MapperType) -> bool {
        self.mappers.has_mapper(mapper)
    }

    pub fn mapper_types(&self) -> Vec<MapperType> {
        self.mappers.mapper_types()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.settings.cache_enabled.is_enabled()
    }

    pub fn is_lazy_loading_enabled(&self) -> bool {
        self.settings.lazy_loading_enabled.is_enabled()
    }

    pub fn default_statement_timeout(&self) -> Option<Duration> {
        self.settings.default_statement_timeout()
    }

    pub fn logger(&self) -> Option<&Arc<dyn Log>> {
        self.logger.as_ref()
    }

    pub fn data_source(&self) -> Option<&DataSource> {
        self.data_source.as_ref()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn connection_pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn interceptor_chain(&self) -> &InterceptorChain {
        &self.interceptor_chain
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("settings", &self.settings)
            .field("logger", &self.logger.as_ref().map(|l| l.tag().to_string()))
            .field("data_source", &self.data_source)
            .field("pool", &self.pool)
            .field("interceptor_chain", &self.interceptor_chain)
            .field("statements", &self.statements.ids())
            .field("mappers", &self.mappers.len())
            .finish()
    }
}
