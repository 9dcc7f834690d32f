//! Statement log implementations and their registry.
//!
//! A configuration can carry one [`Log`], selected by symbolic name through a
//! [`LogRegistry`]. The registry maps names to factory functions taking the
//! logger's tag. Built-in names:
//!
//! - `TRACING` - forwards to the `tracing` macros
//! - `STDOUT` - prints to stdout/stderr
//! - `NO_LOGGING` - discards everything
//!
//! Internal diagnostics of the crate always go through `tracing` directly; the
//! `Log` is only used for the statement log written by executors.

use crate::error::{BatisError, BatisResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tag handed to log factories when a configuration selects a log implementation.
pub const DEFAULT_LOG_TAG: &str = "sqlbatis.statement";

pub const LOG_IMPL_TRACING: &str = "TRACING";
pub const LOG_IMPL_STDOUT: &str = "STDOUT";
pub const LOG_IMPL_NO_LOGGING: &str = "NO_LOGGING";

/// Statement log capability.
pub trait Log: Send + Sync {
    /// Name the logger was constructed with.
    fn tag(&self) -> &str;

    fn is_debug_enabled(&self) -> bool;

    fn is_trace_enabled(&self) -> bool;

    fn error(&self, message: &str);

    fn warn(&self, message: &str);

    fn debug(&self, message: &str);

    fn trace(&self, message: &str);
}

/// Factory building a log from its tag.
pub type LogFactory = Arc<dyn Fn(&str) -> BatisResult<Arc<dyn Log>> + Send + Sync>;

/// Forwards to `tracing`, carrying the tag as a field.
#[derive(Debug, Clone)]
pub struct TracingLog {
    tag: String,
}

impl TracingLog {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Log for TracingLog {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn is_debug_enabled(&self) -> bool {
        tracing::enabled!(tracing::Level::DEBUG)
    }

    fn is_trace_enabled(&self) -> bool {
        tracing::enabled!(tracing::Level::TRACE)
    }

    fn error(&self, message: &str) {
        tracing::error!(tag = %self.tag, "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(tag = %self.tag, "{}", message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!(tag = %self.tag, "{}", message);
    }

    fn trace(&self, message: &str) {
        tracing::trace!(tag = %self.tag, "{}", message);
    }
}

/// Prints debug/trace lines to stdout and warnings/errors to stderr.
#[derive(Debug, Clone)]
pub struct StdOutLog {
    tag: String,
}

impl StdOutLog {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Log for StdOutLog {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn is_debug_enabled(&self) -> bool {
        true
    }

    fn is_trace_enabled(&self) -> bool {
        true
    }

    fn error(&self, message: &str) {
        eprintln!("[{}] ERROR {}", self.tag, message);
    }

    fn warn(&self, message: &str) {
        eprintln!("[{}] WARN {}", self.tag, message);
    }

    fn debug(&self, message: &str) {
        println!("[{}] {}", self.tag, message);
    }

    fn trace(&self, message: &str) {
        println!("[{}] {}", self.tag, message);
    }
}

#[derive(Debug, Clone)]
pub struct NoLoggingLog {
    tag: String,
}

impl NoLoggingLog {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Log for NoLoggingLog {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn is_debug_enabled(&self) -> bool {
        false
    }

    fn is_trace_enabled(&self) -> bool {
        false
    }

    fn error(&self, _message: &str) {}

    fn warn(&self, _message: &str) {}

    fn debug(&self, _message: &str) {}

    fn trace(&self, _message: &str) {}
}

/// Symbolic name -> log factory. Names are matched case-insensitively.
#[derive(Clone)]
pub struct LogRegistry {
    factories: HashMap<String, LogFactory>,
}

impl LogRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in implementations.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(LOG_IMPL_TRACING, |tag| Ok(Arc::new(TracingLog::new(tag))));
        registry.register(LOG_IMPL_STDOUT, |tag| Ok(Arc::new(StdOutLog::new(tag))));
        registry.register(LOG_IMPL_NO_LOGGING, |tag| {
            Ok(Arc::new(NoLoggingLog::new(tag)))
        });
        registry
    }

    /// Register a factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str) -> BatisResult<Arc<dyn Log>> + Send + Sync + 'static,
    {
        self.factories.insert(normalize(name), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&normalize(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve `name` and build a log with the given tag.
    pub fn create(&self, name: &str, tag: &str) -> BatisResult<Arc<dyn Log>> {
        let factory = self.factories.get(&normalize(name)).ok_or_else(|| {
            BatisError::log_resolution(
                name,
                format!("no implementation registered (known: {})", self.names().join(", ")),
            )
        })?;

        factory(tag).map_err(|e| match e {
            BatisError::LogResolution { .. } => e,
            other => BatisError::log_resolution(name, other.to_string()),
        })
    }
}

impl Default for LogRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for LogRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogRegistry")
            .field("names", &self.names())
            .finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// Install a global tracing subscriber for host applications and tests.
///
/// `RUST_LOG` takes precedence over `default_level`. Returns `false` when a
/// subscriber was already installed.
pub fn init_tracing(default_level: &str, json: bool) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(fmt::layer().json()).try_init().is_ok()
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init()
            .is_ok()
    }
}
