//! Statement registry: statement id -> mapped statement.

use crate::models::{MappedStatement, SqlTemplate};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct StatementRegistry {
    statements: HashMap<String, Arc<MappedStatement>>,
}

impl StatementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `template` under `id`. A later registration of the same id wins.
    pub fn insert(&mut self, id: impl Into<String>, template: SqlTemplate) {
        let id = id.into();
        let statement = Arc::new(MappedStatement::new(id.clone(), template));
        if self.statements.insert(id.clone(), statement).is_some() {
            debug!(statement_id = %id, "Replaced existing statement mapping");
        } else {
            debug!(statement_id = %id, "Statement mapping added");
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.statements.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<MappedStatement>> {
        self.statements.get(id).cloned()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.statements.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
