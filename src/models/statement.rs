//! Statement templates and their classification.
//!
//! Templates are produced elsewhere and treated as opaque by the configuration.
//! The only thing derived here is the command type, detected with
//! [sqlparser](https://docs.rs/sqlparser/) when the caller does not state it.

use serde::{Deserialize, Serialize};
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Kind of SQL command a template runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlCommandType {
    Select,
    Insert,
    Update,
    Delete,
    /// DDL, procedure calls, multiple statements, or SQL the parser rejects
    Unknown,
}

impl SqlCommandType {
    /// Classify SQL text. Anything that is not exactly one SELECT/INSERT/UPDATE/DELETE
    /// statement is `Unknown`.
    pub fn detect(sql: &str) -> Self {
        let statements = match Parser::parse_sql(&GenericDialect {}, sql) {
            Ok(statements) => statements,
            Err(_) => return Self::Unknown,
        };

        match statements.as_slice() {
            [single] => classify_statement(single),
            _ => Self::Unknown,
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self, Self::Select)
    }
}

fn classify_statement(stmt: &Statement) -> SqlCommandType {
    match stmt {
        Statement::Query(_) => SqlCommandType::Select,
        Statement::Insert(_) => SqlCommandType::Insert,
        Statement::Update { .. } => SqlCommandType::Update,
        Statement::Delete(_) => SqlCommandType::Delete,
        _ => SqlCommandType::Unknown,
    }
}

/// A parsed SQL statement template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlTemplate {
    sql: String,
    command: SqlCommandType,
    /// Whether query results may be served by the caching executor
    use_cache: bool,
}

impl SqlTemplate {
    /// Create a template, detecting its command type from the SQL text.
    ///
    /// SELECT templates are cacheable by default.
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let command = SqlCommandType::detect(&sql);
        Self {
            use_cache: command.is_select(),
            sql,
            command,
        }
    }

    /// Override the detected command type.
    pub fn with_command(mut self, command: SqlCommandType) -> Self {
        self.command = command;
        self
    }

    /// Opt in or out of result caching.
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn command(&self) -> SqlCommandType {
        self.command
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }
}

/// A template registered under a statement id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedStatement {
    id: String,
    template: SqlTemplate,
}

impl MappedStatement {
    pub fn new(id: impl Into<String>, template: SqlTemplate) -> Self {
        Self {
            id: id.into(),
            template,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn template(&self) -> &SqlTemplate {
        &self.template
    }

    pub fn sql(&self) -> &str {
        self.template.sql()
    }

    pub fn command(&self) -> SqlCommandType {
        self.template.command()
    }

    /// Namespace part of a dotted id (`user` for `user.findById`).
    pub fn namespace(&self) -> Option<&str> {
        self.id.rsplit_once('.').map(|(ns, _)| ns)
    }
}
