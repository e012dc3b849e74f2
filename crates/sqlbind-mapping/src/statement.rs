//! Statement definitions and their registry.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::BindingError;
use crate::source::SqlSource;

/// What a statement does, which drives caching and return-shape rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// A row-producing query.
    Select,
    /// Row insertion; returns an affected count.
    Insert,
    /// Row update; returns an affected count.
    Update,
    /// Row deletion; returns an affected count.
    Delete,
    /// Explicit flush of pending work.
    Flush,
}

impl CommandKind {
    /// Whether this kind mutates data.
    #[must_use]
    pub fn is_mutation(self) -> bool {
        matches!(self, CommandKind::Insert | CommandKind::Update | CommandKind::Delete)
    }
}

/// One named, parameterized unit of SQL plus its metadata.
pub struct StatementDefinition {
    /// Namespace-qualified id, e.g. `com.example.UserMapper.findById`.
    pub id: String,
    /// Command kind.
    pub kind: CommandKind,
    /// Id of the second-level cache this statement participates in.
    pub cache: Option<String>,
    /// Whether select results go through the cache. Defaults on for
    /// selects, off otherwise.
    pub use_cache: bool,
    /// Whether executing this statement clears its cache first. Defaults
    /// on for mutations, off for selects.
    pub flush_cache: bool,
    /// The statement's SQL.
    pub source: SqlSource,
}

impl StatementDefinition {
    /// A definition with kind-appropriate cache defaults.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: CommandKind, source: SqlSource) -> Self {
        Self {
            id: id.into(),
            kind,
            cache: None,
            use_cache: kind == CommandKind::Select,
            flush_cache: kind != CommandKind::Select,
            source,
        }
    }

    /// Bind this statement to a named cache.
    #[must_use]
    pub fn cache(mut self, cache_id: impl Into<String>) -> Self {
        self.cache = Some(cache_id.into());
        self
    }

    /// Override whether results are cached.
    #[must_use]
    pub fn use_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Override whether execution clears the cache first.
    #[must_use]
    pub fn flush_cache(mut self, enabled: bool) -> Self {
        self.flush_cache = enabled;
        self
    }
}

/// `namespace.name` with at least one dot, each segment an identifier.
static STATEMENT_ID: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)+$")
        .expect("statement id pattern is valid")
});

/// Externally populated table of statement id to definition.
#[derive(Default)]
pub struct StatementRegistry {
    statements: HashMap<String, Arc<StatementDefinition>>,
}

impl StatementRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a statement. Ids must be namespace-qualified and unique.
    pub fn register(&mut self, statement: StatementDefinition) -> Result<(), BindingError> {
        if !STATEMENT_ID.is_match(&statement.id) {
            return Err(BindingError::InvalidIdentifier {
                id: statement.id.clone(),
            });
        }
        if self.statements.contains_key(&statement.id) {
            return Err(BindingError::DuplicateStatement {
                id: statement.id.clone(),
            });
        }
        tracing::debug!(id = %statement.id, "registered statement");
        self.statements
            .insert(statement.id.clone(), Arc::new(statement));
        Ok(())
    }

    /// Whether a statement is registered under `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.statements.contains_key(id)
    }

    /// Look up a statement.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<StatementDefinition>> {
        self.statements.get(id).cloned()
    }

    /// Look up a statement, failing with `StatementNotFound`.
    pub fn require(&self, id: &str) -> Result<Arc<StatementDefinition>, BindingError> {
        self.get(id).ok_or_else(|| BindingError::StatementNotFound {
            id: id.to_string(),
        })
    }

    /// Number of registered statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::SqlNode;

    fn select(id: &str) -> StatementDefinition {
        let source =
            SqlSource::new(SqlNode::Static("SELECT 1".to_string())).expect("static source");
        StatementDefinition::new(id, CommandKind::Select, source)
    }

    #[test]
    fn test_register_and_require() {
        let mut registry = StatementRegistry::new();
        registry
            .register(select("com.example.UserMapper.findById"))
            .expect("register");
        assert!(registry.contains("com.example.UserMapper.findById"));
        assert!(registry.require("com.example.UserMapper.findById").is_ok());
        assert!(matches!(
            registry.require("com.example.UserMapper.missing"),
            Err(BindingError::StatementNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = StatementRegistry::new();
        registry.register(select("app.Users.count")).expect("first");
        assert!(matches!(
            registry.register(select("app.Users.count")),
            Err(BindingError::DuplicateStatement { .. })
        ));
    }

    #[test]
    fn test_unqualified_id_is_rejected() {
        let mut registry = StatementRegistry::new();
        assert!(matches!(
            registry.register(select("findById")),
            Err(BindingError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            registry.register(select("a..b")),
            Err(BindingError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_kind_defaults() {
        let stmt = select("app.Users.find");
        assert!(stmt.use_cache);
        assert!(!stmt.flush_cache);

        let source =
            SqlSource::new(SqlNode::Static("DELETE FROM users".to_string())).expect("source");
        let stmt = StatementDefinition::new("app.Users.purge", CommandKind::Delete, source);
        assert!(!stmt.use_cache);
        assert!(stmt.flush_cache);
    }
}
