//! Search compilation engine.
//!
//! [`SearchCompiler`] runs the whole pipeline for one entity:
//! scan and parse, condense full-text clauses, then emit SQL.
//!
//! ```
//! use mailq::engine::SearchCompiler;
//!
//! let compiler = SearchCompiler::new("Message");
//! let sql = compiler.compile("to:eve").unwrap();
//! assert_eq!(
//!     sql,
//!     "(Message.id IN (SELECT content_id FROM MessageSearch WHERE MessageSearch MATCH '(to_ : \"eve\"*)'))"
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::ast::QueryExpression;
use crate::condenser::Condenser;
use crate::config::{Config, EntityConfig};
use crate::dates::{DateResolver, PastDateResolver};
use crate::error::SearchResult;
use crate::parser::{self, ParseOptions};
use crate::transpiler::{Dialect, SqlGenerator};

/// Compiles search queries into `WHERE` fragments for one entity.
///
/// Holds no per-query state, so one instance can be shared across threads.
pub struct SearchCompiler {
    entity: EntityConfig,
    dialect: Dialect,
    options: ParseOptions,
    resolver: Box<dyn DateResolver + Send + Sync>,
}

impl SearchCompiler {
    /// Compiler for `entity` with default columns, dialect and options.
    pub fn new(entity: impl Into<String>) -> Self {
        Self::for_entity(EntityConfig::new(entity))
    }

    pub fn for_entity(entity: EntityConfig) -> Self {
        Self {
            entity,
            dialect: Dialect::default(),
            options: ParseOptions::default(),
            resolver: Box::new(PastDateResolver),
        }
    }

    /// Compiler built from a loaded configuration.
    ///
    /// `entity` overrides the configured default entity.
    pub fn from_config(config: &Config, entity: Option<&str>) -> Self {
        let entity = match entity {
            Some(name) => config.entity(name),
            None => config.default_entity(),
        };
        Self::for_entity(entity)
            .with_dialect(config.dialect)
            .with_options(config.parse_options())
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the date resolver used for `before:` / `after:`.
    pub fn with_resolver(mut self, resolver: impl DateResolver + Send + Sync + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn entity(&self) -> &EntityConfig {
        &self.entity
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn parse(&self, query: &str) -> SearchResult<QueryExpression> {
        parser::parse_with(query, self.options)
    }

    /// Parse and condense `query`.
    pub fn condense(&self, query: &str) -> SearchResult<QueryExpression> {
        Condenser::new().condense(&self.parse(query)?)
    }

    /// Compile `query`, resolving relative dates against the current time.
    pub fn compile(&self, query: &str) -> SearchResult<String> {
        self.compile_at(query, Utc::now())
    }

    /// Compile `query`, resolving relative dates against `now`.
    pub fn compile_at(&self, query: &str, now: DateTime<Utc>) -> SearchResult<String> {
        Ok(self.explain(query, now)?.sql)
    }

    /// Run every stage and keep the intermediate trees.
    pub fn explain(&self, query: &str, now: DateTime<Utc>) -> SearchResult<Explanation> {
        let ast = self.parse(query)?;
        let condensed = Condenser::new().condense(&ast)?;
        debug!(entity = %self.entity.name, %condensed, "condensed query");

        let sql = SqlGenerator::new(&self.entity, self.dialect, self.resolver.as_ref(), now)
            .generate(&condensed)?;
        debug!(entity = %self.entity.name, sql = %sql, "compiled query");

        Ok(Explanation {
            query: query.to_string(),
            entity: self.entity.name.clone(),
            dialect: self.dialect,
            ast,
            condensed,
            sql,
        })
    }
}

impl std::fmt::Debug for SearchCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCompiler")
            .field("entity", &self.entity)
            .field("dialect", &self.dialect)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Every stage of one compilation.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub query: String,
    pub entity: String,
    pub dialect: Dialect,
    pub ast: QueryExpression,
    pub condensed: QueryExpression,
    pub sql: String,
}
