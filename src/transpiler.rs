//! SQL transpiler for condensed search trees.
//!
//! Turns the intermediate tree produced by the condenser into a boolean
//! `WHERE` fragment scoped to one entity. Full-text leaves become a subquery
//! against the entity's search table; flags, attachments and dates become
//! direct column comparisons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{DateDirection, QueryExpression, Visitor};
use crate::config::EntityConfig;
use crate::dates::DateResolver;
use crate::error::{SearchError, SearchResult};
use crate::scanner::Token;

/// Column of the search table holding the owning row id.
pub const CONTENT_ID_COLUMN: &str = "content_id";

/// Predicate used for the attachment filter. Matches rows whose serialized
/// data does not record zero attachments.
pub const NO_ATTACHMENTS_PATTERN: &str = "%\"attachmentCount\":0%";

/// Identifier quoting style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Bare identifiers: `Thread.unread`.
    #[default]
    Plain,
    /// Backticks: `` `Thread`.`unread` ``.
    Sqlite,
    /// Double quotes: `"Thread"."unread"`.
    Ansi,
}

impl Dialect {
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Dialect::Plain => name.to_string(),
            Dialect::Sqlite => format!("`{}`", name.replace('`', "``")),
            Dialect::Ansi => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Single-quoted SQL string literal.
    pub fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Plain => "plain",
            Dialect::Sqlite => "sqlite",
            Dialect::Ansi => "ansi",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Dialect {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(Dialect::Plain),
            "sqlite" => Ok(Dialect::Sqlite),
            "ansi" => Ok(Dialect::Ansi),
            other => Err(SearchError::Config(format!(
                "unknown dialect '{}', expected one of: plain, sqlite, ansi",
                other
            ))),
        }
    }
}

/// Visitor emitting the `WHERE` fragment for a condensed tree.
pub struct SqlGenerator<'a> {
    entity: &'a EntityConfig,
    dialect: Dialect,
    resolver: &'a dyn DateResolver,
    now: DateTime<Utc>,
    /// Inside the right-hand side of an odd number of `Not` nodes.
    negated: bool,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(
        entity: &'a EntityConfig,
        dialect: Dialect,
        resolver: &'a dyn DateResolver,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entity,
            dialect,
            resolver,
            now,
            negated: false,
        }
    }

    pub fn generate(&mut self, root: &QueryExpression) -> SearchResult<String> {
        self.negated = false;
        root.accept(self)
    }

    fn column(&self, column: &str) -> String {
        format!(
            "{}.{}",
            self.dialect.quote_identifier(&self.entity.name),
            self.dialect.quote_identifier(column)
        )
    }

    fn unreachable(node: &QueryExpression) -> SearchResult<String> {
        Err(SearchError::invariant(format!(
            "{} should have been condensed into a full-text match",
            node
        )))
    }

    /// Always-true predicate for the current polarity.
    fn permissive(&self) -> &'static str {
        if self.negated { "(1 = 0)" } else { "(1 = 1)" }
    }
}

/// Generate SQL for a condensed tree.
pub fn generate(
    root: &QueryExpression,
    entity: &EntityConfig,
    dialect: Dialect,
    resolver: &dyn DateResolver,
    now: DateTime<Utc>,
) -> SearchResult<String> {
    SqlGenerator::new(entity, dialect, resolver, now).generate(root)
}

impl Visitor for SqlGenerator<'_> {
    type Output = SearchResult<String>;

    fn visit_and(
        &mut self,
        _node: &QueryExpression,
        lhs: &QueryExpression,
        rhs: &QueryExpression,
    ) -> Self::Output {
        Ok(format!("({} AND {})", lhs.accept(self)?, rhs.accept(self)?))
    }

    fn visit_or(
        &mut self,
        _node: &QueryExpression,
        lhs: &QueryExpression,
        rhs: &QueryExpression,
    ) -> Self::Output {
        Ok(format!("({} OR {})", lhs.accept(self)?, rhs.accept(self)?))
    }

    fn visit_not(
        &mut self,
        _node: &QueryExpression,
        lhs: &QueryExpression,
        rhs: &QueryExpression,
    ) -> Self::Output {
        let kept = lhs.accept(self)?;
        self.negated = !self.negated;
        let excluded = rhs.accept(self);
        self.negated = !self.negated;
        Ok(format!("({} AND NOT {})", kept, excluded?))
    }

    fn visit_from(&mut self, node: &QueryExpression, _text: &Token) -> Self::Output {
        Self::unreachable(node)
    }

    fn visit_to(&mut self, node: &QueryExpression, _text: &Token) -> Self::Output {
        Self::unreachable(node)
    }

    fn visit_subject(&mut self, node: &QueryExpression, _text: &Token) -> Self::Output {
        Self::unreachable(node)
    }

    fn visit_generic(&mut self, node: &QueryExpression, _text: &Token) -> Self::Output {
        Self::unreachable(node)
    }

    fn visit_text(&mut self, node: &QueryExpression, _token: &Token) -> Self::Output {
        Self::unreachable(node)
    }

    fn visit_in(&mut self, node: &QueryExpression, _text: &Token) -> Self::Output {
        Self::unreachable(node)
    }

    fn visit_unread(&mut self, _node: &QueryExpression, status: bool) -> Self::Output {
        Ok(format!(
            "({} = {})",
            self.column(&self.entity.unread_column),
            u8::from(status)
        ))
    }

    fn visit_starred(&mut self, _node: &QueryExpression, status: bool) -> Self::Output {
        Ok(format!(
            "({} = {})",
            self.column(&self.entity.starred_column),
            u8::from(status)
        ))
    }

    // Approximation over the serialized row data.
    fn visit_has_attachment(&mut self, _node: &QueryExpression) -> Self::Output {
        Ok(format!(
            "({} NOT LIKE {})",
            self.column(&self.entity.data_column),
            self.dialect.string_literal(NO_ATTACHMENTS_PATTERN)
        ))
    }

    fn visit_date(
        &mut self,
        _node: &QueryExpression,
        text: &Token,
        direction: DateDirection,
    ) -> Self::Output {
        let Some(date) = self.resolver.resolve(text.as_str(), self.now) else {
            debug!(phrase = text.as_str(), %direction, "unresolved date, filter ignored");
            return Ok(self.permissive().to_string());
        };
        let comparator = match direction {
            DateDirection::Before => '<',
            DateDirection::After => '>',
        };
        Ok(format!(
            "({} {} {})",
            self.column(&self.entity.timestamp_column),
            comparator,
            date.timestamp()
        ))
    }

    fn visit_match(&mut self, _node: &QueryExpression, raw_query: &str) -> Self::Output {
        let search_table = self.dialect.quote_identifier(&self.entity.search_table());
        Ok(format!(
            "({} IN (SELECT {} FROM {} WHERE {} MATCH {}))",
            self.column(&self.entity.id_column),
            self.dialect.quote_identifier(CONTENT_ID_COLUMN),
            search_table,
            search_table,
            self.dialect.string_literal(raw_query)
        ))
    }
}
