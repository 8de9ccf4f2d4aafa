//! Full-text index query lowering.
//!
//! Renders a match-compatible subtree in the index's own query syntax:
//!
//! | Node          | Rendering                  |
//! |---------------|----------------------------|
//! | `And(l, r)`   | `(l AND r)`                |
//! | `Or(l, r)`    | `(l OR r)`                 |
//! | `From(t)`     | `(from_ : "t"*)`           |
//! | `To(t)`       | `(to_ : "t"*)`             |
//! | `Subject(t)`  | `(subject : "t"*)`         |
//! | `Generic(t)`  | `("t"*)`                   |
//! | `Text(t)`     | `t`                        |
//! | `In(t)`       | `(categories : "t*")`      |
//!
//! Token text is embedded as typed; nothing is escaped at this level.

use crate::ast::{DateDirection, QueryExpression, Visitor};
use crate::error::{SearchError, SearchResult};
use crate::scanner::Token;

pub const FROM_COLUMN: &str = "from_";
pub const TO_COLUMN: &str = "to_";
pub const SUBJECT_COLUMN: &str = "subject";
pub const CATEGORIES_COLUMN: &str = "categories";

/// Visitor producing the raw full-text query for a subtree.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullTextLowering;

impl FullTextLowering {
    pub fn lower(&mut self, root: &QueryExpression) -> SearchResult<String> {
        root.accept(self)
    }

    fn field(column: &str, text: &Token) -> String {
        format!("({} : \"{}\"*)", column, text.as_str())
    }

    fn incompatible(node: &QueryExpression) -> SearchResult<String> {
        Err(SearchError::invariant(format!(
            "expected {} to be match compatible",
            node
        )))
    }
}

/// Lower a match-compatible subtree.
pub fn lower(root: &QueryExpression) -> SearchResult<String> {
    FullTextLowering.lower(root)
}

impl Visitor for FullTextLowering {
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
        node: &QueryExpression,
        _lhs: &QueryExpression,
        _rhs: &QueryExpression,
    ) -> Self::Output {
        Err(SearchError::invariant(format!(
            "negation cannot be lowered to a full-text query: {}",
            node
        )))
    }

    fn visit_from(&mut self, _node: &QueryExpression, text: &Token) -> Self::Output {
        Ok(Self::field(FROM_COLUMN, text))
    }

    fn visit_to(&mut self, _node: &QueryExpression, text: &Token) -> Self::Output {
        Ok(Self::field(TO_COLUMN, text))
    }

    fn visit_subject(&mut self, _node: &QueryExpression, text: &Token) -> Self::Output {
        Ok(Self::field(SUBJECT_COLUMN, text))
    }

    fn visit_generic(&mut self, _node: &QueryExpression, text: &Token) -> Self::Output {
        Ok(format!("(\"{}\"*)", text.as_str()))
    }

    // Passed through verbatim, operators included.
    fn visit_text(&mut self, _node: &QueryExpression, token: &Token) -> Self::Output {
        Ok(token.as_str().to_string())
    }

    fn visit_in(&mut self, _node: &QueryExpression, text: &Token) -> Self::Output {
        Ok(format!("({} : \"{}*\")", CATEGORIES_COLUMN, text.as_str()))
    }

    fn visit_unread(&mut self, node: &QueryExpression, _status: bool) -> Self::Output {
        Self::incompatible(node)
    }

    fn visit_starred(&mut self, node: &QueryExpression, _status: bool) -> Self::Output {
        Self::incompatible(node)
    }

    fn visit_has_attachment(&mut self, node: &QueryExpression) -> Self::Output {
        Self::incompatible(node)
    }

    fn visit_date(
        &mut self,
        node: &QueryExpression,
        _text: &Token,
        _direction: DateDirection,
    ) -> Self::Output {
        Self::incompatible(node)
    }

    fn visit_match(&mut self, node: &QueryExpression, _raw_query: &str) -> Self::Output {
        Self::incompatible(node)
    }
}
