//! Match-compatibility condenser.
//!
//! Rewrites a parsed tree so that every maximal subtree the full-text index
//! can answer on its own becomes a single [`ExprKind::Match`] leaf holding the
//! lowered query. Flag, attachment and date filters are kept as they are.
//!
//! `Not` is never folded: the index has no negation, so both sides are
//! condensed separately and the `Not` stays in place for the SQL generator.
//!
//! [`ExprKind::Match`]: crate::ast::ExprKind::Match

use tracing::trace;

use crate::ast::{DateDirection, QueryExpression, Visitor};
use crate::error::SearchResult;
use crate::fulltext::FullTextLowering;
use crate::scanner::Token;

#[derive(Debug, Default, Clone, Copy)]
pub struct Condenser {
    lowering: FullTextLowering,
}

impl Condenser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condense(&mut self, root: &QueryExpression) -> SearchResult<QueryExpression> {
        root.accept(self)
    }

    fn fold(&mut self, node: &QueryExpression) -> SearchResult<QueryExpression> {
        let raw = self.lowering.lower(node)?;
        trace!(%node, raw = %raw, "folded into full-text match");
        Ok(QueryExpression::match_query(raw))
    }
}

/// Condense `root` into its intermediate form.
pub fn condense(root: &QueryExpression) -> SearchResult<QueryExpression> {
    Condenser::new().condense(root)
}

fn is_foldable(node: &QueryExpression) -> bool {
    node.is_match_compatible() && !node.contains_negation()
}

impl Visitor for Condenser {
    type Output = SearchResult<QueryExpression>;

    fn visit_and(
        &mut self,
        node: &QueryExpression,
        lhs: &QueryExpression,
        rhs: &QueryExpression,
    ) -> Self::Output {
        if is_foldable(node) {
            return self.fold(node);
        }
        Ok(QueryExpression::and(lhs.accept(self)?, rhs.accept(self)?))
    }

    fn visit_or(
        &mut self,
        node: &QueryExpression,
        lhs: &QueryExpression,
        rhs: &QueryExpression,
    ) -> Self::Output {
        if is_foldable(node) {
            return self.fold(node);
        }
        Ok(QueryExpression::or(lhs.accept(self)?, rhs.accept(self)?))
    }

    fn visit_not(
        &mut self,
        _node: &QueryExpression,
        lhs: &QueryExpression,
        rhs: &QueryExpression,
    ) -> Self::Output {
        Ok(QueryExpression::and_not(lhs.accept(self)?, rhs.accept(self)?))
    }

    fn visit_from(&mut self, node: &QueryExpression, _text: &Token) -> Self::Output {
        self.fold(node)
    }

    fn visit_to(&mut self, node: &QueryExpression, _text: &Token) -> Self::Output {
        self.fold(node)
    }

    fn visit_subject(&mut self, node: &QueryExpression, _text: &Token) -> Self::Output {
        self.fold(node)
    }

    fn visit_generic(&mut self, node: &QueryExpression, _text: &Token) -> Self::Output {
        self.fold(node)
    }

    fn visit_text(&mut self, node: &QueryExpression, _token: &Token) -> Self::Output {
        self.fold(node)
    }

    fn visit_in(&mut self, node: &QueryExpression, _text: &Token) -> Self::Output {
        self.fold(node)
    }

    fn visit_unread(&mut self, _node: &QueryExpression, status: bool) -> Self::Output {
        Ok(QueryExpression::unread(status))
    }

    fn visit_starred(&mut self, _node: &QueryExpression, status: bool) -> Self::Output {
        Ok(QueryExpression::starred(status))
    }

    fn visit_has_attachment(&mut self, _node: &QueryExpression) -> Self::Output {
        Ok(QueryExpression::has_attachment())
    }

    fn visit_date(
        &mut self,
        _node: &QueryExpression,
        text: &Token,
        direction: DateDirection,
    ) -> Self::Output {
        Ok(QueryExpression::date(text.clone(), direction))
    }

    fn visit_match(&mut self, node: &QueryExpression, _raw_query: &str) -> Self::Output {
        Ok(node.clone())
    }
}
