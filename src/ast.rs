//! Abstract Syntax Tree for search queries.
//!
//! Nodes are immutable once built. Match compatibility (whether a subtree
//! can be answered by the full-text index alone) is computed when a node is
//! constructed, from its already-built children.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scanner::Token;

/// Which side of the resolved instant a date filter keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateDirection {
    Before,
    After,
}

impl fmt::Display for DateDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateDirection::Before => write!(f, "before"),
            DateDirection::After => write!(f, "after"),
        }
    }
}

/// The closed set of expression variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExprKind {
    And(Box<QueryExpression>, Box<QueryExpression>),
    Or(Box<QueryExpression>, Box<QueryExpression>),
    /// `lhs` with everything matching `rhs` removed.
    Not(Box<QueryExpression>, Box<QueryExpression>),
    From(Token),
    To(Token),
    Subject(Token),
    Generic(Token),
    Text(Token),
    In(Token),
    Unread(bool),
    Starred(bool),
    HasAttachment,
    Date(Token, DateDirection),
    /// Already-lowered full-text query. Only the condenser builds these.
    Match(String),
}

/// A node of the query tree.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct QueryExpression {
    kind: ExprKind,
    #[serde(skip)]
    match_compatible: bool,
    #[serde(skip)]
    negation: bool,
}

impl QueryExpression {
    pub fn new(kind: ExprKind) -> Self {
        let (match_compatible, negation) = match &kind {
            ExprKind::And(lhs, rhs) | ExprKind::Or(lhs, rhs) => (
                lhs.match_compatible && rhs.match_compatible,
                lhs.negation || rhs.negation,
            ),
            ExprKind::Not(lhs, rhs) => (lhs.match_compatible && rhs.match_compatible, true),
            ExprKind::From(_)
            | ExprKind::To(_)
            | ExprKind::Subject(_)
            | ExprKind::Generic(_)
            | ExprKind::Text(_)
            | ExprKind::In(_) => (true, false),
            ExprKind::Unread(_)
            | ExprKind::Starred(_)
            | ExprKind::HasAttachment
            | ExprKind::Date(..)
            | ExprKind::Match(_) => (false, false),
        };
        Self {
            kind,
            match_compatible,
            negation,
        }
    }

    pub fn and(lhs: QueryExpression, rhs: QueryExpression) -> Self {
        Self::new(ExprKind::And(Box::new(lhs), Box::new(rhs)))
    }

    pub fn or(lhs: QueryExpression, rhs: QueryExpression) -> Self {
        Self::new(ExprKind::Or(Box::new(lhs), Box::new(rhs)))
    }

    /// `lhs` excluding anything matched by `negated`.
    pub fn and_not(lhs: QueryExpression, negated: QueryExpression) -> Self {
        Self::new(ExprKind::Not(Box::new(lhs), Box::new(negated)))
    }

    /// `from:` filter.
    pub fn sender(text: Token) -> Self {
        Self::new(ExprKind::From(text))
    }

    /// `to:` filter.
    pub fn recipient(text: Token) -> Self {
        Self::new(ExprKind::To(text))
    }

    pub fn subject(text: Token) -> Self {
        Self::new(ExprKind::Subject(text))
    }

    pub fn generic(text: Token) -> Self {
        Self::new(ExprKind::Generic(text))
    }

    pub fn text(token: Token) -> Self {
        Self::new(ExprKind::Text(token))
    }

    /// Folder or label filter (`in:inbox`).
    pub fn in_category(text: Token) -> Self {
        Self::new(ExprKind::In(text))
    }

    pub fn unread(status: bool) -> Self {
        Self::new(ExprKind::Unread(status))
    }

    pub fn starred(status: bool) -> Self {
        Self::new(ExprKind::Starred(status))
    }

    pub fn has_attachment() -> Self {
        Self::new(ExprKind::HasAttachment)
    }

    pub fn date(text: Token, direction: DateDirection) -> Self {
        Self::new(ExprKind::Date(text, direction))
    }

    pub fn match_query(raw_query: impl Into<String>) -> Self {
        Self::new(ExprKind::Match(raw_query.into()))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn into_kind(self) -> ExprKind {
        self.kind
    }

    /// True if the whole subtree can be answered by one full-text lookup.
    ///
    /// `Match` nodes report `false`: they are already lowered.
    pub fn is_match_compatible(&self) -> bool {
        self.match_compatible
    }

    /// True if a `Not` appears anywhere in the subtree.
    pub fn contains_negation(&self) -> bool {
        self.negation
    }

    /// True for the intermediate `Match` node.
    pub fn is_match(&self) -> bool {
        matches!(self.kind, ExprKind::Match(_))
    }

    /// Double dispatch into `visitor`.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match &self.kind {
            ExprKind::And(lhs, rhs) => visitor.visit_and(self, lhs, rhs),
            ExprKind::Or(lhs, rhs) => visitor.visit_or(self, lhs, rhs),
            ExprKind::Not(lhs, rhs) => visitor.visit_not(self, lhs, rhs),
            ExprKind::From(text) => visitor.visit_from(self, text),
            ExprKind::To(text) => visitor.visit_to(self, text),
            ExprKind::Subject(text) => visitor.visit_subject(self, text),
            ExprKind::Generic(text) => visitor.visit_generic(self, text),
            ExprKind::Text(token) => visitor.visit_text(self, token),
            ExprKind::In(text) => visitor.visit_in(self, text),
            ExprKind::Unread(status) => visitor.visit_unread(self, *status),
            ExprKind::Starred(status) => visitor.visit_starred(self, *status),
            ExprKind::HasAttachment => visitor.visit_has_attachment(self),
            ExprKind::Date(text, direction) => visitor.visit_date(self, text, *direction),
            ExprKind::Match(raw) => visitor.visit_match(self, raw),
        }
    }
}

impl PartialEq for QueryExpression {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for QueryExpression {}

impl From<ExprKind> for QueryExpression {
    fn from(kind: ExprKind) -> Self {
        Self::new(kind)
    }
}

/// A pass over the query tree.
///
/// Every pass handles every variant; `node` is the expression being visited.
pub trait Visitor {
    type Output;

    fn visit_and(
        &mut self,
        node: &QueryExpression,
        lhs: &QueryExpression,
        rhs: &QueryExpression,
    ) -> Self::Output;
    fn visit_or(
        &mut self,
        node: &QueryExpression,
        lhs: &QueryExpression,
        rhs: &QueryExpression,
    ) -> Self::Output;
    fn visit_not(
        &mut self,
        node: &QueryExpression,
        lhs: &QueryExpression,
        rhs: &QueryExpression,
    ) -> Self::Output;
    fn visit_from(&mut self, node: &QueryExpression, text: &Token) -> Self::Output;
    fn visit_to(&mut self, node: &QueryExpression, text: &Token) -> Self::Output;
    fn visit_subject(&mut self, node: &QueryExpression, text: &Token) -> Self::Output;
    fn visit_generic(&mut self, node: &QueryExpression, text: &Token) -> Self::Output;
    fn visit_text(&mut self, node: &QueryExpression, token: &Token) -> Self::Output;
    fn visit_in(&mut self, node: &QueryExpression, text: &Token) -> Self::Output;
    fn visit_unread(&mut self, node: &QueryExpression, status: bool) -> Self::Output;
    fn visit_starred(&mut self, node: &QueryExpression, status: bool) -> Self::Output;
    fn visit_has_attachment(&mut self, node: &QueryExpression) -> Self::Output;
    fn visit_date(
        &mut self,
        node: &QueryExpression,
        text: &Token,
        direction: DateDirection,
    ) -> Self::Output;
    fn visit_match(&mut self, node: &QueryExpression, raw_query: &str) -> Self::Output;
}

/// Renders the query back in search syntax, fully parenthesized.
impl fmt::Display for QueryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::And(lhs, rhs) => write!(f, "({} AND {})", lhs, rhs),
            ExprKind::Or(lhs, rhs) => write!(f, "({} OR {})", lhs, rhs),
            ExprKind::Not(lhs, rhs) => write!(f, "({} NOT {})", lhs, rhs),
            ExprKind::From(text) => write!(f, "from:{}", text),
            ExprKind::To(text) => write!(f, "to:{}", text),
            ExprKind::Subject(text) => write!(f, "subject:{}", text),
            ExprKind::Generic(text) | ExprKind::Text(text) => write!(f, "{}", text),
            ExprKind::In(text) => write!(f, "in:{}", text),
            ExprKind::Unread(true) => write!(f, "is:unread"),
            ExprKind::Unread(false) => write!(f, "is:read"),
            ExprKind::Starred(true) => write!(f, "is:starred"),
            ExprKind::Starred(false) => write!(f, "is:unstarred"),
            ExprKind::HasAttachment => write!(f, "has:attachment"),
            ExprKind::Date(text, direction) => write!(f, "{}:{}", direction, text),
            ExprKind::Match(raw) => write!(f, "<match {}>", raw),
        }
    }
}
