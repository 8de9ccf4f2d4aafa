//! # mailq
//!
//! Compiles mail search syntax into SQL predicates over a local mail store.
//!
//! ## Quick Example
//!
//! ```
//! let sql = mailq::compile("is:unread has:attachment", "Thread").unwrap();
//! assert_eq!(
//!     sql,
//!     "((Thread.unread = 1) AND (Thread.data NOT LIKE '%\"attachmentCount\":0%'))"
//! );
//! ```
//!
//! ## Pipeline
//!
//! | Stage        | Module           | Output                               |
//! |--------------|------------------|--------------------------------------|
//! | Scan         | [`scanner`]      | tokens with byte offsets             |
//! | Parse        | [`parser`]       | [`QueryExpression`] tree             |
//! | Condense     | [`condenser`]    | tree with full-text `Match` leaves   |
//! | Lower        | [`fulltext`]     | full-text index query for a subtree  |
//! | Generate     | [`transpiler`]   | `WHERE` fragment                     |
//!
//! ## Syntax
//!
//! | Clause                   | Meaning                               |
//! |--------------------------|---------------------------------------|
//! | `word`, `"two words"`    | any indexed field                     |
//! | `from:` `to:` `subject:` | one indexed field                     |
//! | `in:label`               | category prefix                       |
//! | `is:unread` `is:read`    | unread flag                           |
//! | `is:starred` `is:unstarred` | starred flag                       |
//! | `has:attachment`         | at least one attachment               |
//! | `before:` `since:`/`after:` | date bound, absolute or relative   |
//! | `a b`, `a AND b`         | both                                  |
//! | `a OR b`                 | either                                |
//! | `a NOT b`                | `a` without `b`                       |
//! | `( ... )`                | grouping                              |
//!
//! [`QueryExpression`]: ast::QueryExpression

pub mod ast;
pub mod condenser;
pub mod config;
pub mod dates;
pub mod engine;
pub mod error;
pub mod fulltext;
pub mod parser;
pub mod scanner;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::{DateDirection, ExprKind, QueryExpression, Visitor};
    pub use crate::config::{Config, EntityConfig};
    pub use crate::dates::{DateResolver, PastDateResolver};
    pub use crate::engine::{Explanation, SearchCompiler};
    pub use crate::error::*;
    pub use crate::parser::{ParseOptions, UnknownQualifier};
    pub use crate::scanner::Token;
    pub use crate::transpiler::Dialect;
}

/// Parse a search query into an expression tree.
///
/// # Example
///
/// ```
/// use mailq::ast::QueryExpression;
/// use mailq::scanner::Token;
///
/// let tree = mailq::parse("is:starred subject:lunch").unwrap();
/// assert_eq!(
///     tree,
///     QueryExpression::and(
///         QueryExpression::starred(true),
///         QueryExpression::subject(Token::new("lunch")),
///     )
/// );
/// ```
pub fn parse(input: &str) -> error::SearchResult<ast::QueryExpression> {
    parser::parse(input)
}

/// Compile a search query for `entity` with default settings.
pub fn compile(query: &str, entity: &str) -> error::SearchResult<String> {
    engine::SearchCompiler::new(entity).compile(query)
}
