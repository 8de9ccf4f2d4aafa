//! Recursive-descent parser for the search language.
//!
//! # Grammar
//!
//! ```text
//! query        := and_query+                      (implicit AND, folded right)
//! and_query    := or_query ( ("AND"|ε) ("NOT" and_query | and_query) )?
//! or_query     := simple_query ( "OR" or_query )?
//! simple_query := "(" query ")"
//!               | "TO" ":" TEXT | "FROM" ":" TEXT | "SUBJECT" ":" TEXT
//!               | "IS" ":" ("READ"|"UNREAD"|"STARRED"|"UNSTARRED")
//!               | "HAS" ":" ("ATTACHMENT"|"ATTACHMENTS")
//!               | ("SINCE"|"AFTER"|"BEFORE") ":" TEXT
//!               | "IN" ":" TEXT
//!               | TEXT
//! ```
//!
//! An OR chain binds only simple queries, so `a OR b c` is `(a OR b) AND c`.
//!
//! AND and OR chains are collected in a loop and folded right. Folding makes
//! the tree as deep as the chain is long, and every later pass walks it
//! recursively, so the number of search terms is capped by
//! [`ParseOptions::max_clauses`]. Parenthesis nesting is capped separately by
//! [`ParseOptions::max_depth`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{DateDirection, QueryExpression};
use crate::error::{SearchError, SearchResult};
use crate::scanner::{Lexeme, Scanner, Token};

/// Default limit on parenthesis nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default limit on search terms in one query.
pub const DEFAULT_MAX_CLAUSES: usize = 512;

/// What to do with a qualifier whose value is not recognized (`is:foo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownQualifier {
    /// Fail with a parse error naming the qualifier and value.
    #[default]
    Reject,
    /// Search for the literal text `qualifier:value` instead.
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub max_depth: usize,
    /// Upper bound on terms, which also bounds the depth of the tree.
    pub max_clauses: usize,
    pub unknown_qualifier: UnknownQualifier,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_clauses: DEFAULT_MAX_CLAUSES,
            unknown_qualifier: UnknownQualifier::Reject,
        }
    }
}

/// Parse a complete search query with default options.
pub fn parse(input: &str) -> SearchResult<QueryExpression> {
    parse_with(input, ParseOptions::default())
}

/// Parse a complete search query.
pub fn parse_with(input: &str, options: ParseOptions) -> SearchResult<QueryExpression> {
    let mut parser = Parser {
        scanner: Scanner::new(input),
        options,
        depth: 0,
        clauses: 0,
    };

    let expr = parser.parse_query()?;
    if let Some(stray) = parser.scanner.next_token()? {
        return Err(SearchError::parse(
            stray.position,
            format!("unexpected '{}'", stray.token),
        ));
    }
    let expr = expr.ok_or(SearchError::Empty)?;

    debug!(%expr, "parsed search query");
    Ok(expr)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Qualifier {
    To,
    From,
    Subject,
    Is,
    Has,
    After,
    Before,
    In,
}

impl Qualifier {
    fn lookup(token: &Token) -> Option<Self> {
        if token.is_quoted() {
            return None;
        }
        match token.as_str().to_ascii_uppercase().as_str() {
            "TO" => Some(Self::To),
            "FROM" => Some(Self::From),
            "SUBJECT" => Some(Self::Subject),
            "IS" => Some(Self::Is),
            "HAS" => Some(Self::Has),
            "SINCE" | "AFTER" => Some(Self::After),
            "BEFORE" => Some(Self::Before),
            "IN" => Some(Self::In),
            _ => None,
        }
    }
}

/// How two operands of an AND chain are joined.
#[derive(Debug, Clone, Copy)]
enum Join {
    And,
    AndNot,
}

impl Join {
    fn combine(self, lhs: QueryExpression, rhs: QueryExpression) -> QueryExpression {
        match self {
            Join::And => QueryExpression::and(lhs, rhs),
            Join::AndNot => QueryExpression::and_not(lhs, rhs),
        }
    }
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    options: ParseOptions,
    depth: usize,
    clauses: usize,
}

impl Parser<'_> {
    /// `query := and_query+`, stopping at end of input or `)`.
    fn parse_query(&mut self) -> SearchResult<Option<QueryExpression>> {
        let mut clauses = Vec::new();
        while let Some(next) = self.scanner.peek()? {
            if next.token.is_keyword(")") {
                break;
            }
            clauses.push(self.parse_and_query()?);
        }
        Ok(fold_right(clauses, QueryExpression::and))
    }

    fn parse_and_query(&mut self) -> SearchResult<QueryExpression> {
        let first = self.parse_or_query()?;
        let mut rest: Vec<(Join, QueryExpression)> = Vec::new();

        while let Some(next) = self.scanner.peek()? {
            if next.token.is_keyword("OR") || next.token.is_keyword(")") {
                break;
            }
            if next.token.is_keyword("AND") {
                self.scanner.next_token()?;
            }
            let join = match self.scanner.peek()? {
                Some(l) if l.token.is_keyword("NOT") => {
                    self.scanner.next_token()?;
                    Join::AndNot
                }
                _ => Join::And,
            };
            rest.push((join, self.parse_or_query()?));
        }

        // Each join belongs to the operand on its right.
        let Some((mut join, mut result)) = rest.pop() else {
            return Ok(first);
        };
        while let Some((previous, operand)) = rest.pop() {
            result = join.combine(operand, result);
            join = previous;
        }
        Ok(join.combine(first, result))
    }

    fn parse_or_query(&mut self) -> SearchResult<QueryExpression> {
        let mut operands = vec![self.parse_simple_query()?];
        while let Some(next) = self.scanner.peek()? {
            if !next.token.is_keyword("OR") {
                break;
            }
            self.scanner.next_token()?;
            operands.push(self.parse_simple_query()?);
        }
        fold_right(operands, QueryExpression::or)
            .ok_or_else(|| SearchError::invariant("empty OR chain"))
    }

    fn parse_simple_query(&mut self) -> SearchResult<QueryExpression> {
        let Some(Lexeme { position, token }) = self.scanner.next_token()? else {
            return Err(SearchError::parse(
                self.scanner.offset(),
                "expected a search term but reached end of input",
            ));
        };

        if token.is_keyword("(") {
            return self.parse_group(position);
        }
        if token.is_delimiter() {
            return Err(SearchError::parse(position, format!("unexpected '{}'", token)));
        }
        if ["AND", "OR", "NOT"].iter().any(|op| token.is_keyword(op)) {
            return Err(SearchError::parse(
                position,
                format!("unexpected operator '{}', expected a search term", token),
            ));
        }

        self.clauses += 1;
        if self.clauses > self.options.max_clauses {
            return Err(SearchError::parse(
                position,
                format!(
                    "query too long, more than {} search terms",
                    self.options.max_clauses
                ),
            ));
        }

        let Some(qualifier) = Qualifier::lookup(&token) else {
            return Ok(QueryExpression::generic(token));
        };

        self.expect(":", &token)?;
        match qualifier {
            Qualifier::To => Ok(QueryExpression::recipient(self.parse_text(&token)?)),
            Qualifier::From => Ok(QueryExpression::sender(self.parse_text(&token)?)),
            Qualifier::Subject => Ok(QueryExpression::subject(self.parse_text(&token)?)),
            Qualifier::In => Ok(QueryExpression::in_category(self.parse_text(&token)?)),
            Qualifier::After => Ok(QueryExpression::date(
                self.parse_text(&token)?,
                DateDirection::After,
            )),
            Qualifier::Before => Ok(QueryExpression::date(
                self.parse_text(&token)?,
                DateDirection::Before,
            )),
            Qualifier::Is => {
                let (value_position, value) = self.parse_value(&token)?;
                match value.as_str().to_ascii_uppercase().as_str() {
                    "READ" => Ok(QueryExpression::unread(false)),
                    "UNREAD" => Ok(QueryExpression::unread(true)),
                    "STARRED" => Ok(QueryExpression::starred(true)),
                    "UNSTARRED" => Ok(QueryExpression::starred(false)),
                    _ => self.unknown_value(
                        &token,
                        value_position,
                        &value,
                        "read, unread, starred, unstarred",
                    ),
                }
            }
            Qualifier::Has => {
                let (value_position, value) = self.parse_value(&token)?;
                match value.as_str().to_ascii_uppercase().as_str() {
                    "ATTACHMENT" | "ATTACHMENTS" => Ok(QueryExpression::has_attachment()),
                    _ => self.unknown_value(&token, value_position, &value, "attachment"),
                }
            }
        }
    }

    /// `"(" query ")"`, with the opening parenthesis already consumed.
    fn parse_group(&mut self, open: usize) -> SearchResult<QueryExpression> {
        if self.depth >= self.options.max_depth {
            return Err(SearchError::parse(
                open,
                format!(
                    "parentheses nested deeper than {} levels",
                    self.options.max_depth
                ),
            ));
        }

        self.depth += 1;
        let inner = self.parse_query()?;
        self.depth -= 1;

        let inner = inner.ok_or_else(|| SearchError::parse(open, "empty parentheses"))?;
        match self.scanner.next_token()? {
            Some(l) if l.token.is_keyword(")") => Ok(inner),
            Some(l) => Err(SearchError::parse(
                l.position,
                format!("expected ')', got '{}'", l.token),
            )),
            None => Err(SearchError::parse(
                open,
                "expected ')' to close '(' but reached end of input",
            )),
        }
    }

    fn expect(&mut self, literal: &str, after: &Token) -> SearchResult<()> {
        match self.scanner.next_token()? {
            Some(l) if l.token.is_keyword(literal) => Ok(()),
            Some(l) => Err(SearchError::parse(
                l.position,
                format!("expected '{}' after '{}', got '{}'", literal, after, l.token),
            )),
            None => Err(SearchError::parse(
                self.scanner.offset(),
                format!(
                    "expected '{}' after '{}' but reached end of input",
                    literal, after
                ),
            )),
        }
    }

    /// TEXT following `qualifier:`.
    fn parse_text(&mut self, qualifier: &Token) -> SearchResult<Token> {
        self.parse_value(qualifier).map(|(_, token)| token)
    }

    fn parse_value(&mut self, qualifier: &Token) -> SearchResult<(usize, Token)> {
        match self.scanner.next_token()? {
            Some(l) if l.token.is_delimiter() => Err(SearchError::parse(
                l.position,
                format!("expected text after '{}:', got '{}'", qualifier, l.token),
            )),
            Some(l) => Ok((l.position, l.token)),
            None => Err(SearchError::parse(
                self.scanner.offset(),
                format!("expected text after '{}:' but reached end of input", qualifier),
            )),
        }
    }

    fn unknown_value(
        &self,
        qualifier: &Token,
        position: usize,
        value: &Token,
        expected: &str,
    ) -> SearchResult<QueryExpression> {
        match self.options.unknown_qualifier {
            UnknownQualifier::Reject => Err(SearchError::parse(
                position,
                format!(
                    "unknown value '{}' for '{}:', expected one of: {}",
                    value, qualifier, expected
                ),
            )),
            UnknownQualifier::Literal => Ok(QueryExpression::generic(Token::new(format!(
                "{}:{}",
                qualifier,
                value.as_str()
            )))),
        }
    }
}

/// `[a, b, c]` into `op(a, op(b, c))`.
fn fold_right(
    mut items: Vec<QueryExpression>,
    op: fn(QueryExpression, QueryExpression) -> QueryExpression,
) -> Option<QueryExpression> {
    let mut result = items.pop()?;
    while let Some(lhs) = items.pop() {
        result = op(lhs, result);
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::new(s)
    }

    fn generic(s: &str) -> QueryExpression {
        QueryExpression::generic(word(s))
    }

    #[test]
    fn test_single_term() {
        assert_eq!(parse("hello").unwrap(), generic("hello"));
    }

    #[test]
    fn test_implicit_and_folds_right() {
        assert_eq!(
            parse("a b c").unwrap(),
            QueryExpression::and(generic("a"), QueryExpression::and(generic("b"), generic("c")))
        );
    }

    #[test]
    fn test_explicit_and_matches_implicit() {
        assert_eq!(parse("a AND b and c").unwrap(), parse("a b c").unwrap());
    }

    #[test]
    fn test_or_binds_before_and() {
        assert_eq!(
            parse("a OR b c").unwrap(),
            QueryExpression::and(QueryExpression::or(generic("a"), generic("b")), generic("c"))
        );
    }

    #[test]
    fn test_or_chain_folds_right() {
        assert_eq!(
            parse("a or b OR c").unwrap(),
            QueryExpression::or(generic("a"), QueryExpression::or(generic("b"), generic("c")))
        );
    }

    #[test]
    fn test_not_takes_remaining_chain() {
        assert_eq!(
            parse("is:unread NOT hello AND in:inbox").unwrap(),
            QueryExpression::and_not(
                QueryExpression::unread(true),
                QueryExpression::and(generic("hello"), QueryExpression::in_category(word("inbox")))
            )
        );
    }

    #[test]
    fn test_and_not() {
        assert_eq!(
            parse("a AND NOT b").unwrap(),
            QueryExpression::and_not(generic("a"), generic("b"))
        );
    }

    #[test]
    fn test_qualifiers() {
        assert_eq!(parse("to:eve").unwrap(), QueryExpression::recipient(word("eve")));
        assert_eq!(parse("FROM:ben").unwrap(), QueryExpression::sender(word("ben")));
        assert_eq!(
            parse("subject:\"lunch plans\"").unwrap(),
            QueryExpression::subject(Token::quoted("lunch plans"))
        );
        assert_eq!(parse("in:inbox").unwrap(), QueryExpression::in_category(word("inbox")));
        assert_eq!(parse("is:read").unwrap(), QueryExpression::unread(false));
        assert_eq!(parse("is:UNREAD").unwrap(), QueryExpression::unread(true));
        assert_eq!(parse("is:starred").unwrap(), QueryExpression::starred(true));
        assert_eq!(parse("is:unstarred").unwrap(), QueryExpression::starred(false));
        assert_eq!(parse("has:attachment").unwrap(), QueryExpression::has_attachment());
        assert_eq!(parse("has:attachments").unwrap(), QueryExpression::has_attachment());
    }

    #[test]
    fn test_date_qualifiers() {
        let after = QueryExpression::date(word("yesterday"), DateDirection::After);
        assert_eq!(parse("since:yesterday").unwrap(), after);
        assert_eq!(parse("after:yesterday").unwrap(), after);
        assert_eq!(
            parse("before:\"last week\"").unwrap(),
            QueryExpression::date(Token::quoted("last week"), DateDirection::Before)
        );
    }

    #[test]
    fn test_whitespace_around_colon() {
        assert_eq!(parse("from : ben").unwrap(), parse("from:ben").unwrap());
    }

    #[test]
    fn test_parenthesized_group() {
        assert_eq!(
            parse("(a OR b) is:starred").unwrap(),
            QueryExpression::and(
                QueryExpression::or(generic("a"), generic("b")),
                QueryExpression::starred(true)
            )
        );
    }

    #[test]
    fn test_or_of_groups() {
        assert_eq!(
            parse("(a b) OR (c d)").unwrap(),
            QueryExpression::or(
                QueryExpression::and(generic("a"), generic("b")),
                QueryExpression::and(generic("c"), generic("d"))
            )
        );
    }

    #[test]
    fn test_quoted_keyword_is_text() {
        assert_eq!(
            parse("\"or\" b").unwrap(),
            QueryExpression::and(QueryExpression::generic(Token::quoted("or")), generic("b"))
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse(""), Err(SearchError::Empty)));
        assert!(matches!(parse("   \t\n"), Err(SearchError::Empty)));
    }

    #[test]
    fn test_missing_colon() {
        let err = parse("from ben").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error at position 5: expected ':' after 'from', got 'ben'"
        );
    }

    #[test]
    fn test_missing_text() {
        let err = parse("subject:").unwrap_err();
        assert!(err.to_string().contains("reached end of input"), "{err}");
    }

    #[test]
    fn test_dangling_operators() {
        assert!(parse("a OR").is_err());
        assert!(parse("a AND").is_err());
        assert!(parse("a NOT").is_err());
        assert!(parse("OR a").is_err());
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = parse("(a b").unwrap_err();
        assert!(err.to_string().contains("expected ')'"), "{err}");

        let err = parse("a b)").unwrap_err();
        assert_eq!(err.to_string(), "Parse error at position 3: unexpected ')'");

        assert!(parse("()").is_err());

        let err = parse(")").unwrap_err();
        assert_eq!(err.to_string(), "Parse error at position 0: unexpected ')'");
        let err = parse(") from:ben").unwrap_err();
        assert_eq!(err.to_string(), "Parse error at position 0: unexpected ')'");
        let err = parse("  )").unwrap_err();
        assert_eq!(err.to_string(), "Parse error at position 2: unexpected ')'");
    }

    #[test]
    fn test_unknown_qualifier_rejected_by_default() {
        let err = parse("is:foo").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error at position 3: unknown value 'foo' for 'is:', expected one of: read, unread, starred, unstarred"
        );
        assert!(parse("has:pdf").is_err());
    }

    #[test]
    fn test_unknown_qualifier_literal_fallback() {
        let options = ParseOptions {
            unknown_qualifier: UnknownQualifier::Literal,
            ..ParseOptions::default()
        };
        assert_eq!(parse_with("is:foo", options).unwrap(), generic("is:foo"));
        assert_eq!(
            parse_with("has:pdf from:ben", options).unwrap(),
            QueryExpression::and(generic("has:pdf"), QueryExpression::sender(word("ben")))
        );
        assert_eq!(parse_with("is:unread", options).unwrap(), QueryExpression::unread(true));
    }

    #[test]
    fn test_nesting_limit() {
        let options = ParseOptions {
            max_depth: 3,
            ..ParseOptions::default()
        };
        assert!(parse_with("(((a)))", options).is_ok());
        let err = parse_with("((((a))))", options).unwrap_err();
        assert!(err.to_string().contains("nested deeper than 3"), "{err}");

        let deep = format!("{}a{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(parse(&deep).is_err());
    }

    #[test]
    fn test_clause_limit() {
        let query = vec!["word"; DEFAULT_MAX_CLAUSES].join(" ");
        assert!(parse(&query).is_ok());
        let query = vec!["word"; DEFAULT_MAX_CLAUSES].join(" OR ");
        assert!(parse(&query).is_ok());

        let err = parse(&vec!["word"; 50_000].join(" ")).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Parse error at position {}: query too long, more than 512 search terms",
                5 * DEFAULT_MAX_CLAUSES
            )
        );
        assert!(parse(&vec!["word"; 50_000].join(" OR ")).is_err());

        let options = ParseOptions {
            max_clauses: 2,
            ..ParseOptions::default()
        };
        assert!(parse_with("(a OR b)", options).is_ok());
        assert!(parse_with("(a OR b) c", options).is_err());
        assert!(parse_with("is:unread a NOT b", options).is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for query in [
            "from:\"ben@x.com\" subject:hello",
            "a OR b c",
            "is:unread NOT (hello OR in:inbox)",
            "(a OR b) is:starred has:attachment before:2024-01-01",
        ] {
            let expr = parse(query).unwrap();
            assert_eq!(parse(&expr.to_string()).unwrap(), expr, "{query}");
        }
    }
}
