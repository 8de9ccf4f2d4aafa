//! Token scanner for the search language.
//!
//! Splits raw search text into barewords, quoted strings and the three
//! structural characters `(`, `)` and `:`.
//!
//! ```text
//! from:"ben@x.com" (a OR b)
//! ──┬─┬────┬────── ┬┬─┬──┬┬
//!   │ │    │       ││ │  │└── ')'
//!   │ │    │       ││ │  └── bareword
//!   │ │    │       ││ └── bareword (reserved: OR)
//!   │ │    │       │└── bareword
//!   │ │    │       └── '('
//!   │ │    └── quoted string
//!   │ └── ':'
//!   └── bareword (reserved: FROM)
//! ```

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::{char, one_of},
    combinator::map,
    sequence::delimited,
    IResult,
};
use serde::Serialize;
use tracing::trace;

use crate::error::{SearchError, SearchResult};

/// Words with a meaning of their own in the grammar, matched case-insensitively.
pub const RESERVED_WORDS: &[&str] = &[
    "and",
    "or",
    "not",
    "is",
    "in",
    "has",
    "to",
    "from",
    "subject",
    "before",
    "since",
    "after",
    "read",
    "unread",
    "starred",
    "attachment",
];

/// A single lexical unit of a search query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Token {
    text: String,
    quoted: bool,
}

impl Token {
    /// A bareword token.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    /// A token that was written between double quotes.
    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// True if this is the unquoted keyword or symbol `word` (any case).
    pub fn is_keyword(&self, word: &str) -> bool {
        !self.quoted && self.text.eq_ignore_ascii_case(word)
    }

    /// True for unquoted reserved words.
    pub fn is_reserved(&self) -> bool {
        RESERVED_WORDS.iter().any(|word| self.is_keyword(word))
    }

    /// True for the unquoted structural characters `(`, `)` and `:`.
    pub fn is_delimiter(&self) -> bool {
        !self.quoted && matches!(self.text.as_str(), "(" | ")" | ":")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "\"{}\"", self.text)
        } else {
            f.write_str(&self.text)
        }
    }
}

/// A token together with its byte offset in the scanned input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lexeme {
    pub position: usize,
    pub token: Token,
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

fn is_word_char(c: char) -> bool {
    !is_whitespace(c) && !matches!(c, '(' | ')' | ':')
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(is_whitespace)(input)
}

fn quoted_string(input: &str) -> IResult<&str, Token> {
    map(
        delimited(char('"'), take_till(|c: char| c == '"'), char('"')),
        Token::quoted,
    )(input)
}

fn delimiter(input: &str) -> IResult<&str, Token> {
    map(one_of("():"), |c| Token::new(c.to_string()))(input)
}

/// A bareword never runs into a delimiter, so `from:` always yields the
/// reserved word `from` followed by `:`.
fn bareword(input: &str) -> IResult<&str, Token> {
    map(take_while1(is_word_char), Token::new)(input)
}

/// Cursor over a search string.
///
/// Copying a scanner is cheap, which is how [`Scanner::peek`] looks ahead.
#[derive(Debug, Clone, Copy)]
pub struct Scanner<'a> {
    source: &'a str,
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            rest: source,
        }
    }

    /// Byte offset of the cursor in the source text.
    pub fn offset(&self) -> usize {
        self.source.len() - self.rest.len()
    }

    /// Unscanned input.
    pub fn remaining(&self) -> &'a str {
        self.rest
    }

    /// Scan the next token, or `None` once only whitespace is left.
    pub fn next_token(&mut self) -> SearchResult<Option<Lexeme>> {
        if let Ok((rest, _)) = whitespace(self.rest) {
            self.rest = rest;
        }
        if self.rest.is_empty() {
            return Ok(None);
        }

        let position = self.offset();
        let (rest, token) = if self.rest.starts_with('"') {
            quoted_string(self.rest)
                .map_err(|_| SearchError::unterminated(position, self.rest))?
        } else {
            alt((delimiter, bareword))(self.rest)
                .map_err(|_| SearchError::parse(position, "unrecognized input"))?
        };
        self.rest = rest;

        trace!(position, token = %token, "scanned token");
        Ok(Some(Lexeme { position, token }))
    }

    /// Look at the next token without consuming it.
    pub fn peek(&self) -> SearchResult<Option<Lexeme>> {
        let mut ahead = *self;
        ahead.next_token()
    }
}

/// Scan one token from `text`, returning it with the unscanned remainder.
pub fn next_token(text: &str) -> SearchResult<(Option<Token>, &str)> {
    let mut scanner = Scanner::new(text);
    let lexeme = scanner.next_token()?;
    Ok((lexeme.map(|l| l.token), scanner.remaining()))
}

/// Scan the whole input.
pub fn tokenize(input: &str) -> SearchResult<Vec<Lexeme>> {
    let mut scanner = Scanner::new(input);
    let mut lexemes = Vec::new();
    while let Some(lexeme) = scanner.next_token()? {
        lexemes.push(lexeme);
    }
    Ok(lexemes)
}
