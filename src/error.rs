//! Error types for mailq.

use thiserror::Error;

/// The main error type for search compilation.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A quoted string was opened but never closed.
    #[error("Lex error at position {position}: unterminated string '{fragment}'")]
    Lex { position: usize, fragment: String },

    /// The token stream does not match the grammar.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// The input held no clauses at all.
    #[error("Cannot parse empty query")]
    Empty,

    /// A pass received a node it must never see.
    #[error("Compile invariant violated: {0}")]
    Invariant(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a lex error for an unterminated string starting at `position`.
    pub fn unterminated(position: usize, fragment: impl Into<String>) -> Self {
        Self::Lex {
            position,
            fragment: fragment.into(),
        }
    }

    /// Create an invariant violation.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }

    /// True for errors caused by the query text itself.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Lex { .. } | Self::Parse { .. } | Self::Empty)
    }
}

/// Result type alias for mailq operations.
pub type SearchResult<T> = Result<T, SearchError>;
