//! Compiler configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! default_entity = "Thread"
//! dialect = "sqlite"
//! max_depth = 32
//! max_clauses = 256
//! unknown_qualifier = "literal"
//!
//! [entities.Message]
//! timestamp_column = "date"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SearchError, SearchResult};
use crate::parser::{DEFAULT_MAX_CLAUSES, DEFAULT_MAX_DEPTH, ParseOptions, UnknownQualifier};
use crate::transpiler::Dialect;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "MAILQ_CONFIG";

pub const DEFAULT_ENTITY: &str = "Thread";

const THREAD_TIMESTAMP: &str = "lastMessageReceivedTimestamp";
const MESSAGE_TIMESTAMP: &str = "date";

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Entity compiled against when none is given
    pub default_entity: String,

    pub dialect: Dialect,

    /// Maximum parenthesis nesting
    pub max_depth: usize,

    /// Maximum search terms per query
    pub max_clauses: usize,

    /// What `is:` / `has:` do with a value they don't know
    pub unknown_qualifier: UnknownQualifier,

    /// Per-entity column overrides, keyed by entity name
    pub entities: BTreeMap<String, EntityOverrides>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_entity: DEFAULT_ENTITY.to_string(),
            dialect: Dialect::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_clauses: DEFAULT_MAX_CLAUSES,
            unknown_qualifier: UnknownQualifier::default(),
            entities: BTreeMap::new(),
        }
    }
}

/// Column names as written in the config file. Missing ones use the entity defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityOverrides {
    pub id_column: Option<String>,
    pub unread_column: Option<String>,
    pub starred_column: Option<String>,
    pub data_column: Option<String>,
    pub timestamp_column: Option<String>,
}

/// Fully resolved table mapping for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityConfig {
    pub name: String,
    pub id_column: String,
    pub unread_column: String,
    pub starred_column: String,
    pub data_column: String,
    pub timestamp_column: String,
}

impl EntityConfig {
    /// Default mapping for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let timestamp = match name.as_str() {
            "Message" => MESSAGE_TIMESTAMP,
            _ => THREAD_TIMESTAMP,
        };
        Self {
            name,
            id_column: "id".to_string(),
            unread_column: "unread".to_string(),
            starred_column: "starred".to_string(),
            data_column: "data".to_string(),
            timestamp_column: timestamp.to_string(),
        }
    }

    /// Full-text table backing this entity.
    pub fn search_table(&self) -> String {
        format!("{}Search", self.name)
    }

    fn apply(mut self, overrides: &EntityOverrides) -> Self {
        let fields = [
            (&mut self.id_column, &overrides.id_column),
            (&mut self.unread_column, &overrides.unread_column),
            (&mut self.starred_column, &overrides.starred_column),
            (&mut self.data_column, &overrides.data_column),
            (&mut self.timestamp_column, &overrides.timestamp_column),
        ];
        for (column, value) in fields {
            if let Some(value) = value {
                column.clone_from(value);
            }
        }
        self
    }
}

impl Config {
    pub fn from_toml(content: &str) -> SearchResult<Self> {
        Self::validate(content).map_err(SearchError::Config)
    }

    fn validate(content: &str) -> Result<Self, String> {
        let config: Config = toml::from_str(content).map_err(|e| e.to_string())?;
        if config.default_entity.trim().is_empty() {
            return Err("default_entity must not be empty".to_string());
        }
        if config.max_depth == 0 {
            return Err("max_depth must be at least 1".to_string());
        }
        if config.max_clauses == 0 {
            return Err("max_clauses must be at least 1".to_string());
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> SearchResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::validate(&content)
            .map_err(|e| SearchError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// `<config dir>/mailq/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mailq").join("config.toml"))
    }

    /// Locate and load the configuration.
    ///
    /// An explicit path wins, then `$MAILQ_CONFIG`, then the default path.
    /// Explicit and environment paths must exist; a missing default file
    /// just yields the defaults.
    pub fn discover(explicit: Option<&Path>) -> SearchResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Self::load(Path::new(&path));
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Resolved mapping for `name`, with any overrides applied.
    pub fn entity(&self, name: &str) -> EntityConfig {
        let base = EntityConfig::new(name);
        match self.entities.get(name) {
            Some(overrides) => base.apply(overrides),
            None => base,
        }
    }

    pub fn default_entity(&self) -> EntityConfig {
        self.entity(&self.default_entity)
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_depth: self.max_depth,
            max_clauses: self.max_clauses,
            unknown_qualifier: self.unknown_qualifier,
        }
    }
}
