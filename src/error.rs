use std::path::PathBuf;

use thiserror::Error;

/// Invalid converter configuration. Raised before any text is converted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tab width must be between 1 and {max}, got {value}")]
    InvalidTabWidth { value: usize, max: usize },

    #[error("the block tag allow-list is empty")]
    EmptyBlockTags,

    #[error("invalid block tag name {0:?}: expected ASCII letters and digits")]
    InvalidBlockTag(String),

    #[error("the autolink scheme list is empty")]
    EmptyAutolinkSchemes,

    #[error("invalid autolink scheme {0:?}: expected a letter followed by letters, digits, '+', '-' or '.'")]
    InvalidAutolinkScheme(String),

    #[error("failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {source}")]
    ConfigParseError { source: serde_json::Error },

    #[error("failed to compile pattern: {0}")]
    Pattern(#[from] regex::Error),
}
