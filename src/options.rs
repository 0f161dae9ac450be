//! Converter configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest accepted tab width.
pub const MAX_TAB_WIDTH: usize = 16;

const DEFAULT_BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "table", "dl", "ol",
    "ul", "script", "noscript", "form", "fieldset", "iframe", "math", "ins", "del",
];

const DEFAULT_AUTOLINK_SCHEMES: &[&str] = &["http", "https", "ftp", "dict"];

/// Options controlling a [`Converter`](crate::Converter).
///
/// Missing fields take their default when deserialized, so a partial JSON
/// document such as `{"tab_width": 8}` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Columns per tab stop; also the indentation of a code block.
    pub tab_width: usize,
    /// Tag names recognised as block-level raw HTML.
    pub block_tags: Vec<String>,
    /// URL schemes turned into links when written as `<scheme:...>`.
    pub autolink_schemes: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            tab_width: 4,
            block_tags: DEFAULT_BLOCK_TAGS.iter().map(|tag| tag.to_string()).collect(),
            autolink_schemes: DEFAULT_AUTOLINK_SCHEMES
                .iter()
                .map(|scheme| scheme.to_string())
                .collect(),
        }
    }
}

impl Options {
    /// Check every field, reporting the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tab_width == 0 || self.tab_width > MAX_TAB_WIDTH {
            return Err(ConfigError::InvalidTabWidth {
                value: self.tab_width,
                max: MAX_TAB_WIDTH,
            });
        }
        if self.block_tags.is_empty() {
            return Err(ConfigError::EmptyBlockTags);
        }
        if let Some(tag) = self.block_tags.iter().find(|tag| !is_valid_tag(tag)) {
            return Err(ConfigError::InvalidBlockTag(tag.clone()));
        }
        if self.autolink_schemes.is_empty() {
            return Err(ConfigError::EmptyAutolinkSchemes);
        }
        if let Some(scheme) = self
            .autolink_schemes
            .iter()
            .find(|scheme| !is_valid_scheme(scheme))
        {
            return Err(ConfigError::InvalidAutolinkScheme(scheme.clone()));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let options: Options =
            serde_json::from_str(json).map_err(|source| ConfigError::ConfigParseError { source })?;
        options.validate()?;
        Ok(options)
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;
        Self::from_json_str(&content)
    }
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty() && tag.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut bytes = scheme.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
}
