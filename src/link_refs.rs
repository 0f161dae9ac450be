//! Link reference definitions: `[id]: url "optional title"`.

use std::collections::HashMap;

use regex::{Captures, Regex};

use crate::escape::encode_amps_and_angles;

/// A resolved link reference definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub url: String,
    pub title: Option<String>,
}

/// Link reference definitions collected from one document, keyed by
/// lower-cased id.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    refs: HashMap<String, LinkRef>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition. A later definition for the same id replaces the
    /// url, and the title only when it has one.
    pub fn insert(&mut self, id: &str, link: LinkRef) {
        match self.refs.get_mut(&id.to_lowercase()) {
            Some(existing) => {
                existing.url = link.url;
                if link.title.is_some() {
                    existing.title = link.title;
                }
            }
            None => {
                self.refs.insert(id.to_lowercase(), link);
            }
        }
    }

    /// Look up a definition, ignoring case.
    pub fn get(&self, id: &str) -> Option<&LinkRef> {
        self.refs.get(&id.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Pattern for one definition, allowing `indent` leading spaces.
pub(crate) fn definition_pattern(indent: usize) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        concat!(
            r"(?m)^[ ]{{0,{indent}}}\[(.+)\]:[ \t]*\n?[ \t]*<?(\S+?)>?[ \t]*\n?[ \t]*",
            r#"(?:(\n*)(["(](.+?)[")])[ \t]*)?\n+"#,
        ),
        indent = indent
    ))
}

/// Remove definitions from `text`, storing them in `links`.
///
/// When blank lines separate the url from what looks like a title, that
/// text is not a title and is left in the document.
pub(crate) fn strip_link_definitions(text: &str, pattern: &Regex, links: &mut LinkTable) -> String {
    pattern
        .replace_all(text, |caps: &Captures| {
            let url = encode_amps_and_angles(&caps[2]);
            if let (Some(whole), Some(skipped)) =
                (caps.get(0), caps.get(3).filter(|m| !m.is_empty()))
            {
                links.insert(&caps[1], LinkRef { url, title: None });
                return whole.as_str()[skipped.start() - whole.start()..].to_string();
            }
            let title = caps.get(5).map(|m| m.as_str().replace('"', "&quot;"));
            links.insert(&caps[1], LinkRef { url, title });
            String::new()
        })
        .into_owned()
}
