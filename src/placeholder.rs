//! The table of finished HTML blocks hidden from later passes.

use std::ops::Range;
use std::sync::LazyLock;

use log::warn;
use regex::Regex;

/// Upper bound on substitutions performed by a single [`Placeholders::resolve`].
pub const MAX_RESOLUTIONS: usize = 100_000;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~K(\d+)K").expect("placeholder token pattern"));

/// Blocks of finished HTML, referenced from the text by `~K<index>K` tokens.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    blocks: Vec<String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `block` and return its index.
    pub fn push(&mut self, block: impl Into<String>) -> usize {
        self.blocks.push(block.into());
        self.blocks.len() - 1
    }

    /// The token that stands for the block at `index`.
    pub fn token(index: usize) -> String {
        format!("~K{index}K")
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.blocks.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Hide generated HTML behind a token surrounded by blank lines.
    pub(crate) fn hash_block(&mut self, html: &str) -> String {
        let index = self.push(html.trim_matches('\n'));
        format!("\n\n{}\n\n", Self::token(index))
    }

    /// Hide a raw HTML block found in newline-doubled text.
    pub(crate) fn hash_element(&mut self, html: &str) -> String {
        let html = html.replace("\n\n", "\n");
        let html = html.strip_prefix('\n').unwrap_or(&html);
        let index = self.push(html.trim_end_matches('\n'));
        format!("\n\n{}\n\n", Self::token(index))
    }

    /// Substitute every token with its block, including tokens that appear
    /// inside substituted blocks.
    ///
    /// Tokens whose index is out of range are left as they are. Once
    /// [`MAX_RESOLUTIONS`] substitutions have been made the remaining tokens
    /// are left literal too, so resolving resolved text is a no-op.
    pub fn resolve(&self, text: &str) -> String {
        let mut text = text.to_string();
        let mut from = 0;
        let mut substitutions = 0;
        while let Some((range, block)) = self.next_token(&text, from) {
            if substitutions == MAX_RESOLUTIONS {
                warn!("placeholder resolution stopped after {MAX_RESOLUTIONS} substitutions");
                break;
            }
            text.replace_range(range.clone(), block);
            substitutions += 1;
            // A token may straddle the start of the inserted block.
            from = text[..range.start].rfind('~').unwrap_or(range.start);
        }
        text
    }

    /// The first token at or after `from` that names a stored block.
    fn next_token(&self, text: &str, from: usize) -> Option<(Range<usize>, &str)> {
        let mut at = from;
        while let Some(caps) = TOKEN.captures_at(text, at) {
            let whole = caps.get(0)?;
            let block = caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| self.get(index));
            if let Some(block) = block {
                return Some((whole.range(), block));
            }
            at = whole.start() + 1;
        }
        None
    }
}

/// Whether `text` contains anything shaped like a placeholder token.
pub(crate) fn contains_token(text: &str) -> bool {
    TOKEN.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_block_trims_newlines() {
        let mut blocks = Placeholders::new();
        assert!(blocks.is_empty());
        assert_eq!(blocks.hash_block("\n<hr />\n\n"), "\n\n~K0K\n\n");
        assert_eq!(blocks.get(0), Some("<hr />"));
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn hash_element_undoubles_lines() {
        let mut blocks = Placeholders::new();
        assert_eq!(blocks.hash_element("\n<div>\n\nx\n\n</div>\n\n"), "\n\n~K0K\n\n");
        assert_eq!(blocks.get(0), Some("<div>\nx\n</div>"));
    }

    #[test]
    fn resolves_nested_tokens() {
        let mut blocks = Placeholders::new();
        blocks.push("<pre>x</pre>");
        blocks.push("<blockquote>~K0K</blockquote>");
        assert_eq!(
            blocks.resolve("a ~K1K b"),
            "a <blockquote><pre>x</pre></blockquote> b"
        );
    }

    #[test]
    fn unknown_tokens_stay_literal() {
        let mut blocks = Placeholders::new();
        blocks.push("ok");
        assert_eq!(blocks.resolve("~K7K ~K0K"), "~K7K ok");
    }

    #[test]
    fn cyclic_blocks_stop_at_the_cap() {
        let mut blocks = Placeholders::new();
        blocks.push("~K0K");
        assert_eq!(blocks.resolve("~K0K"), "~K0K");
    }

    #[test]
    fn token_detection() {
        assert!(contains_token("a ~K12K b"));
        assert!(!contains_token("~KK ~K1"));
    }
}
