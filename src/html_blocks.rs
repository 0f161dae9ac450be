//! Hiding block-level raw HTML behind placeholder tokens.
//!
//! All scanners here run on text whose newlines have been doubled, so every
//! original line is followed by a blank line. That lets "preceded by a blank
//! line" and "followed by a newline" be checked on the text itself.

use std::collections::HashSet;
use std::ops::Range;

use crate::placeholder::Placeholders;
use crate::rewrite::{
    count_run, is_js_space, is_word_byte, line_starts, replace_matches, skip_spaces_tabs,
};

/// Tag names recognised as block-level HTML, compiled from the options.
#[derive(Debug, Clone)]
pub(crate) struct BlockTags {
    /// Tags matched with a close tag at the left margin.
    nested: Vec<String>,
    /// Tags matched from the opening tag to the first line ending in the close tag.
    loose: Vec<String>,
    /// Leading spaces allowed before `<hr>`, comments and instructions.
    indent: usize,
}

impl BlockTags {
    pub(crate) fn new(tags: &[String], tab_width: usize) -> Self {
        let loose = tags
            .iter()
            .filter(|tag| !matches!(tag.as_str(), "ins" | "del"))
            .cloned()
            .collect();
        BlockTags {
            nested: tags.to_vec(),
            loose,
            indent: tab_width - 1,
        }
    }
}

/// Replace raw HTML blocks with placeholder tokens.
pub(crate) fn hash_html_blocks(text: &str, tags: &BlockTags, blocks: &mut Placeholders) -> String {
    let text = text.replace('\n', "\n\n");

    // Nested blocks first: the loose scan would stop at the first inner close tag.
    let mut unclosed = HashSet::new();
    let text = replace_matches(&text, |text, from| {
        let range = find_nested_block(text, from, &tags.nested, &mut unclosed)?;
        let token = blocks.hash_element(&text[range.clone()]);
        Some((range, token))
    });
    let mut unclosed = HashSet::new();
    let text = replace_matches(&text, |text, from| {
        let range = find_loose_block(text, from, &tags.loose, &mut unclosed)?;
        let token = blocks.hash_element(&text[range.clone()]);
        Some((range, token))
    });
    let text = replace_matches(&text, |text, from| {
        let range = find_rule(text, from, tags.indent)?;
        let token = blocks.hash_element(&text[range.clone()]);
        Some((range, token))
    });
    let mut unclosed = false;
    let text = replace_matches(&text, |text, from| {
        let range = find_comment(text, from, tags.indent, &mut unclosed)?;
        let token = blocks.hash_element(&text[range.clone()]);
        Some((range, token))
    });
    let mut unclosed = HashSet::new();
    let text = replace_matches(&text, |text, from| {
        let (range, body) = find_instruction(text, from, tags.indent, &mut unclosed)?;
        let token = blocks.hash_element(&text[body..range.end]);
        Some((range, token))
    });

    text.replace("\n\n", "\n")
}

/// `<name` at `at` where `name` is one of `tags` and is not followed by
/// another word character. Returns the name and the offset after it.
fn tag_name_at<'a>(text: &'a str, at: usize, tags: &[String]) -> Option<(&'a str, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(at) != Some(&b'<') {
        return None;
    }
    let len = bytes[at + 1..]
        .iter()
        .take_while(|&&b| is_word_byte(b))
        .count();
    let name = &text[at + 1..at + 1 + len];
    (len > 0 && tags.iter().any(|tag| tag == name)).then_some((name, at + 1 + len))
}

/// An opening tag at a line start through the first `</name>` that also
/// starts a line and ends it, give or take trailing spaces and tabs.
///
/// `unclosed` collects names with no usable close tag left in `text`; later
/// openings of those names are skipped.
fn find_nested_block(
    text: &str,
    from: usize,
    tags: &[String],
    unclosed: &mut HashSet<String>,
) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    for start in line_starts(text, from) {
        let Some((name, after)) = tag_name_at(text, start, tags) else {
            continue;
        };
        if unclosed.contains(name) {
            continue;
        }
        let close = format!("\n</{name}>");
        let mut search = after;
        while let Some(offset) = text[search..].find(&close) {
            let close_at = search + offset;
            let end = skip_spaces_tabs(bytes, close_at + close.len());
            if bytes.get(end) == Some(&b'\n') {
                return Some(start..end);
            }
            search = close_at + 1;
        }
        unclosed.insert(name.to_string());
    }
    None
}

/// An opening tag at a line start through the first line that ends in the
/// matching close tag, newline included.
fn find_loose_block(
    text: &str,
    from: usize,
    tags: &[String],
    unclosed: &mut HashSet<String>,
) -> Option<Range<usize>> {
    for start in line_starts(text, from) {
        let Some((name, after)) = tag_name_at(text, start, tags) else {
            continue;
        };
        if unclosed.contains(name) {
            continue;
        }
        let close = format!("</{name}>");
        let mut line_start = start;
        while let Some(offset) = text[line_start..].find('\n') {
            let line_end = line_start + offset;
            let line = text[line_start..line_end].trim_end_matches([' ', '\t']);
            if line.ends_with(&close) && line_start + line.len() - close.len() >= after {
                return Some(start..line_end + 1);
            }
            line_start = line_end + 1;
        }
        unclosed.insert(name.to_string());
    }
    None
}

/// A standalone `<hr>` tag, indented by at most `indent` spaces and
/// followed by a blank line. The range starts at the preceding newline.
fn find_rule(text: &str, from: usize, indent: usize) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    for (offset, _) in text[from..].match_indices('\n') {
        let newline = from + offset;
        let spaces = count_run(bytes, newline + 1, b' ');
        let open = newline + 1 + spaces;
        if spaces > indent || !text[open..].starts_with("<hr") {
            continue;
        }
        if bytes.get(open + 3).is_some_and(|&b| is_word_byte(b)) {
            continue;
        }
        let Some(stop) = text[open + 3..].find(['<', '>']).map(|o| open + 3 + o) else {
            continue;
        };
        if bytes[stop] != b'>' {
            continue;
        }
        let end = skip_spaces_tabs(bytes, stop + 1);
        if text[end..].starts_with("\n\n") {
            return Some(newline..end);
        }
    }
    None
}

/// Offsets of every blank line start (`\n\n`) at or after `from`,
/// overlapping ones included.
fn blank_line_starts(text: &str, from: usize) -> impl Iterator<Item = usize> + '_ {
    text[from..]
        .match_indices('\n')
        .map(move |(offset, _)| from + offset)
        .filter(|&at| text.as_bytes().get(at + 1) == Some(&b'\n'))
}

/// A standalone `<!-- ... -->` comment between blank lines.
///
/// Once one comment finds no closing `-->` standing alone, no later comment
/// can, and `unclosed` is set.
fn find_comment(
    text: &str,
    from: usize,
    indent: usize,
    unclosed: &mut bool,
) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    for start in blank_line_starts(text, from) {
        if *unclosed {
            return None;
        }
        let spaces = count_run(bytes, start + 2, b' ');
        let open = start + 2 + spaces;
        if spaces > indent || !text[open..].starts_with("<!--") {
            continue;
        }
        let body = open + 2;
        for (offset, _) in text[body..].match_indices('>') {
            let close = body + offset;
            let inner = text[body..close].trim_end_matches(is_js_space);
            if inner.len() < 4 || !inner.ends_with("--") {
                continue;
            }
            let end = skip_spaces_tabs(bytes, close + 1);
            if text[end..].starts_with("\n\n") {
                return Some(start..end);
            }
        }
        *unclosed = true;
    }
    None
}

/// A standalone `<? ... ?>` or `<% ... %>` instruction between blank lines.
///
/// Returns the whole match and the offset where the hidden block begins,
/// after the leading blank line. `unclosed` collects the closing sequences
/// with no standalone occurrence left in `text`.
fn find_instruction(
    text: &str,
    from: usize,
    indent: usize,
    unclosed: &mut HashSet<&'static str>,
) -> Option<(Range<usize>, usize)> {
    let bytes = text.as_bytes();
    for start in blank_line_starts(text, from) {
        let body = start + 2;
        let spaces = count_run(bytes, body, b' ');
        let open = body + spaces;
        let close = match bytes.get(open..open + 2) {
            Some(b"<?") => "?>",
            Some(b"<%") => "%>",
            _ => continue,
        };
        if spaces > indent || unclosed.contains(close) {
            continue;
        }
        let mut search = open + 2;
        while let Some(offset) = text[search..].find(close) {
            let close_at = search + offset;
            let end = skip_spaces_tabs(bytes, close_at + 2);
            if text[end..].starts_with("\n\n") {
                return Some((start..end, body));
            }
            search = close_at + 1;
        }
        unclosed.insert(close);
    }
    None
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn default_tags() -> BlockTags {
        let tags: Vec<String> = crate::options::Options::default().block_tags;
        BlockTags::new(&tags, 4)
    }

    fn hash(text: &str) -> (String, Placeholders) {
        let mut blocks = Placeholders::new();
        let text = hash_html_blocks(text, &default_tags(), &mut blocks);
        (text, blocks)
    }

    #[test]
    fn hides_div_block() {
        let (text, blocks) = hash("\n\n<div>\n*x*\n</div>\n\n");
        assert_eq!(text, "\n\n\n~K0K\n\n\n");
        assert_eq!(blocks.get(0), Some("<div>\n*x*\n</div>"));
    }

    #[test]
    fn nested_blocks_close_at_the_margin() {
        let (_, blocks) = hash("\n\n<div>\n  <div>\n  inner\n  </div>\n</div>\n\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks.get(0),
            Some("<div>\n  <div>\n  inner\n  </div>\n</div>")
        );
    }

    #[test]
    fn loose_scan_accepts_indented_close_tag() {
        let (_, blocks) = hash("\n\n<table><tr><td>x</td></tr>\n  </table>\n\n");
        assert_eq!(blocks.get(0), Some("<table><tr><td>x</td></tr>\n  </table>"));
    }

    #[test]
    fn tag_names_must_match_exactly() {
        let (text, blocks) = hash("\n\n<divx>\nx\n</divx>\n\n");
        assert!(blocks.is_empty());
        assert_eq!(text, "\n\n<divx>\nx\n</divx>\n\n");
    }

    #[test]
    fn standalone_rule_comment_and_instruction() {
        let (_, blocks) = hash("\n\n<hr />\n\n<!-- note -->\n\n<?php echo 1; ?>\n\n");
        assert_eq!(blocks.get(0), Some("<hr />"));
        assert_eq!(blocks.get(1), Some("<!-- note -->"));
        assert_eq!(blocks.get(2), Some("<?php echo 1; ?>"));
    }

    #[test]
    fn comment_needs_dashes_on_both_ends() {
        let (_, blocks) = hash("\n\n<!-->\n\n");
        assert!(blocks.is_empty());
    }

    #[test]
    fn rule_must_stand_alone() {
        let (_, blocks) = hash("\n\n<hr /> text\n\n");
        assert!(blocks.is_empty());
    }

    #[test]
    fn unclosed_block_does_not_hide_other_tags() {
        let (_, blocks) = hash("\n\n<div>\nx\n\n<p>\ny\n</p>\n\n");
        assert_eq!(blocks.get(0), Some("<p>\ny\n</p>"));
    }

    #[test]
    fn many_unclosed_blocks_stay_fast() {
        let text = String::from("\n\n")
            + &"<!-- a >\n\n".repeat(20_000)
            + &"<? a\n\n".repeat(20_000)
            + &"<div>\n\n".repeat(20_000);
        let started = Instant::now();
        let (hashed, blocks) = hash(&text);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(blocks.is_empty());
        assert_eq!(hashed, text);
    }
}
