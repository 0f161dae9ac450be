//! Span-level passes, applied to the text inside a block.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::converter::RenderState;
use crate::email::obfuscate_email;
use crate::escape::{
    encode_amps_and_angles, encode_backslash_escapes, encode_code, escape_characters,
    unescape_special_chars,
};
use crate::rewrite::{char_at, count_run, is_js_space, is_line_start, replace_matches};

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<[a-z/!$](?:"[^"]*"|'[^']*'|[^'">])*>|<!(?:--.*?--\s*)+>"#)
        .expect("html tag pattern")
});
static REFERENCE_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[(.*?)\][ ]?(?:\n[ ]*)?\[(.*?)\]").expect("reference image pattern")
});
static INLINE_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"!\[(.*?)\]\s?\([ \t]*<?(\S+?)>?[ \t]*",
        r#"(?:"(.*?)"[ \t]*|'(.*?)'[ \t]*)?\)"#,
    ))
    .expect("inline image pattern")
});
static REFERENCE_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[((?:\[[^\]]*\]|[^\[\]])*)\][ ]?(?:\n[ ]*)?\[(.*?)\]")
        .expect("reference anchor pattern")
});
static INLINE_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\[((?:\[[^\]]*\]|[^\[\]])*)\]\([ \t]*<?(.*?)>?[ \t]*",
        r#"(?:"(.*?)"[ \t]*|'(.*?)'[ \t]*)?\)"#,
    ))
    .expect("inline anchor pattern")
});
static SHORTCUT_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("shortcut anchor pattern"));
static EMPTY_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\(\s*\)$").expect("empty parens pattern"));
static LINE_JOIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" ?\n").expect("line join pattern"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:(?i:mailto):)?([-.A-Za-z0-9_]+@[-A-Za-z0-9]+(?:\.[-A-Za-z0-9]+)*\.[A-Za-z]+)>")
        .expect("email pattern")
});
static HARD_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}\n").expect("hard break pattern"));

/// The parts of an image or anchor match.
struct LinkParts<'t> {
    whole: &'t str,
    text: &'t str,
    id: &'t str,
    url: &'t str,
    title: Option<&'t str>,
}

impl<'t> LinkParts<'t> {
    /// A reference-style match: the url comes from the link table.
    fn reference(caps: &Captures<'t>) -> Self {
        LinkParts {
            whole: caps.get(0).map_or("", |m| m.as_str()),
            text: caps.get(1).map_or("", |m| m.as_str()),
            id: caps.get(2).map_or("", |m| m.as_str()),
            url: "",
            title: None,
        }
    }

    /// An inline match with an optional double- or single-quoted title.
    fn inline(caps: &Captures<'t>) -> Self {
        LinkParts {
            whole: caps.get(0).map_or("", |m| m.as_str()),
            text: caps.get(1).map_or("", |m| m.as_str()),
            id: "",
            url: caps.get(2).map_or("", |m| m.as_str()),
            title: caps.get(3).or_else(|| caps.get(4)).map(|m| m.as_str()),
        }
    }

    /// The lookup key: the explicit id, or else the link text.
    fn key(&self) -> String {
        if self.id.is_empty() {
            LINE_JOIN
                .replace_all(&self.text.to_lowercase(), " ")
                .into_owned()
        } else {
            self.id.to_lowercase()
        }
    }
}

impl RenderState<'_> {
    pub(crate) fn run_span_gamut(&mut self, text: &str) -> String {
        let text = do_code_spans(text);
        let text = escape_special_chars_within_tag_attributes(&text);
        let text = encode_backslash_escapes(&text);
        // Images first: `![foo][f]` also looks like an anchor.
        let text = self.do_images(&text);
        let text = self.do_anchors(&text);
        // After anchors, since `[this](<url>)` uses angle brackets too.
        let text = self.do_autolinks(&text);
        let text = encode_amps_and_angles(&text);
        let text = do_italics_and_bold(&text);
        HARD_BREAK.replace_all(&text, " <br />\n").into_owned()
    }

    fn do_images(&self, text: &str) -> String {
        let text = REFERENCE_IMAGE.replace_all(text, |caps: &Captures| {
            self.write_image_tag(&LinkParts::reference(caps))
        });
        INLINE_IMAGE
            .replace_all(&text, |caps: &Captures| {
                self.write_image_tag(&LinkParts::inline(caps))
            })
            .into_owned()
    }

    fn write_image_tag(&self, parts: &LinkParts) -> String {
        let mut url = parts.url.to_string();
        let mut title = parts.title.unwrap_or_default().to_string();
        if url.is_empty() {
            let Some(link) = self.links.get(&parts.key()) else {
                return parts.whole.to_string();
            };
            url = link.url.clone();
            if let Some(link_title) = &link.title {
                title = link_title.clone();
            }
        }
        let alt = parts.text.replace('"', "&quot;");
        let url = escape_characters(&url, "*_");
        // Images always carry a title attribute, even an empty one.
        let title = escape_characters(&title.replace('"', "&quot;"), "*_");
        format!("<img src=\"{url}\" alt=\"{alt}\" title=\"{title}\" />")
    }

    fn do_anchors(&self, text: &str) -> String {
        let text = REFERENCE_ANCHOR.replace_all(text, |caps: &Captures| {
            self.write_anchor_tag(&LinkParts::reference(caps))
        });
        let text = INLINE_ANCHOR.replace_all(&text, |caps: &Captures| {
            self.write_anchor_tag(&LinkParts::inline(caps))
        });
        SHORTCUT_ANCHOR
            .replace_all(&text, |caps: &Captures| {
                self.write_anchor_tag(&LinkParts::reference(caps))
            })
            .into_owned()
    }

    fn write_anchor_tag(&self, parts: &LinkParts) -> String {
        let mut url = parts.url.to_string();
        let mut title = parts.title.unwrap_or_default().to_string();
        if url.is_empty() {
            match self.links.get(&parts.key()) {
                Some(link) => {
                    url = link.url.clone();
                    if let Some(link_title) = &link.title {
                        title = link_title.clone();
                    }
                }
                // `[text]()` links to an empty url.
                None if EMPTY_PARENS.is_match(parts.whole) => {}
                None => return parts.whole.to_string(),
            }
        }
        let url = escape_characters(&url, "*_");
        let mut html = format!("<a href=\"{url}\"");
        if !title.is_empty() {
            let title = escape_characters(&title.replace('"', "&quot;"), "*_");
            html.push_str(&format!(" title=\"{title}\""));
        }
        html.push_str(&format!(">{}</a>", parts.text));
        html
    }

    fn do_autolinks(&mut self, text: &str) -> String {
        let text = self
            .converter
            .autolink
            .replace_all(text, "<a href=\"${1}\">${1}</a>");
        EMAIL
            .replace_all(&text, |caps: &Captures| {
                obfuscate_email(&unescape_special_chars(&caps[1]), &mut *self.rng)
            })
            .into_owned()
    }
}

/// Backtick-delimited code spans. The closing run must be exactly as long
/// as the opening one; when no such run exists, shorter openings are tried.
fn do_code_spans(text: &str) -> String {
    let bytes = text.as_bytes();
    let runs = backtick_runs(bytes);
    replace_matches(text, |text, from| {
        let first = runs.partition_point(|run| run.start < from);
        for (index, run) in runs.iter().enumerate().skip(first) {
            let Some((lead, open)) = code_span_opening(text, run, from) else {
                continue;
            };
            for width in (1..=run.end - open).rev() {
                let Some(close) = runs[index + 1..].iter().find(|r| r.len() == width) else {
                    continue;
                };
                let code = text[open + width..close.start].trim_matches([' ', '\t']);
                let html = format!("{}<code>{}</code>", &text[lead..open], encode_code(code));
                return Some((lead..close.end, html));
            }
        }
        None
    })
}

/// Maximal runs of backticks, in order.
fn backtick_runs(bytes: &[u8]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut at = 0;
    while let Some(offset) = bytes[at..].iter().position(|&b| b == b'`') {
        let start = at + offset;
        let len = count_run(bytes, start, b'`');
        runs.push(start..start + len);
        at = start + len;
    }
    runs
}

/// Where a code span may open within `run`: the start of the character kept
/// in front of it, and the offset of the opening backticks.
///
/// The opening run must start a line or follow a character other than a
/// backslash that has not been consumed already. Otherwise it opens one
/// backtick later, keeping the first backtick as text.
fn code_span_opening(text: &str, run: &Range<usize>, from: usize) -> Option<(usize, usize)> {
    let before = text[..run.start].chars().next_back();
    match before {
        Some(c) if c != '\\' && run.start - c.len_utf8() >= from => {
            Some((run.start - c.len_utf8(), run.start))
        }
        _ if is_line_start(text, run.start) => Some((run.start, run.start)),
        _ if run.len() >= 2 => Some((run.start, run.start + 1)),
        _ => None,
    }
}

/// Escape `\`, `` ` ``, `*` and `_` inside HTML tags and comments so later
/// passes leave attribute values alone.
fn escape_special_chars_within_tag_attributes(text: &str) -> String {
    HTML_TAG
        .replace_all(text, |caps: &Captures| {
            let tag = replace_matches(&caps[0], |tag, from| {
                let (range, prev) = find_code_tag(tag, from)?;
                Some((range, format!("{prev}`")))
            });
            escape_characters(&tag, "\\`*_")
        })
        .into_owned()
}

/// A `<code>` or `</code>` that sits between two characters on one line,
/// together with the character before it.
fn find_code_tag(tag: &str, from: usize) -> Option<(Range<usize>, char)> {
    let mut search = from;
    while let Some(offset) = tag[search..].find('<') {
        let at = search + offset;
        search = at + 1;
        let len = if tag[at..].starts_with("<code>") {
            6
        } else if tag[at..].starts_with("</code>") {
            7
        } else {
            continue;
        };
        let Some(prev) = tag[..at].chars().next_back() else {
            continue;
        };
        let start = at - prev.len_utf8();
        if prev == '\n' || start < from {
            continue;
        }
        if char_at(tag, at + len).is_some_and(|next| next != '\n') {
            return Some((start..at + len, prev));
        }
    }
    None
}

/// `<strong>` for `**` and `__`, then `<em>` for `*` and `_`.
fn do_italics_and_bold(text: &str) -> String {
    let mut unclosed = Unclosed::default();
    let text = replace_matches(text, |text, from| {
        let (range, content) = find_emphasis(text, from, 2, &mut unclosed)?;
        Some((range, format!("<strong>{content}</strong>")))
    });
    let mut unclosed = Unclosed::default();
    replace_matches(&text, |text, from| {
        let (range, content) = find_emphasis(text, from, 1, &mut unclosed)?;
        Some((range, format!("<em>{content}</em>")))
    })
}

/// For each delimiter character, the content offset from which no closing
/// delimiter exists. A later opening can only see fewer closers, so it fails
/// without another scan.
#[derive(Debug, Default)]
struct Unclosed {
    star: Option<usize>,
    underscore: Option<usize>,
}

impl Unclosed {
    fn slot(&mut self, mark: u8) -> &mut Option<usize> {
        if mark == b'*' {
            &mut self.star
        } else {
            &mut self.underscore
        }
    }
}

/// The next emphasis span delimited by `width` copies of `*` or `_`.
///
/// The content must start and end with a non-space character. For strong
/// emphasis, a run of `*` and `_` may follow the last non-space character.
fn find_emphasis<'t>(
    text: &'t str,
    from: usize,
    width: usize,
    unclosed: &mut Unclosed,
) -> Option<(Range<usize>, &'t str)> {
    let bytes = text.as_bytes();
    let mut search = from;
    while let Some(offset) = text[search..].find(['*', '_']) {
        let start = search + offset;
        search = start + 1;
        let mark = bytes[start];
        if count_run(bytes, start, mark) < width {
            continue;
        }
        let open_end = start + width;
        if !char_at(text, open_end).is_some_and(|c| !is_js_space(c)) {
            continue;
        }
        if unclosed.slot(mark).is_some_and(|dead| open_end >= dead) {
            continue;
        }
        match find_closer(text, open_end, mark, width) {
            Some(close) => return Some((start..close + width, &text[open_end..close])),
            None => *unclosed.slot(mark) = Some(open_end),
        }
    }
    None
}

/// The offset of the closing delimiter for content starting at `open_end`.
///
/// The content ends at the first non-space character that can be followed
/// by the closer. For strong emphasis the closer is the last pair of `mark`
/// within the run of `*` and `_` after that character.
fn find_closer(text: &str, open_end: usize, mark: u8, width: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    // The run containing the current position and its last usable closer.
    let mut run: Option<(usize, Option<usize>)> = None;
    for (at, c) in text[open_end..].char_indices() {
        if is_js_space(c) {
            continue;
        }
        let last_end = open_end + at + c.len_utf8();
        if width == 1 {
            if bytes.get(last_end) == Some(&mark) {
                return Some(last_end);
            }
            continue;
        }
        if !bytes.get(last_end).is_some_and(is_run_byte) {
            continue;
        }
        let closer = match run {
            Some((run_end, closer)) if last_end < run_end => closer,
            _ => {
                let run_end = last_end
                    + bytes[last_end..]
                        .iter()
                        .take_while(|b| is_run_byte(b))
                        .count();
                let closer = (last_end..run_end - 1)
                    .rev()
                    .find(|&q| bytes[q] == mark && bytes[q + 1] == mark);
                run = Some((run_end, closer));
                closer
            }
        };
        if let Some(close) = closer.filter(|&close| close >= last_end) {
            return Some(close);
        }
    }
    None
}

fn is_run_byte(b: &u8) -> bool {
    matches!(b, b'*' | b'_')
}
