//! Block-level passes: headers, rules, lists, code blocks, blockquotes and
//! paragraphs.

use std::ops::Range;
use std::sync::LazyLock;

use log::warn;
use regex::{Captures, NoExpand, Regex};

use crate::converter::RenderState;
use crate::escape::encode_code;
use crate::html_blocks::hash_html_blocks;
use crate::normalize::detab;
use crate::placeholder::contains_token;
use crate::rewrite::{
    END, char_at, count_run, is_js_space, is_line_start, line_starts, list_marker_at,
    remove_first_end, replace_matches, skip_spaces_tabs,
};

/// Nesting beyond which lists and blockquotes are left as plain text.
pub const MAX_NESTING: usize = 32;

static SETEXT_H1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(.+)[ \t]*\n=+[ \t]*\n+").expect("setext h1 pattern"));
static SETEXT_H2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(.+)[ \t]*\n-+[ \t]*\n+").expect("setext h2 pattern"));
static ATX_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(#{1,6})[ \t]*(.+?)[ \t]*#*\n+").expect("atx header pattern")
});
static RULES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [r"\*", "-", "_"].map(|mark| {
        Regex::new(&format!(r"(?m)^[ ]{{0,2}}(?:[ ]?{mark}[ ]?){{3,}}[ \t]*$"))
            .expect("horizontal rule pattern")
    })
});
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("blank lines pattern"));
static BLOCKQUOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^[ \t]*>[ \t]?.+\n(?:.+\n)*\n*)+").expect("blockquote pattern")
});
static QUOTE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*>[ \t]?").expect("quote marker pattern"));
static WHITESPACE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]+$").expect("whitespace line pattern"));
static PRE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*<pre>[^\r]+?</pre>").expect("pre block pattern"));
static PRE_INDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^  ").expect("pre indent pattern"));

/// How deep the current block gamut call is nested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Depth {
    /// Enclosing lists. Inside a list, a list may start without a blank line.
    pub(crate) list: usize,
    /// Enclosing lists and blockquotes together.
    pub(crate) nesting: usize,
}

impl Depth {
    fn enter_list(self) -> Self {
        Depth {
            list: self.list + 1,
            nesting: self.nesting + 1,
        }
    }

    fn enter_quote(self) -> Self {
        Depth {
            nesting: self.nesting + 1,
            ..self
        }
    }

    fn exhausted(self) -> bool {
        self.nesting >= MAX_NESTING
    }
}

/// A whole list found by [`RenderState::find_list`].
struct ListMatch {
    range: Range<usize>,
    /// Blank lines kept in front of a top-level list.
    runup: Range<usize>,
    body: Range<usize>,
    ordered: bool,
}

/// One item found by [`RenderState::find_list_item`].
struct ItemMatch {
    range: Range<usize>,
    content: Range<usize>,
    after_blank_line: bool,
}

impl RenderState<'_> {
    pub(crate) fn run_block_gamut(&mut self, text: &str, depth: Depth) -> String {
        let text = self.do_headers(text);
        let text = self.do_horizontal_rules(&text);
        let text = self.do_lists(&text, depth);
        let text = self.do_code_blocks(&text);
        let text = self.do_block_quotes(&text, depth);
        // Hide the HTML generated above so it is not wrapped in paragraphs.
        let text = hash_html_blocks(&text, &self.converter.tags, &mut self.blocks);
        self.form_paragraphs(&text)
    }

    fn do_headers(&mut self, text: &str) -> String {
        let text = SETEXT_H1.replace_all(text, |caps: &Captures| self.hash_header(1, &caps[1]));
        let text = SETEXT_H2.replace_all(&text, |caps: &Captures| self.hash_header(2, &caps[1]));
        ATX_HEADER
            .replace_all(&text, |caps: &Captures| {
                self.hash_header(caps[1].len(), &caps[2])
            })
            .into_owned()
    }

    fn hash_header(&mut self, level: usize, content: &str) -> String {
        let content = self.run_span_gamut(content);
        self.blocks
            .hash_block(&format!("<h{level}>{content}</h{level}>"))
    }

    fn do_horizontal_rules(&mut self, text: &str) -> String {
        let key = self.blocks.hash_block("<hr />");
        RULES.iter().fold(text.to_string(), |text, rule| {
            rule.replace_all(&text, NoExpand(&key)).into_owned()
        })
    }

    /// Turn runs of list items into `<ul>` and `<ol>` blocks.
    fn do_lists(&mut self, text: &str, depth: Depth) -> String {
        if depth.exhausted() {
            warn!("lists nested deeper than {MAX_NESTING} levels are left as text");
            return text.to_string();
        }
        let text = format!("{text}{END}");
        let out = replace_matches(&text, |text, from| {
            let list = self.find_list(text, from, depth)?;
            let html = self.render_list(text, &list, depth);
            Some((list.range, html))
        });
        remove_first_end(out)
    }

    /// The next whole list at or after `from`.
    ///
    /// At the top level a list must follow a blank line or start the text;
    /// inside a list any line may start one.
    fn find_list(&self, text: &str, from: usize, depth: Depth) -> Option<ListMatch> {
        if depth.list > 0 {
            return line_starts(text, from).find_map(|start| {
                let (end, ordered) = self.list_at(text, start)?;
                Some(ListMatch {
                    range: start..end,
                    runup: start..start,
                    body: start..end,
                    ordered,
                })
            });
        }
        let bytes = text.as_bytes();
        (from..text.len()).find_map(|at| {
            let body_start = if bytes[at..].starts_with(b"\n\n") {
                at + 2
            } else if at == 0 {
                count_run(bytes, 0, b'\n').min(1)
            } else {
                return None;
            };
            let (end, ordered) = self.list_at(text, body_start)?;
            Some(ListMatch {
                range: at..end,
                runup: at..body_start,
                body: body_start..end,
                ordered,
            })
        })
    }

    /// A list whose first marker is at `start`. Returns where it ends and
    /// whether it is ordered.
    ///
    /// The list runs to the end marker, or to a blank line followed by a line
    /// that is neither indented nor another list item.
    fn list_at(&self, text: &str, start: usize) -> Option<(usize, bool)> {
        let bytes = text.as_bytes();
        let spaces = count_run(bytes, start, b' ');
        if spaces >= self.converter.tab_width() {
            return None;
        }
        let (marker_end, ordered) = list_marker_at(bytes, start + spaces)?;
        let end = content_starts(bytes, marker_end).find_map(|content| list_end(text, content))?;
        Some((end, ordered))
    }

    fn render_list(&mut self, text: &str, list: &ListMatch, depth: Depth) -> String {
        let body = BLANK_LINES.replace_all(&text[list.body.clone()], "\n\n\n");
        let items = self.process_list_items(&body, depth);
        let tag = if list.ordered { "ol" } else { "ul" };
        if depth.list > 0 {
            let items = items.trim_end_matches(is_js_space);
            format!("<{tag}>{items}</{tag}>\n")
        } else {
            let runup = &text[list.runup.clone()];
            format!("{runup}<{tag}>\n{items}</{tag}>\n")
        }
    }

    /// Split a list into items and render each one as `<li>`.
    fn process_list_items(&mut self, list: &str, depth: Depth) -> String {
        let depth = depth.enter_list();
        let list = match list.strip_suffix("\n\n") {
            Some(_) => format!("{}\n{END}", list.trim_end_matches('\n')),
            None => format!("{list}{END}"),
        };
        let out = replace_matches(&list, |text, from| {
            let item = find_list_item(text, from)?;
            let content = &text[item.content.clone()];
            let html = self.render_list_item(content, item.after_blank_line, depth);
            Some((item.range, html))
        });
        out.replace(END, "")
    }

    /// Items that follow a blank line or contain one get full block
    /// processing; others are treated as a line of text with possible
    /// sub-lists.
    fn render_list_item(&mut self, item: &str, after_blank_line: bool, depth: Depth) -> String {
        let outdented = self.converter.outdent.replace_all(item, "");
        let html = if after_blank_line || item.contains("\n\n") {
            self.run_block_gamut(&outdented, depth)
        } else {
            let item = self.do_lists(&outdented, depth);
            let item = item.strip_suffix('\n').unwrap_or(&item);
            self.run_span_gamut(item)
        };
        format!("<li>{html}</li>\n")
    }

    /// Wrap indented runs of lines in `<pre><code>`.
    fn do_code_blocks(&mut self, text: &str) -> String {
        let text = format!("{text}{END}");
        let out = replace_matches(&text, |text, from| {
            let (range, code, next) = self.find_code_block(text, from)?;
            let code = self.converter.outdent.replace_all(&text[code], "");
            let code = detab(&encode_code(&code), self.converter.tab_width());
            let html = format!("<pre><code>{}\n</code></pre>", code.trim_matches('\n'));
            let token = self.blocks.hash_block(&html);
            Some((range, format!("{token}{}", &text[next])))
        });
        remove_first_end(out)
    }

    /// The next code block after a blank line or at the start of the text.
    ///
    /// Returns the whole match, the code lines, and the first character of
    /// the following line, which the match consumes and must be put back.
    fn find_code_block(
        &self,
        text: &str,
        from: usize,
    ) -> Option<(Range<usize>, Range<usize>, Range<usize>)> {
        let bytes = text.as_bytes();
        let tab_width = self.converter.tab_width();
        (from..text.len()).find_map(|at| {
            let start = if bytes[at..].starts_with(b"\n\n") {
                at + 2
            } else if at == 0 {
                0
            } else {
                return None;
            };
            let mut end = start;
            while count_run(bytes, end, b' ') >= tab_width || bytes.get(end) == Some(&b'\t') {
                let Some(offset) = text[end..].find('\n') else {
                    break;
                };
                end += offset;
                end += count_run(bytes, end, b'\n');
            }
            if end == start {
                return None;
            }
            let spaces = count_run(bytes, end, b' ');
            let next = char_at(text, end + spaces)?;
            if spaces >= tab_width || matches!(next, ' ' | '\t' | '\n') {
                return None;
            }
            let next_end = end + spaces + next.len_utf8();
            Some((at..next_end, start..end, end..next_end))
        })
    }

    fn do_block_quotes(&mut self, text: &str, depth: Depth) -> String {
        if depth.exhausted() {
            warn!("blockquotes nested deeper than {MAX_NESTING} levels are left as text");
            return text.to_string();
        }
        BLOCKQUOTE
            .replace_all(text, |caps: &Captures| {
                let quote = QUOTE_MARKER.replace_all(&caps[0], "");
                let quote = WHITESPACE_LINE.replace_all(&quote, "");
                let quote = self.run_block_gamut(&quote, depth.enter_quote());
                let quote = indent_quote(&quote);
                // Leading spaces inside <pre> are content; take the indent back out.
                let quote = PRE_BLOCK.replace_all(&quote, |pre: &Captures| {
                    PRE_INDENT.replace_all(&pre[0], "").into_owned()
                });
                self.blocks
                    .hash_block(&format!("<blockquote>\n{quote}\n</blockquote>"))
            })
            .into_owned()
    }

    /// Wrap each non-blank run of text in `<p>` and put hidden blocks back.
    fn form_paragraphs(&mut self, text: &str) -> String {
        let text = text.trim_matches('\n');
        let mut grafs = Vec::new();
        for graf in BLANK_LINES.split(text) {
            if contains_token(graf) {
                grafs.push(graf.to_string());
            } else if graf.chars().any(|c| !is_js_space(c)) {
                let html = self.run_span_gamut(graf);
                grafs.push(format!("<p>{}</p>", html.trim_start_matches([' ', '\t'])));
            }
        }
        grafs
            .iter()
            .map(|graf| self.blocks.resolve(graf))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// The next list item at or after `from`.
///
/// An item runs from its marker to the end of a line that is followed,
/// after any blank lines, by the end marker or by another marker at the
/// same indentation.
fn find_list_item(text: &str, from: usize) -> Option<ItemMatch> {
    let bytes = text.as_bytes();
    (from..text.len()).find_map(|at| {
        if bytes[at] == b'\n' {
            list_item_at(text, at + 1).map(|(content, end)| ItemMatch {
                range: at..end,
                content,
                after_blank_line: true,
            })
        } else if is_line_start(text, at) {
            list_item_at(text, at).map(|(content, end)| ItemMatch {
                range: at..end,
                content,
                after_blank_line: false,
            })
        } else {
            None
        }
    })
}

/// Where the content after a marker ending at `marker_end` may begin.
///
/// Content normally starts past the spaces and tabs that follow the marker.
/// When nothing ends the list or item from there, the last of those
/// characters is given back to the content, so `"*  \n"` is an empty item.
fn content_starts(bytes: &[u8], marker_end: usize) -> impl Iterator<Item = usize> {
    let content = skip_spaces_tabs(bytes, marker_end);
    let given_back = (content > marker_end + 1).then(|| content - 1);
    (content > marker_end)
        .then_some(content)
        .into_iter()
        .chain(given_back)
}

/// The end of a list whose first item's content starts at `content`: just
/// past the end marker, or before the first line that follows a blank line
/// and is neither indented nor another list item.
fn list_end(text: &str, content: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut at = content + char_at(text, content)?.len_utf8();
    while at < text.len() {
        if text[at..].starts_with(END) {
            return Some(at + END.len());
        }
        if bytes[at] == b'\n' {
            let newlines = count_run(bytes, at, b'\n');
            let next = at + newlines;
            if newlines >= 2
                && char_at(text, next).is_some_and(|c| !is_js_space(c))
                && !starts_list_item(bytes, next)
            {
                return Some(next);
            }
            at = next;
            continue;
        }
        at += char_at(text, at)?.len_utf8();
    }
    None
}

/// An item whose line starts at `start`. Returns its content, trailing
/// newlines included, and where the item ends.
fn list_item_at(text: &str, start: usize) -> Option<(Range<usize>, usize)> {
    let bytes = text.as_bytes();
    let marker = skip_spaces_tabs(bytes, start);
    let indent = &text[start..marker];
    let (marker_end, _) = list_marker_at(bytes, marker)?;
    content_starts(bytes, marker_end).find_map(|content| item_end(text, content, indent))
}

/// The end of an item whose content starts at `content`: the end of the
/// first line followed, after any blank lines, by the end marker or by a
/// marker at `indent`.
fn item_end(text: &str, content: usize, indent: &str) -> Option<(Range<usize>, usize)> {
    let bytes = text.as_bytes();
    let first = content + char_at(text, content)?.len_utf8();
    for (offset, _) in text[first..].match_indices('\n') {
        let line_end = first + offset;
        let newlines = if bytes.get(line_end + 1) == Some(&b'\n') {
            2
        } else {
            1
        };
        let end = line_end + newlines;
        let next = end + count_run(bytes, end, b'\n');
        let continues = text[next..].starts_with(END)
            || (text[next..].starts_with(indent) && starts_marker(bytes, next + indent.len()));
        if continues {
            return Some((content..end, end));
        }
    }
    None
}

/// A list marker at `at` followed by a space or tab.
fn starts_marker(bytes: &[u8], at: usize) -> bool {
    list_marker_at(bytes, at)
        .is_some_and(|(end, _)| matches!(bytes.get(end), Some(b' ' | b'\t')))
}

/// Optional spaces and tabs, then a list marker followed by a space or tab.
fn starts_list_item(bytes: &[u8], at: usize) -> bool {
    starts_marker(bytes, skip_spaces_tabs(bytes, at))
}

/// Indent every line by two spaces.
fn indent_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    out.push_str("  ");
    for (at, c) in text.char_indices() {
        out.push(c);
        if c == '\n' && at > 0 {
            out.push_str("  ");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::Converter;
    use crate::options::Options;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn with_state<T>(f: impl FnOnce(&mut RenderState) -> T) -> T {
        let converter = Converter::new(Options::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut state = RenderState {
            converter: &converter,
            blocks: Default::default(),
            links: Default::default(),
            rng: &mut rng,
        };
        f(&mut state)
    }

    #[test]
    fn depth_tracks_lists_and_quotes_separately() {
        let depth = Depth::default().enter_list().enter_quote();
        assert_eq!(depth, Depth { list: 1, nesting: 2 });
        assert!(!depth.exhausted());
    }

    #[test]
    fn finds_items_and_their_boundaries() {
        let text = "* a\n* b\n~0";
        let first = find_list_item(text, 0).unwrap();
        assert_eq!(first.range, 0..4);
        assert_eq!(&text[first.content], "a\n");
        assert!(!first.after_blank_line);
        let second = find_list_item(text, 4).unwrap();
        assert_eq!(&text[second.content], "b\n");
    }

    #[test]
    fn blank_line_between_items_marks_the_next_one() {
        let text = "* a\n\n\n* b\n~0";
        let first = find_list_item(text, 0).unwrap();
        assert_eq!(&text[first.content.clone()], "a\n\n");
        let second = find_list_item(text, first.range.end).unwrap();
        assert!(second.after_blank_line);
    }

    #[test]
    fn whitespace_only_item_gives_a_space_to_its_content() {
        let text = "*  \n~0";
        let item = find_list_item(text, 0).unwrap();
        assert_eq!(&text[item.content], " \n");
        assert_eq!(item.range, 0..4);
    }

    #[test]
    fn whitespace_only_items_render_empty() {
        with_state(|state| {
            let depth = Depth::default().enter_list();
            assert_eq!(state.do_lists("1.   \n", depth), "<ol><li></li></ol>\n");
        });
    }

    #[test]
    fn top_level_list_needs_a_blank_line_before_it() {
        with_state(|state| {
            let text = "\n\nitem\n8. continues\n\n";
            assert_eq!(state.do_lists(text, Depth::default()), text);
        });
    }

    #[test]
    fn nested_depth_starts_lists_anywhere() {
        with_state(|state| {
            let depth = Depth::default().enter_list();
            let html = state.do_lists("* a\n", depth);
            assert_eq!(html, "<ul><li>a</li></ul>\n");
        });
    }

    #[test]
    fn lists_stop_at_the_nesting_cap() {
        with_state(|state| {
            let depth = Depth {
                list: MAX_NESTING,
                nesting: MAX_NESTING,
            };
            assert_eq!(state.do_lists("* a\n", depth), "* a\n");
        });
    }

    #[test]
    fn code_block_keeps_following_text() {
        with_state(|state| {
            let out = state.do_code_blocks("\n\n    x < y\n\nnext\n\n");
            assert_eq!(out, "\n\n~K0K\n\nnext\n\n");
            assert_eq!(state.blocks.get(0), Some("<pre><code>x &lt; y\n</code></pre>"));
        });
    }

    #[test]
    fn headers_are_hidden_blocks() {
        with_state(|state| {
            let out = state.do_headers("Title\n=====\n\n## Sub ##\n");
            assert_eq!(out, "\n\n~K0K\n\n\n\n~K1K\n\n");
            assert_eq!(state.blocks.get(0), Some("<h1>Title</h1>"));
            assert_eq!(state.blocks.get(1), Some("<h2>Sub</h2>"));
        });
    }

    #[test]
    fn quote_indent_skips_leading_newline() {
        assert_eq!(indent_quote("a\nb"), "  a\n  b");
        assert_eq!(indent_quote("\na"), "  \na");
    }
}
