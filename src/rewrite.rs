//! Scanning helpers shared by the hand-written rewrite passes.
//!
//! Most passes are plain `regex` replacements. The ones that need
//! backreferences or lookaround are written as scanners that report one
//! match at a time; [`replace_matches`] then stitches the output together the
//! same way a global regex replacement would.

use std::ops::Range;

/// End-of-text marker appended by the list and code block passes.
///
/// Every literal `~` in the input is rewritten to `~T` before any pass runs,
/// so this sequence can only ever be one we inserted ourselves.
pub(crate) const END: &str = "~0";

/// Replace every match reported by `find`, scanning left to right.
///
/// `find` receives the full text and the offset to resume from, and returns
/// the byte range of the next match (starting at or after that offset) along
/// with its replacement. Scanning resumes at the end of each match.
pub(crate) fn replace_matches<F>(text: &str, mut find: F) -> String
where
    F: FnMut(&str, usize) -> Option<(Range<usize>, String)>,
{
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while pos < text.len() {
        let Some((range, replacement)) = find(text, pos) else {
            break;
        };
        debug_assert!(range.start >= pos && range.end > range.start);
        out.push_str(&text[pos..range.start]);
        out.push_str(&replacement);
        pos = range.end;
    }
    out.push_str(&text[pos..]);
    out
}

/// Drop the first [`END`] marker, if any.
pub(crate) fn remove_first_end(mut text: String) -> String {
    if let Some(at) = text.find(END) {
        text.replace_range(at..at + END.len(), "");
    }
    text
}

/// `^` in multi-line mode.
pub(crate) fn is_line_start(text: &str, at: usize) -> bool {
    at == 0 || text.as_bytes().get(at - 1) == Some(&b'\n')
}

/// Every line start at or after `from`, in order.
pub(crate) fn line_starts(text: &str, from: usize) -> impl Iterator<Item = usize> + '_ {
    let first = is_line_start(text, from).then_some(from);
    first.into_iter().chain(
        text[from..]
            .match_indices('\n')
            .map(move |(offset, _)| from + offset + 1),
    )
}

/// The character starting at byte offset `at`.
pub(crate) fn char_at(text: &str, at: usize) -> Option<char> {
    text.get(at..)?.chars().next()
}

/// Whitespace as matched by `\s` in the patterns this crate mirrors.
pub(crate) fn is_js_space(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n'
            | '\u{0B}'
            | '\u{0C}'
            | '\r'
            | ' '
            | '\u{A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
            | '\u{FEFF}'
    )
}

/// `\w`: ASCII letters, digits and underscore.
pub(crate) fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Length of the run of `byte` starting at `at`.
pub(crate) fn count_run(bytes: &[u8], at: usize, byte: u8) -> usize {
    bytes
        .get(at..)
        .map_or(0, |rest| rest.iter().take_while(|&&b| b == byte).count())
}

/// Offset just past any spaces and tabs starting at `at`.
pub(crate) fn skip_spaces_tabs(bytes: &[u8], at: usize) -> usize {
    at + bytes.get(at..).map_or(0, |rest| {
        rest.iter().take_while(|&&b| b == b' ' || b == b'\t').count()
    })
}

/// A list marker (`*`, `+`, `-`, or digits followed by `.`) at `at`.
///
/// Returns the offset just past the marker and whether it was numeric.
pub(crate) fn list_marker_at(bytes: &[u8], at: usize) -> Option<(usize, bool)> {
    match bytes.get(at)? {
        b'*' | b'+' | b'-' => Some((at + 1, false)),
        b'0'..=b'9' => {
            let digits = bytes[at..].iter().take_while(|b| b.is_ascii_digit()).count();
            (bytes.get(at + digits) == Some(&b'.')).then_some((at + digits + 1, true))
        }
        _ => None,
    }
}
