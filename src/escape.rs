//! Character escaping: the `~E<code>E` sentinels that shield Markdown
//! punctuation from later passes, and HTML entity encoding.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static SENTINEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~E(\d+)E").expect("sentinel pattern"));
static ESCAPED_BACKSLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(\\)").expect("escaped backslash pattern"));
// `+-.` is a range in the character class, so `,` is escapable too.
static ESCAPED_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\([`*_{}\[\]()>#+,\-.!])").expect("escaped punctuation pattern")
});

/// The sentinel that stands in for `c` until the end of the conversion.
pub(crate) fn sentinel(c: char) -> String {
    format!("~E{}E", c as u32)
}

/// Replace each occurrence of any character in `chars` with its sentinel.
pub(crate) fn escape_characters(text: &str, chars: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if chars.contains(c) {
            out.push_str(&sentinel(c));
        } else {
            out.push(c);
        }
    }
    out
}

/// Turn every sentinel back into the character it encodes.
pub(crate) fn unescape_special_chars(text: &str) -> String {
    SENTINEL
        .replace_all(text, |caps: &Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Encode text that must appear literally inside `<code>`.
pub(crate) fn encode_code(text: &str) -> String {
    let text = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    escape_characters(&text, "*_{}[]\\")
}

/// Hide `\X` escapes behind sentinels so `X` survives as a literal.
pub(crate) fn encode_backslash_escapes(text: &str) -> String {
    let text = ESCAPED_BACKSLASH.replace_all(text, |caps: &Captures| escape_captured(caps));
    ESCAPED_PUNCTUATION
        .replace_all(&text, |caps: &Captures| escape_captured(caps))
        .into_owned()
}

fn escape_captured(caps: &Captures) -> String {
    caps[1].chars().next().map(sentinel).unwrap_or_default()
}

/// Encode `&` that does not start an entity and `<` that cannot start a tag.
pub(crate) fn encode_amps_and_angles(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let replacement = match b {
            b'&' if !starts_entity(&bytes[i + 1..]) => "&amp;",
            b'<' if !starts_tag_like(&bytes[i + 1..]) => "&lt;",
            _ => continue,
        };
        out.push_str(&text[last..i]);
        out.push_str(replacement);
        last = i + 1;
    }
    out.push_str(&text[last..]);
    out
}

/// `#?[xX]?(?:[0-9a-fA-F]+|\w+);`
fn starts_entity(rest: &[u8]) -> bool {
    let rest = rest.strip_prefix(b"#").unwrap_or(rest);
    let word = rest
        .iter()
        .take_while(|&&b| b.is_ascii_alphanumeric() || b == b'_')
        .count();
    word > 0 && rest.get(word) == Some(&b';')
}

fn starts_tag_like(rest: &[u8]) -> bool {
    matches!(rest.first(), Some(b) if b.is_ascii_alphabetic() || matches!(b, b'/' | b'?' | b'$' | b'!'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_round_trip() {
        let escaped = escape_characters("a*b_c", "*_");
        assert_eq!(escaped, "a~E42Eb~E95Ec");
        assert_eq!(unescape_special_chars(&escaped), "a*b_c");
    }

    #[test]
    fn backslash_escapes_include_comma() {
        assert_eq!(encode_backslash_escapes(r"\*\,\a"), r"~E42E~E44E\a");
        assert_eq!(encode_backslash_escapes(r"\\*"), "~E92E*");
    }

    #[test]
    fn code_is_entity_encoded_and_shielded() {
        assert_eq!(encode_code("<a href=x>&_"), "&lt;a href=x&gt;&amp;~E95E");
    }

    #[test]
    fn ampersands_and_angles() {
        assert_eq!(
            encode_amps_and_angles("AT&T &copy; &#169; &#xA9; 1 < 2 <b>"),
            "AT&amp;T &copy; &#169; &#xA9; 1 &lt; 2 <b>"
        );
        assert_eq!(encode_amps_and_angles("&#; <"), "&amp;#; &lt;");
    }
}
