use std::sync::LazyLock;

use compatmark::{ConfigError, Converter, MAX_NESTING, Options, markdown_to_html, render};
use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use regex::Regex;

static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(?:x([0-9A-Fa-f]+)|([0-9]+));").unwrap());
static LIST_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<(/?)(ul|ol|li)>").unwrap());

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let code = match (caps.get(1), caps.get(2)) {
                (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).unwrap(),
                (None, Some(dec)) => dec.as_str().parse().unwrap(),
                (None, None) => unreachable!(),
            };
            char::from_u32(code).unwrap().to_string()
        })
        .into_owned()
}

fn assert_balanced_lists(html: &str) {
    let mut open = Vec::new();
    for caps in LIST_TAG.captures_iter(html) {
        let name = caps[2].to_string();
        if caps[1].is_empty() {
            open.push(name);
        } else {
            assert_eq!(open.pop(), Some(name), "unbalanced list tags in {html:?}");
        }
    }
    assert!(open.is_empty(), "unclosed list tags in {html:?}");
}

#[test]
fn test_header_with_emphasis() {
    assert_eq!(
        markdown_to_html("# Hello *world*"),
        "<h1>Hello <em>world</em></h1>"
    );
}

#[test]
fn test_hard_break_inside_paragraph() {
    let html = markdown_to_html("Line1  \nLine2");
    assert!(html.starts_with("<p>"));
    assert!(html.contains("Line1 <br />\nLine2"));
}

#[test]
fn test_code_block_html_is_escaped() {
    let html = markdown_to_html("    <div>");
    assert!(html.contains("<pre><code>&lt;div&gt;"));
    assert!(!html.contains("<div>"));
}

#[test]
fn test_backslash_escapes_suppress_emphasis() {
    let html = markdown_to_html("\\*foo\\*");
    assert!(html.contains("*foo*"));
    assert!(!html.contains("<em>"));
}

#[test]
fn test_reference_ids_are_case_insensitive() {
    let html = markdown_to_html("[x][Foo]\n\n[foo]: /bar");
    assert!(html.contains("href=\"/bar\""));
}

#[test]
fn test_later_definition_keeps_earlier_title() {
    let html = markdown_to_html("[x]: /one \"One\"\n[x]: /two\n\n[a][x]");
    assert_eq!(html, "<p><a href=\"/two\" title=\"One\">a</a></p>");
}

#[test]
fn test_nested_lists_are_balanced() {
    let html = markdown_to_html("1. first\n    * inner\n        * deeper\n    * inner two\n2. second\n");
    assert!(html.starts_with("<ol>"));
    assert_eq!(html.matches("<ul>").count(), 2);
    assert_balanced_lists(&html);
}

#[test]
fn test_deep_list_nesting_stays_balanced() {
    let mut markdown = String::new();
    for level in 0..6 {
        markdown.push_str(&" ".repeat(level * 4));
        markdown.push_str(&format!("* level {level}\n"));
    }
    let html = markdown_to_html(&markdown);
    assert_eq!(html.matches("<ul>").count(), 6);
    assert_balanced_lists(&html);
}

#[test]
fn test_blockquote_keeps_code_indentation() {
    let html = markdown_to_html("> text\n>\n>         indented code\n");
    assert!(html.starts_with("<blockquote>\n  <p>text</p>"));
    assert!(html.contains("<pre><code>    indented code\n</code></pre>"));
    assert!(!html.contains("      indented code"));
}

#[test]
fn test_blockquotes_past_nesting_limit_stay_text() {
    let html = markdown_to_html(&format!("{}x", "> ".repeat(MAX_NESTING + 2)));
    assert_eq!(html.matches("<blockquote>").count(), MAX_NESTING);
    assert_eq!(html.matches("</blockquote>").count(), MAX_NESTING);
    assert!(html.contains("<p>> > x</p>"));
}

#[test]
fn test_email_autolink_decodes_to_address() {
    let converter = Converter::new(Options::default()).unwrap();
    for seed in 0..16 {
        let mut rng = StdRng::seed_from_u64(seed);
        let html = converter.render_with_rng("<someone.else@example.com>", &mut rng);
        let body = html
            .strip_prefix("<p><a href=\"")
            .and_then(|rest| rest.strip_suffix("</a></p>"))
            .unwrap();
        let (href, text) = body.split_once("\">").unwrap();
        assert_eq!(decode_entities(href), "mailto:someone.else@example.com");
        assert_eq!(decode_entities(text), "someone.else@example.com");
        assert!(!href.contains('@'));
    }
}

#[test]
fn test_seeded_rendering_is_deterministic() {
    let converter = Converter::new(Options::default()).unwrap();
    let first = converter.render_with_rng("<me@example.org>", &mut StdRng::seed_from_u64(7));
    let second = converter.render_with_rng("<me@example.org>", &mut StdRng::seed_from_u64(7));
    assert_eq!(first, second);
}

#[test]
fn test_state_does_not_leak_between_calls() {
    let converter = Converter::new(Options::default()).unwrap();
    let defined = converter.render("[a][x]\n\n[x]: /one");
    assert_eq!(defined, "<p><a href=\"/one\">a</a></p>");
    assert_eq!(converter.render("[a][x]"), "<p>[a][x]</p>");
}

#[test]
fn test_converter_is_shared_across_threads() {
    let converter = Converter::new(Options::default()).unwrap();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let converter = &converter;
                scope.spawn(move || converter.render(&format!("# Title {i}")))
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("<h1>Title {i}</h1>"));
        }
    });
}

#[test]
fn test_image_always_carries_title() {
    assert_eq!(
        markdown_to_html("![alt](/a.png)"),
        "<p><img src=\"/a.png\" alt=\"alt\" title=\"\" /></p>"
    );
}

#[test]
fn test_custom_autolink_schemes() {
    let options = Options {
        autolink_schemes: vec!["irc".to_string()],
        ..Options::default()
    };
    let html = render("<irc://chat.example.net/rust>", &options).unwrap();
    assert_eq!(
        html,
        "<p><a href=\"irc://chat.example.net/rust\">irc://chat.example.net/rust</a></p>"
    );
}

#[test]
fn test_options_from_partial_json() {
    let options = Options::from_json_str(r#"{"tab_width": 8}"#).unwrap();
    assert_eq!(options.tab_width, 8);
    assert_eq!(options.block_tags, Options::default().block_tags);

    assert!(matches!(
        Options::from_json_str(r#"{"tab_width": 0}"#),
        Err(ConfigError::InvalidTabWidth { .. })
    ));
    assert!(matches!(
        Options::from_json_str("not json"),
        Err(ConfigError::ConfigParseError { .. })
    ));
}
