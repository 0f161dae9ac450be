//! A Markdown to HTML converter that reproduces the output of the classic
//! Markdown.pl / Showdown rewriting pipeline, quirks included.
mod block;
pub mod converter;
pub mod email;
pub mod error;
mod escape;
mod html_blocks;
pub mod link_refs;
mod normalize;
pub mod options;
pub mod placeholder;
mod rewrite;
mod span;

use std::sync::LazyLock;

pub use block::MAX_NESTING;
pub use converter::Converter;
pub use email::obfuscate_email;
pub use error::ConfigError;
pub use link_refs::{LinkRef, LinkTable};
pub use options::Options;
pub use placeholder::{MAX_RESOLUTIONS, Placeholders};

static DEFAULT_CONVERTER: LazyLock<Converter> =
    LazyLock::new(|| Converter::new(Options::default()).expect("default options are valid"));

/// Render markdown text to HTML with the default options.
pub fn markdown_to_html(markdown: &str) -> String {
    DEFAULT_CONVERTER.render(markdown)
}

/// Render markdown text to HTML with `options`, which are validated first.
pub fn render(markdown: &str, options: &Options) -> Result<String, ConfigError> {
    let converter = Converter::new(options.clone())?;
    Ok(converter.render(markdown))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(markdown_to_html(""), "");
    }

    #[test]
    fn test_basic_image() {
        let result = markdown_to_html("![foo](/url \"title\")\n");
        assert_eq!(
            result,
            "<p><img src=\"/url\" alt=\"foo\" title=\"title\" /></p>"
        );
    }

    #[test]
    fn test_image_without_title() {
        let result = markdown_to_html("![bar](/path)\n");
        assert_eq!(result, "<p><img src=\"/path\" alt=\"bar\" title=\"\" /></p>");
    }

    #[test]
    fn test_render_rejects_empty_tag_list() {
        let options = Options {
            block_tags: Vec::new(),
            ..Options::default()
        };
        assert!(matches!(
            render("text", &options),
            Err(ConfigError::EmptyBlockTags)
        ));
    }

    #[test]
    fn test_render_with_options() {
        let options = Options {
            tab_width: 2,
            ..Options::default()
        };
        assert_eq!(
            render("  code", &options).unwrap(),
            "<pre><code>code\n</code></pre>"
        );
    }
}
