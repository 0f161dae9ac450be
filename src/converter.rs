//! The compiled converter and the state of a single conversion.

use log::debug;
use rand::{Rng, RngCore};
use regex::Regex;

use crate::block::Depth;
use crate::error::ConfigError;
use crate::escape::unescape_special_chars;
use crate::html_blocks::{BlockTags, hash_html_blocks};
use crate::link_refs::{LinkTable, definition_pattern, strip_link_definitions};
use crate::normalize::{normalize, restore_reserved};
use crate::options::Options;
use crate::placeholder::Placeholders;

/// Markdown to HTML converter. Patterns that depend on the options are
/// compiled once here; every call to [`Converter::render`] starts from
/// empty tables, so one converter can be shared between threads.
#[derive(Debug, Clone)]
pub struct Converter {
    options: Options,
    pub(crate) tags: BlockTags,
    pub(crate) link_definition: Regex,
    pub(crate) outdent: Regex,
    pub(crate) autolink: Regex,
}

impl Converter {
    pub fn new(options: Options) -> Result<Self, ConfigError> {
        options.validate()?;
        let tab_width = options.tab_width;
        let tags = BlockTags::new(&options.block_tags, tab_width);
        let link_definition = definition_pattern(tab_width - 1)?;
        let outdent = Regex::new(&format!(r"(?m)^(?:\t|[ ]{{1,{tab_width}}})"))?;
        let schemes = options
            .autolink_schemes
            .iter()
            .map(|scheme| regex::escape(scheme))
            .collect::<Vec<_>>()
            .join("|");
        let autolink = Regex::new(&format!(r#"<((?i:{schemes}):[^'">\s]+)>"#))?;
        Ok(Converter {
            options,
            tags,
            link_definition,
            outdent,
            autolink,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn tab_width(&self) -> usize {
        self.options.tab_width
    }

    /// Convert `text` to HTML.
    pub fn render(&self, text: &str) -> String {
        self.render_with_rng(text, &mut rand::rng())
    }

    /// Convert `text` to HTML, drawing the email obfuscation choices from `rng`.
    pub fn render_with_rng(&self, text: &str, rng: &mut impl Rng) -> String {
        let mut state = RenderState {
            converter: self,
            blocks: Placeholders::new(),
            links: LinkTable::new(),
            rng,
        };

        let text = normalize(text, self.tab_width());
        let text = hash_html_blocks(&text, &self.tags, &mut state.blocks);
        let text = strip_link_definitions(&text, &self.link_definition, &mut state.links);
        let text = state.run_block_gamut(&text, Depth::default());
        let text = unescape_special_chars(&text);

        debug!(
            "rendered {} bytes with {} hidden blocks and {} link definitions",
            text.len(),
            state.blocks.len(),
            state.links.len()
        );
        restore_reserved(&text)
    }
}

/// Tables owned by one conversion.
pub(crate) struct RenderState<'a> {
    pub(crate) converter: &'a Converter,
    pub(crate) blocks: Placeholders,
    pub(crate) links: LinkTable,
    pub(crate) rng: &'a mut dyn RngCore,
}
