#![forbid(unsafe_code)]

//! `wikidown` converts rendered documentation pages into Markdown.
//!
//! The input is an owned [`Element`] tree (see [`parse_document`] for the serialized snapshot
//! format). Headings, lists, tables, code blocks and links map onto their Markdown forms; code
//! blocks without a declared language get one from [`sniff_language`]; rendered Mermaid diagrams
//! are turned back into Mermaid source by [`wikidown_diagram`].
//!
//! Conversion never fails as a whole: an element that cannot be converted is replaced by an
//! HTML comment marker (or dropped, see [`ConvertOptions::emit_error_markers`]) and a warning is
//! logged through `tracing`.

pub mod convert;
mod markdown;
pub mod page;
pub mod sniff;

pub use convert::{BlockConverter, BlockKind, LineAnchor};
pub use markdown::normalize;
pub use page::{
    ConvertedPage, content_root, convert_document, convert_page, convert_snapshot, page_title,
};
pub use sniff::sniff_language;
pub use wikidown_core::{ConvertOptions, Element, Node, RecoveryOptions, parse_document};
pub use wikidown_diagram::{DiagramKind, RecoveredDiagram, detect_kind, recover};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("element nesting depth {depth} exceeds the configured limit")]
    DepthLimit { depth: usize },

    #[error(transparent)]
    Diagram(#[from] wikidown_diagram::Error),

    #[error("failed to write markdown: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error(transparent)]
    Document(#[from] wikidown_core::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Converts `root` to normalized Markdown with the given options.
pub fn to_markdown(root: &Element, options: &ConvertOptions) -> String {
    BlockConverter::new(options).convert(root)
}
