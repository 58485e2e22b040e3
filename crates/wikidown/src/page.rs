//! Page-level entry points: locate the content root, convert it, and pick a title.

use crate::convert::BlockConverter;
use crate::markdown::collapse_whitespace;
use crate::Result;
use serde::Serialize;
use wikidown_core::{ConvertOptions, Element, parse_document};

pub const UNTITLED: &str = "Untitled";

/// Converted page: a title plus normalized Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedPage {
    pub title: String,
    pub markdown: String,
}

/// Converts an already-selected content root. The title is its first visible `h1`.
pub fn convert_page(root: &Element, options: &ConvertOptions) -> ConvertedPage {
    let markdown = BlockConverter::new(options).convert(root);
    let title = first_heading(root).unwrap_or_else(|| UNTITLED.to_string());
    tracing::debug!(title = %title, bytes = markdown.len(), "converted page");
    ConvertedPage { title, markdown }
}

/// Converts a whole document: the content root is located first, and the title falls back to
/// the document `<title>` when the content has no `h1`.
pub fn convert_document(doc: &Element, options: &ConvertOptions) -> ConvertedPage {
    let root = content_root(doc);
    let markdown = BlockConverter::new(options).convert(root);
    let title = page_title(doc, root);
    tracing::debug!(title = %title, root = %root.tag, bytes = markdown.len(), "converted document");
    ConvertedPage { title, markdown }
}

/// Parses a serialized document snapshot and converts it.
pub fn convert_snapshot(text: &str, options: &ConvertOptions) -> Result<ConvertedPage> {
    let doc = parse_document(text)?;
    Ok(convert_document(&doc, options))
}

/// The element holding the page's article content: a `.prose` container, else `article`,
/// `main` or `body`, else the document itself.
pub fn content_root(doc: &Element) -> &Element {
    let all = || std::iter::once(doc).chain(doc.descendants());
    all()
        .find(|el| el.has_class("prose"))
        .or_else(|| ["article", "main", "body"].iter().find_map(|tag| all().find(|el| el.is(tag))))
        .unwrap_or(doc)
}

pub fn page_title(doc: &Element, root: &Element) -> String {
    first_heading(root)
        .or_else(|| first_heading(doc))
        .or_else(|| {
            all_elements(doc)
                .find(|el| el.is("title"))
                .map(|t| collapse_whitespace(&t.text_content()))
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn first_heading(root: &Element) -> Option<String> {
    all_elements(root)
        .filter(|el| el.is("h1") && !el.is_hidden())
        .map(|h| collapse_whitespace(&h.text_content()))
        .find(|t| !t.is_empty())
}

fn all_elements(root: &Element) -> impl Iterator<Item = &Element> {
    std::iter::once(root).chain(root.descendants())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_root_prefers_prose_container() {
        let doc = parse_document(
            r#"<html><body><nav>menu</nav><main><div class="prose"><h1>Guide</h1></div></main></body></html>"#,
        )
        .expect("fixture parses");
        assert!(content_root(&doc).has_class("prose"));

        let doc = parse_document("<html><body><main><p>x</p></main></body></html>")
            .expect("fixture parses");
        assert!(content_root(&doc).is("main"));
    }

    #[test]
    fn title_falls_back_to_document_title_then_untitled() {
        let doc = parse_document(
            "<html><head><title> Setup  Guide </title></head><body><p>text</p></body></html>",
        )
        .expect("fixture parses");
        assert_eq!(convert_document(&doc, &ConvertOptions::default()).title, "Setup Guide");

        let root = Element::new("div").with_child(Element::new("p").with_text("no heading"));
        assert_eq!(convert_page(&root, &ConvertOptions::default()).title, UNTITLED);
    }
}
