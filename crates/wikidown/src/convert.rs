//! Block converter: a single recursive descent from a document element to Markdown.
//!
//! Every element is first classified into a [`BlockKind`] and then rendered by a local rule for
//! that kind. Each element is converted behind its own error boundary: a failing subtree turns
//! into an inline marker comment and its siblings carry on.

use crate::markdown::{
    code_span, collapse_whitespace, fenced_block, normalize, push_fragment, wrap_inline,
};
use crate::sniff::sniff_language;
use crate::{ConvertError, Result};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::OnceLock;
use url::Url;
use wikidown_core::{ConvertOptions, Element, Node};
use wikidown_diagram::{detect_kind, recover};

/// Elements that never contribute output: interactive controls, navigation chrome, scripts.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "button", "input", "select", "textarea", "nav",
    "aside", "iframe", "canvas", "dialog", "form", "head", "title", "meta", "link",
];

const BLOCK_TAGS: &[&str] = &[
    "html", "body", "main", "article", "section", "div", "header", "footer", "figure",
    "figcaption", "dl", "dt", "dd", "li", "address", "center",
];

/// Largest ordered-list start number Markdown accepts (nine digits).
const MAX_LIST_START: f64 = 999_999_999.0;

fn line_anchor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^L(\d+)(?:-L?(\d+))?$").expect("valid regex"))
}

fn sources_wrapper_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(Sources?:)\s*\[(.*)\]$").expect("valid regex"))
}

/// Closed set of element kinds the converter distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Skip,
    Heading(u8),
    Paragraph,
    List { ordered: bool },
    Blockquote,
    Table,
    CodeBlock,
    /// A `pre` wrapping a rendered diagram, or a bare diagram `svg`.
    Diagram,
    Rule,
    LineBreak,
    Link,
    Image,
    Strong,
    Emphasis,
    Strikethrough,
    InlineCode,
    Details,
    Summary,
    /// Generic block container (`div`, `section`, ...).
    Container,
    /// Anything else; its children are rendered in place.
    Inline,
}

impl BlockKind {
    pub fn of(el: &Element) -> Self {
        if el.is_hidden()
            || el.attr("aria-hidden") == Some("true")
            || el.attr("role") == Some("navigation")
        {
            return BlockKind::Skip;
        }
        let tag = el.tag.to_ascii_lowercase();
        if SKIPPED_TAGS.contains(&tag.as_str()) {
            return BlockKind::Skip;
        }
        if let Some(level) = heading_level(&tag) {
            return BlockKind::Heading(level);
        }
        match tag.as_str() {
            "p" => BlockKind::Paragraph,
            "ul" => BlockKind::List { ordered: false },
            "ol" => BlockKind::List { ordered: true },
            "blockquote" => BlockKind::Blockquote,
            "table" => BlockKind::Table,
            "pre" if el.find_tag("svg").is_some() => BlockKind::Diagram,
            "pre" => BlockKind::CodeBlock,
            "svg" if detect_kind(el).is_some() => BlockKind::Diagram,
            "svg" => BlockKind::Skip,
            "hr" => BlockKind::Rule,
            "br" => BlockKind::LineBreak,
            "a" => BlockKind::Link,
            "img" => BlockKind::Image,
            "strong" | "b" => BlockKind::Strong,
            "em" | "i" => BlockKind::Emphasis,
            "del" | "s" | "strike" => BlockKind::Strikethrough,
            "code" => BlockKind::InlineCode,
            "details" => BlockKind::Details,
            "summary" => BlockKind::Summary,
            t if BLOCK_TAGS.contains(&t) => BlockKind::Container,
            _ => BlockKind::Inline,
        }
    }
}

fn heading_level(tag: &str) -> Option<u8> {
    let n = tag.strip_prefix('h')?.parse::<u8>().ok()?;
    (1..=6).contains(&n).then_some(n)
}

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    depth: usize,
    in_link: bool,
    in_table_cell: bool,
}

impl Context {
    fn child(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }
}

/// A source link target that encodes a line range (`file.go#L10-L20`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineAnchor {
    pub file: String,
    pub start: u32,
    pub end: Option<u32>,
}

impl LineAnchor {
    pub fn parse(href: &str) -> Option<Self> {
        let (path, fragment) = href.split_once('#')?;
        let caps = line_anchor_regex().captures(fragment)?;
        let start = caps.get(1)?.as_str().parse().ok()?;
        let end = caps.get(2).and_then(|m| m.as_str().parse().ok());
        let path = path.split('?').next().unwrap_or(path);
        let file = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        Some(LineAnchor {
            file: file.to_string(),
            start,
            end,
        })
    }

    /// `file.go L10-L20`, or `file.go L10` for a single line.
    pub fn label(&self) -> String {
        match self.end {
            Some(end) if end != self.start => format!("{} L{}-L{end}", self.file, self.start),
            _ => format!("{} L{}", self.file, self.start),
        }
    }
}

pub struct BlockConverter<'a> {
    options: &'a ConvertOptions,
    base_url: Option<Url>,
}

impl<'a> BlockConverter<'a> {
    pub fn new(options: &'a ConvertOptions) -> Self {
        let base_url = options.base_url.as_deref().and_then(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(base_url = raw, error = %err, "ignoring unparseable base URL");
                None
            }
        });
        Self { options, base_url }
    }

    /// Converts `root` and its subtree to normalized Markdown.
    pub fn convert(&self, root: &Element) -> String {
        normalize(&self.element(root, Context::default()))
    }

    /// Per-element error boundary.
    fn element(&self, el: &Element, ctx: Context) -> String {
        match self.try_element(el, ctx) {
            Ok(out) => out,
            Err(err) => {
                tracing::warn!(
                    tag = %el.tag,
                    depth = ctx.depth,
                    error = %err,
                    "element conversion failed"
                );
                if self.options.emit_error_markers {
                    let message = err.to_string().replace("--", "-");
                    format!("\n\n<!-- wikidown: failed to convert {}: {message} -->\n\n", el.tag)
                } else {
                    String::new()
                }
            }
        }
    }

    fn try_element(&self, el: &Element, ctx: Context) -> Result<String> {
        if ctx.depth > self.options.max_depth {
            return Err(ConvertError::DepthLimit { depth: ctx.depth });
        }
        let out = match BlockKind::of(el) {
            BlockKind::Skip => String::new(),
            BlockKind::Heading(level) => {
                let text = collapse_whitespace(&self.children(el, ctx));
                if text.is_empty() {
                    String::new()
                } else {
                    format!("\n\n{} {text}\n\n", "#".repeat(usize::from(level)))
                }
            }
            BlockKind::Paragraph | BlockKind::Container | BlockKind::Details => {
                block(&self.children(el, ctx))
            }
            BlockKind::List { ordered } => self.list(el, ctx, ordered)?,
            BlockKind::Blockquote => self.blockquote(el, ctx),
            BlockKind::Table => self.table(el, ctx)?,
            BlockKind::CodeBlock => self.code_block(el),
            BlockKind::Diagram => self.diagram(el)?,
            BlockKind::Rule => "\n\n---\n\n".to_string(),
            BlockKind::LineBreak if ctx.in_table_cell => "\n".to_string(),
            BlockKind::LineBreak => "  \n".to_string(),
            BlockKind::Link => self.link(el, ctx),
            BlockKind::Image => self.image(el, ctx),
            BlockKind::Strong => wrap_inline(&self.children(el, ctx), "**"),
            BlockKind::Emphasis => wrap_inline(&self.children(el, ctx), "*"),
            BlockKind::Strikethrough => wrap_inline(&self.children(el, ctx), "~~"),
            BlockKind::InlineCode => {
                let code = el.text_content().replace(['\n', '\r'], " ");
                if code.trim().is_empty() {
                    String::new()
                } else {
                    code_span(&code)
                }
            }
            BlockKind::Summary => {
                let text = collapse_whitespace(&self.children(el, ctx));
                if text.is_empty() {
                    String::new()
                } else {
                    format!("\n\n**{text}**\n\n")
                }
            }
            BlockKind::Inline => self.children(el, ctx),
        };
        Ok(out)
    }

    fn children(&self, el: &Element, ctx: Context) -> String {
        let ctx = ctx.child();
        let mut out = String::new();
        for child in &el.children {
            match child {
                Node::Text(t) => push_fragment(&mut out, &collapse_text(t)),
                Node::Element(c) => push_fragment(&mut out, &self.element(c, ctx)),
            }
        }
        out
    }

    fn list(&self, el: &Element, ctx: Context, ordered: bool) -> Result<String> {
        let items: Vec<&Element> = el
            .element_children()
            .filter(|c| c.is("li") && BlockKind::of(c) != BlockKind::Skip)
            .collect();
        if items.is_empty() {
            return Ok(String::new());
        }
        let citations = is_citation_list(&items);
        let start = el
            .number_attr("start")
            .filter(|n| *n >= 0.0)
            .map_or(1, |n| n.min(MAX_LIST_START) as usize);

        let mut out = String::from("\n\n");
        for (i, item) in items.iter().enumerate() {
            let marker = if ordered {
                format!("{}. ", start.saturating_add(i))
            } else {
                "- ".to_string()
            };
            let content = self.children(item, ctx.child());
            let content = content.trim();
            let body = if citations {
                collapse_whitespace(content)
            } else {
                indent_continuation(content, marker.len())
            };
            writeln!(out, "{marker}{body}")?;
        }
        out.push('\n');
        Ok(out)
    }

    fn blockquote(&self, el: &Element, ctx: Context) -> String {
        let inner = normalize(&self.children(el, ctx));
        if inner.is_empty() {
            return String::new();
        }
        let quoted: Vec<String> = inner
            .lines()
            .map(|l| if l.trim().is_empty() { ">".to_string() } else { format!("> {l}") })
            .collect();
        format!("\n\n{}\n\n", quoted.join("\n"))
    }

    fn table(&self, el: &Element, ctx: Context) -> Result<String> {
        let mut header: Option<Vec<String>> = None;
        let mut rows: Vec<Vec<String>> = Vec::new();
        for (in_head, row) in table_rows(el) {
            let cells = self.row_cells(row, ctx);
            if in_head && header.is_none() {
                header = Some(cells);
            } else {
                rows.push(cells);
            }
        }
        let header = match header {
            Some(h) => h,
            None if !rows.is_empty() => rows.remove(0),
            None => return Ok(String::new()),
        };
        let width = rows.iter().map(Vec::len).fold(header.len(), usize::max);
        if width == 0 {
            return Ok(String::new());
        }

        let mut out = String::from("\n\n");
        write_row(&mut out, &header, width)?;
        write_row(&mut out, &vec!["---".to_string(); width], width)?;
        for row in &rows {
            write_row(&mut out, row, width)?;
        }
        out.push('\n');
        Ok(out)
    }

    fn row_cells(&self, row: &Element, ctx: Context) -> Vec<String> {
        let cell_ctx = Context {
            in_table_cell: true,
            ..ctx.child()
        };
        row.element_children()
            .filter(|c| c.is("th") || c.is("td"))
            .map(|cell| {
                let content = normalize(&self.children(cell, cell_ctx));
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .collect::<Vec<_>>()
                    .join("<br>")
                    .replace('|', "\\|")
            })
            .collect()
    }

    fn code_block(&self, pre: &Element) -> String {
        let text = pre.text_content();
        let code = text.strip_prefix('\n').unwrap_or(&text);
        if code.trim().is_empty() {
            return String::new();
        }
        fenced_block(&self.code_language(pre, code), code)
    }

    /// Declared language of a code block, else a sniffed one. Mermaid source is tagged with the
    /// configured diagram fence.
    fn code_language(&self, el: &Element, code: &str) -> String {
        let language = declared_language(el).or_else(|| sniff_language(code).map(str::to_string));
        match language {
            Some(lang) if lang == "mermaid" => self.options.diagram_fence.clone(),
            Some(lang) => lang,
            None => String::new(),
        }
    }

    fn diagram(&self, el: &Element) -> Result<String> {
        let svg = if el.is("svg") { Some(el) } else { el.find_tag("svg") };
        if let Some(svg) = svg {
            if let Some(recovered) = recover(svg, &self.options.recovery)? {
                tracing::debug!(kind = %recovered.kind, "recovered diagram source");
                return Ok(fenced_block(&self.options.diagram_fence, &recovered.text));
            }
            tracing::debug!("no diagram structure recovered; keeping the block as text");
        }

        let mut source = String::new();
        push_text_outside_svg(el, &mut source);
        let source = source.trim_matches('\n');
        if !source.trim().is_empty() {
            return Ok(fenced_block(&self.code_language(el, source), source));
        }
        let labels = svg.map(Element::label_text).unwrap_or_default();
        if labels.is_empty() {
            Ok(String::new())
        } else {
            Ok(fenced_block("", &labels))
        }
    }

    fn link(&self, a: &Element, ctx: Context) -> String {
        let text = collapse_whitespace(&self.children(
            a,
            Context {
                in_link: true,
                ..ctx
            },
        ));
        let Some(href) = a
            .attr("href")
            .map(str::trim)
            .filter(|h| !h.is_empty() && !h.starts_with("javascript:"))
        else {
            return text;
        };
        let target = link_target(&self.resolve(href));

        if let Some(anchor) = LineAnchor::parse(href) {
            let wrapper = sources_wrapper_regex().captures(&text);
            let label = if anchor.file.is_empty() {
                wrapper
                    .as_ref()
                    .and_then(|c| c.get(2))
                    .map_or_else(|| text.clone(), |m| m.as_str().to_string())
            } else {
                anchor.label()
            };
            return match wrapper.as_ref().and_then(|c| c.get(1)) {
                Some(prefix) => format!("{} [{label}]({target})", prefix.as_str()),
                None => format!("[{label}]({target})"),
            };
        }

        if text.is_empty() {
            format!("<{}>", self.resolve(href))
        } else {
            format!("[{text}]({target})")
        }
    }

    fn image(&self, img: &Element, ctx: Context) -> String {
        if ctx.in_link {
            return String::new();
        }
        let Some(src) = img.attr("src").map(str::trim).filter(|s| !s.is_empty()) else {
            return String::new();
        };
        let alt = collapse_whitespace(img.attr("alt").unwrap_or_default());
        format!("![{alt}]({})", link_target(&self.resolve(src)))
    }

    /// Resolves a relative reference against the configured base URL. Fragment-only and
    /// absolute references are returned unchanged.
    fn resolve(&self, href: &str) -> String {
        let Some(base) = &self.base_url else {
            return href.to_string();
        };
        if href.starts_with('#') {
            return href.to_string();
        }
        match Url::parse(href) {
            Err(url::ParseError::RelativeUrlWithoutBase) => base
                .join(href)
                .map(String::from)
                .unwrap_or_else(|_| href.to_string()),
            _ => href.to_string(),
        }
    }
}

fn block(content: &str) -> String {
    let t = content.trim();
    if t.is_empty() {
        String::new()
    } else {
        format!("\n\n{t}\n\n")
    }
}

/// Text node content with whitespace runs collapsed to one space.
fn collapse_text(t: &str) -> String {
    let mut out = String::with_capacity(t.len());
    let mut in_space = false;
    for c in t.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn indent_continuation(content: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    let mut out = String::with_capacity(content.len());
    for (i, line) in content.lines().enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&pad);
            }
        }
        out.push_str(line);
    }
    out
}

/// A list whose every item is a source citation: a `Sources:` line, or nothing but links into
/// line-anchored source files.
fn is_citation_list(items: &[&Element]) -> bool {
    items.iter().all(|li| {
        let text = collapse_whitespace(&li.text_content());
        if text.starts_with("Sources:") || text.starts_with("Source:") {
            return true;
        }
        let mut links = li.descendants().filter(|d| d.is("a")).peekable();
        links.peek().is_some()
            && links.all(|a| a.attr("href").is_some_and(|h| LineAnchor::parse(h).is_some()))
    })
}

/// Rows in document order, flagged when they come from a `thead`.
fn table_rows(table: &Element) -> Vec<(bool, &Element)> {
    let mut rows = Vec::new();
    for child in table.element_children().filter(|c| !c.is_hidden()) {
        if child.is("tr") {
            rows.push((false, child));
        } else if child.is("thead") || child.is("tbody") || child.is("tfoot") {
            let in_head = child.is("thead");
            rows.extend(
                child
                    .element_children()
                    .filter(|r| r.is("tr") && !r.is_hidden())
                    .map(|r| (in_head, r)),
            );
        }
    }
    rows
}

fn write_row(out: &mut String, cells: &[String], width: usize) -> std::fmt::Result {
    out.push('|');
    for i in 0..width {
        write!(out, " {} |", cells.get(i).map(String::as_str).unwrap_or_default())?;
    }
    out.push('\n');
    Ok(())
}

/// Language named by `language-*` / `lang-*` classes or a `data-language` attribute on the
/// block or any element inside it.
fn declared_language(el: &Element) -> Option<String> {
    std::iter::once(el)
        .chain(el.descendants())
        .filter(|e| !e.is("svg"))
        .find_map(|e| {
            let from_class = e.classes().find_map(|c| {
                c.strip_prefix("language-")
                    .or_else(|| c.strip_prefix("lang-"))
                    .filter(|l| !l.is_empty())
            });
            from_class
                .or_else(|| e.attr("data-language"))
                .or_else(|| e.attr("data-lang"))
                .map(|l| l.trim().to_ascii_lowercase())
                .filter(|l| !l.is_empty())
        })
}

fn push_text_outside_svg(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) if e.is("svg") => {}
            Node::Element(e) => push_text_outside_svg(e, out),
        }
    }
}

fn link_target(url: &str) -> String {
    if url.contains(char::is_whitespace) || url.contains(['(', ')']) {
        format!("<{url}>")
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_classify_into_kinds() {
        assert_eq!(BlockKind::of(&Element::new("h3")), BlockKind::Heading(3));
        assert_eq!(BlockKind::of(&Element::new("h7")), BlockKind::Inline);
        assert_eq!(BlockKind::of(&Element::new("OL")), BlockKind::List { ordered: true });
        assert_eq!(BlockKind::of(&Element::new("button")), BlockKind::Skip);
        assert_eq!(BlockKind::of(&Element::new("svg")), BlockKind::Skip);
        assert_eq!(
            BlockKind::of(&Element::new("div").with_attr("aria-hidden", "true")),
            BlockKind::Skip
        );
        assert_eq!(
            BlockKind::of(&Element::new("svg").with_attr("aria-roledescription", "flowchart-v2")),
            BlockKind::Diagram
        );
        assert_eq!(
            BlockKind::of(&Element::new("pre").with_child(Element::new("svg"))),
            BlockKind::Diagram
        );
    }

    #[test]
    fn line_anchors_parse_ranges_and_single_lines() {
        let a = LineAnchor::parse("https://github.com/o/r/blob/main/pkg/file.go#L10-L20").unwrap();
        assert_eq!(a.file, "file.go");
        assert_eq!(a.label(), "file.go L10-L20");
        assert_eq!(LineAnchor::parse("src/lib.rs#L7").unwrap().label(), "lib.rs L7");
        assert_eq!(LineAnchor::parse("a.rs#L3-3").unwrap().label(), "a.rs L3");
        assert_eq!(LineAnchor::parse("a.rs#section"), None);
        assert_eq!(LineAnchor::parse("a.rs"), None);
    }

    #[test]
    fn continuation_lines_align_under_the_marker() {
        assert_eq!(indent_continuation("a\nb\n\nc", 3), "a\n   b\n\n   c");
    }

    #[test]
    fn declared_language_comes_from_class_or_data_attribute() {
        let pre = Element::new("pre")
            .with_child(Element::new("code").with_attr("class", "hljs language-Rust"));
        assert_eq!(declared_language(&pre).as_deref(), Some("rust"));
        let pre = Element::new("pre").with_attr("data-language", "go");
        assert_eq!(declared_language(&pre).as_deref(), Some("go"));
        assert_eq!(declared_language(&Element::new("pre")), None);
    }

    #[test]
    fn depth_limit_yields_a_marker_instead_of_failing() {
        let options = ConvertOptions::default().with_max_depth(1);
        let converter = BlockConverter::new(&options);
        let root = Element::new("div").with_child(
            Element::new("p").with_child(Element::new("b").with_text("deep")),
        );
        let out = converter.convert(&root);
        assert_eq!(
            out,
            "<!-- wikidown: failed to convert b: element nesting depth 2 exceeds the configured limit -->\n"
        );

        let silent = ConvertOptions::default().with_max_depth(1).with_error_markers(false);
        assert_eq!(BlockConverter::new(&silent).convert(&root), "");
    }

    #[test]
    fn relative_targets_resolve_against_the_base_url() {
        let options =
            ConvertOptions::default().with_base_url(Some("https://deepwiki.com/o/r/".into()));
        let converter = BlockConverter::new(&options);
        assert_eq!(converter.resolve("2-setup"), "https://deepwiki.com/o/r/2-setup");
        assert_eq!(converter.resolve("#intro"), "#intro");
        assert_eq!(converter.resolve("https://x.dev/a"), "https://x.dev/a");
    }
}
