//! Owned, read-only snapshot of a rendered document tree.
//!
//! The conversion engine never talks to a live DOM. A host captures the rendered page into this
//! model (tag, attributes, text, computed style, geometry) and hands it over by reference; every
//! conversion call only reads it.

mod bounds;
mod load;
mod style;

pub use load::parse_document;
pub use style::ComputedStyle;

use crate::geom::{BBox, Point, Transform};
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) => Some(t.as_str()),
            Node::Element(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Local tag name as serialized (`div`, `g`, `foreignObject`); compare with [`Element::is`].
    pub tag: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<Node>,
    pub style: ComputedStyle,
    /// Maps this element's local user-space coordinates to root coordinates (own `transform`
    /// attribute included).
    pub transform: Transform,
    /// Bounds in root coordinates, when the element has (or contains) rendered geometry.
    pub bbox: Option<BBox>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
            style: ComputedStyle::default(),
            transform: Transform::identity(),
            bbox: None,
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|s| !s.is_empty())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Parses the first number of a numeric attribute (`x="10 20"` yields `10`).
    pub fn number_attr(&self, name: &str) -> Option<f64> {
        let raw = self.attr(name)?;
        raw.split(|c: char| c == ',' || c.is_whitespace())
            .find(|s| !s.is_empty())?
            .trim_end_matches("px")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }

    /// Maps a point from this element's local coordinates to root coordinates.
    pub fn to_root(&self, x: f64, y: f64) -> Point {
        self.transform.transform_point(crate::geom::point(x, y))
    }

    pub fn is_hidden(&self) -> bool {
        self.style.is_hidden()
    }

    /// Looks up a presentation property: the inline `style` declaration wins over the attribute
    /// of the same name. Values are lower-cased.
    pub fn property(&self, name: &str) -> Option<String> {
        if let Some(style) = self.attr("style") {
            let decls = style::parse_declarations(style);
            if let Some(v) = style::declaration(&decls, name) {
                return Some(v.to_string());
            }
        }
        self.attr(name)
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
    }

    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Pre-order walk over all descendant elements (self excluded).
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<&Element> = self.element_children().collect();
        stack.reverse();
        Descendants { stack }
    }

    pub fn find(&self, pred: impl Fn(&Element) -> bool) -> Option<&Element> {
        self.descendants().find(|el| pred(el))
    }

    pub fn find_class(&self, class: &str) -> Option<&Element> {
        self.find(|el| el.has_class(class))
    }

    pub fn find_tag(&self, tag: &str) -> Option<&Element> {
        self.find(|el| el.is(tag))
    }

    /// Concatenated text of all descendant text nodes, unmodified.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        push_text_content(self, &mut out);
        out
    }

    /// Human-visible label text: `<br>` becomes a line break, whitespace runs collapse within a
    /// line, and blank edge lines are dropped.
    pub fn label_text(&self) -> String {
        let mut raw = String::new();
        push_label_text(self, &mut raw);
        let lines: Vec<String> = raw
            .split('\n')
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect();
        let start = lines.iter().position(|l| !l.is_empty());
        let end = lines.iter().rposition(|l| !l.is_empty());
        match (start, end) {
            (Some(s), Some(e)) => lines[s..=e].join("\n"),
            _ => String::new(),
        }
    }
}

fn push_text_content(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => push_text_content(e, out),
        }
    }
}

fn push_label_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => out.push_str(&t.replace('\n', " ")),
            Node::Element(e) if e.is("br") => out.push('\n'),
            Node::Element(e) if e.is("p") || e.is("div") => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                push_label_text(e, out);
            }
            Node::Element(e) => push_label_text(e, out),
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        let before = self.stack.len();
        self.stack.extend(next.element_children());
        self.stack[before..].reverse();
        Some(next)
    }
}
