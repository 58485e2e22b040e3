use super::bounds::{captured_bbox, local_bounds};
use super::style::{ComputedStyle, declaration, parse_declarations};
use super::{Element, Node};
use crate::error::{Error, Result};
use crate::geom::{BBox, Transform, box_union, transform_box};
use regex::Regex;
use std::borrow::Cow;
use std::str::FromStr;

fn named_entity_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]{1,31});").expect("valid regex"))
}

/// Builds a [`Element`] tree from a well-formed XHTML/SVG serialization of a rendered page.
///
/// Geometry is captured while building: every element gets its cumulative transform and, when it
/// renders anything, a bounding box in root coordinates. A `data-bbox="x y w h"` attribute
/// (captured by the host from the live layout) takes precedence over the computed box.
pub fn parse_document(text: &str) -> Result<Element> {
    let text = decode_named_entities(text);
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(&text, options).map_err(|e| Error::Xml {
        message: e.to_string(),
    })?;
    Ok(build_element(
        doc.root_element(),
        &Transform::identity(),
        &ComputedStyle::default(),
    ))
}

/// XML only knows five named entities; HTML serializations routinely carry more (`&nbsp;`,
/// `&rarr;`, ...). Decode those up front so the XML parser accepts the snapshot.
fn decode_named_entities(text: &str) -> Cow<'_, str> {
    named_entity_regex().replace_all(text, |caps: &regex::Captures<'_>| {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if matches!(name, "amp" | "lt" | "gt" | "quot" | "apos") {
            return whole.to_string();
        }
        let decoded = htmlize::unescape(whole);
        if decoded == whole {
            return format!("&amp;{name};");
        }
        decoded
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    })
}

fn own_transform(raw: Option<&str>) -> Transform {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Transform::identity();
    };
    match svgtypes::Transform::from_str(raw) {
        Ok(t) => Transform::new(t.a, t.b, t.c, t.d, t.e, t.f),
        Err(err) => {
            tracing::trace!(transform = raw, error = %err, "ignoring unparseable transform");
            Transform::identity()
        }
    }
}

fn build_element(
    n: roxmltree::Node<'_, '_>,
    parent_transform: &Transform,
    parent_style: &ComputedStyle,
) -> Element {
    let mut el = Element::new(n.tag_name().name());
    for a in n.attributes() {
        el.attrs.insert(a.name().to_string(), a.value().to_string());
    }

    let decls = el
        .attr("style")
        .map(parse_declarations)
        .unwrap_or_default();
    let mut decls_with_attrs = decls.clone();
    // Presentation attributes behave like lowest-priority declarations.
    for prop in ["display", "visibility"] {
        if let Some(v) = el.attr(prop) {
            decls_with_attrs.insert(0, (prop.to_string(), v.trim().to_ascii_lowercase()));
        }
    }
    el.style = ComputedStyle::resolve(
        parent_style,
        &decls_with_attrs,
        el.attrs.contains_key("hidden"),
    );
    el.transform = own_transform(el.attr("transform")).then(parent_transform);

    for child in n.children() {
        if child.is_element() {
            let child_el = build_element(child, &el.transform, &el.style);
            el.children.push(Node::Element(child_el));
        } else if child.is_text() {
            if let Some(t) = child.text() {
                el.children.push(Node::Text(t.to_string()));
            }
        }
    }

    el.bbox = element_bbox(&el, &decls);
    el
}

fn element_bbox(el: &Element, decls: &[(String, String)]) -> Option<BBox> {
    if let Some(b) = el.attr("data-bbox").and_then(captured_bbox) {
        return Some(b);
    }
    if declaration(decls, "display") == Some("none") {
        return None;
    }
    if let Some(local) = local_bounds(el, decls) {
        return Some(transform_box(&el.transform, &local));
    }
    el.element_children()
        .filter_map(|c| c.bbox)
        .reduce(|acc, b| box_union(&acc, &b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{bbox, point};

    #[test]
    fn nested_translates_accumulate_into_root_coordinates() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg">
            <g transform="translate(100, 50)">
              <g class="node" id="flowchart-A-0" transform="translate(10,20)">
                <rect x="-30" y="-10" width="60" height="20"/>
              </g>
            </g>
          </svg>"#;
        let root = parse_document(svg).unwrap();
        let node = root.find_class("node").unwrap();
        assert_eq!(node.bbox, Some(bbox(80.0, 60.0, 140.0, 80.0)));
        assert_eq!(node.to_root(0.0, 0.0), point(110.0, 70.0));
        assert_eq!(root.bbox, node.bbox);
    }

    #[test]
    fn captured_bbox_overrides_computed_geometry() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect data-bbox="1 2 3 4" width="10" height="10"/></svg>"#;
        let root = parse_document(svg).unwrap();
        assert_eq!(root.find_tag("rect").unwrap().bbox, Some(bbox(1.0, 2.0, 4.0, 6.0)));
    }

    #[test]
    fn html_entities_and_doctype_are_accepted() {
        let html = "<!DOCTYPE html><html><body><p>a&nbsp;b &rarr; c &amp; d &bogus;</p></body></html>";
        let root = parse_document(html).unwrap();
        let p = root.find_tag("p").unwrap();
        assert_eq!(p.text_content(), "a\u{a0}b \u{2192} c & d &bogus;");
    }

    #[test]
    fn style_and_hidden_attribute_are_resolved() {
        let html = r#"<div><p style="display:none">x</p><p hidden="">y</p><span visibility="hidden"><b>z</b></span><i>w</i></div>"#;
        let root = parse_document(html).unwrap();
        let hidden: Vec<bool> = root.descendants().map(Element::is_hidden).collect();
        assert_eq!(hidden, vec![true, true, true, true, false]);
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        let err = parse_document("<div><p></div>").unwrap_err();
        assert!(matches!(err, Error::Xml { .. }));
    }
}
