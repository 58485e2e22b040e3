//! Connector paths and edge labels shared by the graph-like recoverers.

use wikidown_core::Element;
use wikidown_core::geom::{Point, box_center, distance, parse_path_points, polyline_midpoint};

/// A rendered edge label (`g.edgeLabel`), in document order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EdgeLabel {
    pub text: String,
    pub center: Point,
    /// Connector id recorded on the label group (`data-id`), when the renderer emits one.
    pub edge_id: Option<String>,
}

/// Collects every `g.edgeLabel`, empty ones included so positional matching stays aligned.
pub(crate) fn edge_labels(svg: &Element) -> Vec<EdgeLabel> {
    svg.descendants()
        .filter(|el| el.is("g") && el.has_class("edgeLabel"))
        .map(|el| EdgeLabel {
            text: el.label_text(),
            center: el.bbox.map(|b| box_center(&b)).unwrap_or_else(|| el.to_root(0.0, 0.0)),
            edge_id: std::iter::once(el)
                .chain(el.descendants())
                .find_map(|d| d.attr("data-id"))
                .map(str::to_string),
        })
        .collect()
}

/// Index of the non-empty label closest to `p`, when it lies within `max_distance`.
pub(crate) fn nearest_label(
    labels: &[EdgeLabel],
    edge_id: Option<&str>,
    p: Point,
    max_distance: f64,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, label) in labels.iter().enumerate() {
        if label.text.is_empty() {
            continue;
        }
        // Pinned to some other connector.
        if label.edge_id.as_deref().is_some_and(|id| Some(id) != edge_id) {
            continue;
        }
        let d = distance(label.center, p);
        if d < max_distance && best.is_none_or(|(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// A rendered connector with its geometry mapped to root coordinates.
#[derive(Debug, Clone)]
pub(crate) struct Connector<'a> {
    pub el: &'a Element,
    pub points: Vec<Point>,
}

impl<'a> Connector<'a> {
    pub fn from_path(el: &'a Element) -> Option<Self> {
        let local = parse_path_points(el.attr("d")?);
        if local.len() < 2 {
            return None;
        }
        let points = local
            .into_iter()
            .map(|p| el.transform.transform_point(p))
            .collect();
        Some(Self { el, points })
    }

    pub fn id(&self) -> Option<&'a str> {
        self.el.id()
    }

    pub fn start(&self) -> Point {
        self.points[0]
    }

    pub fn end(&self) -> Point {
        self.points[self.points.len() - 1]
    }

    /// Point halfway along the path length.
    pub fn midpoint(&self) -> Point {
        polyline_midpoint(&self.points).unwrap_or_else(|| self.start())
    }

    pub fn is_dashed(&self) -> bool {
        is_dashed(self.el)
    }

    pub fn marker_start(&self) -> Option<String> {
        marker_ref(self.el, "marker-start")
    }

    pub fn marker_end(&self) -> Option<String> {
        marker_ref(self.el, "marker-end")
    }
}

/// Connector paths in document order: every `path` under a `g.edgePaths` group, plus paths that
/// Mermaid tags as edges elsewhere (`data-edge`, `flowchart-link`, `relation`, `transition`).
pub(crate) fn connectors(svg: &Element) -> Vec<Connector<'_>> {
    let mut out = Vec::new();
    collect_connectors(svg, false, &mut out);
    out
}

fn collect_connectors<'a>(el: &'a Element, in_edge_group: bool, out: &mut Vec<Connector<'a>>) {
    for child in el.element_children() {
        if child.is("path") && (in_edge_group || is_tagged_edge(child)) {
            match Connector::from_path(child) {
                Some(c) => out.push(c),
                None => tracing::trace!(
                    id = child.id(),
                    "skipping connector without usable path data"
                ),
            }
            continue;
        }
        let in_group = in_edge_group || (child.is("g") && child.has_class("edgePaths"));
        collect_connectors(child, in_group, out);
    }
}

fn is_tagged_edge(el: &Element) -> bool {
    el.attr("data-edge") == Some("true")
        || el.has_class("flowchart-link")
        || el.has_class("relation")
        || el.has_class("transition")
}

/// Dash detection from Mermaid's pattern classes or an explicit non-zero `stroke-dasharray`.
pub(crate) fn is_dashed(el: &Element) -> bool {
    if el.classes().any(|c| {
        matches!(
            c,
            "edge-pattern-dashed"
                | "edge-pattern-dotted"
                | "dashed-line"
                | "dotted-line"
                | "messageLine1"
        )
    }) {
        return true;
    }
    el.property("stroke-dasharray").is_some_and(|v| {
        v != "none"
            && v.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .any(|s| s.trim_end_matches("px").parse::<f64>().is_ok_and(|n| n > 0.0))
    })
}

/// Returns the id inside a `url(#...)` marker reference, lower-cased.
pub(crate) fn marker_ref(el: &Element, name: &str) -> Option<String> {
    let raw = el.property(name)?;
    let inner = raw
        .trim()
        .strip_prefix("url(")
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(raw.as_str())
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim_start_matches('#');
    (!inner.is_empty() && inner != "none").then(|| inner.to_ascii_lowercase())
}
