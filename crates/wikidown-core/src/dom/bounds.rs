//! Bounding boxes of rendered SVG elements in their own user space.
//!
//! These mirror what `getBBox()` reports for the shapes Mermaid emits. Text has no font metrics
//! available here, so its box is an estimate centered on the anchor point.

use super::Element;
use super::style::declaration;
use crate::geom::{BBox, bbox, bbox_xywh, parse_path_points, point, points_bounds};

const DEFAULT_FONT_SIZE: f64 = 16.0;
const AVERAGE_GLYPH_WIDTH_EM: f64 = 0.6;

pub(super) fn local_bounds(el: &Element, decls: &[(String, String)]) -> Option<BBox> {
    let num = |name: &str| el.number_attr(name);
    match el.tag.to_ascii_lowercase().as_str() {
        "rect" | "foreignobject" | "image" | "use" | "svg" => {
            let width = num("width").or_else(|| css_length(declaration(decls, "width")?))?;
            let height = num("height").or_else(|| css_length(declaration(decls, "height")?))?;
            if width < 0.0 || height < 0.0 {
                return None;
            }
            Some(bbox_xywh(
                num("x").unwrap_or(0.0),
                num("y").unwrap_or(0.0),
                width,
                height,
            ))
        }
        "circle" => {
            let r = num("r")?;
            let (cx, cy) = (num("cx").unwrap_or(0.0), num("cy").unwrap_or(0.0));
            Some(bbox(cx - r, cy - r, cx + r, cy + r))
        }
        "ellipse" => {
            let (rx, ry) = (num("rx")?, num("ry")?);
            let (cx, cy) = (num("cx").unwrap_or(0.0), num("cy").unwrap_or(0.0));
            Some(bbox(cx - rx, cy - ry, cx + rx, cy + ry))
        }
        "line" => Some(bbox(
            num("x1").unwrap_or(0.0),
            num("y1").unwrap_or(0.0),
            num("x2").unwrap_or(0.0),
            num("y2").unwrap_or(0.0),
        )),
        "polygon" | "polyline" => points_bounds(&parse_points(el.attr("points")?)),
        "path" => points_bounds(&parse_path_points(el.attr("d")?)),
        "text" => text_bounds(el, decls),
        _ => None,
    }
}

/// Parses a `data-bbox="x y width height"` capture.
pub(super) fn captured_bbox(raw: &str) -> Option<BBox> {
    let nums: Vec<f64> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()
        .ok()?;
    match nums.as_slice() {
        [x, y, w, h] if *w >= 0.0 && *h >= 0.0 => Some(bbox_xywh(*x, *y, *w, *h)),
        _ => None,
    }
}

pub(crate) fn parse_points(raw: &str) -> Vec<crate::geom::Point> {
    let nums: Vec<f64> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f64>().ok())
        .collect();
    nums.chunks_exact(2).map(|c| point(c[0], c[1])).collect()
}

fn css_length(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches("px").trim().parse::<f64>().ok()
}

fn text_bounds(el: &Element, decls: &[(String, String)]) -> Option<BBox> {
    let text = el.text_content();
    let chars = text.trim().chars().count();
    if chars == 0 {
        return None;
    }
    let font_size = el
        .attr("font-size")
        .and_then(css_length)
        .or_else(|| css_length(declaration(decls, "font-size")?))
        .unwrap_or(DEFAULT_FONT_SIZE);
    let width = chars as f64 * font_size * AVERAGE_GLYPH_WIDTH_EM;

    let x = el.number_attr("x").unwrap_or(0.0);
    let mut y = el.number_attr("y").unwrap_or(0.0);
    if let Some(dy) = el.attr("dy") {
        let dy = dy.trim();
        if let Some(em) = dy.strip_suffix("em") {
            y += em.parse::<f64>().unwrap_or(0.0) * font_size;
        } else if let Ok(v) = dy.parse::<f64>() {
            y += v;
        }
    }

    let anchor = el
        .attr("text-anchor")
        .or_else(|| declaration(decls, "text-anchor"))
        .unwrap_or("start");
    let left = match anchor {
        "middle" => x - width / 2.0,
        "end" => x - width,
        _ => x,
    };
    let baseline = el
        .attr("dominant-baseline")
        .or_else(|| el.attr("alignment-baseline"))
        .unwrap_or("auto");
    let top = match baseline {
        "middle" | "central" => y - font_size / 2.0,
        "hanging" | "text-before-edge" => y,
        _ => y - font_size * 0.8,
    };
    Some(bbox_xywh(left, top, width, font_size))
}
