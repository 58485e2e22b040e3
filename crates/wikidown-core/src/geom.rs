#![forbid(unsafe_code)]

//! Geometry primitives shared by every diagram recoverer.
//!
//! All functions here are pure: they operate on already-captured coordinates (root SVG user
//! space) and never consult a live layout. Malformed input yields empty results, not errors.

use svgtypes::{PathParser, PathSegment};

pub type Unit = euclid::UnknownUnit;

pub type Point = euclid::Point2D<f64, Unit>;
pub type Vector = euclid::Vector2D<f64, Unit>;
pub type Size = euclid::Size2D<f64, Unit>;
/// Axis-aligned bounding box; `min` is the left/top corner, `max` the right/bottom corner.
pub type BBox = euclid::Box2D<f64, Unit>;
pub type Transform = euclid::Transform2D<f64, Unit, Unit>;

pub fn point(x: f64, y: f64) -> Point {
    euclid::point2(x, y)
}

pub fn vector(x: f64, y: f64) -> Vector {
    euclid::vec2(x, y)
}

/// Builds a box from left/top/right/bottom edges, normalizing swapped edges.
pub fn bbox(left: f64, top: f64, right: f64, bottom: f64) -> BBox {
    BBox::new(
        point(left.min(right), top.min(bottom)),
        point(left.max(right), top.max(bottom)),
    )
}

pub fn bbox_xywh(x: f64, y: f64, width: f64, height: f64) -> BBox {
    bbox(x, y, x + width, y + height)
}

pub fn box_width(b: &BBox) -> f64 {
    b.max.x - b.min.x
}

pub fn box_height(b: &BBox) -> f64 {
    b.max.y - b.min.y
}

pub fn box_area(b: &BBox) -> f64 {
    box_width(b) * box_height(b)
}

/// Zero-sized boxes are rendering artifacts (hidden helpers, empty labels).
pub fn has_area(b: &BBox) -> bool {
    box_width(b) > 0.0 && box_height(b) > 0.0
}

pub fn box_center(b: &BBox) -> Point {
    point((b.min.x + b.max.x) / 2.0, (b.min.y + b.max.y) / 2.0)
}

pub fn box_union(a: &BBox, b: &BBox) -> BBox {
    bbox(
        a.min.x.min(b.min.x),
        a.min.y.min(b.min.y),
        a.max.x.max(b.max.x),
        a.max.y.max(b.max.y),
    )
}

/// Axis-aligned bounds of `b` after applying `t` to its four corners.
pub fn transform_box(t: &Transform, b: &BBox) -> BBox {
    let corners = [
        t.transform_point(point(b.min.x, b.min.y)),
        t.transform_point(point(b.max.x, b.min.y)),
        t.transform_point(point(b.max.x, b.max.y)),
        t.transform_point(point(b.min.x, b.max.y)),
    ];
    points_bounds(&corners).unwrap_or(*b)
}

pub fn points_bounds(points: &[Point]) -> Option<BBox> {
    let first = points.first()?;
    let mut out = bbox(first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        out = box_union(&out, &bbox(p.x, p.y, p.x, p.y));
    }
    Some(out)
}

/// `true` iff `inner` lies entirely within `outer` (closed intervals on all four edges).
pub fn box_contains(outer: &BBox, inner: &BBox) -> bool {
    inner.min.x >= outer.min.x
        && inner.max.x <= outer.max.x
        && inner.min.y >= outer.min.y
        && inner.max.y <= outer.max.y
}

/// Euclidean distance from `p` to the closest edge of `b`; zero when `p` is inside.
pub fn distance_to_box(p: Point, b: &BBox) -> f64 {
    let dx = (b.min.x - p.x).max(0.0).max(p.x - b.max.x);
    let dy = (b.min.y - p.y).max(0.0).max(p.y - b.max.y);
    dx.hypot(dy)
}

pub fn distance(a: Point, b: Point) -> f64 {
    (a - b).length()
}

/// Returns the index of the box closest to `p` and its distance. Ties keep the earliest box.
pub fn nearest_box<I>(p: Point, boxes: I) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = BBox>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, b) in boxes.into_iter().enumerate() {
        let d = distance_to_box(p, &b);
        if best.is_none_or(|(_, cur)| d < cur) {
            best = Some((idx, d));
        }
    }
    best
}

/// Returns the index of the point closest to `p` and its distance. Ties keep the earliest point.
pub fn nearest_point<I>(p: Point, candidates: I) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = Point>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, c) in candidates.into_iter().enumerate() {
        let d = distance(p, c);
        if best.is_none_or(|(_, cur)| d < cur) {
            best = Some((idx, d));
        }
    }
    best
}

/// Parses SVG path data and returns the endpoint of every segment, in order.
///
/// Control points are dropped; relative commands are resolved to absolute coordinates. Any parse
/// error yields an empty result.
pub fn parse_path_points(d: &str) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::new();
    let mut cur = point(0.0, 0.0);
    let mut subpath_start = cur;

    for seg in PathParser::from(d) {
        let Ok(seg) = seg else {
            return Vec::new();
        };
        let resolve = |abs: bool, x: f64, y: f64| {
            if abs { point(x, y) } else { point(cur.x + x, cur.y + y) }
        };
        let next = match seg {
            PathSegment::MoveTo { abs, x, y } => {
                let p = resolve(abs, x, y);
                subpath_start = p;
                p
            }
            PathSegment::LineTo { abs, x, y }
            | PathSegment::CurveTo { abs, x, y, .. }
            | PathSegment::SmoothCurveTo { abs, x, y, .. }
            | PathSegment::Quadratic { abs, x, y, .. }
            | PathSegment::SmoothQuadratic { abs, x, y }
            | PathSegment::EllipticalArc { abs, x, y, .. } => resolve(abs, x, y),
            PathSegment::HorizontalLineTo { abs, x } => {
                if abs {
                    point(x, cur.y)
                } else {
                    point(cur.x + x, cur.y)
                }
            }
            PathSegment::VerticalLineTo { abs, y } => {
                if abs {
                    point(cur.x, y)
                } else {
                    point(cur.x, cur.y + y)
                }
            }
            PathSegment::ClosePath { .. } => subpath_start,
        };
        out.push(next);
        cur = next;
    }
    out
}

/// Total length of the polyline through `points`.
pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// The point `target` units along the polyline (clamped to its ends).
pub fn point_along(points: &[Point], target: f64) -> Option<Point> {
    let first = *points.first()?;
    if target <= 0.0 {
        return Some(first);
    }
    let mut walked = 0.0;
    for w in points.windows(2) {
        let seg = distance(w[0], w[1]);
        if seg > 0.0 && walked + seg >= target {
            let t = (target - walked) / seg;
            return Some(w[0].lerp(w[1], t));
        }
        walked += seg;
    }
    points.last().copied()
}

/// Midpoint by arc length (total length / 2) of the polyline through `points`.
pub fn polyline_midpoint(points: &[Point]) -> Option<Point> {
    point_along(points, polyline_length(points) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_contains_uses_closed_intervals() {
        let outer = bbox(0.0, 0.0, 100.0, 100.0);
        assert!(box_contains(&outer, &bbox(10.0, 10.0, 20.0, 20.0)));
        assert!(box_contains(&outer, &outer));
        assert!(box_contains(&outer, &bbox(0.0, 0.0, 100.0, 50.0)));
        assert!(!box_contains(&outer, &bbox(-1.0, 10.0, 20.0, 20.0)));
        assert!(!box_contains(&outer, &bbox(10.0, 10.0, 20.0, 100.5)));
    }

    #[test]
    fn distance_to_box_is_zero_inside_and_euclidean_outside() {
        let b = bbox(0.0, 0.0, 10.0, 10.0);
        assert_eq!(distance_to_box(point(5.0, 5.0), &b), 0.0);
        assert_eq!(distance_to_box(point(15.0, 5.0), &b), 5.0);
        assert_eq!(distance_to_box(point(13.0, 14.0), &b), 5.0);
    }

    #[test]
    fn nearest_box_prefers_earliest_on_ties() {
        let boxes = [
            bbox(20.0, 0.0, 30.0, 10.0),
            bbox(-30.0, 0.0, -20.0, 10.0),
            bbox(100.0, 100.0, 110.0, 110.0),
        ];
        let (idx, d) = nearest_box(point(0.0, 5.0), boxes).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(d, 20.0);
        assert!(nearest_box(point(0.0, 0.0), Vec::<BBox>::new()).is_none());
    }

    #[test]
    fn parse_path_points_keeps_segment_endpoints_only() {
        let pts = parse_path_points("M10,20 L30,20 C40,0 50,0 60,20 Q70,40 80,20");
        assert_eq!(
            pts,
            vec![
                point(10.0, 20.0),
                point(30.0, 20.0),
                point(60.0, 20.0),
                point(80.0, 20.0)
            ]
        );
    }

    #[test]
    fn parse_path_points_resolves_relative_commands() {
        let pts = parse_path_points("m10 10 l5 0 h5 v5 z");
        assert_eq!(
            pts,
            vec![
                point(10.0, 10.0),
                point(15.0, 10.0),
                point(20.0, 10.0),
                point(20.0, 15.0),
                point(10.0, 10.0)
            ]
        );
    }

    #[test]
    fn parse_path_points_returns_empty_on_malformed_data() {
        assert!(parse_path_points("M10,10 L").is_empty());
        assert!(parse_path_points("not a path").is_empty());
        assert!(parse_path_points("").is_empty());
    }

    #[test]
    fn polyline_midpoint_walks_half_the_length() {
        let pts = [point(0.0, 0.0), point(10.0, 0.0), point(10.0, 30.0)];
        assert_eq!(polyline_length(&pts), 40.0);
        assert_eq!(polyline_midpoint(&pts), Some(point(10.0, 10.0)));
        assert_eq!(polyline_midpoint(&[point(3.0, 4.0)]), Some(point(3.0, 4.0)));
        assert_eq!(polyline_midpoint(&[]), None);
    }

    #[test]
    fn transform_box_takes_axis_aligned_bounds() {
        let t = Transform::translation(5.0, -5.0).then_scale(2.0, 2.0);
        let b = transform_box(&t, &bbox(0.0, 0.0, 10.0, 10.0));
        assert_eq!(b, bbox(10.0, -10.0, 30.0, 10.0));
    }
}
