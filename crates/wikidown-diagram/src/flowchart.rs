//! Flowchart recovery.
//!
//! Nodes come from `g.node` groups (`flowchart-<id>-<n>`), subgraphs from `g.cluster` groups.
//! Subgraph membership is not encoded in the markup, so it is rebuilt from geometry: every node
//! or cluster belongs to the smallest-area cluster whose box contains it. Edges are owned by the
//! lowest common ancestor cluster of their endpoints.

use crate::Result;
use crate::ids::{connector_name, element_name, split_connector};
use crate::labels::{Connector, EdgeLabel, connectors, edge_labels, nearest_label};
use crate::text::quoted_label;
use indexmap::IndexMap;
use std::fmt::Write as _;
use wikidown_core::geom::{BBox, Point, box_area, box_center, box_contains, has_area, nearest_box};
use wikidown_core::{Element, RecoveryOptions};

const NODE_ID_PREFIXES: &[&str] = &["flowchart-"];
const EDGE_ID_PREFIXES: &[&str] = &["L_", "L-"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    Rect,
    Round,
    Diamond,
    Circle,
}

impl NodeShape {
    fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            NodeShape::Rect => ("[", "]"),
            NodeShape::Round => ("(", ")"),
            NodeShape::Diamond => ("{", "}"),
            NodeShape::Circle => ("((", "))"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    TopDown,
    BottomTop,
    LeftRight,
    RightLeft,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::TopDown => "TD",
            Direction::BottomTop => "BT",
            Direction::LeftRight => "LR",
            Direction::RightLeft => "RL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Solid,
    Dotted,
    Thick,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
    pub bbox: BBox,
    /// Immediate parent cluster id.
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: String,
    pub title: String,
    pub bbox: BBox,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub stroke: Stroke,
    /// Arrowhead glyph at the source end (`<`, `x`, `o`).
    pub start_head: Option<char>,
    /// Arrowhead glyph at the target end (`>`, `x`, `o`).
    pub end_head: Option<char>,
    /// Cluster the edge is written in; `None` is the top level.
    pub owner: Option<String>,
}

impl FlowEdge {
    /// Mermaid link operator, e.g. `-->`, `-.->`, `==>`, `---`, `<-->`.
    pub fn operator(&self) -> String {
        let start = self.start_head.map(String::from).unwrap_or_default();
        match (self.stroke, self.end_head) {
            (Stroke::Solid, Some(h)) => format!("{start}--{h}"),
            (Stroke::Solid, None) => format!("{start}---"),
            (Stroke::Dotted, Some(h)) => format!("{start}-.-{h}"),
            (Stroke::Dotted, None) => format!("{start}-.-"),
            (Stroke::Thick, Some(h)) => format!("{start}=={h}"),
            (Stroke::Thick, None) => format!("{start}==="),
        }
    }
}

/// Recovered flowchart model, keyed by stable ids in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Flowchart {
    pub direction: Direction,
    pub nodes: IndexMap<String, FlowNode>,
    pub clusters: IndexMap<String, Cluster>,
    pub edges: Vec<FlowEdge>,
}

pub fn recover_flowchart(svg: &Element, options: &RecoveryOptions) -> Result<Option<String>> {
    let chart = Flowchart::extract(svg, options);
    if chart.nodes.is_empty() && chart.clusters.is_empty() {
        return Ok(None);
    }
    chart.to_mermaid().map(Some)
}

impl Flowchart {
    pub fn extract(svg: &Element, options: &RecoveryOptions) -> Self {
        let mut chart = Flowchart {
            direction: Direction::TopDown,
            nodes: collect_nodes(svg),
            clusters: collect_clusters(svg),
            edges: Vec::new(),
        };
        chart.assign_parents();

        let labels = edge_labels(svg);
        for connector in connectors(svg) {
            if let Some(edge) = chart.resolve_edge(&connector, &labels, options) {
                chart.edges.push(edge);
            }
        }
        chart.direction = chart.infer_direction();
        chart
    }

    fn is_known(&self, id: &str) -> bool {
        self.nodes.contains_key(id) || self.clusters.contains_key(id)
    }

    fn bbox_of(&self, id: &str) -> Option<BBox> {
        self.nodes
            .get(id)
            .map(|n| n.bbox)
            .or_else(|| self.clusters.get(id).map(|c| c.bbox))
    }

    fn parent_of(&self, id: &str) -> Option<&str> {
        self.nodes
            .get(id)
            .and_then(|n| n.parent.as_deref())
            .or_else(|| self.clusters.get(id).and_then(|c| c.parent.as_deref()))
    }

    /// Smallest-area cluster containing `bbox`. For clusters (`own_id` set) only strictly larger
    /// clusters qualify, which keeps the result a tree even for coincident boxes.
    fn smallest_enclosing(&self, bbox: &BBox, own_id: Option<&str>) -> Option<String> {
        let area = box_area(bbox);
        let mut best: Option<&Cluster> = None;
        for c in self.clusters.values() {
            if own_id == Some(c.id.as_str()) || !box_contains(&c.bbox, bbox) {
                continue;
            }
            if own_id.is_some() && box_area(&c.bbox) <= area {
                continue;
            }
            if best.is_none_or(|b| box_area(&c.bbox) < box_area(&b.bbox)) {
                best = Some(c);
            }
        }
        best.map(|c| c.id.clone())
    }

    fn assign_parents(&mut self) {
        let node_parents: Vec<Option<String>> = self
            .nodes
            .values()
            .map(|n| self.smallest_enclosing(&n.bbox, None))
            .collect();
        for (node, parent) in self.nodes.values_mut().zip(node_parents) {
            node.parent = parent;
        }

        let cluster_parents: Vec<Option<String>> = self
            .clusters
            .values()
            .map(|c| self.smallest_enclosing(&c.bbox, Some(&c.id)))
            .collect();
        for (cluster, parent) in self.clusters.values_mut().zip(cluster_parents) {
            cluster.parent = parent;
        }
    }

    /// Enclosing clusters of `id`, innermost first (the element itself excluded).
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = self.parent_of(id);
        while let Some(p) = cur {
            if out.len() > self.clusters.len() {
                break;
            }
            out.push(p.to_string());
            cur = self.parent_of(p);
        }
        out
    }

    /// Innermost cluster enclosing both endpoints; `None` means the top level.
    pub fn owning_cluster(&self, from: &str, to: &str) -> Option<String> {
        let to_chain = self.ancestors(to);
        self.ancestors(from)
            .into_iter()
            .find(|c| to_chain.contains(c))
    }

    fn resolve_edge(
        &self,
        connector: &Connector<'_>,
        labels: &[EdgeLabel],
        options: &RecoveryOptions,
    ) -> Option<FlowEdge> {
        let by_id = connector.id().and_then(|id| {
            split_connector(connector_name(id, EDGE_ID_PREFIXES), |s| self.is_known(s))
        });
        let Some((from, to)) = by_id.or_else(|| self.endpoints_by_geometry(connector, options))
        else {
            tracing::debug!(id = connector.id(), "flowchart connector matches no nodes; skipping");
            return None;
        };

        let label = match connector
            .id()
            .and_then(|id| labels.iter().find(|l| l.edge_id.as_deref() == Some(id)))
        {
            Some(l) => (!l.text.is_empty()).then(|| l.text.clone()),
            None => nearest_label(
                labels,
                connector.id(),
                connector.midpoint(),
                options.flowchart_label_distance,
            )
            .map(|i| labels[i].text.clone()),
        };

        let classes: Vec<&str> = connector.el.classes().collect();
        let stroke = if classes.contains(&"edge-pattern-dotted")
            || classes.contains(&"edge-pattern-dashed")
        {
            Stroke::Dotted
        } else if classes.contains(&"edge-thickness-thick") {
            Stroke::Thick
        } else if connector.is_dashed() {
            Stroke::Dotted
        } else {
            Stroke::Solid
        };

        let owner = self.owning_cluster(&from, &to);
        Some(FlowEdge {
            start_head: connector.marker_start().map(|m| head_glyph(&m, '<')),
            end_head: connector.marker_end().map(|m| head_glyph(&m, '>')),
            from,
            to,
            label,
            stroke,
            owner,
        })
    }

    fn endpoints_by_geometry(
        &self,
        connector: &Connector<'_>,
        options: &RecoveryOptions,
    ) -> Option<(String, String)> {
        let ids: Vec<&String> = self.nodes.keys().collect();
        let nearest = |p: Point| {
            let (idx, d) = nearest_box(p, self.nodes.values().map(|n| n.bbox))?;
            (d <= options.edge_endpoint_tolerance).then(|| ids[idx].clone())
        };
        Some((nearest(connector.start())?, nearest(connector.end())?))
    }

    fn infer_direction(&self) -> Direction {
        let (mut dx, mut dy) = (0.0, 0.0);
        for edge in &self.edges {
            if let (Some(a), Some(b)) = (self.bbox_of(&edge.from), self.bbox_of(&edge.to)) {
                let d = box_center(&b) - box_center(&a);
                dx += d.x;
                dy += d.y;
            }
        }
        if dx == 0.0 && dy == 0.0 {
            Direction::TopDown
        } else if dy.abs() >= dx.abs() {
            if dy >= 0.0 { Direction::TopDown } else { Direction::BottomTop }
        } else if dx > 0.0 {
            Direction::LeftRight
        } else {
            Direction::RightLeft
        }
    }

    pub fn to_mermaid(&self) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "flowchart {}", self.direction.as_str())?;
        for node in self.nodes.values() {
            let (open, close) = node.shape.delimiters();
            writeln!(out, "    {}{open}\"{}\"{close}", node.id, quoted_label(&node.label))?;
        }
        for edge in self.edges.iter().filter(|e| e.owner.is_none()) {
            write_edge(&mut out, edge, 1)?;
        }
        for cluster in self.clusters.values().filter(|c| c.parent.is_none()) {
            self.write_cluster(&mut out, cluster, 1)?;
        }
        Ok(out)
    }

    fn write_cluster(&self, out: &mut String, cluster: &Cluster, depth: usize) -> Result<()> {
        let indent = "    ".repeat(depth);
        if cluster.title == cluster.id {
            writeln!(out, "{indent}subgraph {}", cluster.id)?;
        } else {
            writeln!(out, "{indent}subgraph {}[\"{}\"]", cluster.id, quoted_label(&cluster.title))?;
        }
        let inside = Some(cluster.id.as_str());
        for node in self.nodes.values().filter(|n| n.parent.as_deref() == inside) {
            writeln!(out, "{indent}    {}", node.id)?;
        }
        for edge in self.edges.iter().filter(|e| e.owner.as_deref() == inside) {
            write_edge(out, edge, depth + 1)?;
        }
        for child in self.clusters.values().filter(|c| c.parent.as_deref() == inside) {
            self.write_cluster(out, child, depth + 1)?;
        }
        writeln!(out, "{indent}end")?;
        Ok(())
    }
}

fn write_edge(out: &mut String, edge: &FlowEdge, depth: usize) -> Result<()> {
    let indent = "    ".repeat(depth);
    match &edge.label {
        Some(label) => writeln!(
            out,
            "{indent}{} {}|{}| {}",
            edge.from,
            edge.operator(),
            quoted_label(label).replace('|', "#124;"),
            edge.to
        )?,
        None => writeln!(out, "{indent}{} {} {}", edge.from, edge.operator(), edge.to)?,
    }
    Ok(())
}

fn head_glyph(marker: &str, arrow: char) -> char {
    if marker.contains("cross") {
        'x'
    } else if marker.contains("circle") {
        'o'
    } else {
        arrow
    }
}

fn collect_nodes(svg: &Element) -> IndexMap<String, FlowNode> {
    let mut nodes = IndexMap::new();
    for el in svg.descendants().filter(|el| el.is("g") && el.has_class("node")) {
        let Some(id) = el.id().and_then(|id| element_name(id, NODE_ID_PREFIXES)) else {
            continue;
        };
        let Some(bbox) = el.bbox.filter(has_area) else {
            tracing::debug!(id, "skipping zero-area flowchart node");
            continue;
        };
        if nodes.contains_key(id) {
            continue;
        }
        let label = node_label(el);
        nodes.insert(
            id.to_string(),
            FlowNode {
                id: id.to_string(),
                label: if label.is_empty() { id.to_string() } else { label },
                shape: node_shape(el),
                bbox,
                parent: None,
            },
        );
    }
    nodes
}

fn node_label(el: &Element) -> String {
    el.find_class("nodeLabel")
        .map(Element::label_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| el.label_text())
}

fn node_shape(el: &Element) -> NodeShape {
    let Some(container) = el.find_class("label-container") else {
        return NodeShape::Rect;
    };
    if container.is("circle") {
        return NodeShape::Circle;
    }
    if container.is("polygon") {
        let coords = container
            .attr("points")
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .count();
        if coords == 8 {
            return NodeShape::Diamond;
        }
    }
    if container.is("rect") && container.number_attr("rx").is_some_and(|rx| rx > 0.0) {
        return NodeShape::Round;
    }
    NodeShape::Rect
}

fn collect_clusters(svg: &Element) -> IndexMap<String, Cluster> {
    let mut clusters = IndexMap::new();
    for el in svg.descendants().filter(|el| el.is("g") && el.has_class("cluster")) {
        let Some(id) = el.id() else {
            continue;
        };
        let frame = el
            .element_children()
            .find(|c| c.is("rect"))
            .and_then(|r| r.bbox)
            .or(el.bbox);
        let Some(bbox) = frame.filter(has_area) else {
            tracing::debug!(id, "skipping zero-area cluster");
            continue;
        };
        let title = el
            .find_class("cluster-label")
            .map(Element::label_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| id.to_string());
        clusters.entry(id.to_string()).or_insert(Cluster {
            id: id.to_string(),
            title,
            bbox,
            parent: None,
        });
    }
    clusters
}
