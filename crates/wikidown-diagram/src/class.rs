//! Class-diagram recovery.
//!
//! Classes are `g.node` groups with `classId-<name>-<n>` ids; their compartments are the
//! `annotation-group`, `members-group` and `methods-group` children. Relations are the
//! `relation` connector paths: the endpoints come from the `id_<from>_<to>_<n>` id and the
//! relation type from the `marker-start` / `marker-end` references.

use crate::Result;
use crate::ids::{connector_name, element_name, split_connector};
use crate::labels::{Connector, EdgeLabel, connectors, edge_labels};
use crate::text::single_line;
use indexmap::IndexMap;
use std::fmt::Write as _;
use wikidown_core::geom::{
    BBox, Point, Vector, bbox, box_center, distance, distance_to_box, nearest_box,
};
use wikidown_core::{Element, RecoveryOptions};

const CLASS_ID_PREFIXES: &[&str] = &["classId-"];
const RELATION_ID_PREFIXES: &[&str] = &["id_", "id-"];
const NOTE_FILL: &str = "#fff5ad";

#[derive(Debug, Clone, PartialEq)]
pub struct ClassEntity {
    pub name: String,
    pub stereotype: Option<String>,
    pub members: Vec<String>,
    pub methods: Vec<String>,
    pub center: Point,
    pub half_extents: Vector,
}

impl ClassEntity {
    pub fn bbox(&self) -> BBox {
        bbox(
            self.center.x - self.half_extents.x,
            self.center.y - self.half_extents.y,
            self.center.x + self.half_extents.x,
            self.center.y + self.half_extents.y,
        )
    }
}

/// Arrowhead decoration at one end of a relation line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Extension,
    Composition,
    Aggregation,
    Dependency,
    Lollipop,
}

impl Marker {
    fn from_marker_id(id: &str) -> Option<Self> {
        if id.contains("extension") {
            Some(Marker::Extension)
        } else if id.contains("composition") {
            Some(Marker::Composition)
        } else if id.contains("aggregation") {
            Some(Marker::Aggregation)
        } else if id.contains("dependency") {
            Some(Marker::Dependency)
        } else if id.contains("lollipop") {
            Some(Marker::Lollipop)
        } else {
            None
        }
    }

    fn left_glyph(self) -> &'static str {
        match self {
            Marker::Extension => "<|",
            Marker::Composition => "*",
            Marker::Aggregation => "o",
            Marker::Dependency => "<",
            Marker::Lollipop => "()",
        }
    }

    fn right_glyph(self) -> &'static str {
        match self {
            Marker::Extension => "|>",
            Marker::Composition => "*",
            Marker::Aggregation => "o",
            Marker::Dependency => ">",
            Marker::Lollipop => "()",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Inheritance,
    Realization,
    Composition,
    Aggregation,
    Association,
    Dependency,
    Link,
}

/// A relation as it is written: `left <marker><line><marker> right`.
///
/// A single decoration is always written on the left, so `left` is the class the arrowhead
/// points at (the base class for inheritance).
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub left: String,
    pub right: String,
    pub left_marker: Option<Marker>,
    pub right_marker: Option<Marker>,
    pub dashed: bool,
    pub label: Option<String>,
}

impl Relation {
    /// Builds a relation from a connector drawn `source -> target` with its start/end markers.
    pub fn from_connector(
        source: String,
        target: String,
        start: Option<Marker>,
        end: Option<Marker>,
        dashed: bool,
        label: Option<String>,
    ) -> Self {
        let (left, right, left_marker, right_marker) = match (start, end) {
            (None, Some(m)) => (target, source, Some(m), None),
            (start, end) => (source, target, start, end),
        };
        Relation {
            left,
            right,
            left_marker,
            right_marker,
            dashed,
            label,
        }
    }

    pub fn kind(&self) -> RelationKind {
        let marker = self.left_marker.or(self.right_marker);
        match (marker, self.dashed) {
            (Some(Marker::Extension), false) => RelationKind::Inheritance,
            (Some(Marker::Extension), true) | (Some(Marker::Lollipop), _) => {
                RelationKind::Realization
            }
            (Some(Marker::Composition), _) => RelationKind::Composition,
            (Some(Marker::Aggregation), _) => RelationKind::Aggregation,
            (Some(Marker::Dependency), false) => RelationKind::Association,
            (Some(Marker::Dependency), true) => RelationKind::Dependency,
            (None, _) => RelationKind::Link,
        }
    }

    pub fn operator(&self) -> String {
        let line = if self.dashed { ".." } else { "--" };
        format!(
            "{}{line}{}",
            self.left_marker.map(Marker::left_glyph).unwrap_or_default(),
            self.right_marker.map(Marker::right_glyph).unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassNote {
    pub text: String,
    pub bbox: BBox,
    /// Class the note is attached to; free-floating when `None`.
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDiagram {
    pub classes: IndexMap<String, ClassEntity>,
    pub relations: Vec<Relation>,
    pub notes: Vec<ClassNote>,
}

pub fn recover_class_diagram(svg: &Element, options: &RecoveryOptions) -> Result<Option<String>> {
    let diagram = ClassDiagram::extract(svg, options);
    if diagram.classes.is_empty() && diagram.relations.is_empty() && diagram.notes.is_empty() {
        return Ok(None);
    }
    diagram.to_mermaid().map(Some)
}

impl ClassDiagram {
    pub fn extract(svg: &Element, options: &RecoveryOptions) -> Self {
        let classes = collect_classes(svg);
        let mut notes = collect_notes(svg);
        let all_connectors = connectors(svg);
        let labels = edge_labels(svg);

        let mut diagram = ClassDiagram {
            classes,
            relations: Vec::new(),
            notes: Vec::new(),
        };

        for note in &mut notes {
            note.target = diagram.note_target(note, &all_connectors, options);
        }

        for (idx, connector) in all_connectors.iter().enumerate() {
            if let Some(rel) = diagram.resolve_relation(connector, idx, &labels, &notes, options) {
                diagram.relations.push(rel);
            }
        }
        diagram.notes = notes;
        diagram
    }

    fn resolve_relation(
        &self,
        connector: &Connector<'_>,
        idx: usize,
        labels: &[EdgeLabel],
        notes: &[ClassNote],
        options: &RecoveryOptions,
    ) -> Option<Relation> {
        if connector
            .id()
            .is_some_and(|id| id.to_ascii_lowercase().starts_with("edgenote"))
        {
            return None;
        }
        let by_id = connector.id().and_then(|id| {
            split_connector(connector_name(id, RELATION_ID_PREFIXES), |s| {
                self.classes.contains_key(s)
            })
        });
        let by_geometry = || {
            let note_end = notes.iter().any(|n| {
                touches(n.bbox, connector.start(), options)
                    || touches(n.bbox, connector.end(), options)
            });
            if note_end {
                return None;
            }
            self.endpoints_by_geometry(connector, options)
        };
        let Some((source, target)) = by_id.or_else(by_geometry) else {
            tracing::debug!(id = connector.id(), "class connector matches no classes; skipping");
            return None;
        };

        // Every connector gets one label group, in connector order; `data-id` pins it when present.
        let label = connector
            .id()
            .and_then(|id| labels.iter().find(|l| l.edge_id.as_deref() == Some(id)))
            .or_else(|| labels.get(idx))
            .map(|l| l.text.clone())
            .filter(|t| !t.is_empty());

        Some(Relation::from_connector(
            source,
            target,
            connector.marker_start().as_deref().and_then(Marker::from_marker_id),
            connector.marker_end().as_deref().and_then(Marker::from_marker_id),
            connector.is_dashed(),
            label,
        ))
    }

    fn endpoints_by_geometry(
        &self,
        connector: &Connector<'_>,
        options: &RecoveryOptions,
    ) -> Option<(String, String)> {
        let names: Vec<&String> = self.classes.keys().collect();
        let nearest = |p: Point| {
            let (idx, d) = nearest_box(p, self.classes.values().map(ClassEntity::bbox))?;
            (d <= options.edge_endpoint_tolerance).then(|| names[idx].clone())
        };
        Some((nearest(connector.start())?, nearest(connector.end())?))
    }

    /// Class reached by a connector that starts (or ends) at the note, scored by the smaller of
    /// center distance and box-edge distance at the far end.
    fn note_target(
        &self,
        note: &ClassNote,
        connectors: &[Connector<'_>],
        options: &RecoveryOptions,
    ) -> Option<String> {
        let mut best: Option<(&str, f64)> = None;
        for c in connectors {
            for (near, far) in [(c.start(), c.end()), (c.end(), c.start())] {
                if !touches(note.bbox, near, options) {
                    continue;
                }
                for class in self.classes.values() {
                    let d_center = distance(far, class.center);
                    let d_edge = distance_to_box(far, &class.bbox());
                    if d_center > options.class_note_center_distance
                        && d_edge > options.class_note_edge_distance
                    {
                        continue;
                    }
                    let score = d_center.min(d_edge);
                    if best.is_none_or(|(_, s)| score < s) {
                        best = Some((class.name.as_str(), score));
                    }
                }
            }
        }
        best.map(|(name, _)| name.to_string())
    }

    pub fn to_mermaid(&self) -> Result<String> {
        let mut out = String::from("classDiagram\n");
        for class in self.classes.values() {
            if class.stereotype.is_none() && class.members.is_empty() && class.methods.is_empty() {
                writeln!(out, "    class {}", class.name)?;
                continue;
            }
            writeln!(out, "    class {} {{", class.name)?;
            if let Some(st) = &class.stereotype {
                writeln!(out, "        <<{st}>>")?;
            }
            for line in class.members.iter().chain(&class.methods) {
                writeln!(out, "        {line}")?;
            }
            writeln!(out, "    }}")?;
        }
        for rel in &self.relations {
            write!(out, "    {} {} {}", rel.left, rel.operator(), rel.right)?;
            match &rel.label {
                Some(label) => writeln!(out, " : {}", single_line(label))?,
                None => writeln!(out)?,
            }
        }
        for note in &self.notes {
            let text = note.text.replace('"', "'").replace('\n', "\\n");
            match &note.target {
                Some(target) => writeln!(out, "    note for {target} \"{text}\"")?,
                None => writeln!(out, "    note \"{text}\"")?,
            }
        }
        Ok(out)
    }
}

fn touches(b: BBox, p: Point, options: &RecoveryOptions) -> bool {
    distance_to_box(p, &b) <= options.class_note_edge_distance
}

fn collect_classes(svg: &Element) -> IndexMap<String, ClassEntity> {
    let mut classes = IndexMap::new();
    for el in svg.descendants().filter(|el| el.is("g") && el.has_class("node")) {
        let Some(id) = el.id().filter(|id| id.starts_with("classId-")) else {
            continue;
        };
        let Some(name) = element_name(id, CLASS_ID_PREFIXES) else {
            continue;
        };
        if classes.contains_key(name) {
            continue;
        }
        let outline = el
            .find_class("label-container")
            .and_then(|c| c.bbox)
            .or(el.bbox);
        let Some(outline) = outline else {
            tracing::debug!(id, "skipping class without geometry");
            continue;
        };
        let center = if el.attr("transform").is_some() {
            el.to_root(0.0, 0.0)
        } else {
            box_center(&outline)
        };
        let half_extents = Vector::new(
            (center.x - outline.min.x).max(outline.max.x - center.x),
            (center.y - outline.min.y).max(outline.max.y - center.y),
        );
        let stereotype = el
            .find_class("annotation-group")
            .map(Element::label_text)
            .map(|t| t.trim_matches(['«', '»', '<', '>']).trim().to_string())
            .filter(|t| !t.is_empty());
        classes.insert(
            name.to_string(),
            ClassEntity {
                name: name.to_string(),
                stereotype,
                members: compartment_lines(el, "members-group"),
                methods: compartment_lines(el, "methods-group"),
                center,
                half_extents,
            },
        );
    }
    classes
}

fn compartment_lines(el: &Element, class: &str) -> Vec<String> {
    let Some(group) = el.find_class(class) else {
        return Vec::new();
    };
    let lines: Vec<String> = group
        .element_children()
        .map(Element::label_text)
        .filter(|t| !t.is_empty())
        .collect();
    if lines.is_empty() {
        return group
            .label_text()
            .lines()
            .map(str::to_string)
            .filter(|l| !l.is_empty())
            .collect();
    }
    lines
}

/// Notes come in two renderings: a `.note` box next to a `.noteText` label, or a `g.node` whose
/// id starts with `note` / whose outline uses the note fill. Both are collected and duplicates
/// (same text at nearly the same spot) are dropped.
fn collect_notes(svg: &Element) -> Vec<ClassNote> {
    let mut notes: Vec<ClassNote> = Vec::new();
    let mut push = |text: String, bbox: Option<BBox>| {
        let Some(bbox) = bbox else {
            return;
        };
        if text.is_empty() {
            return;
        }
        let center = box_center(&bbox);
        if notes
            .iter()
            .any(|n| n.text == text && distance(box_center(&n.bbox), center) < 1.0)
        {
            return;
        }
        notes.push(ClassNote {
            text,
            bbox,
            target: None,
        });
    };

    for parent in std::iter::once(svg).chain(svg.descendants()) {
        let children: Vec<&Element> = parent.element_children().collect();
        for (i, el) in children.iter().enumerate() {
            if !el.has_class("note") {
                continue;
            }
            let text_el = children[i + 1..]
                .iter()
                .chain(children[..i].iter())
                .find(|c| c.has_class("noteText"));
            if let Some(text_el) = text_el {
                push(text_el.label_text(), el.bbox);
            }
        }
    }

    for el in svg.descendants().filter(|el| el.is("g") && el.has_class("node")) {
        let by_id = el.id().is_some_and(|id| id.starts_with("note"));
        let by_fill = el
            .descendants()
            .any(|d| d.property("fill").as_deref() == Some(NOTE_FILL));
        if !by_id && !by_fill {
            continue;
        }
        let text = el
            .find_class("nodeLabel")
            .map(Element::label_text)
            .unwrap_or_else(|| el.label_text());
        push(text, el.bbox);
    }
    notes
}
