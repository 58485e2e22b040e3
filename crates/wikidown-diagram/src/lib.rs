#![forbid(unsafe_code)]

//! Recovers Mermaid source text from rendered diagram SVG.
//!
//! Every recoverer reads an owned [`Element`] snapshot of the `<svg>` subtree (geometry already
//! captured in root coordinates) and either returns diagram text or `None` when the markup holds
//! nothing it recognizes. Recognition is tied to the structural conventions of Mermaid's SVG
//! output (group classes, generated ids, marker references); this is not a general SVG
//! interpreter.

pub mod class;
pub mod flowchart;
pub mod sequence;
pub mod state;

mod ids;
mod labels;
mod text;

use serde::Serialize;
use wikidown_core::{Element, RecoveryOptions};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to write diagram text: {0}")]
    Fmt(#[from] std::fmt::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagramKind {
    Flowchart,
    Class,
    Sequence,
    State,
}

impl DiagramKind {
    /// Header keyword of the recovered Mermaid text.
    pub fn keyword(self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Class => "classDiagram",
            DiagramKind::Sequence => "sequenceDiagram",
            DiagramKind::State => "stateDiagram-v2",
        }
    }

    /// Maps Mermaid's `aria-roledescription` value to a kind.
    pub fn from_role_description(role: &str) -> Option<Self> {
        match role.trim() {
            "flowchart-v2" | "flowchart" | "flowchart-elk" | "graph" => {
                Some(DiagramKind::Flowchart)
            }
            "classDiagram" | "class" => Some(DiagramKind::Class),
            "sequence" | "sequenceDiagram" => Some(DiagramKind::Sequence),
            "stateDiagram" | "stateDiagram-v2" | "state" => Some(DiagramKind::State),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Recovered diagram source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveredDiagram {
    pub kind: DiagramKind,
    pub text: String,
}

/// Classifies a rendered `<svg>`: the `aria-roledescription` Mermaid stamps on its root wins,
/// otherwise the kind is guessed from characteristic element classes and ids.
pub fn detect_kind(svg: &Element) -> Option<DiagramKind> {
    if let Some(kind) = svg
        .attr("aria-roledescription")
        .and_then(DiagramKind::from_role_description)
    {
        return Some(kind);
    }
    for class in svg.classes() {
        match class {
            "flowchart" => return Some(DiagramKind::Flowchart),
            "classDiagram" => return Some(DiagramKind::Class),
            "statediagram" => return Some(DiagramKind::State),
            _ => {}
        }
    }

    for el in std::iter::once(svg).chain(svg.descendants()) {
        let id = el.id().unwrap_or_default();
        if el.has_class("node") && id.starts_with("flowchart-") {
            return Some(DiagramKind::Flowchart);
        }
        if el.has_class("node") && id.starts_with("classId-") {
            return Some(DiagramKind::Class);
        }
        if el.has_class("statediagram-state") || el.has_class("state-start") {
            return Some(DiagramKind::State);
        }
        if (el.is("text") && el.has_class("actor"))
            || el.has_class("messageLine0")
            || el.has_class("messageLine1")
        {
            return Some(DiagramKind::Sequence);
        }
    }
    None
}

/// Detects the diagram kind and runs the matching recoverer.
pub fn recover(svg: &Element, options: &RecoveryOptions) -> Result<Option<RecoveredDiagram>> {
    let Some(kind) = detect_kind(svg) else {
        tracing::debug!("svg does not look like a supported diagram");
        return Ok(None);
    };
    recover_as(kind, svg, options)
}

pub fn recover_as(
    kind: DiagramKind,
    svg: &Element,
    options: &RecoveryOptions,
) -> Result<Option<RecoveredDiagram>> {
    let text = match kind {
        DiagramKind::Flowchart => flowchart::recover_flowchart(svg, options)?,
        DiagramKind::Class => class::recover_class_diagram(svg, options)?,
        DiagramKind::Sequence => sequence::recover_sequence_diagram(svg, options)?,
        DiagramKind::State => state::recover_state_diagram(svg, options)?,
    };
    if text.is_none() {
        tracing::debug!(%kind, "no diagram structure recovered");
    }
    Ok(text.map(|text| RecoveredDiagram { kind, text }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_description_wins_over_structure() {
        let svg = Element::new("svg")
            .with_attr("aria-roledescription", "sequence")
            .with_child(
                Element::new("g")
                    .with_attr("class", "node")
                    .with_attr("id", "flowchart-A-0"),
            );
        assert_eq!(detect_kind(&svg), Some(DiagramKind::Sequence));
    }

    #[test]
    fn structure_is_used_without_role_description() {
        let flow = Element::new("svg").with_child(
            Element::new("g")
                .with_attr("class", "node default")
                .with_attr("id", "flowchart-A-0"),
        );
        assert_eq!(detect_kind(&flow), Some(DiagramKind::Flowchart));

        let class = Element::new("svg").with_child(
            Element::new("g")
                .with_attr("class", "node default")
                .with_attr("id", "classId-Animal-0"),
        );
        assert_eq!(detect_kind(&class), Some(DiagramKind::Class));

        let seq = Element::new("svg").with_child(
            Element::new("text").with_attr("class", "actor actor-box").with_text("Alice"),
        );
        assert_eq!(detect_kind(&seq), Some(DiagramKind::Sequence));

        let icon = Element::new("svg").with_child(Element::new("path").with_attr("d", "M0 0L1 1"));
        assert_eq!(detect_kind(&icon), None);
    }

    #[test]
    fn unknown_svg_recovers_nothing() {
        let icon = Element::new("svg").with_child(Element::new("circle").with_attr("r", "4"));
        assert!(recover(&icon, &RecoveryOptions::default()).unwrap().is_none());
    }
}
