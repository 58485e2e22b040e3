//! State-diagram recovery.
//!
//! Transition paths carry no usable endpoint ids, so both ends are matched geometrically: a
//! transition connects the state boxes its path starts and ends on.

use crate::Result;
use crate::ids::element_name;
use crate::labels::{EdgeLabel, connectors, edge_labels, nearest_label};
use crate::text::{is_plain_identifier, quoted_label, single_line, to_identifier};
use std::fmt::Write as _;
use wikidown_core::geom::{BBox, has_area, nearest_box};
use wikidown_core::{Element, RecoveryOptions};

/// Name of the start/end pseudostates.
pub const SENTINEL: &str = "[*]";

const STATE_ID_PREFIXES: &[&str] = &["state-"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Normal,
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateNode {
    /// State id, or [`SENTINEL`] for start/end markers.
    pub id: String,
    pub label: String,
    pub kind: StateKind,
    pub bbox: BBox,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateDiagram {
    pub states: Vec<StateNode>,
    pub transitions: Vec<Transition>,
}

pub fn recover_state_diagram(svg: &Element, options: &RecoveryOptions) -> Result<Option<String>> {
    let diagram = StateDiagram::extract(svg, options);
    let has_states = diagram.states.iter().any(|s| s.kind == StateKind::Normal);
    if !has_states && diagram.transitions.is_empty() {
        return Ok(None);
    }
    diagram.to_mermaid().map(Some)
}

impl StateDiagram {
    pub fn extract(svg: &Element, options: &RecoveryOptions) -> Self {
        let states = collect_states(svg);
        let labels = edge_labels(svg);
        let mut transitions: Vec<Transition> = Vec::new();

        for connector in connectors(svg) {
            let boxes = || states.iter().map(|s| s.bbox);
            let ends = nearest_box(connector.start(), boxes())
                .zip(nearest_box(connector.end(), boxes()));
            let Some(((from, d_from), (to, d_to))) = ends else {
                continue;
            };
            if d_from > options.state_endpoint_tolerance
                || d_to > options.state_endpoint_tolerance
            {
                tracing::debug!(
                    id = connector.id(),
                    d_from,
                    d_to,
                    "transition does not touch two states; skipping"
                );
                continue;
            }
            let (from, to) = (&states[from], &states[to]);
            if from.id == to.id {
                continue;
            }

            let label = transition_label(connector.id(), connector.midpoint(), &labels, options);
            let transition = Transition {
                from: from.id.clone(),
                to: to.id.clone(),
                label,
            };
            if !transitions.contains(&transition) {
                transitions.push(transition);
            }
        }
        StateDiagram {
            states,
            transitions,
        }
    }

    pub fn to_mermaid(&self) -> Result<String> {
        let mut out = String::from("stateDiagram-v2\n");
        let mut declared: Vec<&str> = Vec::new();
        for state in self.states.iter().filter(|s| s.kind == StateKind::Normal) {
            if declared.contains(&state.id.as_str()) {
                continue;
            }
            declared.push(&state.id);
            if state.label != state.id {
                writeln!(out, "    state \"{}\" as {}", quoted_label(&state.label), state.id)?;
            }
        }
        for t in &self.transitions {
            write!(out, "    {} --> {}", t.from, t.to)?;
            match &t.label {
                Some(label) => writeln!(out, " : {}", single_line(label))?,
                None => writeln!(out)?,
            }
        }
        for id in declared {
            let connected = self.transitions.iter().any(|t| t.from == id || t.to == id);
            let has_declaration = self
                .states
                .iter()
                .any(|s| s.id == id && s.label != s.id);
            if !connected && !has_declaration {
                writeln!(out, "    {id}")?;
            }
        }
        Ok(out)
    }
}

fn transition_label(
    id: Option<&str>,
    midpoint: wikidown_core::geom::Point,
    labels: &[EdgeLabel],
    options: &RecoveryOptions,
) -> Option<String> {
    match id.and_then(|id| labels.iter().find(|l| l.edge_id.as_deref() == Some(id))) {
        Some(l) => (!l.text.is_empty()).then(|| l.text.clone()),
        None => nearest_label(labels, id, midpoint, options.state_label_distance)
            .map(|i| labels[i].text.clone()),
    }
}

fn sentinel_kind(el: &Element) -> Option<StateKind> {
    if el.has_class("state-start") || el.find_class("state-start").is_some() {
        return Some(StateKind::Start);
    }
    if el.has_class("state-end") || el.find_class("state-end").is_some() {
        return Some(StateKind::End);
    }
    if el.has_class("statediagram-state") {
        return None;
    }
    let id = el.id().unwrap_or_default();
    let name = element_name(id, STATE_ID_PREFIXES).unwrap_or(id);
    if name.ends_with("_start") {
        return Some(StateKind::Start);
    }
    if name.ends_with("_end") {
        return Some(StateKind::End);
    }
    // An unlabeled default node drawn as nested paths is the end marker (bullseye).
    let paths = el.descendants().filter(|d| d.is("path")).count();
    if el.has_class("default") && paths >= 2 && el.label_text().is_empty() {
        return Some(StateKind::End);
    }
    None
}

fn collect_states(svg: &Element) -> Vec<StateNode> {
    let mut out = Vec::new();
    for el in svg.descendants().filter(|el| el.is("g") && el.has_class("node")) {
        let frame = el
            .find_class("label-container")
            .and_then(|c| c.bbox)
            .or(el.bbox);
        let Some(bbox) = frame.filter(has_area) else {
            tracing::debug!(id = el.id(), "skipping zero-area state");
            continue;
        };

        if let Some(kind) = sentinel_kind(el) {
            out.push(StateNode {
                id: SENTINEL.to_string(),
                label: SENTINEL.to_string(),
                kind,
                bbox,
            });
            continue;
        }
        if !el.has_class("statediagram-state") {
            continue;
        }
        let Some(name) = el.id().and_then(|id| element_name(id, STATE_ID_PREFIXES)) else {
            continue;
        };
        let label = el
            .find_class("nodeLabel")
            .map(Element::label_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| el.label_text());
        let id = if is_plain_identifier(name) {
            name.to_string()
        } else {
            to_identifier(name)
        };
        out.push(StateNode {
            label: if label.is_empty() { name.to_string() } else { label },
            id,
            kind: StateKind::Normal,
            bbox,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikidown_core::geom::bbox;

    fn state(id: &str, label: &str, kind: StateKind) -> StateNode {
        StateNode {
            id: id.to_string(),
            label: label.to_string(),
            kind,
            bbox: bbox(0.0, 0.0, 10.0, 10.0),
        }
    }

    #[test]
    fn declarations_transitions_and_standalone_states() {
        let diagram = StateDiagram {
            states: vec![
                state(SENTINEL, SENTINEL, StateKind::Start),
                state("Idle", "Idle", StateKind::Normal),
                state("Busy", "Working hard", StateKind::Normal),
                state("Orphan", "Orphan", StateKind::Normal),
            ],
            transitions: vec![
                Transition { from: SENTINEL.into(), to: "Idle".into(), label: None },
                Transition { from: "Idle".into(), to: "Busy".into(), label: Some("go".into()) },
            ],
        };
        assert_eq!(
            diagram.to_mermaid().unwrap(),
            "stateDiagram-v2\n    state \"Working hard\" as Busy\n    [*] --> Idle\n    Idle --> Busy : go\n    Orphan\n"
        );
    }

    #[test]
    fn sentinels_are_recognized_by_class_and_id() {
        let start = Element::new("g")
            .with_attr("class", "node default")
            .with_child(Element::new("circle").with_attr("class", "state-start"));
        assert_eq!(sentinel_kind(&start), Some(StateKind::Start));

        let end = Element::new("g")
            .with_attr("class", "node default")
            .with_attr("id", "state-root_end-3");
        assert_eq!(sentinel_kind(&end), Some(StateKind::End));

        let bullseye = Element::new("g").with_attr("class", "node default").with_child(
            Element::new("g")
                .with_child(Element::new("path").with_attr("d", "M0 0"))
                .with_child(Element::new("path").with_attr("d", "M1 1")),
        );
        assert_eq!(sentinel_kind(&bullseye), Some(StateKind::End));

        let plain = Element::new("g").with_attr("class", "node statediagram-state");
        assert_eq!(sentinel_kind(&plain), None);
    }
}
