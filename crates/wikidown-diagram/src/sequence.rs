//! Sequence-diagram recovery.
//!
//! Participants are the `text.actor` labels (top and bottom copies collapse by name). Message
//! arrows (`messageLine0` solid, `messageLine1` dashed) and message texts (`text.messageText`)
//! are collected independently and paired by vertical order: the i-th arrow from the top takes
//! the i-th text from the top. Blocks (`loop`, `alt`, ...) come from the `loopLine` frames.

use crate::Result;
use crate::labels::{Connector, is_dashed, marker_ref};
use crate::text::{is_plain_identifier, single_line, to_identifier};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::Write as _;
use wikidown_core::geom::{BBox, Point, box_union};
use wikidown_core::{Element, RecoveryOptions};

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    /// Identifier used in message lines.
    pub id: String,
    /// Display name as rendered.
    pub name: String,
    pub x: f64,
    /// Rendered as a stick figure (`actor`) rather than a box.
    pub is_actor: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub text: String,
    pub dashed: bool,
    /// Arrowhead part of the operator: `>>`, `x`, `)` or `>`.
    pub head: &'static str,
    pub y: f64,
    pub self_message: bool,
}

impl Message {
    pub fn operator(&self) -> String {
        format!("{}{}", if self.dashed { "--" } else { "-" }, self.head)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotePlacement {
    Over(Vec<String>),
    LeftOf(String),
    RightOf(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceNote {
    pub text: String,
    pub placement: NotePlacement,
    pub y: f64,
}

/// A framed region (`loop`, `alt`, `opt`, `par`, `critical`, `break`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub keyword: String,
    pub label: String,
    pub top: f64,
    pub bottom: f64,
    /// Follow-on sections (`else` / `and` / `option`) with their vertical position.
    pub sections: Vec<(f64, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceDiagram {
    pub participants: Vec<Participant>,
    pub messages: Vec<Message>,
    pub notes: Vec<SequenceNote>,
    pub blocks: Vec<Block>,
}

pub fn recover_sequence_diagram(
    svg: &Element,
    options: &RecoveryOptions,
) -> Result<Option<String>> {
    let diagram = SequenceDiagram::extract(svg, options);
    if diagram.participants.is_empty() {
        return Ok(None);
    }
    diagram.to_mermaid().map(Some)
}

/// A message arrow before it is paired with its text.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageLine {
    pub start: Point,
    pub end: Point,
    pub dashed: bool,
    pub head: &'static str,
    pub self_message: bool,
}

/// Pairs arrows with texts by ascending vertical position. Extra arrows get an empty text;
/// extra texts are ignored.
pub fn pair_messages(
    mut lines: Vec<MessageLine>,
    mut texts: Vec<(f64, String)>,
) -> Vec<(MessageLine, String)> {
    lines.sort_by(|a, b| a.start.y.total_cmp(&b.start.y));
    texts.sort_by(|a, b| a.0.total_cmp(&b.0));
    if lines.len() != texts.len() {
        tracing::debug!(
            lines = lines.len(),
            texts = texts.len(),
            "message arrow and text counts differ"
        );
    }
    let mut texts = texts.into_iter().map(|(_, t)| t);
    lines
        .into_iter()
        .map(|line| {
            let text = texts.next().unwrap_or_default();
            (line, text)
        })
        .collect()
}

impl SequenceDiagram {
    pub fn extract(svg: &Element, options: &RecoveryOptions) -> Self {
        let participants = collect_participants(svg);
        let mut diagram = SequenceDiagram {
            participants,
            messages: Vec::new(),
            notes: Vec::new(),
            blocks: collect_blocks(svg),
        };
        if diagram.participants.is_empty() {
            return diagram;
        }

        let lines = collect_message_lines(svg, options);
        let texts = collect_message_texts(svg);
        for (line, text) in pair_messages(lines, texts) {
            let from = diagram.nearest_participant(line.start.x);
            let to = if line.self_message {
                from.clone()
            } else {
                diagram.nearest_participant(line.end.x)
            };
            diagram.messages.push(Message {
                from,
                to,
                text,
                dashed: line.dashed,
                head: line.head,
                y: line.start.y,
                self_message: line.self_message,
            });
        }

        diagram.notes = collect_note_boxes(svg)
            .into_iter()
            .map(|(text, b)| SequenceNote {
                placement: diagram.note_placement(&b),
                text,
                y: b.min.y,
            })
            .collect();
        diagram
    }

    fn nearest_participant(&self, x: f64) -> String {
        self.participants
            .iter()
            .min_by(|a, b| (a.x - x).abs().total_cmp(&(b.x - x).abs()))
            .map(|p| p.id.clone())
            .unwrap_or_default()
    }

    fn note_placement(&self, b: &BBox) -> NotePlacement {
        let over: Vec<&Participant> = self
            .participants
            .iter()
            .filter(|p| p.x >= b.min.x && p.x <= b.max.x)
            .collect();
        match over.as_slice() {
            [] => {
                let cx = (b.min.x + b.max.x) / 2.0;
                let id = self.nearest_participant(cx);
                let px = self
                    .participants
                    .iter()
                    .find(|p| p.id == id)
                    .map_or(cx, |p| p.x);
                if cx < px {
                    NotePlacement::LeftOf(id)
                } else {
                    NotePlacement::RightOf(id)
                }
            }
            [only] => NotePlacement::Over(vec![only.id.clone()]),
            [first, .., last] => NotePlacement::Over(vec![first.id.clone(), last.id.clone()]),
        }
    }

    pub fn to_mermaid(&self) -> Result<String> {
        let mut out = String::from("sequenceDiagram\n");
        for p in &self.participants {
            let keyword = if p.is_actor { "actor" } else { "participant" };
            if p.id == p.name {
                writeln!(out, "    {keyword} {}", p.id)?;
            } else {
                writeln!(out, "    {keyword} {} as {}", p.id, single_line(&p.name))?;
            }
        }

        let mut events: Vec<Event<'_>> = Vec::new();
        events.extend(self.messages.iter().map(|m| Event::Message(m.y, m)));
        events.extend(self.notes.iter().map(|n| Event::Note(n.y, n)));
        for block in &self.blocks {
            events.push(Event::Start(block.top, block));
            for (y, label) in &block.sections {
                events.push(Event::Section(*y, block, label));
            }
            events.push(Event::End(block.bottom));
        }
        events.sort_by(|a, b| a.y().total_cmp(&b.y()).then(a.rank().cmp(&b.rank())));

        let mut depth = 1usize;
        for event in events {
            match event {
                Event::Start(_, block) => {
                    writeln!(out, "{}{}", indent(depth), header(&block.keyword, &block.label))?;
                    depth += 1;
                }
                Event::Section(_, block, label) => {
                    let keyword = section_keyword(&block.keyword);
                    writeln!(
                        out,
                        "{}{}",
                        indent(depth.saturating_sub(1).max(1)),
                        header(keyword, label)
                    )?;
                }
                Event::End(_) => {
                    if depth > 1 {
                        depth -= 1;
                        writeln!(out, "{}end", indent(depth))?;
                    }
                }
                Event::Message(_, m) => {
                    let line = format!(
                        "{}{}{}: {}",
                        m.from,
                        m.operator(),
                        m.to,
                        single_line(&m.text)
                    );
                    writeln!(out, "{}{}", indent(depth), line.trim_end())?;
                }
                Event::Note(_, n) => {
                    let place = match &n.placement {
                        NotePlacement::Over(ids) => format!("over {}", ids.join(",")),
                        NotePlacement::LeftOf(id) => format!("left of {id}"),
                        NotePlacement::RightOf(id) => format!("right of {id}"),
                    };
                    writeln!(out, "{}Note {place}: {}", indent(depth), single_line(&n.text))?;
                }
            }
        }
        Ok(out)
    }
}

enum Event<'a> {
    Start(f64, &'a Block),
    Section(f64, &'a Block, &'a str),
    Message(f64, &'a Message),
    Note(f64, &'a SequenceNote),
    End(f64),
}

impl Event<'_> {
    fn y(&self) -> f64 {
        match self {
            Event::Start(y, _)
            | Event::Section(y, _, _)
            | Event::Message(y, _)
            | Event::Note(y, _)
            | Event::End(y) => *y,
        }
    }

    /// Frame openings sort before, and closings after, events at the same height.
    fn rank(&self) -> u8 {
        match self {
            Event::Start(..) => 0,
            Event::Section(..) => 1,
            Event::Message(..) | Event::Note(..) => 2,
            Event::End(..) => 3,
        }
    }
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn header(keyword: &str, label: &str) -> String {
    if label.is_empty() {
        keyword.to_string()
    } else {
        format!("{keyword} {}", single_line(label))
    }
}

fn section_keyword(block_keyword: &str) -> &'static str {
    match block_keyword {
        "par" => "and",
        "critical" => "option",
        _ => "else",
    }
}

fn collect_participants(svg: &Element) -> Vec<Participant> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut out: Vec<Participant> = Vec::new();
    for el in svg
        .descendants()
        .filter(|el| el.is("text") && el.has_class("actor"))
    {
        let name = el.label_text();
        if name.is_empty() || seen.contains(&name) {
            continue;
        }
        let x = el.to_root(el.number_attr("x").unwrap_or(0.0), 0.0).x;
        seen.insert(name.clone());
        out.push(Participant {
            id: String::new(),
            name,
            x,
            is_actor: el.has_class("actor-man"),
        });
    }
    out.sort_by(|a, b| a.x.total_cmp(&b.x));

    let mut used: FxHashMap<String, usize> = FxHashMap::default();
    for p in &mut out {
        let base = if is_plain_identifier(&p.name) {
            p.name.clone()
        } else {
            to_identifier(&p.name)
        };
        let n = used.entry(base.clone()).or_insert(0);
        *n += 1;
        p.id = if *n == 1 { base } else { format!("{base}_{n}") };
    }
    out
}

fn message_head(el: &Element) -> &'static str {
    match marker_ref(el, "marker-end") {
        Some(m) if m.contains("crosshead") => "x",
        Some(m) if m.contains("filled-head") => ")",
        Some(m) if m.contains("arrowhead") => ">>",
        _ => ">",
    }
}

fn collect_message_lines(svg: &Element, options: &RecoveryOptions) -> Vec<MessageLine> {
    let mut out = Vec::new();
    for el in svg
        .descendants()
        .filter(|el| el.has_class("messageLine0") || el.has_class("messageLine1"))
    {
        let (start, end) = if el.is("line") {
            let n = |name: &str| el.number_attr(name).unwrap_or(0.0);
            (el.to_root(n("x1"), n("y1")), el.to_root(n("x2"), n("y2")))
        } else if let Some(c) = Connector::from_path(el) {
            (c.start(), c.end())
        } else {
            tracing::trace!("skipping message arrow without geometry");
            continue;
        };
        let self_message =
            el.is("path") && (start.x - end.x).abs() <= options.sequence_self_message_tolerance;
        out.push(MessageLine {
            start,
            end,
            dashed: is_dashed(el),
            head: message_head(el),
            self_message,
        });
    }
    out
}

fn collect_message_texts(svg: &Element) -> Vec<(f64, String)> {
    svg.descendants()
        .filter(|el| el.is("text") && el.has_class("messageText"))
        .map(|el| {
            let y = el
                .to_root(
                    el.number_attr("x").unwrap_or(0.0),
                    el.number_attr("y").unwrap_or(0.0),
                )
                .y;
            (y, el.label_text())
        })
        .collect()
}

/// `rect.note` boxes with the `text.noteText` label of the same group.
fn collect_note_boxes(svg: &Element) -> Vec<(String, BBox)> {
    let mut out = Vec::new();
    for parent in std::iter::once(svg).chain(svg.descendants()) {
        let Some(rect) = parent
            .element_children()
            .find(|c| c.has_class("note") && c.bbox.is_some())
        else {
            continue;
        };
        let text: Vec<String> = parent
            .element_children()
            .filter(|c| c.has_class("noteText"))
            .map(Element::label_text)
            .filter(|t| !t.is_empty())
            .collect();
        if let (Some(b), false) = (rect.bbox, text.is_empty()) {
            out.push((text.join("\n"), b));
        }
    }
    out
}

fn strip_brackets(s: &str) -> String {
    let t = s.trim();
    t.strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(t)
        .trim()
        .to_string()
}

/// One frame per group holding `loopLine` borders.
fn collect_blocks(svg: &Element) -> Vec<Block> {
    let mut out = Vec::new();
    for group in std::iter::once(svg).chain(svg.descendants()) {
        let lines: Vec<&Element> = group
            .element_children()
            .filter(|c| c.has_class("loopLine"))
            .collect();
        let Some(frame) = lines
            .iter()
            .filter_map(|l| l.bbox)
            .reduce(|a, b| box_union(&a, &b))
        else {
            continue;
        };

        let keyword = group
            .element_children()
            .find(|c| c.has_class("labelText"))
            .map(Element::label_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "loop".to_string());

        let mut texts: Vec<(f64, String)> = group
            .element_children()
            .filter(|c| c.has_class("loopText"))
            .map(|c| {
                let y = c.bbox.map_or_else(|| c.to_root(0.0, 0.0).y, |b| b.min.y);
                (y, strip_brackets(&c.label_text()))
            })
            .collect();
        texts.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut texts = texts.into_iter();
        let label = texts.next().map(|(_, t)| t).unwrap_or_default();

        out.push(Block {
            keyword,
            label,
            top: frame.min.y,
            bottom: frame.max.y,
            sections: texts.collect(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikidown_core::geom::point;

    fn line(y: f64) -> MessageLine {
        MessageLine {
            start: point(0.0, y),
            end: point(100.0, y),
            dashed: false,
            head: ">>",
            self_message: false,
        }
    }

    #[test]
    fn arrows_and_texts_pair_by_vertical_order() {
        let pairs = pair_messages(
            vec![line(200.0), line(100.0)],
            vec![(180.0, "second".to_string()), (80.0, "first".to_string())],
        );
        let got: Vec<(f64, &str)> = pairs.iter().map(|(l, t)| (l.start.y, t.as_str())).collect();
        assert_eq!(got, vec![(100.0, "first"), (200.0, "second")]);

        let swapped = pair_messages(
            vec![line(200.0), line(100.0)],
            vec![(80.0, "second".to_string()), (180.0, "first".to_string())],
        );
        assert_eq!(swapped[0].1, "second");
        assert_eq!(swapped[1].1, "first");
    }

    #[test]
    fn surplus_arrows_get_empty_text() {
        let pairs = pair_messages(vec![line(1.0), line(2.0)], vec![(0.0, "only".to_string())]);
        assert_eq!(pairs[0].1, "only");
        assert_eq!(pairs[1].1, "");
        assert_eq!(pair_messages(vec![], vec![(0.0, "x".to_string())]).len(), 0);
    }

    #[test]
    fn operators_combine_line_and_head() {
        let mut m = Message {
            from: "A".into(),
            to: "B".into(),
            text: String::new(),
            dashed: true,
            head: ">>",
            y: 0.0,
            self_message: false,
        };
        assert_eq!(m.operator(), "-->>");
        m.dashed = false;
        m.head = "x";
        assert_eq!(m.operator(), "-x");
    }

    #[test]
    fn brackets_are_stripped_from_block_labels() {
        assert_eq!(strip_brackets(" [Every minute] "), "Every minute");
        assert_eq!(strip_brackets("plain"), "plain");
    }
}
