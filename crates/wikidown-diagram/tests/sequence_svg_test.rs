use wikidown_core::{RecoveryOptions, parse_document};
use wikidown_diagram::sequence::{NotePlacement, SequenceDiagram};
use wikidown_diagram::{DiagramKind, recover};

const SEQUENCE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" id="my-svg" aria-roledescription="sequence">
<g><rect x="0" y="0" width="150" height="65" class="actor actor-top"/><text x="75" y="32.5" dominant-baseline="central" class="actor actor-box" style="text-anchor: middle;"><tspan x="75" dy="0">Alice</tspan></text></g>
<g><rect x="200" y="0" width="150" height="65" class="actor actor-top"/><text x="275" y="32.5" dominant-baseline="central" class="actor actor-box" style="text-anchor: middle;"><tspan x="275" dy="0">Bob Smith</tspan></text></g>
<g><rect x="0" y="370" width="150" height="65" class="actor actor-bottom"/><text x="75" y="402.5" dominant-baseline="central" class="actor actor-box" style="text-anchor: middle;"><tspan x="75" dy="0">Alice</tspan></text></g>
<g><rect x="200" y="370" width="150" height="65" class="actor actor-bottom"/><text x="275" y="402.5" dominant-baseline="central" class="actor actor-box" style="text-anchor: middle;"><tspan x="275" dy="0">Bob Smith</tspan></text></g>
<text x="175" y="80" text-anchor="middle" dominant-baseline="middle" alignment-baseline="middle" class="messageText" dy="1em" style="font-size: 16px;">Hello Bob</text>
<line x1="76" y1="110" x2="271" y2="110" class="messageLine0" stroke-width="2" stroke="none" marker-end="url(#arrowhead)" style="fill: none;"/>
<text x="175" y="130" text-anchor="middle" dominant-baseline="middle" alignment-baseline="middle" class="messageText" dy="1em" style="font-size: 16px;">Hi</text>
<line x1="274" y1="160" x2="79" y2="160" class="messageLine1" stroke-width="2" stroke="none" marker-end="url(#arrowhead)" style="stroke-dasharray: 3, 3; fill: none;"/>
<g>
<line x1="50" y1="180" x2="300" y2="180" class="loopLine"/>
<line x1="300" y1="180" x2="300" y2="310" class="loopLine"/>
<line x1="50" y1="310" x2="300" y2="310" class="loopLine"/>
<line x1="50" y1="180" x2="50" y2="310" class="loopLine"/>
<polygon points="50,180 100,180 100,193 91.6,200 50,200" class="labelBox"/>
<text x="75" y="193" text-anchor="middle" dominant-baseline="middle" alignment-baseline="middle" class="labelText" style="font-size: 16px;">loop</text>
<text x="200" y="198" text-anchor="middle" class="loopText" style="font-size: 16px;"><tspan x="200">[Every minute]</tspan></text>
</g>
<g><rect x="40" y="200" fill="#EDF2AE" stroke="#666" width="70" height="30" class="note"/><text x="75" y="205" text-anchor="middle" dominant-baseline="middle" alignment-baseline="middle" class="noteText" dy="1em" style="font-size: 16px;"><tspan x="75">Ponder</tspan></text></g>
<text x="330" y="240" text-anchor="start" class="messageText" dy="1em" style="font-size: 16px;">think</text>
<path d="M 276,270 C 336,260 336,300 276,290" class="messageLine0" stroke-width="2" stroke="none" marker-end="url(#arrowhead)" style="fill: none;"/>
<g><rect x="50" y="330" fill="#EDF2AE" stroke="#666" width="250" height="30" class="note"/><text x="175" y="335" text-anchor="middle" class="noteText" dy="1em" style="font-size: 16px;"><tspan x="175">Done</tspan></text></g>
</svg>"##;

#[test]
fn messages_notes_and_loops_are_recovered_in_vertical_order() {
    let svg = parse_document(SEQUENCE).expect("fixture parses");
    let recovered = recover(&svg, &RecoveryOptions::default())
        .expect("recovery ok")
        .expect("sequence recognized");
    assert_eq!(recovered.kind, DiagramKind::Sequence);
    let expected = "\
sequenceDiagram
    participant Alice
    participant Bob_Smith as Bob Smith
    Alice->>Bob_Smith: Hello Bob
    Bob_Smith-->>Alice: Hi
    loop Every minute
        Note over Alice: Ponder
        Bob_Smith->>Bob_Smith: think
    end
    Note over Alice,Bob_Smith: Done
";
    assert_eq!(recovered.text, expected);
}

#[test]
fn top_and_bottom_actor_copies_collapse() {
    let svg = parse_document(SEQUENCE).expect("fixture parses");
    let diagram = SequenceDiagram::extract(&svg, &RecoveryOptions::default());
    let names: Vec<&str> = diagram.participants.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Bob Smith"]);

    let self_messages: Vec<_> = diagram.messages.iter().filter(|m| m.self_message).collect();
    assert_eq!(self_messages.len(), 1);
    assert_eq!(self_messages[0].from, "Bob_Smith");
    assert_eq!(self_messages[0].to, "Bob_Smith");

    assert_eq!(diagram.blocks.len(), 1);
    assert_eq!(diagram.blocks[0].keyword, "loop");
    assert_eq!(diagram.blocks[0].label, "Every minute");
    assert_eq!(
        diagram.notes[1].placement,
        NotePlacement::Over(vec!["Alice".to_string(), "Bob_Smith".to_string()])
    );
}

#[test]
fn note_beside_a_lifeline_is_placed_left_or_right() {
    let svg = parse_document(
        r#"<svg xmlns="http://www.w3.org/2000/svg" aria-roledescription="sequence">
<text x="100" y="30" class="actor actor-box">A</text>
<g><rect x="120" y="100" width="60" height="30" class="note"/><text x="150" y="115" class="noteText">right</text></g>
<g><rect x="10" y="150" width="60" height="30" class="note"/><text x="40" y="165" class="noteText">left</text></g>
</svg>"#,
    )
    .expect("fixture parses");
    let recovered = recover(&svg, &RecoveryOptions::default())
        .expect("recovery ok")
        .expect("sequence recognized");
    assert_eq!(
        recovered.text,
        "sequenceDiagram\n    participant A\n    Note right of A: right\n    Note left of A: left\n"
    );
}

#[test]
fn diagram_without_participants_recovers_nothing() {
    let svg = parse_document(
        r#"<svg xmlns="http://www.w3.org/2000/svg" aria-roledescription="sequence"><line class="messageLine0" x1="0" y1="0" x2="10" y2="0"/></svg>"#,
    )
    .expect("fixture parses");
    assert_eq!(recover(&svg, &RecoveryOptions::default()).expect("recovery ok"), None);
}
