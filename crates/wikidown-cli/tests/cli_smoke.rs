use assert_cmd::prelude::*;
use std::fs;
use std::process::Command;

const PAGE: &str = r#"<html><head><title>Snapshot</title></head><body>
<nav>Contents</nav>
<div class="prose">
<h1>Overview</h1>
<p>See <a href="src/main.rs#L3-L9">Sources: [main.rs:3]</a></p>
<table><thead><tr><th>Name</th><th>Age</th></tr></thead><tbody><tr><td>Alice</td><td>30</td></tr></tbody></table>
</div>
</body></html>"#;

const STATE_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" aria-roledescription="stateDiagram">
<g class="root"><g class="nodes">
<g class="node statediagram-state" id="state-Idle-0" transform="translate(50, 50)"><rect x="-30" y="-15" width="60" height="30"/><g class="label"><text>Idle</text></g></g>
</g></g></svg>"#;

fn wikidown() -> Command {
    Command::new(assert_cmd::cargo_bin!("wikidown"))
}

#[test]
fn cli_converts_page_snapshot_to_markdown() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let page = tmp.path().join("page.xhtml");
    fs::write(&page, PAGE).expect("write snapshot");

    let output = wikidown()
        .arg(page.to_string_lossy().as_ref())
        .output()
        .expect("run wikidown");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
    assert_eq!(
        stdout,
        "# Overview\n\nSee Sources: [main.rs L3-L9](src/main.rs#L3-L9)\n\n| Name | Age |\n| --- | --- |\n| Alice | 30 |\n"
    );
}

#[test]
fn cli_prints_json_with_title() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let page = tmp.path().join("page.xhtml");
    fs::write(&page, PAGE).expect("write snapshot");

    let output = wikidown()
        .args(["--json", page.to_string_lossy().as_ref()])
        .output()
        .expect("run wikidown");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(value["title"], "Overview");
    assert!(
        value["markdown"]
            .as_str()
            .is_some_and(|md| md.starts_with("# Overview\n"))
    );
}

#[test]
fn cli_recovers_a_single_diagram() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let svg = tmp.path().join("state.svg");
    fs::write(&svg, STATE_SVG).expect("write svg");

    wikidown()
        .args(["detect", svg.to_string_lossy().as_ref()])
        .assert()
        .success()
        .stdout("stateDiagram-v2\n");

    let output = wikidown()
        .args(["diagram", svg.to_string_lossy().as_ref()])
        .output()
        .expect("run wikidown");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
    assert!(stdout.starts_with("stateDiagram-v2\n"));
    assert!(stdout.contains("Idle"));
}

#[test]
fn cli_exit_codes() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let icon = tmp.path().join("icon.svg");
    fs::write(&icon, r#"<svg xmlns="http://www.w3.org/2000/svg"><path d="M0,0L1,1"/></svg>"#)
        .expect("write svg");
    wikidown()
        .args(["diagram", icon.to_string_lossy().as_ref()])
        .assert()
        .code(3);

    wikidown().arg("--bogus").assert().code(2);

    let broken = tmp.path().join("broken.xhtml");
    fs::write(&broken, "<div><p>unclosed</div>").expect("write snapshot");
    wikidown()
        .arg(broken.to_string_lossy().as_ref())
        .assert()
        .code(1);
}
