//! Escaping of recovered labels and identifiers for Mermaid source.

use regex::Regex;
use std::sync::OnceLock;

fn plain_identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

pub(crate) fn is_plain_identifier(s: &str) -> bool {
    plain_identifier_regex().is_match(s)
}

/// Turns arbitrary text into an identifier Mermaid accepts unquoted.
pub(crate) fn to_identifier(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.trim().chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let out = out.trim_matches('_').to_string();
    match out.chars().next() {
        None => "_".to_string(),
        Some(c) if c.is_ascii_digit() => format!("_{out}"),
        Some(_) => out,
    }
}

/// Label text for a quoted flowchart/state label: quotes become the `#quot;` entity and line
/// breaks become `<br/>`.
pub(crate) fn quoted_label(s: &str) -> String {
    s.replace('"', "#quot;").replace('\n', "<br/>")
}

/// Label text that has to stay on one source line (messages, relation labels, notes).
pub(crate) fn single_line(s: &str) -> String {
    s.replace('\n', "<br/>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_made_mermaid_safe() {
        assert!(is_plain_identifier("Alice_2"));
        assert!(!is_plain_identifier("Alice Smith"));
        assert!(!is_plain_identifier("2fa"));
        assert_eq!(to_identifier("Alice Smith"), "Alice_Smith");
        assert_eq!(to_identifier("  web-server (v2) "), "web_server_v2");
        assert_eq!(to_identifier("2fa"), "_2fa");
        assert_eq!(to_identifier("!!"), "_");
    }

    #[test]
    fn quotes_and_breaks_are_escaped() {
        assert_eq!(quoted_label("say \"hi\"\nnow"), "say #quot;hi#quot;<br/>now");
        assert_eq!(single_line("a\nb"), "a<br/>b");
    }
}
