//! Decoding of the ids Mermaid generates for rendered elements.

use regex::Regex;
use std::sync::OnceLock;

fn trailing_counter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-_]\d+$").expect("valid regex"))
}

/// Drops a generated trailing counter (`-0`, `_12`).
pub(crate) fn strip_counter(id: &str) -> &str {
    match trailing_counter_regex().find(id) {
        Some(m) if m.start() > 0 => &id[..m.start()],
        _ => id,
    }
}

/// Extracts the user-facing identifier from a generated element id: the first matching prefix is
/// removed, then the trailing counter. `flowchart-A-0` with prefix `flowchart-` yields `A`.
pub(crate) fn element_name<'a>(id: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    let rest = prefixes
        .iter()
        .find_map(|p| id.strip_prefix(p))
        .unwrap_or(id);
    let name = match trailing_counter_regex().find(rest) {
        Some(m) => &rest[..m.start()],
        None => rest,
    };
    (!name.is_empty()).then_some(name)
}

/// Splits the name portion of a connector id into `(source, target)`.
///
/// Connector ids concatenate both endpoint ids (`L_A_B_0`, `id_Animal_Dog_1`). Every split point
/// is tried from left to right; at each one a single `_`/`-` separator is dropped from either side
/// when present. The first split where both halves are known identifiers wins.
pub(crate) fn split_connector<F>(name: &str, is_known: F) -> Option<(String, String)>
where
    F: Fn(&str) -> bool,
{
    for (i, _) in name.char_indices().skip(1) {
        let (left, right) = name.split_at(i);
        let lefts = [left.strip_suffix(['_', '-']), Some(left)];
        let rights = [right.strip_prefix(['_', '-']), Some(right)];
        for l in lefts.into_iter().flatten() {
            for r in rights.iter().copied().flatten() {
                if !l.is_empty() && !r.is_empty() && is_known(l) && is_known(r) {
                    return Some((l.to_string(), r.to_string()));
                }
            }
        }
    }
    None
}

/// Name portion of a connector id: prefix and trailing counter removed.
pub(crate) fn connector_name<'a>(id: &'a str, prefixes: &[&str]) -> &'a str {
    let rest = prefixes
        .iter()
        .find_map(|p| id.strip_prefix(p))
        .unwrap_or(id);
    strip_counter(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known<'a>(names: &'a [&'a str]) -> impl Fn(&str) -> bool + 'a {
        move |s: &str| names.iter().any(|n| *n == s)
    }

    #[test]
    fn element_names_lose_prefix_and_counter() {
        assert_eq!(element_name("flowchart-A-0", &["flowchart-"]), Some("A"));
        assert_eq!(element_name("flowchart-my-node-12", &["flowchart-"]), Some("my-node"));
        assert_eq!(element_name("classId-Animal-3", &["classId-"]), Some("Animal"));
        assert_eq!(element_name("state-Idle-1", &["state-"]), Some("Idle"));
        assert_eq!(element_name("flowchart--0", &["flowchart-"]), None);
        assert_eq!(element_name("Plain", &["flowchart-"]), Some("Plain"));
    }

    #[test]
    fn split_prefers_the_point_where_both_halves_are_known() {
        let names = ["A", "A1", "B2"];
        assert_eq!(
            split_connector("A1B2", known(&names)),
            Some(("A1".to_string(), "B2".to_string()))
        );
    }

    #[test]
    fn split_handles_separators_and_underscored_ids() {
        let names = ["my_node", "B", "Animal", "Dog"];
        assert_eq!(
            split_connector(connector_name("L_my_node_B_0", &["L_", "L-"]), known(&names)),
            Some(("my_node".to_string(), "B".to_string()))
        );
        assert_eq!(
            split_connector(connector_name("id_Animal_Dog_1", &["id_"]), known(&names)),
            Some(("Animal".to_string(), "Dog".to_string()))
        );
        assert_eq!(split_connector("Cat_Dog", known(&names)), None);
    }
}
