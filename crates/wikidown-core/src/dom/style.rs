use serde::{Deserialize, Serialize};

/// The subset of computed style the converter consults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComputedStyle {
    pub display: Option<String>,
    pub visibility: Option<String>,
}

impl ComputedStyle {
    pub fn hidden() -> Self {
        Self {
            display: Some("none".to_string()),
            visibility: None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.display.as_deref() == Some("none")
            || matches!(self.visibility.as_deref(), Some("hidden" | "collapse"))
    }

    /// Resolves the style of an element from its inline declarations, inheriting `visibility`
    /// from `parent` (`display` does not inherit).
    pub(crate) fn resolve(
        parent: &ComputedStyle,
        decls: &[(String, String)],
        hidden_attr: bool,
    ) -> Self {
        let mut out = ComputedStyle {
            display: None,
            visibility: parent.visibility.clone(),
        };
        for (k, v) in decls {
            match k.as_str() {
                "display" => out.display = Some(v.clone()),
                "visibility" => out.visibility = Some(v.clone()),
                _ => {}
            }
        }
        if hidden_attr && out.display.is_none() {
            out.display = Some("none".to_string());
        }
        out
    }
}

/// Splits an inline `style` attribute into lower-cased `(property, value)` pairs. `!important`
/// suffixes are dropped.
pub(crate) fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim().to_ascii_lowercase();
            let v = v.trim().trim_end_matches("!important").trim().to_ascii_lowercase();
            if k.is_empty() || v.is_empty() {
                return None;
            }
            Some((k, v))
        })
        .collect()
}

pub(crate) fn declaration<'a>(decls: &'a [(String, String)], name: &str) -> Option<&'a str> {
    decls
        .iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_are_normalized() {
        let decls = parse_declarations("Display: NONE ; fill:#fff5ad !important;;bogus");
        assert_eq!(
            decls,
            vec![
                ("display".to_string(), "none".to_string()),
                ("fill".to_string(), "#fff5ad".to_string())
            ]
        );
        assert_eq!(declaration(&decls, "fill"), Some("#fff5ad"));
    }

    #[test]
    fn visibility_inherits_but_display_does_not() {
        let parent = ComputedStyle::resolve(
            &ComputedStyle::default(),
            &parse_declarations("display:none;visibility:hidden"),
            false,
        );
        assert!(parent.is_hidden());
        let child = ComputedStyle::resolve(&parent, &[], false);
        assert_eq!(child.display, None);
        assert_eq!(child.visibility.as_deref(), Some("hidden"));
        assert!(child.is_hidden());

        let shown =
            ComputedStyle::resolve(&parent, &parse_declarations("visibility: visible"), false);
        assert!(!shown.is_hidden());
        assert!(ComputedStyle::resolve(&ComputedStyle::default(), &[], true).is_hidden());
    }
}
