//! Guesses the language of an unlabeled code block.
//!
//! Every rule is a set of line-oriented patterns; the language with the most matching patterns
//! wins, earlier rules winning ties. A rule only counts once it reaches its own minimum number
//! of hits, so a single stray `=>` does not make prose look like JavaScript.

use regex::Regex;
use std::sync::OnceLock;

struct Rule {
    language: &'static str,
    min_hits: usize,
    patterns: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule {
        language: "mermaid",
        min_hits: 1,
        patterns: &[
            r"^\s*(flowchart|graph)\s+(TD|TB|BT|LR|RL)\b",
            r"^\s*(sequenceDiagram|classDiagram|stateDiagram(-v2)?|erDiagram|gantt|pie|journey|gitGraph|mindmap|timeline)\s*$",
        ],
    },
    Rule {
        language: "rust",
        min_hits: 2,
        patterns: &[
            r"^\s*(pub(\(crate\))?\s+)?fn\s+\w+",
            r"\blet\s+mut\s+\w+",
            r"^\s*impl(<[^>]*>)?\s+\w+",
            r"^\s*use\s+\w+(::\w+)+",
            r"^\s*#\[(derive|cfg|test)",
            r"->\s*(Result|Option|Self|&?str|String|u\d+|i\d+|bool)\b",
            r"^\s*(pub\s+)?(struct|enum|trait|mod)\s+\w+",
            r"\w+!\(",
        ],
    },
    Rule {
        language: "go",
        min_hits: 2,
        patterns: &[
            r"^package\s+\w+\s*$",
            r"^func\s+(\([^)]*\)\s*)?\w+\(",
            r"\w+\s*:=\s*",
            r#"^import\s+(\(|")"#,
            r"\bif\s+err\s*!=\s*nil\b",
            r"^type\s+\w+\s+(struct|interface)\s*\{",
        ],
    },
    Rule {
        language: "python",
        min_hits: 2,
        patterns: &[
            r"^\s*def\s+\w+\s*\(.*\)\s*(->\s*[\w\[\], .]+)?:\s*$",
            r"^\s*class\s+\w+(\(.*\))?:\s*$",
            r"^\s*from\s+[\w.]+\s+import\s+",
            r"^\s*import\s+\w+(\s+as\s+\w+)?\s*$",
            r"^\s*(if|elif|for|while|with|try|except)\b.*:\s*$",
            r"\bself\.\w+",
            r"^\s*@\w+",
            r"\bprint\(",
        ],
    },
    Rule {
        language: "typescript",
        min_hits: 2,
        patterns: &[
            r"^\s*(export\s+)?interface\s+\w+",
            r"^\s*(export\s+)?type\s+\w+\s*=",
            r":\s*(string|number|boolean|void|any|unknown)\b",
            r"^\s*import\s+.*\s+from\s+['\x22]",
            r"\b(const|let)\s+\w+\s*:\s*\w+",
            r"<\w+>\(",
        ],
    },
    Rule {
        language: "javascript",
        min_hits: 2,
        patterns: &[
            r"\b(const|let|var)\s+\w+\s*=",
            r"\bfunction\s*\w*\s*\(",
            r"=>",
            r"\brequire\(['\x22]",
            r"\bconsole\.log\(",
            r"^\s*(module\.)?exports\b",
            r"^\s*import\s+.*\s+from\s+['\x22]",
        ],
    },
    Rule {
        language: "java",
        min_hits: 2,
        patterns: &[
            r"^\s*(public|private|protected)\s+(static\s+)?(final\s+)?(class|interface|void|[A-Z]\w*)\b",
            r"\bSystem\.out\.println\(",
            r"^\s*import\s+java\.",
            r"^\s*package\s+[\w.]+;\s*$",
            r"@Override\b",
        ],
    },
    Rule {
        language: "csharp",
        min_hits: 2,
        patterns: &[
            r"^\s*using\s+System(\.\w+)*;\s*$",
            r"^\s*namespace\s+[\w.]+",
            r"\bConsole\.WriteLine\(",
            r"\{\s*get;\s*(set;)?\s*\}",
        ],
    },
    Rule {
        language: "cpp",
        min_hits: 2,
        patterns: &[
            r"^\s*#include\s*[<\x22]",
            r"\bstd::\w+",
            r"^\s*template\s*<",
            r"^\s*namespace\s+\w+\s*\{",
            r"\b(cout|cerr)\s*<<",
        ],
    },
    Rule {
        language: "c",
        min_hits: 2,
        patterns: &[
            r"^\s*#include\s*<\w+\.h>",
            r"\bprintf\(",
            r"\bmalloc\(",
            r"^\s*(int|void|char|static)\s+\*?\w+\s*\(",
        ],
    },
    Rule {
        language: "sql",
        min_hits: 1,
        patterns: &[
            r"(?i)^\s*(select\s+.+\s+from|insert\s+into|update\s+\w+\s+set|delete\s+from|create\s+(table|index|view))\b",
        ],
    },
    Rule {
        language: "dockerfile",
        min_hits: 2,
        patterns: &[
            r"^FROM\s+\S+",
            r"^(RUN|CMD|ENTRYPOINT|COPY|ADD|WORKDIR|ENV|EXPOSE)\s+",
        ],
    },
    Rule {
        language: "bash",
        min_hits: 1,
        patterns: &[
            r"^#!\s*/(usr/)?bin/(env\s+)?(ba|z)?sh\b",
            r"^\s*\$\s+\w+",
            r"^\s*(sudo|npm|npx|yarn|pnpm|cargo|pip|git|docker|kubectl|make|cd|export|curl|brew)\s+\S+",
        ],
    },
    Rule {
        language: "toml",
        min_hits: 2,
        patterns: &[
            r"^\s*\[\[?[\w.-]+\]\]?\s*$",
            r#"^\s*[\w.-]+\s*=\s*("|\d|\[|\{|true|false)"#,
        ],
    },
    Rule {
        language: "yaml",
        min_hits: 2,
        patterns: &[
            r"^[\w.-]+:\s*$",
            r"^\s+[\w.-]+:\s+\S",
            r"^\s*-\s+[\w.-]+:\s",
            r"^---\s*$",
        ],
    },
];

fn compiled_rules() -> &'static [(&'static str, usize, Vec<Regex>)] {
    static RULES_RE: OnceLock<Vec<(&'static str, usize, Vec<Regex>)>> = OnceLock::new();
    RULES_RE.get_or_init(|| {
        RULES
            .iter()
            .map(|rule| {
                let patterns = rule
                    .patterns
                    .iter()
                    .map(|p| Regex::new(&format!("(?m){p}")).expect("valid regex"))
                    .collect();
                (rule.language, rule.min_hits, patterns)
            })
            .collect()
    })
}

/// Best-guess language tag for `code`, or `None` when nothing is recognizable.
pub fn sniff_language(code: &str) -> Option<&'static str> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return None;
    }
    if looks_like_json(trimmed) {
        return Some("json");
    }
    if let Some(lang) = markup_language(trimmed) {
        return Some(lang);
    }

    let mut best: Option<(&'static str, usize)> = None;
    for (language, min_hits, patterns) in compiled_rules() {
        let hits = patterns.iter().filter(|re| re.is_match(trimmed)).count();
        if hits < *min_hits {
            continue;
        }
        if best.is_none_or(|(_, b)| hits > b) {
            best = Some((language, hits));
        }
    }
    if let Some((language, hits)) = best {
        tracing::trace!(language, hits, "sniffed code block language");
    }
    best.map(|(language, _)| language)
}

fn looks_like_json(code: &str) -> bool {
    let framed = (code.starts_with('{') && code.ends_with('}'))
        || (code.starts_with('[') && code.ends_with(']'));
    framed && serde_json::from_str::<serde_json::Value>(code).is_ok()
}

fn markup_language(code: &str) -> Option<&'static str> {
    if !code.starts_with('<') {
        return None;
    }
    let head = code.get(..64).unwrap_or(code).to_ascii_lowercase();
    if head.starts_with("<?xml") {
        Some("xml")
    } else if head.starts_with("<svg") {
        Some("svg")
    } else if head.starts_with("<!doctype html")
        || head.starts_with("<html")
        || code.ends_with('>')
    {
        Some("html")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_languages_are_recognized() {
        let rust = "use std::fmt;\n\npub fn render(x: &str) -> String {\n    let mut out = String::new();\n    out\n}";
        assert_eq!(sniff_language(rust), Some("rust"));

        let go = "package main\n\nfunc main() {\n\tx := 1\n}";
        assert_eq!(sniff_language(go), Some("go"));

        let python = "import os\n\ndef main(argv):\n    print(argv)\n";
        assert_eq!(sniff_language(python), Some("python"));

        let ts = "export interface User {\n  name: string;\n  age: number;\n}";
        assert_eq!(sniff_language(ts), Some("typescript"));

        let js = "const express = require('express');\nconst app = express();\napp.get('/', (req, res) => res.send('ok'));";
        assert_eq!(sniff_language(js), Some("javascript"));
    }

    #[test]
    fn data_and_shell_formats() {
        assert_eq!(sniff_language("{\"name\": \"wikidown\", \"tags\": [1, 2]}"), Some("json"));
        assert_eq!(sniff_language("$ cargo build --release"), Some("bash"));
        assert_eq!(sniff_language("npm install --save-dev vite"), Some("bash"));
        assert_eq!(sniff_language("SELECT id, name FROM users WHERE id = 1;"), Some("sql"));
        assert_eq!(
            sniff_language("server:\n  port: 8080\n  host: localhost\n"),
            Some("yaml")
        );
        assert_eq!(
            sniff_language("[package]\nname = \"demo\"\nversion = \"0.1.0\"\n"),
            Some("toml")
        );
        assert_eq!(sniff_language("<div class=\"x\">hi</div>"), Some("html"));
        assert_eq!(sniff_language("flowchart TD\n    A --> B"), Some("mermaid"));
    }

    #[test]
    fn prose_and_empty_text_are_not_classified() {
        assert_eq!(sniff_language(""), None);
        assert_eq!(sniff_language("   \n  "), None);
        assert_eq!(
            sniff_language("This module handles request routing for the service."),
            None
        );
        assert_eq!(sniff_language("{ not json"), None);
    }
}
