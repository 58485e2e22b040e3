//! Markdown text helpers: fences, inline code spans and final output normalization.

/// Collapses every whitespace run (line breaks included) to a single space.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn longest_run(s: &str, ch: char) -> usize {
    let (mut best, mut cur) = (0, 0);
    for c in s.chars() {
        if c == ch {
            cur += 1;
            best = best.max(cur);
        } else {
            cur = 0;
        }
    }
    best
}

/// Fenced code block. The fence is one backtick longer than any backtick run in `code`.
pub(crate) fn fenced_block(info: &str, code: &str) -> String {
    let fence = "`".repeat(longest_run(code, '`').max(2) + 1);
    let code = code.trim_end_matches(['\n', '\r']);
    format!("\n\n{fence}{info}\n{code}\n{fence}\n\n")
}

/// Inline code span, widened and padded when the content itself contains backticks.
pub(crate) fn code_span(code: &str) -> String {
    let fence = "`".repeat(longest_run(code, '`') + 1);
    if code.starts_with('`') || code.ends_with('`') {
        format!("{fence} {code} {fence}")
    } else {
        format!("{fence}{code}{fence}")
    }
}

/// Wraps inline content in a delimiter pair (`**`, `*`, `~~`), keeping surrounding whitespace
/// outside the delimiters. Whitespace-only content is returned unchanged.
pub(crate) fn wrap_inline(content: &str, delimiter: &str) -> String {
    let inner = content.trim();
    if inner.is_empty() {
        return content.to_string();
    }
    let lead = if content.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if content.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{delimiter}{inner}{delimiter}{trail}")
}

/// Appends a converted fragment, dropping the spaces that would otherwise start a line or dangle
/// before a block boundary.
pub(crate) fn push_fragment(out: &mut String, fragment: &str) {
    let fragment = if out.is_empty() || out.ends_with('\n') {
        fragment.trim_start_matches([' ', '\t'])
    } else {
        fragment
    };
    if fragment.starts_with('\n') {
        let keep = out.trim_end_matches([' ', '\t']).len();
        if !out[keep..].is_empty() && !out.ends_with("  ") {
            out.truncate(keep);
        }
    }
    out.push_str(fragment);
}

fn fence_marker(line: &str) -> Option<(char, usize)> {
    let t = line.trim_start();
    let ch = t.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let n = t.chars().take_while(|c| *c == ch).count();
    (n >= 3).then_some((ch, n))
}

/// Final clean-up of converted output:
/// - blank-line runs collapse to a single blank line
/// - trailing whitespace is removed, except a two-space hard break followed by more text
/// - fenced blocks pass through untouched
/// - the result ends with exactly one newline (empty input stays empty)
pub fn normalize(markdown: &str) -> String {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut fence: Option<(char, usize)> = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some((ch, n)) = fence {
            out.push(line.to_string());
            if fence_marker(line).is_some_and(|(c, m)| c == ch && m >= n)
                && line.trim().chars().all(|c| c == ch)
            {
                fence = None;
            }
            continue;
        }
        if let Some(marker) = fence_marker(line) {
            fence = Some(marker);
            out.push(line.trim_end().to_string());
            continue;
        }

        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            if out.last().is_some_and(|l| !l.is_empty()) {
                out.push(String::new());
            }
            continue;
        }
        let next_has_text = lines
            .get(i + 1)
            .is_some_and(|next| !next.trim().is_empty());
        if line.ends_with("  ") && next_has_text {
            out.push(format!("{trimmed}  "));
        } else {
            out.push(trimmed.to_string());
        }
    }

    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    if out.is_empty() {
        return String::new();
    }
    let mut text = out.join("\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_blank_runs_and_trims_lines() {
        let raw = "\n\n\n# Title   \n\n\n\nText\t\n\n\n";
        assert_eq!(normalize(raw), "# Title\n\nText\n");
        assert_eq!(normalize("\n \n\t\n"), "");
    }

    #[test]
    fn normalize_keeps_hard_breaks_and_fenced_content() {
        let raw = "line one  \nline two  \n\n```\nkeep   \n\n\n\nthis\n```\n";
        assert_eq!(
            normalize(raw),
            "line one  \nline two\n\n```\nkeep   \n\n\n\nthis\n```\n"
        );
    }

    #[test]
    fn fences_and_spans_outgrow_their_content() {
        assert_eq!(fenced_block("rust", "fn a() {}\n"), "\n\n```rust\nfn a() {}\n```\n\n");
        assert_eq!(fenced_block("", "x ``` y"), "\n\n````\nx ``` y\n````\n\n");
        assert_eq!(code_span("a"), "`a`");
        assert_eq!(code_span("a`b"), "``a`b``");
        assert_eq!(code_span("`a"), "`` `a ``");
    }

    #[test]
    fn inline_wrapping_keeps_outer_spaces() {
        assert_eq!(wrap_inline(" bold ", "**"), " **bold** ");
        assert_eq!(wrap_inline("  ", "*"), "  ");
    }

    #[test]
    fn fragments_do_not_start_lines_with_spaces() {
        let mut out = String::from("# T\n\n");
        push_fragment(&mut out, "  Hello");
        push_fragment(&mut out, " ");
        push_fragment(&mut out, "\n\nNext");
        assert_eq!(out, "# T\n\nHello\n\nNext");
    }
}
