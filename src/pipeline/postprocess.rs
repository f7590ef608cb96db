//! Post-processing: deterministic cleanup of model output.
//!
//! Even well-prompted models wrap answers in ```` ```markdown ```` fences,
//! emit CRLF line endings or sprinkle zero-width characters. These passes
//! fix those quirks without touching content, so prompts can stay focused on
//! what to read rather than on formatting edge-cases.

use once_cell::sync::Lazy;
use regex::Regex;

static OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A\s*```[A-Za-z0-9_-]*[ \t]*\n(.*?)\n?```\s*\z").expect("valid regex")
});

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

const INVISIBLE: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}'];

/// Clean a page transcription. Ends with exactly one newline unless empty.
pub fn clean_markdown(input: &str) -> String {
    let s = normalise(input);
    let s = s.trim_matches('\n');
    if s.is_empty() {
        return String::new();
    }
    format!("{s}\n")
}

/// Clean a block transcription. Trimmed on both ends.
pub fn clean_block_text(input: &str) -> String {
    normalise(input).trim().to_string()
}

fn normalise(input: &str) -> String {
    let s = input.replace("\r\n", "\n").replace('\r', "\n");
    let s = strip_outer_fence(&s);
    let s: String = s.chars().filter(|c| !INVISIBLE.contains(c)).collect();
    let s = s.lines().map(str::trim_end).collect::<Vec<_>>().join("\n");
    BLANK_RUNS.replace_all(&s, "\n\n").into_owned()
}

fn strip_outer_fence(s: &str) -> String {
    match OUTER_FENCE.captures(s) {
        Some(c) => c.get(1).map_or_else(String::new, |m| m.as_str().to_string()),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence() {
        let raw = "```markdown\n# Title\n\nBody\n```";
        assert_eq!(clean_markdown(raw), "# Title\n\nBody\n");
    }

    #[test]
    fn keeps_inner_code_blocks() {
        let raw = "Intro\n\n```rust\nfn main() {}\n```\n\nOutro";
        assert_eq!(clean_markdown(raw), format!("{raw}\n"));
    }

    #[test]
    fn normalises_whitespace_and_invisibles() {
        let raw = "a  \r\nb\u{200B}\n\n\n\nc";
        assert_eq!(clean_markdown(raw), "a\nb\n\nc\n");
    }

    #[test]
    fn block_text_is_trimmed() {
        assert_eq!(clean_block_text("\n```\n  Invoice #42  \n```\n"), "Invoice #42");
        assert_eq!(clean_block_text("   "), "");
    }
}
