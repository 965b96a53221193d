//! HTML to readable markdown-ish text.
//!
//! Regex based. Headings, links, list items and paragraph breaks survive;
//! scripts, styles and all other tags are dropped before entities are decoded.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static DROPPED_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>|<noscript\b[^>]*>.*?</noscript>|<head\b[^>]*>.*?</head>|<svg\b[^>]*>.*?</svg>")
        .expect("valid regex")
});
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>").expect("valid regex"));
static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#).expect("valid regex")
});
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("valid regex"));
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:p|div|section|article|main|aside|ul|ol|table|tr|blockquote|pre|figure|header|footer|nav)\b[^>]*>")
        .expect("valid regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Convert an HTML document to markdown-flavoured plain text.
pub fn to_markdown(html: &str) -> String {
    let text = DROPPED_BLOCKS.replace_all(html, "");

    let text = HEADING.replace_all(&text, |caps: &Captures| {
        let level = caps[1].parse::<usize>().unwrap_or(1);
        format!("\n\n{} {}\n\n", "#".repeat(level), inline_text(&caps[2]))
    });

    let text = LINK.replace_all(&text, |caps: &Captures| {
        let label = inline_text(&caps[2]);
        let href = html_escape::decode_html_entities(&caps[1]);
        if label.is_empty() {
            String::new()
        } else if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            label
        } else {
            format!("[{label}]({href})")
        }
    });

    let text = LIST_ITEM.replace_all(&text, "\n- ");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = BLOCK.replace_all(&text, "\n\n");
    let text = TAG.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text);

    normalize_whitespace(&text)
}

/// Flatten an HTML fragment to a single line of text.
pub fn inline_text(fragment: &str) -> String {
    let text = TAG.replace_all(fragment, "");
    let text = html_escape::decode_html_entities(&text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_whitespace(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| SPACES.replace_all(line, " ").trim().to_string())
        .collect();
    let joined = lines.join("\n");
    BLANK_LINES.replace_all(&joined, "\n\n").trim().to_string()
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}\n\n[... truncated at {max_chars} characters]", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_links_and_lists() {
        let html = r#"<html><head><title>T</title><style>p{}</style></head>
            <body><h1>Rust <em>language</em></h1>
            <p>Read the <a href="https://doc.rust-lang.org/book/">book</a> first.</p>
            <ul><li>Safety</li><li>Speed &amp; concurrency</li></ul>
            <script>alert(1)</script></body></html>"#;
        let md = to_markdown(html);
        assert!(md.starts_with("# Rust language"));
        assert!(md.contains("Read the [book](https://doc.rust-lang.org/book/) first."));
        assert!(md.contains("- Safety"));
        assert!(md.contains("- Speed & concurrency"));
        assert!(!md.contains("alert"));
        assert!(!md.contains("p{}"));
        assert!(!md.contains('<'));
    }

    #[test]
    fn blank_runs_collapse() {
        let md = to_markdown("<div>a</div><div></div><div></div><p>b</p>");
        assert_eq!(md, "a\n\nb");
    }

    #[test]
    fn anchor_only_links_keep_label() {
        assert_eq!(to_markdown(r##"<a href="#top">Back</a>"##), "Back");
    }

    #[test]
    fn inline_text_strips_markup() {
        assert_eq!(inline_text("  The <b>Rust</b>\n  Book &amp; more "), "The Rust Book & more");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        let cut = truncate_chars("héllo", 2);
        assert!(cut.starts_with("hé\n\n[... truncated at 2 characters]"));
    }
}
