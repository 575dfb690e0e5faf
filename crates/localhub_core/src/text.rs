//! Plain-text helpers for user-authored markdown.
//!
//! Nothing here renders markdown; these functions extract tags and mentions
//! and produce short previews for notifications and listings.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static HASHTAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)[＃#](\w+)").expect("valid hashtag regex"));
static MENTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)[＠@]([^\s#<>!.?\[\]|{}]+)").expect("valid mention regex")
});
static MARKDOWN_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*]\(([^)]+)\)").expect("valid image regex"));
static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link regex"));
static MARKDOWN_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\*_`#>~\[\]\(\)!]+"#).expect("valid markdown symbol regex"));
static LIST_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-+]|\d+\.)\s+").expect("valid list marker regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Lowercased `#tags` found in `text`.
pub fn extract_hashtags(text: &str) -> BTreeSet<String> {
    text.split(' ')
        .flat_map(|token| HASHTAG_RE.captures_iter(token))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_lowercase()))
        .collect()
}

/// `@usernames` found in `text`, case preserved.
pub fn extract_mentions(text: &str) -> BTreeSet<String> {
    MENTION_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Lowercase, dash-separated form of `text` keeping unicode alphanumerics.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Markdown reduced to whitespace-normalized text.
pub fn plaintext(markdown: &str) -> String {
    let without_images = MARKDOWN_IMAGE_RE.replace_all(markdown, " ");
    let without_links = MARKDOWN_LINK_RE.replace_all(&without_images, "$1");
    let without_lists = LIST_MARKER_RE.replace_all(&without_links, " ");
    let without_symbols = MARKDOWN_SYMBOL_RE.replace_all(&without_lists, " ");
    WHITESPACE_RE
        .replace_all(&without_symbols, " ")
        .trim()
        .to_string()
}

/// Plaintext cut to at most `length` chars, ending in `...` when cut.
pub fn abbreviate(markdown: &str, length: usize) -> String {
    let text = plaintext(markdown);
    if text.chars().count() <= length {
        return text;
    }
    let keep = length.saturating_sub(3);
    let head: String = text.chars().take(keep).collect();
    format!("{}...", head.trim_end())
}
