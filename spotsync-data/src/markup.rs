//! HTML-to-text conversion shared by the parsers and the sync pipeline.

use std::sync::LazyLock;

use regex::Regex;

static LINE_BREAK_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*br\s*/?\s*>|<\s*/\s*(?:p|div|li|h[1-6]|tr)\s*>")
        .expect("line break pattern is valid")
});

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));

static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("numeric entity pattern is valid")
});

static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#)
        .expect("image source pattern is valid")
});

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank run pattern is valid"));

/// Convert an HTML fragment into plain text.
///
/// Block-closing tags and `<br>` become line breaks, remaining tags are
/// removed, common entities are decoded, trailing spaces are trimmed from
/// each line, and runs of blank lines collapse to one.
///
/// # Examples
/// ```
/// use spotsync_data::markup::html_to_text;
///
/// let text = html_to_text("<p>Smooth&nbsp;ledge</p><p>Bust &amp; run</p>");
/// assert_eq!(text, "Smooth ledge\nBust & run");
/// ```
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let normalised = html.replace("\r\n", "\n");
    let with_breaks = LINE_BREAK_TAGS.replace_all(&normalised, "\n");
    let stripped = ANY_TAG.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);
    let trimmed = decoded
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUNS
        .replace_all(&trimmed, "\n\n")
        .trim()
        .to_owned()
}

/// Sources of `<img>` elements in document order.
pub fn image_sources(html: &str) -> impl Iterator<Item = String> + '_ {
    IMG_SRC
        .captures_iter(html)
        .filter_map(|captures| captures.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
}

/// Decode named entities in common use plus numeric character references.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY.replace_all(text, |captures: &regex::Captures<'_>| {
        let reference = captures.get(1).map_or("", |m| m.as_str());
        let code = reference
            .strip_prefix('x')
            .map_or_else(|| reference.parse().ok(), |hex| u32::from_str_radix(hex, 16).ok());
        code.and_then(char::from_u32)
            .map_or_else(|| captures.get(0).map_or("", |m| m.as_str()).to_owned(), String::from)
    });
    numeric
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
