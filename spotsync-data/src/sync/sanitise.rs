//! Description clean-up applied before spots are stored.

use std::sync::LazyLock;

use regex::Regex;

use crate::formats::push_unique;
use crate::markup::html_to_text;

static YOUTUBE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^\s<>]*?&(?:amp;)?)?v=|embed/|shorts/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .expect("video id pattern is valid")
});

/// Plain-text description plus the videos it referenced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitisedDescription {
    /// Description without markup, line breaks preserved.
    pub text: String,
    /// YouTube video identifiers in first-seen order.
    pub video_ids: Vec<String>,
}

/// Strip markup from a feed description and pull out video references.
///
/// # Examples
/// ```
/// use spotsync_data::sync::sanitise_description;
///
/// let cleaned = sanitise_description(
///     "Kinked rail<br><a href=\"https://youtu.be/dQw4w9WgXcQ\">clip</a>",
/// );
/// assert_eq!(cleaned.text, "Kinked rail\nclip");
/// assert_eq!(cleaned.video_ids, ["dQw4w9WgXcQ"]);
/// ```
#[must_use]
pub fn sanitise_description(html: &str) -> SanitisedDescription {
    let mut video_ids = Vec::new();
    for captures in YOUTUBE_ID.captures_iter(html) {
        if let Some(id) = captures.get(1) {
            push_unique(&mut video_ids, id.as_str().to_owned());
        }
    }
    SanitisedDescription {
        text: html_to_text(html),
        video_ids,
    }
}
