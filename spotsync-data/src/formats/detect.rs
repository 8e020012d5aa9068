//! Feed format classification.

use std::fmt;

/// Formats the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedFormat {
    /// Zipped KML.
    Kmz,
    /// Keyhole Markup Language.
    Kml,
    /// GeoJSON, including umap-style metadata documents.
    GeoJson,
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Kmz => "kmz",
            Self::Kml => "kml",
            Self::GeoJson => "geojson",
        })
    }
}

const ZIP_SIGNATURE: &[u8; 4] = b"PK\x03\x04";
const UTF8_BOM: &[u8; 3] = b"\xEF\xBB\xBF";

/// Classify a downloaded export.
///
/// A ZIP signature always means KMZ. Otherwise the URL path extension
/// decides, then the first non-whitespace byte. Feeds that omit every hint
/// are treated as GeoJSON.
///
/// # Examples
/// ```
/// use spotsync_data::formats::{FeedFormat, detect_format};
///
/// assert_eq!(detect_format(b"PK\x03\x04rest", "https://x/a.kml"), FeedFormat::Kmz);
/// assert_eq!(detect_format(b"{}", "https://x/a.kml?v=2"), FeedFormat::Kml);
/// assert_eq!(detect_format(b"  <kml/>", "https://x/export"), FeedFormat::Kml);
/// assert_eq!(detect_format(b"", "https://x/export"), FeedFormat::GeoJson);
/// ```
#[must_use]
pub fn detect_format(bytes: &[u8], url_hint: &str) -> FeedFormat {
    if bytes.starts_with(ZIP_SIGNATURE) {
        return FeedFormat::Kmz;
    }
    if let Some(format) = format_from_extension(url_hint) {
        return format;
    }
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match body.iter().find(|byte| !byte.is_ascii_whitespace()) {
        Some(b'<') => FeedFormat::Kml,
        _ => FeedFormat::GeoJson,
    }
}

fn format_from_extension(url: &str) -> Option<FeedFormat> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default().to_ascii_lowercase();
    let (_, extension) = segment.rsplit_once('.')?;
    match extension {
        "kmz" => Some(FeedFormat::Kmz),
        "kml" => Some(FeedFormat::Kml),
        "geojson" | "json" => Some(FeedFormat::GeoJson),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"PK\x03\x04....".as_slice(), "https://maps.example/feed.geojson", FeedFormat::Kmz)]
    #[case(b"PK\x03\x04....".as_slice(), "https://maps.example/feed.kml", FeedFormat::Kmz)]
    #[case(b"{\"type\":1}".as_slice(), "https://maps.example/feed.KML", FeedFormat::Kml)]
    #[case(b"<kml/>".as_slice(), "https://maps.example/feed.json?download=1", FeedFormat::GeoJson)]
    #[case(b"x".as_slice(), "https://maps.example/feed.kmz#frag", FeedFormat::Kmz)]
    #[case(b"\n\t<?xml version=\"1.0\"?>".as_slice(), "https://maps.example/export", FeedFormat::Kml)]
    #[case(b"\xEF\xBB\xBF<kml/>".as_slice(), "https://maps.example/export", FeedFormat::Kml)]
    #[case(b"  [".as_slice(), "https://maps.example/export", FeedFormat::GeoJson)]
    #[case(b"{".as_slice(), "https://maps.example/export", FeedFormat::GeoJson)]
    #[case(b"plain".as_slice(), "https://maps.example/export", FeedFormat::GeoJson)]
    fn classifies_feeds(#[case] bytes: &[u8], #[case] url: &str, #[case] expected: FeedFormat) {
        assert_eq!(detect_format(bytes, url), expected);
    }

    #[rstest]
    fn ignores_dots_in_host_names() {
        assert_eq!(
            detect_format(b"{}", "https://kml.example.com/export"),
            FeedFormat::GeoJson
        );
    }
}
