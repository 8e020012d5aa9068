//! Feed parsing: format detection and normalisation into [`Placemark`]s.
//!
//! Every supported export is turned into the same canonical record before
//! anything downstream looks at it. Parsers are pure functions over bytes
//! or text; fetching happens elsewhere.

mod address;
mod detect;
mod folders;
mod geojson;
mod kml;
mod kmz;
mod placemark;

use thiserror::Error;

pub use self::detect::{FeedFormat, detect_format};
pub use self::folders::{distinct_folder_names, filter_and_order};
pub use self::geojson::{DatalayerRef, FeedDocument, parse_geojson};
pub use self::kml::parse_kml;
pub use self::kmz::extract_kml_from_kmz;
pub use self::placemark::{Placemark, PlacemarkLocation, PlacemarkOrigin};
pub(crate) use self::placemark::push_unique;

const UTF8_BOM: &str = "\u{feff}";

/// Errors raised while decoding a feed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FormatError {
    /// The KMZ archive could not be read.
    #[error("invalid KMZ archive")]
    Archive {
        /// Error reported by the ZIP reader.
        #[source]
        source: zip::result::ZipError,
    },
    /// The KMZ archive holds no `.kml` document.
    #[error("KMZ archive contains no KML document")]
    MissingKml,
    /// An archive entry could not be decompressed.
    #[error("failed to read archive entry {name}")]
    ArchiveEntry {
        /// Entry path inside the archive.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid UTF-8.
    #[error("feed is not valid UTF-8")]
    Encoding {
        /// Decoding error.
        #[source]
        source: std::str::Utf8Error,
    },
    /// The KML markup is malformed.
    #[error("malformed KML: {reason}")]
    Markup {
        /// Reader diagnostic.
        reason: String,
    },
    /// The GeoJSON document is not valid JSON.
    #[error("malformed GeoJSON")]
    Json {
        /// Error reported by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// The JSON document is neither a feature collection, a feature, nor a
    /// datalayer index.
    #[error("unsupported GeoJSON document of type {kind}")]
    UnsupportedGeoJson {
        /// Value of the top-level `type` member, or `unknown`.
        kind: String,
    },
    /// A datalayer reference could not be resolved against its base URL.
    #[error("invalid datalayer URL {url}")]
    InvalidUrl {
        /// URL or reference that failed to parse.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
}

/// Decode feed bytes as UTF-8, dropping a leading byte order mark.
pub fn decode_text(bytes: &[u8]) -> Result<String, FormatError> {
    let text = std::str::from_utf8(bytes).map_err(|source| FormatError::Encoding { source })?;
    Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text).to_owned())
}

/// Parse any supported feed into placemarks or datalayer references.
///
/// KMZ and KML always yield placemarks; GeoJSON may instead describe the
/// datalayers of a multi-layer map.
///
/// # Examples
/// ```
/// use spotsync_data::formats::{FeedDocument, parse_feed};
///
/// let kml = br#"<kml><Document><Placemark><name>Rail</name>
///     <Point><coordinates>13.4,52.5</coordinates></Point></Placemark></Document></kml>"#;
/// let FeedDocument::Placemarks(placemarks) = parse_feed(kml, "https://maps.example/export.kml")?
/// else {
///     panic!("KML never yields datalayers");
/// };
/// assert_eq!(placemarks[0].name, "Rail");
/// # Ok::<(), spotsync_data::formats::FormatError>(())
/// ```
pub fn parse_feed(bytes: &[u8], url_hint: &str) -> Result<FeedDocument, FormatError> {
    match detect_format(bytes, url_hint) {
        FeedFormat::Kmz => {
            let text = extract_kml_from_kmz(bytes)?;
            parse_kml(&text).map(FeedDocument::Placemarks)
        }
        FeedFormat::Kml => parse_kml(&decode_text(bytes)?).map(FeedDocument::Placemarks),
        FeedFormat::GeoJson => parse_geojson(&decode_text(bytes)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn strips_byte_order_marks() {
        let text = decode_text(b"\xEF\xBB\xBF{}").expect("decode");
        assert_eq!(text, "{}");
    }

    #[rstest]
    fn rejects_invalid_utf8() {
        assert!(matches!(
            decode_text(&[0xff, 0xfe, 0x00]),
            Err(FormatError::Encoding { .. })
        ));
    }
}
