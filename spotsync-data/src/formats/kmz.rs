//! KML extraction from zipped KMZ archives.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use super::FormatError;

/// Return the KML document packed inside a KMZ archive.
///
/// A `.kml` entry at the archive root wins over nested ones; otherwise the
/// first nested entry in archive order is used. Entries under `__MACOSX/`
/// and dot-prefixed metadata paths are ignored.
pub fn extract_kml_from_kmz(bytes: &[u8]) -> Result<String, FormatError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|source| FormatError::Archive { source })?;

    let mut root = None;
    let mut nested = None;
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|source| FormatError::Archive { source })?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().trim_start_matches('/');
        if is_metadata_path(name) || !name.to_ascii_lowercase().ends_with(".kml") {
            continue;
        }
        if name.contains('/') {
            nested.get_or_insert(index);
        } else {
            root = Some(index);
            break;
        }
    }

    let index = root.or(nested).ok_or(FormatError::MissingKml)?;
    let mut entry = archive
        .by_index(index)
        .map_err(|source| FormatError::Archive { source })?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|source| FormatError::ArchiveEntry {
            name: entry.name().to_owned(),
            source,
        })?;
    super::decode_text(&bytes)
}

fn is_metadata_path(name: &str) -> bool {
    name.split('/')
        .any(|segment| segment == "__MACOSX" || segment.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::build_kmz;
    use rstest::rstest;

    #[rstest]
    fn prefers_root_level_documents() {
        let archive = build_kmz(&[
            ("files/nested.kml", "<kml>nested</kml>"),
            ("doc.kml", "<kml>root</kml>"),
        ]);
        assert_eq!(
            extract_kml_from_kmz(&archive).expect("extract"),
            "<kml>root</kml>"
        );
    }

    #[rstest]
    fn falls_back_to_nested_documents() {
        let archive = build_kmz(&[
            ("__MACOSX/._doc.kml", "junk"),
            (".hidden.kml", "junk"),
            ("layers/first.kml", "<kml>first</kml>"),
            ("layers/second.kml", "<kml>second</kml>"),
        ]);
        assert_eq!(
            extract_kml_from_kmz(&archive).expect("extract"),
            "<kml>first</kml>"
        );
    }

    #[rstest]
    fn reports_archives_without_kml() {
        let archive = build_kmz(&[("images/a.png", "png")]);
        assert!(matches!(
            extract_kml_from_kmz(&archive),
            Err(FormatError::MissingKml)
        ));
    }

    #[rstest]
    fn rejects_corrupt_archives() {
        assert!(matches!(
            extract_kml_from_kmz(b"PK\x03\x04 not really a zip"),
            Err(FormatError::Archive { .. })
        ));
    }
}
