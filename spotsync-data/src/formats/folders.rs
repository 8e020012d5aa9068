//! Folder allow-listing and ordering.

use super::placemark::Placemark;

/// Keep placemarks from the listed folders, grouped in list order.
///
/// A placemark survives when any element of its folder path matches a
/// listed name, ignoring case. Survivors are ordered by the position of the
/// first listed folder they match; the original order is preserved within
/// each group. An empty list keeps everything untouched.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use spotsync_data::formats::{Placemark, PlacemarkLocation, PlacemarkOrigin, filter_and_order};
///
/// let at = |name: &str, folder: &str| Placemark {
///     name: name.into(),
///     description: String::new(),
///     location: PlacemarkLocation::Coordinates(Coord { x: 0.0, y: 0.0 }),
///     image_urls: vec![],
///     tags: vec![],
///     folder_path: vec![folder.into()],
///     origin: PlacemarkOrigin::FromKml { style_url: None },
/// };
/// let kept = filter_and_order(
///     vec![at("a1", "A"), at("c1", "C"), at("b1", "b"), at("a2", "A")],
///     &["B".to_owned(), "A".to_owned()],
/// );
/// let names: Vec<_> = kept.iter().map(|p| p.name.as_str()).collect();
/// assert_eq!(names, ["b1", "a1", "a2"]);
/// ```
#[must_use]
pub fn filter_and_order(placemarks: Vec<Placemark>, include_folders: &[String]) -> Vec<Placemark> {
    if include_folders.is_empty() {
        return placemarks;
    }
    let wanted: Vec<String> = include_folders
        .iter()
        .map(|name| name.trim().to_lowercase())
        .collect();

    let mut ranked: Vec<(usize, Placemark)> = placemarks
        .into_iter()
        .filter_map(|placemark| {
            let rank = wanted.iter().position(|name| {
                placemark
                    .folder_path
                    .iter()
                    .any(|folder| folder.trim().to_lowercase() == *name)
            })?;
            Some((rank, placemark))
        })
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);
    ranked.into_iter().map(|(_, placemark)| placemark).collect()
}

/// Distinct innermost folder names in first-seen order.
#[must_use]
pub fn distinct_folder_names(placemarks: &[Placemark]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in placemarks.iter().filter_map(Placemark::folder_name) {
        if !names.iter().any(|seen| seen == name) {
            names.push(name.to_owned());
        }
    }
    names
}
