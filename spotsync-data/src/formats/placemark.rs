//! Canonical record every feed format is normalised into.

use geo::Coord;

/// Where a placemark is, as far as the feed says.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacemarkLocation {
    /// Explicit WGS84 coordinates (`x = longitude`, `y = latitude`).
    Coordinates(Coord<f64>),
    /// Only a street address; coordinates must be geocoded.
    Address(String),
}

/// Format-specific provenance kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacemarkOrigin {
    /// Parsed from KML or KMZ.
    FromKml {
        /// `styleUrl` of the placemark, when present.
        style_url: Option<String>,
    },
    /// Parsed from a GeoJSON feature.
    FromGeoJson {
        /// Feature `id`, when present.
        feature_id: Option<String>,
    },
}

/// A single point of interest extracted from an export.
#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    /// Display name.
    pub name: String,
    /// Raw description, possibly containing markup.
    pub description: String,
    /// Coordinates or address.
    pub location: PlacemarkLocation,
    /// Referenced image URLs in document order.
    pub image_urls: Vec<String>,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Enclosing folders, outermost first.
    pub folder_path: Vec<String>,
    /// Format-specific provenance.
    pub origin: PlacemarkOrigin,
}

impl Placemark {
    /// Innermost folder, when the placemark sits in one.
    #[must_use]
    pub fn folder_name(&self) -> Option<&str> {
        self.folder_path.last().map(String::as_str)
    }

    /// Address text for placemarks without coordinates.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        match &self.location {
            PlacemarkLocation::Address(address) => Some(address),
            PlacemarkLocation::Coordinates(_) => None,
        }
    }
}

/// Append `value` unless it is blank or already present.
pub(crate) fn push_unique(values: &mut Vec<String>, value: String) {
    if !value.is_empty() && !values.contains(&value) {
        values.push(value);
    }
}

/// Build a WGS84 coordinate, rejecting out-of-range or non-finite values.
pub(crate) fn checked_coord(longitude: f64, latitude: f64) -> Option<Coord<f64>> {
    let valid = (-180.0..=180.0).contains(&longitude) && (-90.0..=90.0).contains(&latitude);
    valid.then_some(Coord {
        x: longitude,
        y: latitude,
    })
}
