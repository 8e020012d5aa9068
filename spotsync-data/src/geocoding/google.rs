//! Response types of the Google-compatible geocoding JSON API.

use serde::Deserialize;

/// Top-level geocoding response.
#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeResponse {
    /// `OK`, `ZERO_RESULTS`, `OVER_QUERY_LIMIT`, `REQUEST_DENIED`, ...
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeResult {
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Component types that name a city, most specific first.
const CITY_TYPES: &[&str] = &[
    "locality",
    "postal_town",
    "administrative_area_level_2",
    "administrative_area_level_1",
];

impl GeocodeResult {
    fn component(&self, kind: &str) -> Option<&AddressComponent> {
        self.address_components
            .iter()
            .find(|component| component.types.iter().any(|t| t == kind))
    }

    /// Long name of the most specific city-like component.
    pub fn city(&self) -> Option<String> {
        CITY_TYPES
            .iter()
            .find_map(|kind| self.component(kind))
            .map(|component| component.long_name.clone())
    }

    /// Two-letter country code.
    pub fn country_code(&self) -> Option<String> {
        self.component("country")
            .map(|component| component.short_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn result(components: &str) -> GeocodeResult {
        let json = format!(r#"{{"formatted_address": "x", "address_components": {components}}}"#);
        serde_json::from_str(&json).expect("should deserialise")
    }

    #[rstest]
    fn deserialise_success_response() {
        let json = r#"{
            "status": "OK",
            "results": [{
                "formatted_address": "1 Rua Nova, Porto, Portugal",
                "address_components": [
                    {"long_name": "Porto", "short_name": "Porto", "types": ["locality", "political"]},
                    {"long_name": "Portugal", "short_name": "PT", "types": ["country", "political"]}
                ],
                "geometry": {"location": {"lat": 41.15, "lng": -8.61}}
            }]
        }"#;
        let response: GeocodeResponse = serde_json::from_str(json).expect("should deserialise");
        assert_eq!(response.status, "OK");
        let first = &response.results[0];
        assert_eq!(first.city().as_deref(), Some("Porto"));
        assert_eq!(first.country_code().as_deref(), Some("PT"));
        let location = &first.geometry.as_ref().expect("geometry").location;
        assert_eq!((location.lat, location.lng), (41.15, -8.61));
    }

    #[rstest]
    fn deserialise_error_response() {
        let json = r#"{"status": "REQUEST_DENIED", "error_message": "bad key"}"#;
        let response: GeocodeResponse = serde_json::from_str(json).expect("should deserialise");
        assert!(response.results.is_empty());
        assert_eq!(response.error_message.as_deref(), Some("bad key"));
    }

    #[rstest]
    #[case(
        r#"[{"long_name": "Hackney", "short_name": "Hackney", "types": ["administrative_area_level_2"]},
            {"long_name": "London", "short_name": "London", "types": ["postal_town"]}]"#,
        Some("London")
    )]
    #[case(
        r#"[{"long_name": "England", "short_name": "England", "types": ["administrative_area_level_1"]},
            {"long_name": "Kent", "short_name": "Kent", "types": ["administrative_area_level_2"]}]"#,
        Some("Kent")
    )]
    #[case(
        r#"[{"long_name": "Bavaria", "short_name": "BY", "types": ["administrative_area_level_1"]}]"#,
        Some("Bavaria")
    )]
    #[case(r#"[{"long_name": "France", "short_name": "FR", "types": ["country"]}]"#, None)]
    fn city_follows_component_priority(#[case] components: &str, #[case] expected: Option<&str>) {
        assert_eq!(result(components).city().as_deref(), expected);
    }
}
