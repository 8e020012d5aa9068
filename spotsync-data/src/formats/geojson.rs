//! GeoJSON features and uMap-style datalayer indexes.

use log::debug;
use serde_json::{Map, Value};
use url::Url;

use super::FormatError;
use super::placemark::{Placemark, PlacemarkLocation, PlacemarkOrigin, checked_coord, push_unique};
use crate::markup::image_sources;

/// Property keys naming a feature's folder, in priority order.
const FOLDER_KEYS: &[&str] = &["folder", "layer", "datalayer", "category", "group", "type"];
const NAME_KEYS: &[&str] = &["name", "title"];
const DESCRIPTION_KEYS: &[&str] = &["description", "desc"];
const IMAGE_KEYS: &[&str] = &["gx_media_links", "images", "image", "photo"];
const TAG_KEYS: &[&str] = &["tags", "keywords"];

/// What a feed document contains.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedDocument {
    /// Importable placemarks.
    Placemarks(Vec<Placemark>),
    /// Named sub-resources that must be fetched and parsed individually.
    Datalayers(Vec<DatalayerRef>),
}

/// A datalayer listed by a multi-layer map's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatalayerRef {
    /// Layer identifier, when declared.
    pub id: Option<String>,
    /// Declared layer name, used as the folder of its features.
    pub name: String,
    /// Explicit data URL, absolute or relative to the metadata URL.
    pub url: Option<String>,
}

impl DatalayerRef {
    /// Resolve the URL serving this layer's GeoJSON.
    ///
    /// An explicit `url` wins and may be relative to `base`; otherwise the
    /// layer is fetched from `datalayer/{id}/` below `base`.
    ///
    /// # Examples
    /// ```
    /// use spotsync_data::formats::DatalayerRef;
    ///
    /// let layer = DatalayerRef { id: Some("42".into()), name: "Parks".into(), url: None };
    /// assert_eq!(
    ///     layer.resolve_url("https://umap.example/en/map/skate_7/")?,
    ///     "https://umap.example/en/map/skate_7/datalayer/42/"
    /// );
    /// # Ok::<(), spotsync_data::formats::FormatError>(())
    /// ```
    pub fn resolve_url(&self, base: &str) -> Result<String, FormatError> {
        let reference = match (&self.url, &self.id) {
            (Some(url), _) => url.clone(),
            (None, Some(id)) => format!("datalayer/{id}/"),
            (None, None) => String::new(),
        };
        if let Ok(absolute) = Url::parse(&reference) {
            return Ok(absolute.into());
        }
        let base_url = Url::parse(base).map_err(|source| FormatError::InvalidUrl {
            url: base.to_owned(),
            source,
        })?;
        base_url
            .join(&reference)
            .map(Into::into)
            .map_err(|source| FormatError::InvalidUrl {
                url: reference,
                source,
            })
    }
}

/// Parse a GeoJSON document.
///
/// Feature collections, single features and bare feature arrays yield
/// placemarks; a document whose properties enumerate `datalayers` yields
/// layer references instead. Only `Point` geometries are imported.
pub fn parse_geojson(text: &str) -> Result<FeedDocument, FormatError> {
    let document: Value =
        serde_json::from_str(text).map_err(|source| FormatError::Json { source })?;

    if let Some(layers) = datalayer_list(&document) {
        return Ok(FeedDocument::Datalayers(
            layers.iter().filter_map(datalayer_ref).collect(),
        ));
    }

    let features: Vec<&Value> = match &document {
        Value::Array(items) => items.iter().collect(),
        Value::Object(object) => match object.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => object
                .get("features")
                .and_then(Value::as_array)
                .map(|items| items.iter().collect())
                .unwrap_or_default(),
            Some("Feature") => vec![&document],
            other => {
                return Err(FormatError::UnsupportedGeoJson {
                    kind: other.unwrap_or("unknown").to_owned(),
                });
            }
        },
        _ => {
            return Err(FormatError::UnsupportedGeoJson {
                kind: String::from("scalar"),
            });
        }
    };

    Ok(FeedDocument::Placemarks(
        features.into_iter().filter_map(feature_to_placemark).collect(),
    ))
}

fn datalayer_list(document: &Value) -> Option<&Vec<Value>> {
    document
        .pointer("/properties/datalayers")
        .or_else(|| document.get("datalayers"))
        .and_then(Value::as_array)
}

fn datalayer_ref(layer: &Value) -> Option<DatalayerRef> {
    let id = layer.get("id").and_then(scalar_string);
    let url = layer.get("url").and_then(scalar_string);
    if id.is_none() && url.is_none() {
        debug!("skipping datalayer without id or url");
        return None;
    }
    let name = layer
        .get("name")
        .and_then(scalar_string)
        .or_else(|| id.clone())
        .unwrap_or_default();
    Some(DatalayerRef { id, name, url })
}

fn feature_to_placemark(feature: &Value) -> Option<Placemark> {
    let feature_id = feature.get("id").and_then(scalar_string);
    let geometry = feature.get("geometry")?;
    if geometry.get("type").and_then(Value::as_str) != Some("Point") {
        debug!("skipping non-point feature {feature_id:?}");
        return None;
    }
    let coordinates = geometry.get("coordinates")?.as_array()?;
    let longitude = coordinates.first()?.as_f64()?;
    let latitude = coordinates.get(1)?.as_f64()?;
    let coord = checked_coord(longitude, latitude)?;

    let empty = Map::new();
    let properties = feature
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let description = first_string(properties, DESCRIPTION_KEYS).unwrap_or_default();

    let mut image_urls = Vec::new();
    for key in IMAGE_KEYS {
        for url in string_items(properties.get(*key)) {
            push_unique(&mut image_urls, url);
        }
    }
    for url in image_sources(&description) {
        push_unique(&mut image_urls, url);
    }

    let tags = TAG_KEYS
        .iter()
        .flat_map(|key| list_items(properties.get(*key), &[',', ';']))
        .collect();

    Some(Placemark {
        name: first_string(properties, NAME_KEYS).unwrap_or_default(),
        description,
        location: PlacemarkLocation::Coordinates(coord),
        image_urls,
        tags,
        folder_path: first_string(properties, FOLDER_KEYS).into_iter().collect(),
        origin: PlacemarkOrigin::FromGeoJson { feature_id },
    })
}

fn scalar_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn first_string(properties: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| properties.get(*key).and_then(scalar_string))
}

/// Whitespace-separated or array-valued URL lists.
fn string_items(value: Option<&Value>) -> Vec<String> {
    list_items(value, &[' ', '\n', '\t', '\r'])
}

fn list_items(value: Option<&Value>, separators: &[char]) -> Vec<String> {
    match value {
        Some(Value::String(text)) => text
            .split(separators)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;
    use rstest::rstest;

    fn placemarks(text: &str) -> Vec<Placemark> {
        match parse_geojson(text).expect("parse") {
            FeedDocument::Placemarks(placemarks) => placemarks,
            FeedDocument::Datalayers(layers) => panic!("unexpected datalayers {layers:?}"),
        }
    }

    #[rstest]
    fn imports_points_and_skips_other_geometry() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": 7,
                 "geometry": {"type": "Point", "coordinates": [20.0, 10.0]},
                 "properties": {"name": "Wall Spot", "description": "Ledge <img src='https://i/1.jpg'>",
                                "images": ["https://i/0.jpg"], "tags": "ledge, rail",
                                "category": "Ledges", "type": "street"}},
                {"type": "Feature",
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
                 "properties": {"name": "Path"}},
                {"type": "Feature", "geometry": null, "properties": {"name": "Void"}}
            ]
        }"#;
        let parsed = placemarks(text);
        assert_eq!(parsed.len(), 1);
        let wall = &parsed[0];
        assert_eq!(wall.name, "Wall Spot");
        assert_eq!(
            wall.location,
            PlacemarkLocation::Coordinates(Coord { x: 20.0, y: 10.0 })
        );
        assert_eq!(wall.image_urls, vec!["https://i/0.jpg", "https://i/1.jpg"]);
        assert_eq!(wall.tags, vec!["ledge", "rail"]);
        assert_eq!(wall.folder_path, vec!["Ledges"]);
        assert_eq!(
            wall.origin,
            PlacemarkOrigin::FromGeoJson {
                feature_id: Some("7".into())
            }
        );
    }

    #[rstest]
    #[case(r#"{"folder": "A", "layer": "B"}"#, Some("A"))]
    #[case(r#"{"layer": "B", "group": "C"}"#, Some("B"))]
    #[case(r#"{"datalayer": " ", "group": "C"}"#, Some("C"))]
    #[case(r#"{"type": "bowl"}"#, Some("bowl"))]
    #[case(r#"{"name": "x"}"#, None)]
    fn infers_folder_by_key_priority(#[case] properties: &str, #[case] expected: Option<&str>) {
        let text = format!(
            r#"{{"type":"Feature","geometry":{{"type":"Point","coordinates":[1,2]}},"properties":{properties}}}"#
        );
        let parsed = placemarks(&text);
        assert_eq!(parsed[0].folder_name(), expected);
    }

    #[rstest]
    fn lists_datalayers_from_metadata() {
        let text = r#"{
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [0, 0]},
            "properties": {"name": "Map", "datalayers": [
                {"id": 11, "name": "Parks"},
                {"name": "Remote", "url": "https://cdn.example/layer.geojson"},
                {"name": "Broken"}
            ]}
        }"#;
        let FeedDocument::Datalayers(layers) = parse_geojson(text).expect("parse") else {
            panic!("expected datalayers");
        };
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].name, "Parks");
        assert_eq!(layers[0].id.as_deref(), Some("11"));
        assert_eq!(
            layers[1].resolve_url("https://umap.example/map/1/").expect("resolve"),
            "https://cdn.example/layer.geojson"
        );
    }

    #[rstest]
    #[case(Some("11"), None, "https://umap.example/map/1/datalayer/11/")]
    #[case(None, Some("../layers/a.json"), "https://umap.example/map/layers/a.json")]
    #[case(Some("11"), Some("/raw/11.json"), "https://umap.example/raw/11.json")]
    fn resolves_layer_urls(
        #[case] id: Option<&str>,
        #[case] url: Option<&str>,
        #[case] expected: &str,
    ) {
        let layer = DatalayerRef {
            id: id.map(str::to_owned),
            name: "L".into(),
            url: url.map(str::to_owned),
        };
        assert_eq!(
            layer.resolve_url("https://umap.example/map/1/").expect("resolve"),
            expected
        );
    }

    #[rstest]
    fn rejects_unrelated_documents() {
        assert!(matches!(
            parse_geojson(r#"{"type": "Topology"}"#),
            Err(FormatError::UnsupportedGeoJson { kind }) if kind == "Topology"
        ));
        assert!(matches!(parse_geojson("{"), Err(FormatError::Json { .. })));
    }
}
