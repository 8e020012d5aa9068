//! Streaming KML reader.
//!
//! Walks `Document` and `Folder` elements recursively, tracking the folder
//! path of every `Placemark`. Only point geometry is read; placemarks without
//! a point fall back to address inference and are dropped when that fails.

use geo::Coord;
use log::debug;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, BytesText, Event};

use super::FormatError;
use super::address::{AddressHints, infer_address};
use super::placemark::{Placemark, PlacemarkLocation, PlacemarkOrigin, checked_coord, push_unique};
use crate::markup::image_sources;

const MEDIA_LINKS_KEY: &str = "gx_media_links";
const TAG_KEYS: &[&str] = &["tags", "keywords"];

#[derive(Debug, Default)]
struct PendingPlacemark {
    name: String,
    description: String,
    address: Option<String>,
    style_url: Option<String>,
    coordinates: Option<Coord<f64>>,
    extended: Vec<(String, String)>,
}

impl PendingPlacemark {
    fn finish(self, folder_path: Vec<String>) -> Option<Placemark> {
        let location = match self.coordinates {
            Some(coord) => PlacemarkLocation::Coordinates(coord),
            None => {
                let hints = AddressHints {
                    structured: self.address.as_deref(),
                    extended: &self.extended,
                    description: &self.description,
                    name: &self.name,
                };
                let Some(address) = infer_address(&hints) else {
                    debug!("dropping placemark {:?}: no coordinates or address", self.name);
                    return None;
                };
                PlacemarkLocation::Address(address)
            }
        };

        let image_urls = collect_image_urls(&self.extended, &self.description);
        let tags = collect_tags(&self.extended);
        Some(Placemark {
            name: self.name,
            description: self.description,
            location,
            image_urls,
            tags,
            folder_path,
            origin: PlacemarkOrigin::FromKml {
                style_url: self.style_url,
            },
        })
    }
}

#[derive(Debug, Default)]
struct KmlWalker {
    elements: Vec<String>,
    folders: Vec<Option<String>>,
    pending: Option<PendingPlacemark>,
    data_key: Option<String>,
    text: String,
    placemarks: Vec<Placemark>,
}

impl KmlWalker {
    fn parent(&self) -> Option<&str> {
        self.elements.iter().rev().nth(1).map(String::as_str)
    }

    fn within(&self, element: &str) -> bool {
        self.elements.iter().any(|name| name == element)
    }

    fn folder_path(&self) -> Vec<String> {
        self.folders.iter().flatten().cloned().collect()
    }

    fn open(&mut self, start: &BytesStart<'_>) {
        let name = local_name(start);
        self.text.clear();
        match name.as_str() {
            "Folder" => self.folders.push(None),
            "Placemark" => self.pending = Some(PendingPlacemark::default()),
            "Data" | "SimpleData" => self.data_key = attribute(start, "name"),
            _ => {}
        }
        self.elements.push(name);
    }

    fn close(&mut self) {
        let text = std::mem::take(&mut self.text).trim().to_owned();
        let parent = self.parent().map(str::to_owned);
        let in_point = self.within("Point");
        let Some(name) = self.elements.pop() else {
            return;
        };

        match name.as_str() {
            "Folder" => {
                self.folders.pop();
            }
            "Placemark" => {
                let path = self.folder_path();
                if let Some(placemark) = self.pending.take().and_then(|p| p.finish(path)) {
                    self.placemarks.push(placemark);
                }
            }
            "name" if parent.as_deref() == Some("Folder") && self.pending.is_none() => {
                if let Some(slot) = self.folders.last_mut() {
                    *slot = (!text.is_empty()).then_some(text);
                }
            }
            "name" if parent.as_deref() == Some("Placemark") => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.name = text;
                }
            }
            "description" if parent.as_deref() == Some("Placemark") => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.description = text;
                }
            }
            "address" => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.address = Some(text);
                }
            }
            "styleUrl" => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.style_url = (!text.is_empty()).then_some(text);
                }
            }
            "coordinates" if in_point => {
                if let Some(pending) = self.pending.as_mut()
                    && pending.coordinates.is_none()
                {
                    pending.coordinates = parse_point(&text);
                }
            }
            "value" | "SimpleData" => {
                if let (Some(pending), Some(key)) = (self.pending.as_mut(), self.data_key.clone()) {
                    pending.extended.push((key, text));
                }
            }
            _ => {}
        }
        if matches!(name.as_str(), "Data" | "SimpleData") {
            self.data_key = None;
        }
    }
}

/// Parse a KML document into placemarks in document order.
///
/// Placemarks inherit the names of their enclosing `Folder` elements as
/// `folder_path`, outermost first. `Document` names are not part of the
/// path.
pub fn parse_kml(text: &str) -> Result<Vec<Placemark>, FormatError> {
    let mut reader = Reader::from_str(text);
    let mut walker = KmlWalker::default();
    loop {
        let event = reader.read_event().map_err(|err| FormatError::Markup {
            reason: format!("{err} at byte {}", reader.error_position()),
        })?;
        match event {
            Event::Start(start) => walker.open(&start),
            Event::End(_) => walker.close(),
            Event::Text(content) => walker.text.push_str(&unescape_lossy(&content)),
            Event::CData(content) => {
                walker
                    .text
                    .push_str(&String::from_utf8_lossy(&content.into_inner()));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(walker.placemarks)
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn attribute(start: &BytesStart<'_>, key: &str) -> Option<String> {
    let attr = start.try_get_attribute(key).ok().flatten()?;
    attr.unescape_value().ok().map(|value| value.trim().to_owned())
}

// Feeds routinely carry HTML entities such as `&nbsp;` that XML does not
// define; keep the raw text rather than rejecting the document.
fn unescape_lossy(content: &BytesText<'_>) -> String {
    content.unescape().map_or_else(
        |_| String::from_utf8_lossy(content).into_owned(),
        std::borrow::Cow::into_owned,
    )
}

/// Read the first `lng,lat[,alt]` tuple of a coordinates element.
fn parse_point(text: &str) -> Option<Coord<f64>> {
    let tuple = text.split_whitespace().next()?;
    let mut parts = tuple.split(',');
    let x: f64 = parts.next()?.trim().parse().ok()?;
    let y: f64 = parts.next()?.trim().parse().ok()?;
    checked_coord(x, y)
}

fn collect_image_urls(extended: &[(String, String)], description: &str) -> Vec<String> {
    let media = extended
        .iter()
        .filter(|(key, _)| key.eq_ignore_ascii_case(MEDIA_LINKS_KEY))
        .flat_map(|(_, value)| value.split_whitespace().map(str::to_owned));

    let mut urls = Vec::new();
    for url in media.chain(image_sources(description)) {
        push_unique(&mut urls, url);
    }
    urls
}

fn collect_tags(extended: &[(String, String)]) -> Vec<String> {
    extended
        .iter()
        .filter(|(key, _)| TAG_KEYS.iter().any(|tag| key.eq_ignore_ascii_case(tag)))
        .flat_map(|(_, value)| value.split([',', ';']))
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}
