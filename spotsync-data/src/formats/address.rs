//! Address inference for placemarks that carry no coordinates.

use std::sync::LazyLock;

use regex::Regex;

use crate::markup::html_to_text;

/// Extended-data keys that name an address, compared case-insensitively.
const ADDRESS_KEYS: &[&str] = &[
    "address",
    "adresse",
    "addr",
    "location",
    "street",
    "street address",
    "street_address",
    "full address",
    "full_address",
];

static LABELLED_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:address|location|addr|where)\s*[:\-]\s*(\S.*?)\s*$")
        .expect("labelled address pattern is valid")
});

static NUMBER_FIRST_STREET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\d+[a-z]?\s+[\p{L}0-9 .'-]+\b(?:st|street|rd|road|ave|avenue|blvd|boulevard|ln|lane|dr|drive|way|ct|court|pl|place|sq|square|hwy|highway|pkwy|parkway|ter|terrace|cres|crescent)\b\.?(?:,.*)?$",
    )
    .expect("street address pattern is valid")
});

static STREET_THEN_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L} .'-]+\s\d+[a-zA-Z]?,\s*\d{4,5}\s+\p{L}[\p{L} .'-]*$")
        .expect("postal address pattern is valid")
});

/// What the parser gathered about a placemark before deciding where it is.
#[derive(Debug, Default)]
pub(crate) struct AddressHints<'a> {
    /// Content of a structured `<address>` element.
    pub structured: Option<&'a str>,
    /// Extended-data `(key, value)` pairs in document order.
    pub extended: &'a [(String, String)],
    /// Raw description, possibly containing markup.
    pub description: &'a str,
    /// Display name.
    pub name: &'a str,
}

/// Find the most trustworthy address for a placemark, if it has one.
///
/// Sources are consulted from most to least structured: the address element,
/// key-named extended data, labelled lines in the description, and finally a
/// name that reads like a street address.
pub(crate) fn infer_address(hints: &AddressHints<'_>) -> Option<String> {
    if let Some(address) = hints.structured.and_then(non_blank) {
        return Some(address);
    }

    let from_extended = hints.extended.iter().find_map(|(key, value)| {
        let key = key.trim().to_lowercase();
        ADDRESS_KEYS
            .contains(&key.as_str())
            .then(|| non_blank(value))
            .flatten()
    });
    if from_extended.is_some() {
        return from_extended;
    }

    let text = html_to_text(hints.description);
    if let Some(captures) = LABELLED_ADDRESS.captures(&text)
        && let Some(address) = captures.get(1).and_then(|m| non_blank(m.as_str()))
    {
        return Some(address);
    }

    let name = hints.name.trim();
    (NUMBER_FIRST_STREET.is_match(name) || STREET_THEN_NUMBER.is_match(name))
        .then(|| name.to_owned())
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
