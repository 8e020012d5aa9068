//! Object naming for content-addressed images.

use super::OBJECT_PREFIX;

const MAX_SLUG_LEN: usize = 60;
const HASH_LEN: usize = 64;

/// Reduce a spot name to a lowercase ASCII slug.
///
/// # Examples
/// ```
/// use spotsync_data::images::slugify;
///
/// assert_eq!(slugify("Wall Spot v2!"), "wall-spot-v2");
/// assert_eq!(slugify("  ***  "), "spot");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        String::from("spot")
    } else {
        trimmed.to_owned()
    }
}

/// Name of the stored object for an image of a spot.
#[must_use]
pub fn object_name(spot_name: &str, hash: &str, index: usize) -> String {
    format!("{OBJECT_PREFIX}{}-{hash}-{index}.jpg", slugify(spot_name))
}

/// Recover the content hash embedded in an object name.
///
/// Returns `None` for names not produced by [`object_name`].
///
/// # Examples
/// ```
/// use spotsync_data::images::{hash_from_object_name, object_name};
///
/// let hash = "ab".repeat(32);
/// let name = object_name("Wall-Spot 9", &hash, 3);
/// assert_eq!(hash_from_object_name(&name), Some(hash.as_str()));
/// assert_eq!(hash_from_object_name("spots/readme.txt"), None);
/// ```
#[must_use]
pub fn hash_from_object_name(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(".jpg")?;
    let (rest, index) = stem.rsplit_once('-')?;
    if index.is_empty() || !index.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let (_, hash) = rest.rsplit_once('-')?;
    let valid = hash.len() == HASH_LEN && hash.bytes().all(|byte| byte.is_ascii_hexdigit());
    valid.then_some(hash)
}
