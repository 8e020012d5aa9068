//! Per-placemark image resolution against the URL cache and object store.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::Utc;
use futures::future::join_all;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use spotsync_core::{ImageCacheEntry, ImageCacheStore};

use super::naming::object_name;
use super::optimise::optimise;
use super::storage::{ObjectStorage, StorageError};
use super::{ImageConfig, ImageError, ProcessedImage};
use crate::transport::Fetcher;

/// SHA-256 hex digest used to address stored images.
///
/// # Examples
/// ```
/// use spotsync_data::images::content_hash;
///
/// assert_eq!(
///     content_hash(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Percent-encoded cache key of an image URL.
fn cache_key(url: &str) -> String {
    urlencoding::encode(url).into_owned()
}

fn storage_error(operation: &'static str) -> impl FnOnce(StorageError) -> ImageError {
    move |source| ImageError::Storage { operation, source }
}

/// How a single image was satisfied before any upload.
enum Lookup {
    /// URL cache hit whose object still exists.
    Cached(ProcessedImage),
    /// An object with the same content is already stored.
    Stored(ProcessedImage),
    /// Fresh content that still needs uploading.
    Downloaded { hash: String, bytes: Bytes },
}

/// Resolves feed image URLs to stored, deduplicated objects.
#[derive(Clone, Copy)]
pub struct ImageDeduplicator<'a> {
    storage: &'a dyn ObjectStorage,
    cache: &'a dyn ImageCacheStore,
    fetcher: &'a dyn Fetcher,
    config: &'a ImageConfig,
}

impl<'a> ImageDeduplicator<'a> {
    /// Wire the deduplicator to its collaborators.
    #[must_use]
    pub fn new(
        storage: &'a dyn ObjectStorage,
        cache: &'a dyn ImageCacheStore,
        fetcher: &'a dyn Fetcher,
        config: &'a ImageConfig,
    ) -> Self {
        Self {
            storage,
            cache,
            fetcher,
            config,
        }
    }

    /// Store the images of one placemark.
    ///
    /// `prior_hashes[i]` is the content hash recorded for image `i` of the
    /// same spot during an earlier sync. Lookups run concurrently in groups
    /// of [`ImageConfig::group_size`]; uploads run one at a time so identical
    /// content within the placemark is stored once. Failed images are logged
    /// and left out of the result, which otherwise keeps input order.
    pub async fn process_images(
        &self,
        spot_name: &str,
        urls: &[String],
        prior_hashes: &[String],
    ) -> Vec<ProcessedImage> {
        let group_size = self.config.group_size.max(1);
        let mut processed = Vec::with_capacity(urls.len());
        let mut uploaded: HashMap<String, ProcessedImage> = HashMap::new();

        for (group_index, group) in urls.chunks(group_size).enumerate() {
            let first = group_index * group_size;
            let lookups = group.iter().enumerate().map(|(offset, url)| {
                let prior = prior_hashes.get(first + offset).map(String::as_str);
                self.lookup(url, prior)
            });
            let outcomes = join_all(lookups).await;

            for (offset, (url, outcome)) in group.iter().zip(outcomes).enumerate() {
                let index = first + offset;
                let result = match outcome {
                    Ok(lookup) => self.settle(spot_name, index, url, lookup, &mut uploaded).await,
                    Err(err) => Err(err),
                };
                match result {
                    Ok(image) => processed.push(image),
                    Err(err) => warn!("skipping image {url} of {spot_name:?}: {err}"),
                }
            }
        }
        processed
    }

    async fn lookup(&self, url: &str, prior_hash: Option<&str>) -> Result<Lookup, ImageError> {
        if !self.config.is_ephemeral(url)
            && let Some(image) = self.cached(url).await?
        {
            return Ok(Lookup::Cached(image));
        }

        if let Some(hash) = prior_hash
            && let Some(image) = self.stored(hash).await?
        {
            return Ok(Lookup::Stored(image));
        }

        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|source| ImageError::Download { source })?;
        let hash = content_hash(&bytes);
        if let Some(image) = self.stored(&hash).await? {
            return Ok(Lookup::Stored(image));
        }
        Ok(Lookup::Downloaded { hash, bytes })
    }

    async fn cached(&self, url: &str) -> Result<Option<ProcessedImage>, ImageError> {
        let key = cache_key(url);
        let entry = self
            .cache
            .get_cache_entry(&key)
            .map_err(|source| ImageError::Cache {
                operation: "read",
                source,
            })?;
        let Some(entry) = entry else {
            return Ok(None);
        };

        let alive = match self.storage.object_name(&entry.public_url) {
            Some(name) => self
                .storage
                .exists(&name)
                .await
                .map_err(storage_error("exists"))?,
            None => false,
        };
        if alive {
            debug!("image cache hit for {url}");
            return Ok(Some(ProcessedImage {
                public_url: entry.public_url,
                hash: entry.hash,
            }));
        }

        debug!("dropping stale image cache entry for {url}");
        if let Err(err) = self.cache.delete_cache_entry(&key) {
            warn!("failed to drop stale image cache entry for {url}: {err}");
        }
        Ok(None)
    }

    async fn stored(&self, hash: &str) -> Result<Option<ProcessedImage>, ImageError> {
        let name = self
            .storage
            .find_by_hash(hash)
            .await
            .map_err(storage_error("find_by_hash"))?;
        Ok(name.map(|name| ProcessedImage {
            public_url: self.storage.public_url(&name),
            hash: hash.to_owned(),
        }))
    }

    async fn settle(
        &self,
        spot_name: &str,
        index: usize,
        url: &str,
        lookup: Lookup,
        uploaded: &mut HashMap<String, ProcessedImage>,
    ) -> Result<ProcessedImage, ImageError> {
        let image = match lookup {
            Lookup::Cached(image) => return Ok(image),
            Lookup::Stored(image) => image,
            Lookup::Downloaded { hash, bytes } => {
                if let Some(image) = uploaded.get(&hash) {
                    image.clone()
                } else {
                    let image = self.upload(spot_name, index, url, hash, &bytes).await?;
                    uploaded.insert(image.hash.clone(), image.clone());
                    image
                }
            }
        };
        self.remember(url, &image);
        Ok(image)
    }

    async fn upload(
        &self,
        spot_name: &str,
        index: usize,
        url: &str,
        hash: String,
        bytes: &[u8],
    ) -> Result<ProcessedImage, ImageError> {
        let encoded = optimise(bytes, self.config).map_err(|source| ImageError::Decode {
            url: url.to_owned(),
            source,
        })?;
        let name = object_name(spot_name, &hash, index);
        self.storage
            .upload(&name, Bytes::from(encoded), "image/jpeg")
            .await
            .map_err(storage_error("upload"))?;
        self.storage
            .make_public(&name)
            .await
            .map_err(storage_error("make_public"))?;
        debug!("stored image {url} as {name}");
        Ok(ProcessedImage {
            public_url: self.storage.public_url(&name),
            hash,
        })
    }

    fn remember(&self, url: &str, image: &ProcessedImage) {
        if self.config.is_ephemeral(url) {
            return;
        }
        let entry = ImageCacheEntry {
            key: cache_key(url),
            hash: image.hash.clone(),
            public_url: image.public_url.clone(),
            last_checked: Utc::now(),
        };
        if let Err(err) = self.cache.put_cache_entry(&entry) {
            warn!("failed to cache image {url}: {err}");
        }
    }
}
