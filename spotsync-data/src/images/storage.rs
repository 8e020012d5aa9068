//! Object storage abstraction for stored images.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use super::naming::hash_from_object_name;
use super::OBJECT_PREFIX;

/// Errors reported by an [`ObjectStorage`] backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Filesystem failure in a local backend.
    #[error("storage I/O failed for {name}")]
    Io {
        /// Object or directory involved.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The backend refused or could not complete the request.
    #[error("storage backend unavailable: {message}")]
    Unavailable {
        /// Backend diagnostic.
        message: String,
    },
}

/// A bucket of named binary objects with public URLs.
#[async_trait(?Send)]
pub trait ObjectStorage {
    /// Report whether an object exists.
    async fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Store an object, replacing any previous content.
    async fn upload(&self, name: &str, bytes: Bytes, content_type: &str)
    -> Result<(), StorageError>;

    /// Allow anonymous reads of an object.
    async fn make_public(&self, name: &str) -> Result<(), StorageError>;

    /// Names of all objects starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Delete an object, returning whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;

    /// URL an object is served from.
    fn public_url(&self, name: &str) -> String;

    /// Object name behind a URL produced by [`ObjectStorage::public_url`].
    fn object_name(&self, public_url: &str) -> Option<String>;

    /// Name of an existing image object whose name embeds `hash`.
    async fn find_by_hash(&self, hash: &str) -> Result<Option<String>, StorageError> {
        let names = self.list(OBJECT_PREFIX).await?;
        Ok(names
            .into_iter()
            .find(|name| hash_from_object_name(name) == Some(hash)))
    }
}
