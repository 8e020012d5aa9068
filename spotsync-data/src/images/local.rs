//! Object storage on the local filesystem.

use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use log::debug;
use spotsync_fs::{
    file_exists_in_dir, list_file_names, open_or_create_dir, remove_file_in_dir, write_in_dir,
};

use super::OBJECT_PREFIX;
use super::naming::hash_from_object_name;
use super::storage::{ObjectStorage, StorageError};

/// Stores objects as files below a root directory.
///
/// Every object is public: the directory is expected to be served verbatim
/// at `public_base_url`.
///
/// Hash lookups are answered from an index built by listing the image
/// prefix once; uploads and deletes made through this handle keep it
/// current.
#[derive(Debug)]
pub struct LocalObjectStorage {
    root: Dir,
    root_path: Utf8PathBuf,
    public_base_url: String,
    by_hash: RefCell<Option<HashMap<String, String>>>,
}

impl LocalObjectStorage {
    /// Open (creating if needed) a storage root.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the directory cannot be created or
    /// opened.
    pub fn open(root: &Utf8Path, public_base_url: impl Into<String>) -> Result<Self, StorageError> {
        let dir = open_or_create_dir(root).map_err(|source| StorageError::Io {
            name: root.to_string(),
            source,
        })?;
        let mut public_base_url = public_base_url.into();
        if !public_base_url.ends_with('/') {
            public_base_url.push('/');
        }
        Ok(Self {
            root: dir,
            root_path: root.to_path_buf(),
            public_base_url,
            by_hash: RefCell::new(None),
        })
    }

    /// Directory holding the objects.
    #[must_use]
    pub fn root_path(&self) -> &Utf8Path {
        &self.root_path
    }

    async fn hash_index_loaded(&self) -> Result<(), StorageError> {
        if self.by_hash.borrow().is_some() {
            return Ok(());
        }
        let names = self.list(OBJECT_PREFIX).await?;
        let mut index = HashMap::with_capacity(names.len());
        for name in names {
            if let Some(hash) = hash_from_object_name(&name) {
                index.entry(hash.to_owned()).or_insert(name);
            }
        }
        debug!("indexed {} stored images by hash", index.len());
        *self.by_hash.borrow_mut() = Some(index);
        Ok(())
    }

    fn index_upload(&self, name: &str) {
        let Some(hash) = hash_from_object_name(name) else {
            return;
        };
        if let Some(index) = self.by_hash.borrow_mut().as_mut() {
            index
                .entry(hash.to_owned())
                .or_insert_with(|| name.to_owned());
        }
    }

    fn unindex(&self, name: &str) {
        let Some(hash) = hash_from_object_name(name) else {
            return;
        };
        if let Some(index) = self.by_hash.borrow_mut().as_mut()
            && index.get(hash).is_some_and(|indexed| indexed == name)
        {
            index.remove(hash);
        }
    }
}

fn io_error(name: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        name: name.to_owned(),
        source,
    }
}

#[async_trait(?Send)]
impl ObjectStorage for LocalObjectStorage {
    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        file_exists_in_dir(&self.root, Utf8Path::new(name)).map_err(io_error(name))
    }

    async fn upload(
        &self,
        name: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        write_in_dir(&self.root, Utf8Path::new(name), &bytes).map_err(io_error(name))?;
        self.index_upload(name);
        Ok(())
    }

    async fn make_public(&self, name: &str) -> Result<(), StorageError> {
        if self.exists(name).await? {
            Ok(())
        } else {
            Err(StorageError::Unavailable {
                message: format!("cannot publish missing object {name}"),
            })
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let (directory, file_prefix) = prefix.rsplit_once('/').unwrap_or(("", prefix));
        let listed = if directory.is_empty() { "." } else { directory };
        let names =
            list_file_names(&self.root, Utf8Path::new(listed)).map_err(io_error(listed))?;
        Ok(names
            .into_iter()
            .filter(|name| name.starts_with(file_prefix))
            .map(|name| {
                if directory.is_empty() {
                    name
                } else {
                    format!("{directory}/{name}")
                }
            })
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let removed =
            remove_file_in_dir(&self.root, Utf8Path::new(name)).map_err(io_error(name))?;
        self.unindex(name);
        Ok(removed)
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<String>, StorageError> {
        self.hash_index_loaded().await?;
        let indexed = self
            .by_hash
            .borrow()
            .as_ref()
            .and_then(|index| index.get(hash).cloned());
        let Some(name) = indexed else {
            return Ok(None);
        };
        // Files removed behind our back leave stale entries.
        if self.exists(&name).await? {
            Ok(Some(name))
        } else {
            self.unindex(&name);
            Ok(None)
        }
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}{name}", self.public_base_url)
    }

    fn object_name(&self, public_url: &str) -> Option<String> {
        public_url
            .strip_prefix(&self.public_base_url)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
    }
}
