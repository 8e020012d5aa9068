//! Deterministic test doubles for the pipeline's external collaborators.
//!
//! Nothing here performs network I/O. Doubles record how they were used so
//! tests can assert on call counts.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::io::{Cursor, Write};

use async_trait::async_trait;
use bytes::Bytes;
use geo::Coord;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::geocoding::{AddressDetails, GeocodeFailure, GeocodeFailureKind, Geocoder};
use crate::images::{ObjectStorage, StorageError};
use crate::transport::{Fetcher, TransportError};

/// Run a future to completion on a fresh current-thread runtime.
///
/// # Panics
///
/// Panics when the runtime cannot be built.
pub fn block_on_for_tests<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime should build")
        .block_on(future)
}

/// [`Fetcher`] serving canned responses.
///
/// Unknown URLs fail with an HTTP 404 transport error.
#[derive(Debug, Default)]
pub struct StubFetcher {
    responses: RefCell<HashMap<String, Result<Bytes, TransportError>>>,
    fetched: RefCell<Vec<String>>,
}

impl StubFetcher {
    /// Serve `body` for `url`.
    pub fn respond(&self, url: &str, body: impl Into<Bytes>) {
        self.responses
            .borrow_mut()
            .insert(url.to_owned(), Ok(body.into()));
    }

    /// Fail requests for `url` with `error`.
    pub fn fail(&self, url: &str, error: TransportError) {
        self.responses.borrow_mut().insert(url.to_owned(), Err(error));
    }

    /// Number of fetches issued so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetched.borrow().len()
    }

    /// URLs fetched, in call order.
    #[must_use]
    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, TransportError> {
        self.fetched.borrow_mut().push(url.to_owned());
        self.responses
            .borrow()
            .get(url)
            .cloned()
            .unwrap_or_else(|| {
                Err(TransportError::Http {
                    url: url.to_owned(),
                    status: 404,
                    message: String::from("not found"),
                })
            })
    }
}

/// [`Geocoder`] answering from fixed tables.
///
/// Forward lookups return [`StubGeocoder::details`] unless a failure is
/// configured; reverse lookups succeed only for registered addresses.
#[derive(Debug, Default)]
pub struct StubGeocoder {
    details: RefCell<AddressDetails>,
    forward_failure: RefCell<Option<GeocodeFailure>>,
    addresses: RefCell<HashMap<String, Coord<f64>>>,
    forward_calls: Cell<usize>,
    reverse_calls: Cell<usize>,
}

impl StubGeocoder {
    /// Geocoder whose forward lookups all return `details`.
    #[must_use]
    pub fn with_details(details: AddressDetails) -> Self {
        Self {
            details: RefCell::new(details),
            ..Self::default()
        }
    }

    /// Details returned by forward lookups.
    #[must_use]
    pub fn details(&self) -> AddressDetails {
        self.details.borrow().clone()
    }

    /// Make forward lookups fail.
    pub fn fail_forward(&self, failure: GeocodeFailure) {
        *self.forward_failure.borrow_mut() = Some(failure);
    }

    /// Resolve `address` to `location` in reverse lookups.
    pub fn register_address(&self, address: &str, location: Coord<f64>) {
        self.addresses
            .borrow_mut()
            .insert(address.to_owned(), location);
    }

    /// Forward lookups issued so far.
    #[must_use]
    pub fn forward_calls(&self) -> usize {
        self.forward_calls.get()
    }

    /// Reverse lookups issued so far.
    #[must_use]
    pub fn reverse_calls(&self) -> usize {
        self.reverse_calls.get()
    }
}

#[async_trait(?Send)]
impl Geocoder for StubGeocoder {
    async fn forward(&self, _location: Coord<f64>) -> Result<AddressDetails, GeocodeFailure> {
        self.forward_calls.set(self.forward_calls.get() + 1);
        match self.forward_failure.borrow().clone() {
            Some(failure) => Err(failure),
            None => Ok(self.details()),
        }
    }

    async fn reverse(&self, address: &str) -> Result<Coord<f64>, GeocodeFailure> {
        self.reverse_calls.set(self.reverse_calls.get() + 1);
        self.addresses.borrow().get(address).copied().ok_or_else(|| {
            GeocodeFailure::new(GeocodeFailureKind::NoResults, format!("unknown address {address}"))
        })
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Bytes,
    public: bool,
}

/// Base URL of objects held by [`MemoryObjectStorage`].
pub const MEMORY_STORAGE_URL: &str = "https://objects.test/";

/// [`ObjectStorage`] over an in-memory map.
#[derive(Debug, Default)]
pub struct MemoryObjectStorage {
    objects: RefCell<BTreeMap<String, StoredObject>>,
    uploads: Cell<usize>,
    fail_uploads: Cell<bool>,
}

impl MemoryObjectStorage {
    /// Number of stored objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.borrow().len()
    }

    /// Report whether an object is stored.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.objects.borrow().contains_key(name)
    }

    /// Report whether an object has been made public.
    #[must_use]
    pub fn is_public(&self, name: &str) -> bool {
        self.objects.borrow().get(name).is_some_and(|object| object.public)
    }

    /// Content of a stored object.
    #[must_use]
    pub fn bytes(&self, name: &str) -> Option<Bytes> {
        self.objects.borrow().get(name).map(|object| object.bytes.clone())
    }

    /// Uploads accepted so far.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.get()
    }

    /// Remove every object, simulating external deletion.
    pub fn clear(&self) {
        self.objects.borrow_mut().clear();
    }

    /// Make uploads fail until reset.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.set(fail);
    }
}

#[async_trait(?Send)]
impl ObjectStorage for MemoryObjectStorage {
    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.contains(name))
    }

    async fn upload(
        &self,
        name: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        if self.fail_uploads.get() {
            return Err(StorageError::Unavailable {
                message: String::from("uploads disabled"),
            });
        }
        self.uploads.set(self.uploads.get() + 1);
        self.objects.borrow_mut().insert(
            name.to_owned(),
            StoredObject {
                bytes,
                public: false,
            },
        );
        Ok(())
    }

    async fn make_public(&self, name: &str) -> Result<(), StorageError> {
        match self.objects.borrow_mut().get_mut(name) {
            Some(object) => {
                object.public = true;
                Ok(())
            }
            None => Err(StorageError::Unavailable {
                message: format!("no object named {name}"),
            }),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .borrow()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.objects.borrow_mut().remove(name).is_some())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{MEMORY_STORAGE_URL}{name}")
    }

    fn object_name(&self, public_url: &str) -> Option<String> {
        public_url.strip_prefix(MEMORY_STORAGE_URL).map(str::to_owned)
    }
}

/// Zip `(path, contents)` entries into a KMZ archive.
///
/// # Panics
///
/// Panics when the archive cannot be written.
#[must_use]
pub fn build_kmz(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("archive entry should start");
        writer
            .write_all(contents.as_bytes())
            .expect("archive entry should be written");
    }
    writer
        .finish()
        .expect("archive should be finalised")
        .into_inner()
}

/// Encode a solid-colour PNG.
///
/// # Panics
///
/// Panics when encoding fails.
#[must_use]
pub fn sample_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)));
    let mut encoded = Cursor::new(Vec::new());
    image
        .write_to(&mut encoded, ImageFormat::Png)
        .expect("png should encode");
    encoded.into_inner()
}
