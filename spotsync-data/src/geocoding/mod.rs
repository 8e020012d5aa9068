//! Geocoding between coordinates and street addresses.
//!
//! [`Geocoder`] implementations never raise: every failure comes back as a
//! [`GeocodeFailure`] the sync pipeline can count and move past. Callers that
//! issue several requests in a batch space them with a [`GeocodeThrottle`].

mod google;
mod http;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use geo::Coord;
use thiserror::Error;
use tokio::time::Instant;

pub use self::http::{DEFAULT_GEOCODER_URL, HttpGeocoder, HttpGeocoderConfig};

/// Address fields derived from a location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressDetails {
    /// Formatted street address.
    pub address: Option<String>,
    /// City or closest equivalent administrative area.
    pub city: Option<String>,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: Option<String>,
}

/// Why a geocoding request produced no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeocodeFailureKind {
    /// The service could not be reached or answered with an HTTP error.
    Transport,
    /// The service found nothing for the query.
    NoResults,
    /// The service refused the request, for example over quota.
    Rejected,
    /// The response could not be decoded.
    Malformed,
}

impl fmt::Display for GeocodeFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transport => "transport",
            Self::NoResults => "no results",
            Self::Rejected => "rejected",
            Self::Malformed => "malformed response",
        })
    }
}

/// Tagged geocoding failure with a human-readable reason.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("geocoding failed ({kind}): {reason}")]
pub struct GeocodeFailure {
    /// Failure category.
    pub kind: GeocodeFailureKind,
    /// Diagnostic detail.
    pub reason: String,
}

impl GeocodeFailure {
    /// Build a failure of the given kind.
    pub fn new(kind: GeocodeFailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Converts between coordinates and addresses.
#[async_trait(?Send)]
pub trait Geocoder {
    /// Look up the address, city and country of a location.
    async fn forward(&self, location: Coord<f64>) -> Result<AddressDetails, GeocodeFailure>;

    /// Resolve a street address to coordinates (`x = longitude`).
    async fn reverse(&self, address: &str) -> Result<Coord<f64>, GeocodeFailure>;
}

/// Spaces consecutive geocoding calls by a fixed delay.
///
/// The first call proceeds immediately; each later call waits until `delay`
/// has elapsed since the previous one was released.
#[derive(Debug, Clone)]
pub struct GeocodeThrottle {
    delay: Duration,
    last: Option<Instant>,
}

impl GeocodeThrottle {
    /// Create a throttle with the given spacing.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    /// Configured spacing between calls.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait for the next call slot.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + self.delay).await;
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::block_on_for_tests;
    use rstest::rstest;

    #[rstest]
    fn throttle_spaces_calls() {
        let delay = Duration::from_millis(25);
        let mut throttle = GeocodeThrottle::new(delay);
        let elapsed = block_on_for_tests(async {
            let started = Instant::now();
            throttle.wait().await;
            let first = started.elapsed();
            throttle.wait().await;
            throttle.wait().await;
            (first, started.elapsed())
        });
        assert!(elapsed.0 < delay, "first call waited {:?}", elapsed.0);
        assert!(elapsed.1 >= delay * 2, "calls were not spaced: {:?}", elapsed.1);
    }

    #[rstest]
    fn failures_render_kind_and_reason() {
        let failure = GeocodeFailure::new(GeocodeFailureKind::NoResults, "ZERO_RESULTS");
        assert_eq!(
            failure.to_string(),
            "geocoding failed (no results): ZERO_RESULTS"
        );
    }
}
