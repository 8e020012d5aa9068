//! [`Geocoder`] backed by a Google-compatible geocoding JSON API.

use std::time::Duration;

use async_trait::async_trait;
use geo::Coord;
use log::debug;
use reqwest::Client;

use super::google::{GeocodeResponse, GeocodeResult};
use super::{AddressDetails, GeocodeFailure, GeocodeFailureKind, Geocoder};
use crate::transport::{ConfigurationError, DEFAULT_USER_AGENT, convert_reqwest_error};

/// Default endpoint of the geocoding service.
pub const DEFAULT_GEOCODER_URL: &str = "https://maps.googleapis.com/maps/api/geocode";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for [`HttpGeocoder`].
#[derive(Debug, Clone)]
pub struct HttpGeocoderConfig {
    /// Service endpoint without the trailing `/json`.
    pub base_url: String,
    /// API key; construction fails without one.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Preferred result language, for example `en`.
    pub language: Option<String>,
}

impl Default for HttpGeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOCODER_URL.to_owned(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            language: None,
        }
    }
}

impl HttpGeocoderConfig {
    /// Create a configuration using the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Point the geocoder at a different endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Request results in the given language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// HTTP geocoder.
#[derive(Debug, Clone)]
pub struct HttpGeocoder {
    client: Client,
    config: HttpGeocoderConfig,
    api_key: String,
}

impl HttpGeocoder {
    /// Create a geocoder with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingCredential`] when no API key is
    /// configured, and [`ConfigurationError::HttpClient`] when the client
    /// cannot be built. No request is issued in either case.
    pub fn with_config(config: HttpGeocoderConfig) -> Result<Self, ConfigurationError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigurationError::MissingCredential {
                name: "geocoder api key",
            })?
            .to_owned();
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|source| ConfigurationError::HttpClient { source })?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/json", self.config.base_url.trim_end_matches('/'))
    }

    fn query_url(&self, query: &str) -> String {
        let mut url = format!(
            "{}?{query}&key={}",
            self.endpoint(),
            urlencoding::encode(&self.api_key)
        );
        if let Some(language) = &self.config.language {
            url.push_str("&language=");
            url.push_str(&urlencoding::encode(language));
        }
        url
    }

    async fn request(&self, query: &str) -> Result<GeocodeResult, GeocodeFailure> {
        let url = self.query_url(query);
        // Keep the key out of diagnostics.
        let shown = self.endpoint();
        let transport = |err: &reqwest::Error| {
            let error = convert_reqwest_error(err, &shown, self.config.timeout);
            GeocodeFailure::new(GeocodeFailureKind::Transport, error.to_string())
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| transport(&err))?
            .error_for_status()
            .map_err(|err| transport(&err))?;
        let body: GeocodeResponse = response.json().await.map_err(|err| {
            GeocodeFailure::new(GeocodeFailureKind::Malformed, err.to_string())
        })?;
        first_result(body)
    }
}

/// Interpret the service status and pick the best result.
fn first_result(body: GeocodeResponse) -> Result<GeocodeResult, GeocodeFailure> {
    match body.status.as_str() {
        "OK" => body.results.into_iter().next().ok_or_else(|| {
            GeocodeFailure::new(GeocodeFailureKind::NoResults, "empty result list")
        }),
        "ZERO_RESULTS" => Err(GeocodeFailure::new(
            GeocodeFailureKind::NoResults,
            "ZERO_RESULTS",
        )),
        status => {
            let detail = body.error_message.unwrap_or_default();
            Err(GeocodeFailure::new(
                GeocodeFailureKind::Rejected,
                format!("{status} {detail}").trim_end().to_owned(),
            ))
        }
    }
}

fn address_details(result: &GeocodeResult) -> AddressDetails {
    AddressDetails {
        address: result.formatted_address.clone(),
        city: result.city(),
        country_code: result.country_code(),
    }
}

fn coordinates(result: &GeocodeResult) -> Result<Coord<f64>, GeocodeFailure> {
    let location = result
        .geometry
        .as_ref()
        .map(|geometry| &geometry.location)
        .ok_or_else(|| GeocodeFailure::new(GeocodeFailureKind::Malformed, "missing geometry"))?;
    Ok(Coord {
        x: location.lng,
        y: location.lat,
    })
}

#[async_trait(?Send)]
impl Geocoder for HttpGeocoder {
    async fn forward(&self, location: Coord<f64>) -> Result<AddressDetails, GeocodeFailure> {
        debug!("geocoding {},{}", location.y, location.x);
        let query = format!("latlng={},{}", location.y, location.x);
        self.request(&query).await.map(|result| address_details(&result))
    }

    async fn reverse(&self, address: &str) -> Result<Coord<f64>, GeocodeFailure> {
        debug!("resolving address {address:?}");
        let query = format!("address={}", urlencoding::encode(address));
        let result = self.request(&query).await?;
        coordinates(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn response(json: &str) -> GeocodeResponse {
        serde_json::from_str(json).expect("should deserialise")
    }

    #[rstest]
    #[case(None)]
    #[case(Some("   "))]
    fn refuses_to_build_without_a_key(#[case] key: Option<&str>) {
        let config = HttpGeocoderConfig {
            api_key: key.map(str::to_owned),
            ..HttpGeocoderConfig::default()
        };
        let err = HttpGeocoder::with_config(config).expect_err("key is required");
        assert!(matches!(
            err,
            ConfigurationError::MissingCredential { name: "geocoder api key" }
        ));
    }

    #[rstest]
    fn builds_query_urls() {
        let geocoder = HttpGeocoder::with_config(
            HttpGeocoderConfig::new("k&y")
                .with_base_url("http://geo.example/api/")
                .with_language("en"),
        )
        .expect("geocoder should build");
        assert_eq!(
            geocoder.query_url("address=1%20Main"),
            "http://geo.example/api/json?address=1%20Main&key=k%26y&language=en"
        );
    }

    #[rstest]
    fn maps_statuses_to_failure_kinds() {
        let none = first_result(response(r#"{"status": "ZERO_RESULTS"}"#)).expect_err("none");
        assert_eq!(none.kind, GeocodeFailureKind::NoResults);

        let denied = first_result(response(
            r#"{"status": "OVER_QUERY_LIMIT", "error_message": "slow down"}"#,
        ))
        .expect_err("denied");
        assert_eq!(denied.kind, GeocodeFailureKind::Rejected);
        assert_eq!(denied.reason, "OVER_QUERY_LIMIT slow down");

        let empty = first_result(response(r#"{"status": "OK", "results": []}"#)).expect_err("empty");
        assert_eq!(empty.kind, GeocodeFailureKind::NoResults);
    }

    #[rstest]
    fn extracts_details_and_coordinates() {
        let result = first_result(response(
            r#"{"status": "OK", "results": [{
                "formatted_address": "Unter den Linden 1, 10117 Berlin, Germany",
                "address_components": [
                    {"long_name": "Berlin", "short_name": "Berlin", "types": ["locality"]},
                    {"long_name": "Germany", "short_name": "DE", "types": ["country"]}
                ],
                "geometry": {"location": {"lat": 52.517, "lng": 13.397}}
            }]}"#,
        ))
        .expect("ok");
        assert_eq!(
            address_details(&result),
            AddressDetails {
                address: Some("Unter den Linden 1, 10117 Berlin, Germany".into()),
                city: Some("Berlin".into()),
                country_code: Some("DE".into()),
            }
        );
        assert_eq!(coordinates(&result).expect("coords"), Coord { x: 13.397, y: 52.517 });
    }
}
