use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::error::ServiceError;
use crate::geo::Coordinate;
use crate::resolver::{GeocodingService, Place};

const MAX_CANDIDATES: &str = "5";

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

impl SearchHit {
    fn coordinate(&self) -> Result<Coordinate, ServiceError> {
        let parse = |s: &str| {
            s.parse::<f64>()
                .map_err(|e| ServiceError::Parse(format!("bad coordinate '{s}': {e}")))
        };
        Ok(Coordinate::new(parse(&self.lat)?, parse(&self.lon)?))
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Address {
    country: Option<String>,
}

/// OpenStreetMap Nominatim geocoder.
pub struct NominatimGeocoder {
    http: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ServiceError> {
        Url::parse_with_params(&format!("{}/{path}", self.base_url), params)
            .map_err(|e| ServiceError::Unavailable(format!("bad geocoder URL: {e}")))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ServiceError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        resp.json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }
}

impl GeocodingService for NominatimGeocoder {
    async fn forward_geocode(&self, query: &str) -> Result<Vec<Coordinate>, ServiceError> {
        let url = self.endpoint(
            "search",
            &[("q", query), ("format", "jsonv2"), ("limit", MAX_CANDIDATES)],
        )?;
        let hits: Vec<SearchHit> = self.get_json(url).await?;
        debug!(query, candidates = hits.len(), "forward geocode");
        hits.iter().map(SearchHit::coordinate).collect()
    }

    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Vec<Place>, ServiceError> {
        let lat = coordinate.latitude.to_string();
        let lon = coordinate.longitude.to_string();
        let url = self.endpoint(
            "reverse",
            &[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("format", "jsonv2"),
                ("zoom", "3"),
                ("accept-language", "en"),
            ],
        )?;
        let resp: ReverseResponse = self.get_json(url).await?;
        Ok(reverse_places(resp))
    }
}

/// Nominatim answers open sea with `{"error": ...}`; that is "no place", not a failure.
fn reverse_places(resp: ReverseResponse) -> Vec<Place> {
    if let Some(error) = resp.error {
        debug!(%error, "reverse geocode found nothing");
        return Vec::new();
    }
    resp.address
        .map(|a| Place { country: a.country })
        .into_iter()
        .collect()
}
