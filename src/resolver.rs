//! Location resolution: free text, device GPS or a dropdown region turned
//! into a coordinate plus, when one applies, a region key.
//!
//! The external collaborators are traits so the resolver can run against
//! real HTTP services, the offline catalog, or scripted fakes in tests.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{ResolutionError, ServiceError};
use crate::geo::Coordinate;
use crate::normalize::CountryNormalizer;
use crate::region::RegionCatalog;

/// Outcome of a device location permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// One reverse-geocoding candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Place {
    pub country: Option<String>,
}

impl Place {
    pub fn country(name: impl Into<String>) -> Self {
        Self {
            country: Some(name.into()),
        }
    }
}

/// Forward and reverse geocoding.
pub trait GeocodingService: Send + Sync {
    /// Candidate coordinates for a place name, best first.
    fn forward_geocode(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Coordinate>, ServiceError>> + Send;

    /// Places at a coordinate, best first.
    fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> impl Future<Output = Result<Vec<Place>, ServiceError>> + Send;
}

/// Device GPS, gated by a permission prompt.
pub trait DeviceLocationService: Send + Sync {
    fn request_permission(&self) -> impl Future<Output = Permission> + Send;

    fn current_coordinate(&self) -> impl Future<Output = Result<Coordinate, ServiceError>> + Send;

    /// Whether this device can locate itself at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// What the user asked to locate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationInput {
    FreeText(String),
    DeviceLocation,
    /// A region picked from the dropdown, by key.
    Region(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    pub coordinate: Coordinate,
    /// `None` when the place has no contamination-risk region.
    pub matched_region_key: Option<String>,
}

pub struct LocationResolver<G, D> {
    geocoder: G,
    device: D,
    normalizer: CountryNormalizer,
    catalog: Arc<RegionCatalog>,
}

impl<G, D> LocationResolver<G, D>
where
    G: GeocodingService,
    D: DeviceLocationService,
{
    pub fn new(
        geocoder: G,
        device: D,
        normalizer: CountryNormalizer,
        catalog: Arc<RegionCatalog>,
    ) -> Self {
        Self {
            geocoder,
            device,
            normalizer,
            catalog,
        }
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    pub fn device_available(&self) -> bool {
        self.device.is_available()
    }

    pub async fn resolve(&self, input: &LocationInput) -> Result<ResolutionResult, ResolutionError> {
        match input {
            LocationInput::FreeText(text) => self.resolve_text(text).await,
            LocationInput::DeviceLocation => self.resolve_device().await,
            LocationInput::Region(key) => self.resolve_region(key),
        }
    }

    async fn resolve_device(&self) -> Result<ResolutionResult, ResolutionError> {
        if self.device.request_permission().await == Permission::Denied {
            info!("device location permission denied");
            return Err(ResolutionError::PermissionDenied);
        }
        let coordinate = self.device.current_coordinate().await?;
        debug!(%coordinate, "device located");
        Ok(ResolutionResult {
            coordinate,
            matched_region_key: None,
        })
    }

    fn resolve_region(&self, key: &str) -> Result<ResolutionResult, ResolutionError> {
        let region = self
            .catalog
            .get(key)
            .ok_or_else(|| ResolutionError::NotFound {
                query: key.to_string(),
            })?;
        Ok(ResolutionResult {
            coordinate: region.center,
            matched_region_key: Some(region.key.clone()),
        })
    }

    async fn resolve_text(&self, text: &str) -> Result<ResolutionResult, ResolutionError> {
        let query = text.trim();
        if query.is_empty() {
            return Err(ResolutionError::NotFound {
                query: text.to_string(),
            });
        }

        let candidates = self.geocoder.forward_geocode(query).await?;
        let Some(&coordinate) = candidates.first() else {
            debug!(query, "forward geocoding returned no candidates");
            return Err(ResolutionError::NotFound {
                query: query.to_string(),
            });
        };

        let places = self.geocoder.reverse_geocode(coordinate).await?;
        let country = places.into_iter().find_map(|p| p.country);
        let matched_region_key = country
            .as_deref()
            .and_then(|name| self.region_for_country(name));

        debug!(
            query,
            %coordinate,
            country = country.as_deref().unwrap_or("-"),
            region = matched_region_key.as_deref().unwrap_or("-"),
            "free text resolved"
        );
        Ok(ResolutionResult {
            coordinate,
            matched_region_key,
        })
    }

    /// Only keys present in the catalog are reported.
    fn region_for_country(&self, country: &str) -> Option<String> {
        let key = self.normalizer.normalize(country)?;
        match self.catalog.get(key) {
            Some(region) => Some(region.key.clone()),
            None => {
                warn!(country, key, "normalized region key is not in the catalog");
                None
            }
        }
    }
}
