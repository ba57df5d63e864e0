use std::sync::Arc;

use crate::error::ServiceError;
use crate::geo::Coordinate;
use crate::normalize::CountryNormalizer;
use crate::region::RegionCatalog;
use crate::resolver::{DeviceLocationService, GeocodingService, Permission, Place};

/// Reverse lookups farther than this from every region centre find nothing.
pub const MAX_REVERSE_DISTANCE_METERS: f64 = 1_500_000.0;

/// Geocoder backed only by the region catalog and the country-name table.
///
/// Forward lookups understand region keys, display names and any name the
/// normalizer knows; reverse lookups answer with the nearest region.
pub struct CatalogGeocoder {
    catalog: Arc<RegionCatalog>,
    normalizer: CountryNormalizer,
}

impl CatalogGeocoder {
    pub fn new(catalog: Arc<RegionCatalog>, normalizer: CountryNormalizer) -> Self {
        Self {
            catalog,
            normalizer,
        }
    }

    fn lookup(&self, query: &str) -> Option<Coordinate> {
        if let Some(region) = self.catalog.find(query) {
            return Some(region.center);
        }
        let key = self.normalizer.normalize(query)?;
        self.catalog.get(key).map(|r| r.center)
    }
}

impl GeocodingService for CatalogGeocoder {
    async fn forward_geocode(&self, query: &str) -> Result<Vec<Coordinate>, ServiceError> {
        Ok(self.lookup(query).into_iter().collect())
    }

    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Vec<Place>, ServiceError> {
        Ok(self
            .catalog
            .nearest(&coordinate)
            .filter(|(_, distance)| *distance <= MAX_REVERSE_DISTANCE_METERS)
            .map(|(region, _)| Place::country(region.display_name.clone()))
            .into_iter()
            .collect())
    }
}

/// Device locator with a fixed answer, for `--lat/--lon` and tests.
#[derive(Debug, Clone)]
pub struct StaticDeviceLocator {
    coordinate: Option<Coordinate>,
    permission: Permission,
}

impl StaticDeviceLocator {
    /// Permission granted, located at `coordinate`.
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            coordinate: Some(coordinate),
            permission: Permission::Granted,
        }
    }

    /// The user refuses the permission prompt.
    pub fn denied() -> Self {
        Self {
            coordinate: None,
            permission: Permission::Denied,
        }
    }

    /// No location hardware at all.
    pub fn unavailable() -> Self {
        Self {
            coordinate: None,
            permission: Permission::Granted,
        }
    }
}

impl DeviceLocationService for StaticDeviceLocator {
    async fn request_permission(&self) -> Permission {
        self.permission
    }

    async fn current_coordinate(&self) -> Result<Coordinate, ServiceError> {
        self.coordinate
            .ok_or_else(|| ServiceError::Unavailable("no device location".to_string()))
    }

    fn is_available(&self) -> bool {
        self.coordinate.is_some() || self.permission == Permission::Denied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geocoder() -> CatalogGeocoder {
        CatalogGeocoder::new(
            Arc::new(RegionCatalog::embedded().unwrap()),
            CountryNormalizer::default(),
        )
    }

    #[tokio::test]
    async fn forward_matches_names_and_aliases() {
        let g = geocoder();
        let norway = Coordinate::new(60.472, 8.4689);
        assert_eq!(g.forward_geocode("Norway").await.unwrap(), vec![norway]);
        assert_eq!(g.forward_geocode("norge").await.unwrap(), vec![norway]);
        assert_eq!(
            g.forward_geocode("United Kingdom").await.unwrap(),
            vec![Coordinate::new(52.3555, -1.1743)]
        );
        assert!(g.forward_geocode("Oslo").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reverse_returns_nearest_region_name() {
        let g = geocoder();
        let places = g
            .reverse_geocode(Coordinate::new(59.9, 10.7))
            .await
            .unwrap();
        assert_eq!(places, vec![Place::country("Norway")]);
    }

    #[tokio::test]
    async fn reverse_far_from_everything_is_empty() {
        let g = geocoder();
        let places = g
            .reverse_geocode(Coordinate::new(-33.9, 151.2))
            .await
            .unwrap();
        assert!(places.is_empty());
    }

    #[tokio::test]
    async fn static_locator_variants() {
        let here = Coordinate::new(57.0, -2.0);
        let located = StaticDeviceLocator::at(here);
        assert!(located.is_available());
        assert_eq!(located.request_permission().await, Permission::Granted);
        assert_eq!(located.current_coordinate().await.unwrap(), here);

        let denied = StaticDeviceLocator::denied();
        assert!(denied.is_available());
        assert_eq!(denied.request_permission().await, Permission::Denied);

        let none = StaticDeviceLocator::unavailable();
        assert!(!none.is_available());
        assert!(none.current_coordinate().await.is_err());
    }
}
