use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Length of one degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Haversine distance to `other`, in metres.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}\u{00b0}{}, {:.2}\u{00b0}{}",
            self.latitude.abs(),
            if self.latitude >= 0.0 { "N" } else { "S" },
            self.longitude.abs(),
            if self.longitude >= 0.0 { "E" } else { "W" },
        )
    }
}

/// Latitude/longitude deltas of a viewport. Both are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoomSpan {
    latitude_delta: f64,
    longitude_delta: f64,
}

impl ZoomSpan {
    /// 10 degrees on both axes: roughly one country.
    pub const DEFAULT: ZoomSpan = ZoomSpan {
        latitude_delta: 10.0,
        longitude_delta: 10.0,
    };

    pub fn new(latitude_delta: f64, longitude_delta: f64) -> Result<Self, DatasetError> {
        for delta in [latitude_delta, longitude_delta] {
            if !(delta.is_finite() && delta > 0.0) {
                return Err(DatasetError::InvalidSpan(delta));
            }
        }
        Ok(Self {
            latitude_delta,
            longitude_delta,
        })
    }

    /// Equal deltas on both axes.
    pub fn square(degrees: f64) -> Result<Self, DatasetError> {
        Self::new(degrees, degrees)
    }

    pub fn latitude_delta(&self) -> f64 {
        self.latitude_delta
    }

    pub fn longitude_delta(&self) -> f64 {
        self.longitude_delta
    }
}

/// The visible map area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: Coordinate,
    pub span: ZoomSpan,
}

impl Viewport {
    pub fn new(center: Coordinate, span: ZoomSpan) -> Self {
        Self { center, span }
    }

    /// (min_lon, min_lat, max_lon, max_lat)
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        let half_lat = self.span.latitude_delta / 2.0;
        let half_lon = self.span.longitude_delta / 2.0;
        (
            self.center.longitude - half_lon,
            self.center.latitude - half_lat,
            self.center.longitude + half_lon,
            self.center.latitude + half_lat,
        )
    }

    pub fn contains(&self, point: &Coordinate) -> bool {
        let (min_lon, min_lat, max_lon, max_lat) = self.bbox();
        point.longitude >= min_lon
            && point.longitude <= max_lon
            && point.latitude >= min_lat
            && point.latitude <= max_lat
    }
}

/// Convert a ground distance to (lat_degrees, lon_degrees) at the given latitude.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> (f64, f64) {
    let lat_deg = meters / METERS_PER_DEGREE;
    // Longitude degrees shrink towards the poles; clamp so the poles stay finite.
    let cos_lat = latitude.to_radians().cos().max(0.01);
    (lat_deg, lat_deg / cos_lat)
}
