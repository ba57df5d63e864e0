//! Concrete collaborators for [`LocationResolver`](crate::resolver::LocationResolver).
//!
//! The HTTP-backed services need the `online` feature. The offline pair works
//! from the region catalog and fixed coordinates alone.

#[cfg(feature = "online")]
mod geoip;
#[cfg(feature = "online")]
mod nominatim;
mod offline;

#[cfg(feature = "online")]
pub use geoip::IpDeviceLocator;
#[cfg(feature = "online")]
pub use nominatim::NominatimGeocoder;
pub use offline::{CatalogGeocoder, StaticDeviceLocator};

/// Shared HTTP client for the online services.
#[cfg(feature = "online")]
pub fn http_client(
    user_agent: &str,
    timeout: std::time::Duration,
) -> Result<reqwest::Client, crate::error::ServiceError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| crate::error::ServiceError::Unavailable(e.to_string()))
}
