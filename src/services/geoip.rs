use serde::Deserialize;
use tracing::debug;

use crate::error::ServiceError;
use crate::geo::Coordinate;
use crate::resolver::{DeviceLocationService, Permission};

#[derive(Debug, Deserialize)]
#[serde(tag = "status")]
enum GeoIpResponse {
    #[serde(rename = "success")]
    Success { lat: f64, lon: f64 },
    #[serde(rename = "fail")]
    Fail { message: String },
}

impl GeoIpResponse {
    fn into_coordinate(self) -> Result<Coordinate, ServiceError> {
        match self {
            GeoIpResponse::Success { lat, lon } => Ok(Coordinate::new(lat, lon)),
            GeoIpResponse::Fail { message } => Err(ServiceError::Unavailable(format!(
                "GeoIP lookup failed: {message}"
            ))),
        }
    }
}

/// Approximates the device position from its public IP.
///
/// There is no OS prompt for this, so the permission answer is decided up
/// front by whoever builds the locator.
pub struct IpDeviceLocator {
    http: reqwest::Client,
    url: String,
    permission: Permission,
}

impl IpDeviceLocator {
    pub fn new(http: reqwest::Client, url: impl Into<String>, permission: Permission) -> Self {
        Self {
            http,
            url: url.into(),
            permission,
        }
    }
}

impl DeviceLocationService for IpDeviceLocator {
    async fn request_permission(&self) -> Permission {
        self.permission
    }

    async fn current_coordinate(&self) -> Result<Coordinate, ServiceError> {
        let url = format!("{}?fields=status,message,lat,lon", self.url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        let data: GeoIpResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        let coordinate = data.into_coordinate()?;
        debug!(%coordinate, "GeoIP lookup succeeded");
        Ok(coordinate)
    }
}
