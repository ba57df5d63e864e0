use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geo::ZoomSpan;
use crate::map::ViewSettings;
use crate::normalize::{CountryNormalizer, DEFAULT_UK_REGION};

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_GEOLOCATION_URL: &str = "http://ip-api.com/json/";

/// Smallest accepted zoom span, roughly one kilometre.
pub const MIN_ZOOM_SPAN_DEGREES: f64 = 0.01;

/// Runtime settings, read from a JSON file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region key for "United Kingdom", "Wales" and friends.
    pub uk_default_region: String,
    /// Extra or overriding country name -> region key entries.
    pub country_aliases: BTreeMap<String, String>,
    pub zoom_span_degrees: f64,
    pub animation_ms: u64,
    pub geocoder_url: String,
    pub geolocation_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uk_default_region: DEFAULT_UK_REGION.to_string(),
            country_aliases: BTreeMap::new(),
            zoom_span_degrees: 10.0,
            animation_ms: 1000,
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            geolocation_url: DEFAULT_GEOLOCATION_URL.to_string(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.zoom_span_degrees.is_finite() && self.zoom_span_degrees > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "zoom_span_degrees",
                value: self.zoom_span_degrees.to_string(),
                reason: "must be a positive number",
            });
        }
        if self.zoom_span_degrees < MIN_ZOOM_SPAN_DEGREES {
            return Err(ConfigError::InvalidValue {
                key: "zoom_span_degrees",
                value: self.zoom_span_degrees.to_string(),
                reason: "must be at least 0.01",
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs",
                value: "0".to_string(),
                reason: "must be at least 1",
            });
        }
        if self.uk_default_region.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "uk_default_region",
                value: String::new(),
                reason: "must name a region key",
            });
        }
        Ok(())
    }

    pub fn normalizer(&self) -> CountryNormalizer {
        self.country_aliases.iter().fold(
            CountryNormalizer::with_uk_default(&self.uk_default_region),
            |n, (name, key)| n.with_alias(name, key),
        )
    }

    pub fn view_settings(&self) -> Result<ViewSettings, ConfigError> {
        let zoom_span =
            ZoomSpan::square(self.zoom_span_degrees).map_err(|_| ConfigError::InvalidValue {
                key: "zoom_span_degrees",
                value: self.zoom_span_degrees.to_string(),
                reason: "must be a positive number",
            })?;
        Ok(ViewSettings {
            zoom_span,
            animation: Duration::from_millis(self.animation_ms),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_object_gives_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        let settings = config.view_settings().unwrap();
        assert_eq!(settings.zoom_span, ZoomSpan::DEFAULT);
        assert_eq!(settings.animation, Duration::from_secs(1));
    }

    #[test]
    fn uk_default_and_aliases_reach_normalizer() {
        let config = Config::from_json(
            r#"{ "uk_default_region": "scotland", "country_aliases": { "Faroe Islands": "norway" } }"#,
        )
        .unwrap();
        let n = config.normalizer();
        assert_eq!(n.normalize("United Kingdom"), Some("scotland"));
        assert_eq!(n.normalize("faroe islands"), Some("norway"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_json(r#"{ "zoom_span_degrees": 0 }"#),
            Err(ConfigError::InvalidValue { key: "zoom_span_degrees", .. })
        ));
        assert!(matches!(
            Config::from_json(r#"{ "zoom_span_degrees": 1e-9 }"#),
            Err(ConfigError::InvalidValue { key: "zoom_span_degrees", .. })
        ));
        assert!(Config::from_json(r#"{ "zoom_span_degrees": 0.01 }"#).is_ok());
        assert!(matches!(
            Config::from_json(r#"{ "request_timeout_secs": 0 }"#),
            Err(ConfigError::InvalidValue { key: "request_timeout_secs", .. })
        ));
        assert!(matches!(
            Config::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "animation_ms": 250 }}"#).unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.animation_ms, 250);
        assert_eq!(config.zoom_span_degrees, 10.0);
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load_from(&dir.path().join("nope.json")),
            Err(ConfigError::Read(_))
        ));
    }
}
