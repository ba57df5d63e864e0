use thiserror::Error;

/// Why a location query could not be turned into a coordinate.
///
/// "No risk region for this place" is not an error: it comes back as a
/// successful resolution with no matched region key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The user refused device location. Not retried until permission changes.
    #[error("permission to access location was denied")]
    PermissionDenied,

    /// The query matched no known place.
    #[error("no location found for \"{query}\"")]
    NotFound { query: String },

    /// Network or geocoding service trouble. Retrying may help.
    #[error("location service failed: {0}")]
    ServiceFailure(String),
}

impl ResolutionError {
    /// Text shown to the user through the alert channel.
    pub fn user_message(&self) -> String {
        match self {
            ResolutionError::PermissionDenied => {
                "Permission to access location was denied".to_string()
            }
            ResolutionError::NotFound { query } => {
                format!("Could not find \"{query}\". Check the spelling and try again.")
            }
            ResolutionError::ServiceFailure(_) => {
                "Location service is unavailable right now. Please try again.".to_string()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, ResolutionError::PermissionDenied)
    }
}

/// Failures reported by external collaborators (geocoder, device locator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl From<ServiceError> for ResolutionError {
    fn from(e: ServiceError) -> Self {
        ResolutionError::ServiceFailure(e.to_string())
    }
}

/// Problems with the static region and farm tables.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to parse {table} table: {source}")]
    Parse {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate region key: {0}")]
    DuplicateRegion(String),

    #[error("duplicate farm id: {0}")]
    DuplicateFarm(u64),

    #[error("contamination level {level} for {entry} is outside 0-100")]
    LevelOutOfRange { entry: String, level: u8 },

    #[error("invalid coordinate for {0}")]
    InvalidCoordinate(String),

    #[error("zoom span must be positive, got {0}")]
    InvalidSpan(f64),
}

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {key} = {value} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}
