//! Microplastic risk lookup for seafood suppliers.
//!
//! Resolves a place (typed, picked from a list, or the device's own
//! position) to a contamination-risk region, filters a static fish-farm table
//! by species and region, and keeps a map viewport in step.

pub mod config;
pub mod error;
pub mod farm;
pub mod filter;
pub mod geo;
pub mod logging;
pub mod map;
pub mod normalize;
pub mod region;
pub mod render;
pub mod resolver;
pub mod services;

pub use error::{ConfigError, DatasetError, ResolutionError, ServiceError};
pub use farm::{Farm, FarmDataset, RiskBand, Species};
pub use filter::filter_farms;
pub use geo::{Coordinate, Viewport, ZoomSpan};
pub use map::{
    AlertChannel, Applied, ControllerState, MapSurface, MapViewController, Overlay, SearchState,
    ViewSettings,
};
pub use normalize::CountryNormalizer;
pub use region::{Region, RegionCatalog};
pub use resolver::{
    DeviceLocationService, GeocodingService, LocationInput, LocationResolver, Permission, Place,
    ResolutionResult,
};
