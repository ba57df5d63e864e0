use std::collections::HashMap;

use serde::Deserialize;

use crate::error::DatasetError;
use crate::geo::Coordinate;

static REGIONS_JSON: &str = include_str!("../data/regions.json");

#[derive(Debug, Deserialize)]
struct RegionRecord {
    key: String,
    name: String,
    latitude: f64,
    longitude: f64,
    level: u8,
}

/// A named area with an aggregate contamination-risk score.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub key: String,
    pub display_name: String,
    pub center: Coordinate,
    /// 0-100
    pub contamination_level: u8,
}

impl Region {
    /// Case-insensitive match on either the key or the display name.
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.trim();
        self.key.eq_ignore_ascii_case(name) || self.display_name.eq_ignore_ascii_case(name)
    }
}

/// Immutable table of known regions, in file order.
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    regions: Vec<Region>,
    by_key: HashMap<String, usize>,
}

impl RegionCatalog {
    /// The table bundled with the binary.
    pub fn embedded() -> Result<Self, DatasetError> {
        Self::from_json(REGIONS_JSON)
    }

    pub fn from_json(json: &str) -> Result<Self, DatasetError> {
        let records: Vec<RegionRecord> =
            serde_json::from_str(json).map_err(|source| DatasetError::Parse {
                table: "region",
                source,
            })?;

        let regions = records
            .into_iter()
            .map(|r| Region {
                key: r.key.trim().to_lowercase(),
                display_name: r.name,
                center: Coordinate::new(r.latitude, r.longitude),
                contamination_level: r.level,
            })
            .collect();
        Self::new(regions)
    }

    pub fn new(regions: Vec<Region>) -> Result<Self, DatasetError> {
        let mut by_key = HashMap::with_capacity(regions.len());
        for (i, region) in regions.iter().enumerate() {
            if region.contamination_level > 100 {
                return Err(DatasetError::LevelOutOfRange {
                    entry: region.key.clone(),
                    level: region.contamination_level,
                });
            }
            if !region.center.is_valid() {
                return Err(DatasetError::InvalidCoordinate(region.key.clone()));
            }
            if by_key.insert(region.key.to_lowercase(), i).is_some() {
                return Err(DatasetError::DuplicateRegion(region.key.clone()));
            }
        }
        Ok(Self { regions, by_key })
    }

    /// Exact lookup by key, ignoring case.
    pub fn get(&self, key: &str) -> Option<&Region> {
        self.by_key
            .get(&key.trim().to_lowercase())
            .map(|&i| &self.regions[i])
    }

    /// Lookup by key first, then by display name.
    pub fn find(&self, name: &str) -> Option<&Region> {
        self.get(name)
            .or_else(|| self.regions.iter().find(|r| r.matches_name(name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Closest region centre to `point`, with its distance in metres.
    pub fn nearest(&self, point: &Coordinate) -> Option<(&Region, f64)> {
        self.regions
            .iter()
            .map(|r| (r, r.center.distance_to(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}
