use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DatasetError;
use crate::geo::Coordinate;
use crate::region::RegionCatalog;

static FARMS_JSON: &str = include_str!("../data/fishfarms.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Species {
    Salmon,
    SeaBass,
    Mackerel,
}

impl Species {
    pub const ALL: [Species; 3] = [Species::Salmon, Species::SeaBass, Species::Mackerel];

    /// Lower-case, space separated name, as farm records spell it.
    pub fn label(self) -> &'static str {
        match self {
            Species::Salmon => "salmon",
            Species::SeaBass => "sea bass",
            Species::Mackerel => "mackerel",
        }
    }
}

/// `sea_bass`, `Sea Bass` and `SEA BASS` all become `sea bass`.
fn normalize_species_name(name: &str) -> String {
    name.trim().replace('_', " ").to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown species '{0}' (expected salmon, sea_bass or mackerel)")]
pub struct ParseSpeciesError(String);

impl FromStr for Species {
    type Err = ParseSpeciesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_species_name(s);
        Species::ALL
            .into_iter()
            .find(|species| species.label() == normalized)
            .ok_or_else(|| ParseSpeciesError(s.to_string()))
    }
}

impl TryFrom<String> for Species {
    type Error = ParseSpeciesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Deserialize)]
struct FarmRecord {
    id: u64,
    latitude: f64,
    longitude: f64,
    species: Species,
    country: String,
    level: u8,
}

/// One fish farm or catch site.
#[derive(Debug, Clone, PartialEq)]
pub struct Farm {
    pub id: u64,
    pub coordinate: Coordinate,
    pub species: Species,
    /// Should name a region key or display name, any case.
    pub country: String,
    pub contamination_level: u8,
}

/// Risk bucket used to colour farm overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_level(level: u8) -> Self {
        if level > 60 {
            RiskBand::High
        } else if level > 40 {
            RiskBand::Medium
        } else {
            RiskBand::Low
        }
    }

    pub fn fill_color(self) -> &'static str {
        match self {
            RiskBand::High => "rgba(255,0,0,0.4)",
            RiskBand::Medium => "rgba(255,165,0,0.4)",
            RiskBand::Low => "rgba(0,128,0,0.4)",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskBand::Low => write!(f, "low"),
            RiskBand::Medium => write!(f, "moderate"),
            RiskBand::High => write!(f, "high"),
        }
    }
}

/// Immutable farm table in file order.
#[derive(Debug, Clone, Default)]
pub struct FarmDataset {
    farms: Vec<Farm>,
}

impl FarmDataset {
    pub fn embedded() -> Result<Self, DatasetError> {
        Self::from_json(FARMS_JSON)
    }

    pub fn from_json(json: &str) -> Result<Self, DatasetError> {
        let records: Vec<FarmRecord> =
            serde_json::from_str(json).map_err(|source| DatasetError::Parse {
                table: "farm",
                source,
            })?;

        let farms = records
            .into_iter()
            .map(|r| Farm {
                id: r.id,
                coordinate: Coordinate::new(r.latitude, r.longitude),
                species: r.species,
                country: r.country,
                contamination_level: r.level,
            })
            .collect();
        Self::new(farms)
    }

    pub fn new(farms: Vec<Farm>) -> Result<Self, DatasetError> {
        let mut seen = HashSet::with_capacity(farms.len());
        for farm in &farms {
            if !seen.insert(farm.id) {
                return Err(DatasetError::DuplicateFarm(farm.id));
            }
            if !farm.coordinate.is_valid() {
                return Err(DatasetError::InvalidCoordinate(format!("farm {}", farm.id)));
            }
            if farm.contamination_level > 100 {
                return Err(DatasetError::LevelOutOfRange {
                    entry: format!("farm {}", farm.id),
                    level: farm.contamination_level,
                });
            }
        }
        Ok(Self { farms })
    }

    pub fn farms(&self) -> &[Farm] {
        &self.farms
    }

    pub fn len(&self) -> usize {
        self.farms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.farms.is_empty()
    }

    /// Farms whose country is no region key. The filter matches on keys
    /// only, so these can never be shown.
    pub fn orphans<'a>(&'a self, catalog: &RegionCatalog) -> Vec<&'a Farm> {
        self.farms
            .iter()
            .filter(|f| catalog.get(&f.country).is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn species_parse_is_lenient() {
        assert_eq!("salmon".parse::<Species>().unwrap(), Species::Salmon);
        assert_eq!("Sea Bass".parse::<Species>().unwrap(), Species::SeaBass);
        assert_eq!("sea_bass".parse::<Species>().unwrap(), Species::SeaBass);
        assert_eq!(" MACKEREL ".parse::<Species>().unwrap(), Species::Mackerel);
        assert!("tuna".parse::<Species>().is_err());
    }

    #[test]
    fn species_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Species::SeaBass).unwrap(), "\"sea_bass\"");
        let parsed: Species = serde_json::from_str("\"Sea Bass\"").unwrap();
        assert_eq!(parsed, Species::SeaBass);
    }

    #[test]
    fn risk_band_thresholds() {
        assert_eq!(RiskBand::from_level(61), RiskBand::High);
        assert_eq!(RiskBand::from_level(60), RiskBand::Medium);
        assert_eq!(RiskBand::from_level(41), RiskBand::Medium);
        assert_eq!(RiskBand::from_level(40), RiskBand::Low);
        assert_eq!(RiskBand::High.fill_color(), "rgba(255,0,0,0.4)");
    }

    #[test]
    fn embedded_farms_all_map_to_regions() {
        let farms = FarmDataset::embedded().unwrap();
        let catalog = RegionCatalog::embedded().unwrap();
        assert!(!farms.is_empty());
        assert!(farms.orphans(&catalog).is_empty());
    }

    #[test]
    fn orphans_are_reported() {
        let farms = FarmDataset::from_json(
            r#"[
                { "id": 1, "latitude": 60.0, "longitude": 8.0, "species": "salmon", "country": "Norway", "level": 60 },
                { "id": 2, "latitude": 45.0, "longitude": 3.0, "species": "salmon", "country": "France", "level": 10 }
            ]"#,
        )
        .unwrap();
        let catalog = RegionCatalog::embedded().unwrap();
        let orphans: Vec<_> = farms.orphans(&catalog).iter().map(|f| f.id).collect();
        assert_eq!(orphans, [2]);
    }

    #[test]
    fn display_name_alone_is_an_orphan() {
        let catalog = RegionCatalog::from_json(
            r#"[{ "key": "no", "name": "Norway", "latitude": 60.0, "longitude": 8.0, "level": 10 }]"#,
        )
        .unwrap();
        let farms = FarmDataset::from_json(
            r#"[
                { "id": 1, "latitude": 60.0, "longitude": 8.0, "species": "salmon", "country": "NO", "level": 60 },
                { "id": 2, "latitude": 61.0, "longitude": 8.0, "species": "salmon", "country": "Norway", "level": 60 }
            ]"#,
        )
        .unwrap();
        let orphans: Vec<_> = farms.orphans(&catalog).iter().map(|f| f.id).collect();
        assert_eq!(orphans, [2]);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let json = r#"[
            { "id": 7, "latitude": 60.0, "longitude": 8.0, "species": "salmon", "country": "Norway", "level": 60 },
            { "id": 7, "latitude": 61.0, "longitude": 8.0, "species": "salmon", "country": "Norway", "level": 60 }
        ]"#;
        assert!(matches!(
            FarmDataset::from_json(json),
            Err(DatasetError::DuplicateFarm(7))
        ));
    }

    #[test]
    fn unknown_species_fails_to_load() {
        let json = r#"[{ "id": 1, "latitude": 0.0, "longitude": 0.0, "species": "tuna", "country": "Norway", "level": 1 }]"#;
        assert!(matches!(
            FarmDataset::from_json(json),
            Err(DatasetError::Parse { table: "farm", .. })
        ));
    }
}
