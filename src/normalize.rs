use std::collections::BTreeMap;

/// Key every UK-wide or unlisted UK-nation name maps to unless configured.
pub const DEFAULT_UK_REGION: &str = "england";

/// Names that stand for "somewhere in the UK" and collapse to one region.
const UK_NAMES: &[&str] = &[
    "united kingdom",
    "great britain",
    "uk",
    "wales",
    "northern ireland",
];

/// Names that map straight to a region of their own.
const DIRECT_NAMES: &[(&str, &str)] = &[
    ("norway", "norway"),
    ("norge", "norway"),
    ("england", "england"),
    ("scotland", "scotland"),
];

/// Maps reverse-geocoded country names to region keys. Many-to-one.
#[derive(Debug, Clone)]
pub struct CountryNormalizer {
    table: BTreeMap<String, String>,
    uk_default: String,
}

impl Default for CountryNormalizer {
    fn default() -> Self {
        Self::with_uk_default(DEFAULT_UK_REGION)
    }
}

impl CountryNormalizer {
    /// Built-in table with UK-wide names pointed at `region_key`.
    pub fn with_uk_default(region_key: &str) -> Self {
        let uk_default = region_key.trim().to_lowercase();
        let mut table: BTreeMap<String, String> = DIRECT_NAMES
            .iter()
            .map(|(name, key)| (name.to_string(), key.to_string()))
            .collect();
        for name in UK_NAMES {
            table.insert(name.to_string(), uk_default.clone());
        }
        Self { table, uk_default }
    }

    /// Add or replace a single entry.
    pub fn with_alias(mut self, name: &str, region_key: &str) -> Self {
        self.table
            .insert(name.trim().to_lowercase(), region_key.trim().to_lowercase());
        self
    }

    pub fn uk_default(&self) -> &str {
        &self.uk_default
    }

    /// Region key for a country name, if the table knows it.
    pub fn normalize(&self, country: &str) -> Option<&str> {
        self.table
            .get(&country.trim().to_lowercase())
            .map(String::as_str)
    }

    /// All known names, for matching free text offline.
    pub fn names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.table.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
