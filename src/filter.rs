use crate::farm::{Farm, Species};

/// Select the farms to draw for the current selection.
///
/// Both a species and a region are required; with either missing nothing is
/// returned, so the map never shows the whole dataset before the user has
/// chosen. Country names compare case-insensitively against the region key.
/// Output keeps dataset order.
pub fn filter_farms<'a>(
    farms: &'a [Farm],
    species: Option<Species>,
    region_key: Option<&str>,
) -> Vec<&'a Farm> {
    let (Some(species), Some(region_key)) = (species, region_key) else {
        return Vec::new();
    };
    let region_key = region_key.trim();

    farms
        .iter()
        .filter(|farm| farm.species == species)
        .filter(|farm| farm.country.trim().eq_ignore_ascii_case(region_key))
        .collect()
}
