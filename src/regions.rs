//! Fixed lat/lon boxes used to include or exclude records by location.

use serde::Serialize;

use crate::geometry::GeoBounds;

pub const CONTINENTAL_US: GeoBounds = GeoBounds::new(-125.0, -66.93457, 24.396308, 49.384358);
pub const ALASKA_COVERAGE: GeoBounds = GeoBounds::new(-179.15, -129.97, 51.2, 71.5);
pub const HAWAII: GeoBounds = GeoBounds::new(-160.5, -154.5, 18.5, 22.5);

/// Alaska as used by the fire exclusion policy. Slightly different from
/// [`ALASKA_COVERAGE`], which only decides whether a hotspot is US data.
pub const ALASKA: GeoBounds = GeoBounds::new(-173.0, -130.0, 51.0, 72.0);

const UNITED_STATES: [GeoBounds; 3] = [CONTINENTAL_US, ALASKA_COVERAGE, HAWAII];

pub fn is_within_united_states(lat: f64, lon: f64) -> bool {
    UNITED_STATES.iter().any(|region| region.contains(lat, lon))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NamedRegion {
    pub name: &'static str,
    pub bounds: GeoBounds,
}

const KNOWN_REGIONS: [NamedRegion; 1] = [NamedRegion {
    name: "alaska",
    bounds: ALASKA,
}];

/// Regions whose fires are dropped from the perimeter collection.
///
/// This is a product decision, not data cleaning: fires inside these boxes
/// are valid upstream records and are removed silently from what clients see.
/// The dashboard currently excludes Alaska by default.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedRegions {
    regions: Vec<NamedRegion>,
}

impl ExcludedRegions {
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    /// Resolves region names case-insensitively. Returns the first unknown name on failure.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        let regions = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                KNOWN_REGIONS
                    .iter()
                    .find(|region| region.name.eq_ignore_ascii_case(name.trim()))
                    .copied()
                    .ok_or_else(|| name.to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { regions })
    }

    pub fn matching(&self, lat: f64, lon: f64) -> Option<&NamedRegion> {
        self.regions.iter().find(|region| region.bounds.contains(lat, lon))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.regions.iter().map(|region| region.name).collect()
    }
}

impl Default for ExcludedRegions {
    fn default() -> Self {
        Self {
            regions: KNOWN_REGIONS.to_vec(),
        }
    }
}
