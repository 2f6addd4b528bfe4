use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::regions::ExcludedRegions;

const DEFAULT_FIRE_PERIMETERS_URL: &str = "https://services3.arcgis.com/T4QMspbfLg3qTGWY/arcgis/rest/services/WFIGS_Interagency_Perimeters_Current/FeatureServer/0/query?outFields=*&where=1%3D1&f=geojson";
const DEFAULT_MODIS_HOTSPOTS_URL: &str = "https://services9.arcgis.com/RHVPKKiFTONKtxq3/arcgis/rest/services/MODIS_Thermal_v1/FeatureServer/0/query?outFields=*&where=1%3D1&f=geojson";
const DEFAULT_VIIRS_HOTSPOTS_URL: &str = "https://services9.arcgis.com/RHVPKKiFTONKtxq3/arcgis/rest/services/Satellite_VIIRS_Thermal_Hotspots_and_Fire_Activity/FeatureServer/0/query?outFields=*&where=1%3D1&f=geojson";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub fire_perimeters_url: String,
    pub modis_hotspots_url: String,
    pub viirs_hotspots_url: String,
    pub upstream_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub fire_excluded_regions: Vec<String>,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            fire_perimeters_url: DEFAULT_FIRE_PERIMETERS_URL.to_string(),
            modis_hotspots_url: DEFAULT_MODIS_HOTSPOTS_URL.to_string(),
            viirs_hotspots_url: DEFAULT_VIIRS_HOTSPOTS_URL.to_string(),
            upstream_timeout_secs: 30,
            cache_ttl_secs: 300,
            fire_excluded_regions: vec!["alaska".to_string()],
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let config = Config {
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            fire_perimeters_url: env::var("FIRE_PERIMETERS_URL")
                .unwrap_or(defaults.fire_perimeters_url),
            modis_hotspots_url: env::var("MODIS_HOTSPOTS_URL")
                .unwrap_or(defaults.modis_hotspots_url),
            viirs_hotspots_url: env::var("VIIRS_HOTSPOTS_URL")
                .unwrap_or(defaults.viirs_hotspots_url),
            upstream_timeout_secs: parse_secs("UPSTREAM_TIMEOUT_SECS", defaults.upstream_timeout_secs)?,
            cache_ttl_secs: parse_secs("CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            fire_excluded_regions: match env::var("FIRE_EXCLUDED_REGIONS") {
                Ok(value) => split_list(&value),
                Err(_) => defaults.fire_excluded_regions,
            },
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|value| split_list(&value))
                .unwrap_or_default(),
        };

        // Fail at startup rather than on the first request.
        config.excluded_regions()?;

        Ok(config)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs as i64)
    }

    pub fn excluded_regions(&self) -> anyhow::Result<ExcludedRegions> {
        ExcludedRegions::from_names(self.fire_excluded_regions.as_slice())
            .map_err(|name| anyhow::anyhow!("FIRE_EXCLUDED_REGIONS: unknown region '{}'", name))
    }
}

fn parse_secs(key: &str, default: u64) -> anyhow::Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds, got '{}'", key, value)),
        Err(_) => Ok(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
