use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::client::FeedError;
use crate::cache::SourceKey;

// Only the envelope is decoded strictly. Each feature is converted on its
// own, so a bad element becomes a skipped record instead of failing the batch.

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Option<Vec<Value>>,
}

#[derive(Debug, Clone)]
pub struct RawFeatureCollection {
    /// One entry per upstream element, in document order.
    pub features: Vec<Result<RawFeature, RecordSkipped>>,
}

#[derive(Debug, Clone, Default)]
pub struct RawFeature {
    pub id: Option<Value>,
    pub geometry: Option<Value>,
    pub properties: Option<Map<String, Value>>,
}

impl RawFeatureCollection {
    pub fn from_value(value: Value) -> Result<Self, FeedError> {
        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|e| FeedError::MalformedResponse(format!("not a GeoJSON document: {}", e)))?;

        if envelope.kind != "FeatureCollection" {
            return Err(FeedError::MalformedResponse(format!(
                "expected FeatureCollection, got {}",
                envelope.kind
            )));
        }

        let features = envelope
            .features
            .unwrap_or_default()
            .into_iter()
            .map(RawFeature::from_value)
            .collect();

        Ok(Self { features })
    }
}

impl RawFeature {
    /// Accepts any JSON object. `properties` must be an object or null.
    pub fn from_value(value: Value) -> Result<Self, RecordSkipped> {
        let Value::Object(mut object) = value else {
            return Err(RecordSkipped::NotAFeature);
        };

        let properties = match object.remove("properties") {
            None | Some(Value::Null) => None,
            Some(Value::Object(properties)) => Some(properties),
            Some(_) => return Err(RecordSkipped::MalformedProperties),
        };

        Ok(Self {
            id: object.remove("id"),
            geometry: object.remove("geometry"),
            properties,
        })
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties
            .as_ref()
            .and_then(|props| props.get(key))
            .filter(|value| !value.is_null())
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.property(key).and_then(Value::as_f64)
    }

    /// Non-empty string property.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.property(key)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    }

    /// String or numeric identifier property, rendered as a string.
    pub fn identifier(&self, key: &str) -> Option<String> {
        self.property(key).and_then(identifier_string)
    }

    pub fn feature_id(&self) -> Option<String> {
        self.id.as_ref().and_then(identifier_string)
    }

    pub fn geometry(&self) -> Option<geojson::Geometry> {
        let value = self.geometry.as_ref().filter(|value| !value.is_null())?;
        serde_json::from_value(value.clone()).ok()
    }
}

fn identifier_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Why a single feature was left out of a normalized collection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordSkipped {
    #[error("feature is not a JSON object")]
    NotAFeature,
    #[error("feature properties are not an object")]
    MalformedProperties,
    #[error("no usable geometry")]
    MissingGeometry,
    #[error("could not compute a center")]
    NoCenter,
    #[error("missing field {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_acres(size_acres: f64) -> Self {
        if size_acres >= 10_000.0 {
            Severity::High
        } else if size_acres >= 1_000.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Center {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireRecord {
    pub id: String,
    pub name: String,
    pub center: Center,
    pub size_acres: f64,
    pub containment_percent: Option<f64>,
    pub severity: Severity,
    pub last_update: Option<DateTime<Utc>>,
    pub geometry: geojson::Geometry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireCollection {
    pub fires: Vec<FireRecord>,
    pub total: usize,
    pub timestamp: DateTime<Utc>,
}

impl FireCollection {
    pub fn new(fires: Vec<FireRecord>, timestamp: DateTime<Utc>) -> Self {
        Self {
            total: fires.len(),
            fires,
            timestamp,
        }
    }

    pub fn find(&self, id: &str) -> Option<&FireRecord> {
        self.fires.iter().find(|fire| fire.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Satellite {
    #[serde(rename = "MODIS")]
    Modis,
    #[serde(rename = "VIIRS")]
    Viirs,
}

impl Satellite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Satellite::Modis => "MODIS",
            Satellite::Viirs => "VIIRS",
        }
    }

    pub fn source_key(&self) -> SourceKey {
        match self {
            Satellite::Modis => SourceKey::Modis,
            Satellite::Viirs => SourceKey::Viirs,
        }
    }
}

impl fmt::Display for Satellite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Satellite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MODIS" => Ok(Satellite::Modis),
            "VIIRS" => Ok(Satellite::Viirs),
            _ => Err(format!("unknown satellite source: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotRecord {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub age_hours: f64,
    pub confidence_percent: Option<f64>,
    /// Fire radiative power.
    pub intensity: f64,
    pub source: Satellite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotCollection {
    pub hotspots: Vec<HotspotRecord>,
    pub total: usize,
    pub source: Satellite,
    pub timestamp: DateTime<Utc>,
}

impl HotspotCollection {
    pub fn new(source: Satellite, hotspots: Vec<HotspotRecord>, timestamp: DateTime<Utc>) -> Self {
        Self {
            total: hotspots.len(),
            hotspots,
            source,
            timestamp,
        }
    }
}
