//! Satellite thermal hotspot feeds (MODIS and VIIRS).
//!
//! Both feeds share one normalizer; everything that differs between them
//! lives in a [`HotspotFields`] table.

use chrono::{DateTime, Utc};

use super::types::*;
use crate::regions::is_within_united_states;

pub struct ConfidenceRule {
    pub field: &'static str,
    /// Detections below this percentage are discarded.
    pub min_percent: f64,
}

/// Upstream property names for one hotspot feed.
pub struct HotspotFields {
    pub source: Satellite,
    pub age_hours: &'static str,
    pub intensity: &'static str,
    /// `None` when the feed publishes no confidence value.
    pub confidence: Option<ConfidenceRule>,
}

pub static MODIS_FIELDS: HotspotFields = HotspotFields {
    source: Satellite::Modis,
    age_hours: "HOURS_OLD",
    intensity: "FRP",
    confidence: Some(ConfidenceRule {
        field: "CONFIDENCE",
        min_percent: 80.0,
    }),
};

pub static VIIRS_FIELDS: HotspotFields = HotspotFields {
    source: Satellite::Viirs,
    age_hours: "hours_old",
    intensity: "frp",
    confidence: None,
};

impl Satellite {
    pub fn fields(&self) -> &'static HotspotFields {
        match self {
            Satellite::Modis => &MODIS_FIELDS,
            Satellite::Viirs => &VIIRS_FIELDS,
        }
    }
}

enum Outcome {
    Keep(HotspotRecord),
    OutsideCoverage,
    LowConfidence,
}

fn point_lat_lon(feature: &RawFeature) -> Option<(f64, f64)> {
    match feature.geometry()?.value {
        // GeoJSON order is [lon, lat]
        geojson::Value::Point(position) => match position.as_slice() {
            [lon, lat, ..] => Some((*lat, *lon)),
            _ => None,
        },
        _ => None,
    }
}

fn hotspot_record(
    fields: &HotspotFields,
    position: usize,
    feature: &RawFeature,
) -> Result<Outcome, RecordSkipped> {
    let (latitude, longitude) = point_lat_lon(feature).ok_or(RecordSkipped::MissingGeometry)?;
    if !is_within_united_states(latitude, longitude) {
        return Ok(Outcome::OutsideCoverage);
    }

    let confidence_percent = match &fields.confidence {
        Some(rule) => {
            let confidence = feature
                .number(rule.field)
                .ok_or(RecordSkipped::MissingField(rule.field))?;
            if confidence < rule.min_percent {
                return Ok(Outcome::LowConfidence);
            }
            Some(confidence)
        }
        None => None,
    };

    let age_hours = feature
        .number(fields.age_hours)
        .ok_or(RecordSkipped::MissingField(fields.age_hours))?;
    let intensity = feature
        .number(fields.intensity)
        .ok_or(RecordSkipped::MissingField(fields.intensity))?;

    let id = feature
        .feature_id()
        .or_else(|| feature.identifier("OBJECTID"))
        .unwrap_or_else(|| format!("{}_{}", fields.source.as_str().to_lowercase(), position));

    Ok(Outcome::Keep(HotspotRecord {
        id,
        latitude,
        longitude,
        age_hours,
        confidence_percent,
        intensity,
        source: fields.source,
    }))
}

pub fn normalize_hotspots(
    fields: &HotspotFields,
    collection: &RawFeatureCollection,
    now: DateTime<Utc>,
) -> HotspotCollection {
    let mut hotspots = Vec::new();
    let (mut outside, mut low_confidence, mut skipped) = (0usize, 0usize, 0usize);

    for (index, entry) in collection.features.iter().enumerate() {
        let outcome = entry
            .as_ref()
            .map_err(Clone::clone)
            .and_then(|feature| hotspot_record(fields, index + 1, feature));
        match outcome {
            Ok(Outcome::Keep(record)) => hotspots.push(record),
            Ok(Outcome::OutsideCoverage) => outside += 1,
            Ok(Outcome::LowConfidence) => low_confidence += 1,
            Err(reason) => {
                tracing::debug!("Skipping {} feature {}: {}", fields.source, index + 1, reason);
                skipped += 1;
            }
        }
    }

    tracing::info!(
        "{}: kept {} of {} hotspots ({} outside US, {} low confidence, {} unusable)",
        fields.source,
        hotspots.len(),
        collection.features.len(),
        outside,
        low_confidence,
        skipped
    );

    HotspotCollection::new(fields.source, hotspots, now)
}
