//! Interagency fire perimeter feed (WFIGS current perimeters).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::types::*;
use crate::geometry::centroid;
use crate::regions::ExcludedRegions;
use crate::utils::round_to_decimals;

const INCIDENT_NAME: &str = "poly_IncidentName";
const INCIDENT_NAME_FALLBACK: &str = "incident_name";
const DATE_CURRENT: &str = "poly_DateCurrent";
const ACRES: &str = "poly_Acres_AutoCalc";
const PERCENT_CONTAINED: &str = "poly_PercentContained";
const OBJECT_ID: &str = "OBJECTID";

/// Perimeters not updated within this many hours are dropped.
pub const RECENCY_WINDOW_HOURS: i64 = 24;

struct Candidate<'a> {
    name: String,
    date_ms: f64,
    feature: &'a RawFeature,
}

fn incident_name(feature: &RawFeature) -> Option<&str> {
    feature
        .text(INCIDENT_NAME)
        .or_else(|| feature.text(INCIDENT_NAME_FALLBACK))
}

/// Latest feature per incident name among those updated at or after `cutoff_ms`.
///
/// Output keeps the order in which each name was first seen. Within a name the
/// later `poly_DateCurrent` wins; on equal dates the first one seen is kept.
fn latest_by_name(
    features: &[Result<RawFeature, RecordSkipped>],
    cutoff_ms: f64,
) -> Vec<Candidate<'_>> {
    let mut latest: IndexMap<String, Candidate<'_>> = IndexMap::new();

    for (index, entry) in features.iter().enumerate() {
        let feature = match entry {
            Ok(feature) => feature,
            Err(reason) => {
                tracing::warn!("Skipping perimeter feature {}: {}", index + 1, reason);
                continue;
            }
        };
        let Some(name) = incident_name(feature) else {
            continue;
        };
        let date_ms = feature.number(DATE_CURRENT).unwrap_or(0.0);
        if date_ms < cutoff_ms {
            continue;
        }

        match latest.get_mut(name) {
            Some(current) if date_ms > current.date_ms => {
                current.date_ms = date_ms;
                current.feature = feature;
            }
            Some(_) => {}
            None => {
                latest.insert(
                    name.to_string(),
                    Candidate {
                        name: name.to_string(),
                        date_ms,
                        feature,
                    },
                );
            }
        }
    }

    latest.into_values().collect()
}

fn fire_record(position: usize, candidate: &Candidate<'_>) -> Result<FireRecord, RecordSkipped> {
    let feature = candidate.feature;
    let geometry = feature.geometry().ok_or(RecordSkipped::MissingGeometry)?;
    let center = centroid(&geometry.value).ok_or(RecordSkipped::NoCenter)?;

    let size_acres = round_to_decimals(feature.number(ACRES).unwrap_or(0.0), 2);

    let last_update = feature
        .number(DATE_CURRENT)
        .filter(|ms| *ms != 0.0)
        .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64));

    // A zero OBJECTID is treated as absent.
    let id = feature
        .identifier(OBJECT_ID)
        .filter(|_| feature.number(OBJECT_ID) != Some(0.0))
        .unwrap_or_else(|| format!("fire_{}", position));

    Ok(FireRecord {
        id,
        name: candidate.name.clone(),
        center: Center {
            latitude: center.lat,
            longitude: center.lng,
        },
        size_acres,
        containment_percent: feature.number(PERCENT_CONTAINED),
        severity: Severity::from_acres(size_acres),
        last_update,
        geometry,
    })
}

pub fn normalize_fires(
    collection: &RawFeatureCollection,
    now: DateTime<Utc>,
    excluded: &ExcludedRegions,
) -> FireCollection {
    let cutoff_ms = (now - chrono::Duration::hours(RECENCY_WINDOW_HOURS)).timestamp_millis() as f64;
    let candidates = latest_by_name(&collection.features, cutoff_ms);
    tracing::debug!(
        "{} of {} perimeter features are recent and unique by name",
        candidates.len(),
        collection.features.len()
    );

    let mut fires = Vec::with_capacity(candidates.len());
    let mut excluded_count = 0;

    for (index, candidate) in candidates.iter().enumerate() {
        let record = match fire_record(index + 1, candidate) {
            Ok(record) => record,
            Err(reason) => {
                tracing::warn!("Skipping fire '{}': {}", candidate.name, reason);
                continue;
            }
        };

        if let Some(region) = excluded.matching(record.center.latitude, record.center.longitude) {
            tracing::debug!("Excluding fire '{}' in region {}", record.name, region.name);
            excluded_count += 1;
            continue;
        }

        fires.push(record);
    }

    if excluded_count > 0 {
        tracing::info!("Filtered out {} fires in excluded regions", excluded_count);
    }

    FireCollection::new(fires, now)
}
