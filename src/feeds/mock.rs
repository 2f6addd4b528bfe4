//! Canned upstream documents and a scripted fetcher for tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::client::{FeedError, FeedFetcher};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap()
}

/// Unclosed four-vertex ring whose vertex mean is exactly `(lat, lon)`.
pub fn square_around(lat: f64, lon: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [lon - 0.1, lat - 0.1],
            [lon - 0.1, lat + 0.1],
            [lon + 0.1, lat + 0.1],
            [lon + 0.1, lat - 0.1]
        ]]
    })
}

pub fn fire_feature(object_id: u64, name: &str, date_ms: i64, acres: f64, geometry: Value) -> Value {
    json!({
        "type": "Feature",
        "id": object_id,
        "geometry": geometry,
        "properties": {
            "OBJECTID": object_id,
            "poly_IncidentName": name,
            "poly_DateCurrent": date_ms,
            "poly_Acres_AutoCalc": acres,
            "poly_PercentContained": null
        }
    })
}

pub fn modis_feature(id: u64, lat: f64, lon: f64, confidence: f64) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "geometry": {"type": "Point", "coordinates": [lon, lat]},
        "properties": {
            "HOURS_OLD": 4,
            "CONFIDENCE": confidence,
            "FRP": 31.7
        }
    })
}

pub fn viirs_feature(id: u64, lat: f64, lon: f64) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "geometry": {"type": "Point", "coordinates": [lon, lat]},
        "properties": {
            "hours_old": 3,
            "frp": 12.5
        }
    })
}

pub fn feature_collection(features: Vec<Value>) -> Value {
    json!({"type": "FeatureCollection", "features": features})
}

/// Serves fixed responses by URL and counts every call.
#[derive(Default)]
pub struct StubFetcher {
    responses: Mutex<HashMap<String, Result<Value, FeedError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn respond(&self, url: &str, response: Result<Value, FeedError>) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedFetcher for StubFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FeedError::SourceUnavailable(format!("no stub for {}", url))))
    }
}
