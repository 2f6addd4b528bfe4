//! Layout for a static satellite snapshot of one fire perimeter.
//!
//! Produces everything an image exporter needs (which basemap tiles to stitch,
//! the geographic extent of the mosaic, and the perimeter outline in mosaic
//! pixel space) without downloading or drawing anything.

use serde::Serialize;
use thiserror::Error;

use crate::feeds::types::FireRecord;
use crate::geometry::{
    bounding_box, expand_bounds, project_to_pixels, quadkey_from_tile, tile_range,
    tile_range_bounds, GeoBounds, TileRange, TILE_SIZE_PX,
};

pub const DEFAULT_ZOOM: u8 = 15;
/// Makes the perimeter fill roughly 40-50% of the frame.
pub const DEFAULT_EXPAND_FACTOR: f64 = 2.2;
/// Largest mosaic a plan may ask an exporter to stitch.
pub const MAX_MOSAIC_TILES: u64 = 1024;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderPlanError {
    #[error("fire {0} has no perimeter vertices")]
    NoVertices(String),
    #[error("expand factor must be a positive number, got {0}")]
    InvalidExpandFactor(f64),
    #[error("mosaic of {count} tiles exceeds the limit of {max}")]
    TooManyTiles { count: u64, max: u64 },
}

/// One basemap tile and where it goes in the stitched mosaic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MosaicTile {
    pub x: u32,
    pub y: u32,
    /// Bing Maps address of the same tile.
    pub quadkey: String,
    pub offset_x_px: u32,
    pub offset_y_px: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPlan {
    pub fire_id: String,
    pub perimeter_bounds: GeoBounds,
    pub view_bounds: GeoBounds,
    pub tiles: TileRange,
    pub mosaic: Vec<MosaicTile>,
    pub map_bounds: GeoBounds,
    pub width_px: u32,
    pub height_px: u32,
    /// One outline per outer ring, in mosaic pixels.
    pub outlines: Vec<Vec<(f64, f64)>>,
    pub label: String,
    pub file_name: String,
}

impl RenderPlan {
    pub fn for_fire(fire: &FireRecord, zoom: u8, expand_factor: f64) -> Result<Self, RenderPlanError> {
        if !expand_factor.is_finite() || expand_factor <= 0.0 {
            return Err(RenderPlanError::InvalidExpandFactor(expand_factor));
        }

        let perimeter_bounds = bounding_box(&fire.geometry.value)
            .ok_or_else(|| RenderPlanError::NoVertices(fire.id.clone()))?;
        let view_bounds = expand_bounds(&perimeter_bounds, expand_factor);
        let tiles = tile_range(&view_bounds, zoom);

        let count = tiles.tile_count();
        if count > MAX_MOSAIC_TILES {
            return Err(RenderPlanError::TooManyTiles {
                count,
                max: MAX_MOSAIC_TILES,
            });
        }

        let mosaic = tiles
            .tiles()
            .map(|(x, y)| MosaicTile {
                x,
                y,
                quadkey: quadkey_from_tile(x, y, zoom),
                offset_x_px: (x - tiles.min_x) * TILE_SIZE_PX,
                offset_y_px: (y - tiles.min_y) * TILE_SIZE_PX,
            })
            .collect();

        let map_bounds = tile_range_bounds(&tiles);
        let width_px = tiles.columns() * TILE_SIZE_PX;
        let height_px = tiles.rows() * TILE_SIZE_PX;

        let outlines = outer_rings(&fire.geometry.value)
            .into_iter()
            .map(|ring| project_to_pixels(ring, &map_bounds, width_px, height_px))
            .collect();

        let time = fire
            .last_update
            .map(|ts| ts.format("%H:%M %d/%m").to_string())
            .unwrap_or_else(|| "N/A".to_string());

        Ok(Self {
            fire_id: fire.id.clone(),
            perimeter_bounds,
            view_bounds,
            tiles,
            mosaic,
            map_bounds,
            width_px,
            height_px,
            outlines,
            label: format!("{}\n{}", time, fire.name),
            file_name: format!("{}_{}.png", fire.name.replace(' ', "_"), fire.id),
        })
    }
}

fn outer_rings(geometry: &geojson::Value) -> Vec<&[geojson::Position]> {
    match geometry {
        geojson::Value::Polygon(rings) => rings.first().map(|r| r.as_slice()).into_iter().collect(),
        geojson::Value::MultiPolygon(polygons) => polygons
            .iter()
            .filter_map(|rings| rings.first())
            .map(|r| r.as_slice())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::types::{Center, Severity};
    use chrono::{TimeZone, Utc};

    fn fire(geometry: geojson::Value) -> FireRecord {
        FireRecord {
            id: "4021".to_string(),
            name: "Park Fire".to_string(),
            center: Center { latitude: 39.9, longitude: -121.8 },
            size_acres: 12.0,
            containment_percent: None,
            severity: Severity::Low,
            last_update: Some(Utc.with_ymd_and_hms(2025, 7, 30, 14, 5, 0).unwrap()),
            geometry: geojson::Geometry::new(geometry),
        }
    }

    fn small_square() -> geojson::Value {
        geojson::Value::Polygon(vec![vec![
            vec![-121.81, 39.89],
            vec![-121.81, 39.91],
            vec![-121.79, 39.91],
            vec![-121.79, 39.89],
        ]])
    }

    #[test]
    fn test_plan_for_polygon() {
        let perimeter = geojson::Value::Polygon(vec![vec![
            vec![-121.81, 39.89],
            vec![-121.81, 39.91],
            vec![-121.79, 39.91],
            vec![-121.79, 39.89],
            vec![-121.81, 39.89],
        ]]);
        let plan = RenderPlan::for_fire(&fire(perimeter), DEFAULT_ZOOM, DEFAULT_EXPAND_FACTOR).unwrap();

        assert_eq!(plan.file_name, "Park_Fire_4021.png");
        assert_eq!(plan.label, "14:05 30/07\nPark Fire");
        assert_eq!(plan.width_px, plan.tiles.columns() * 256);
        assert_eq!(plan.height_px, plan.tiles.rows() * 256);
        assert_eq!(plan.outlines.len(), 1);
        assert_eq!(plan.outlines[0].len(), 5);

        // the view box sits inside the stitched mosaic, so every vertex lands on the image
        for &(x, y) in &plan.outlines[0] {
            assert!(x >= 0.0 && x <= plan.width_px as f64);
            assert!(y >= 0.0 && y <= plan.height_px as f64);
        }
        assert!(plan.map_bounds.min_lon <= plan.view_bounds.min_lon);
        assert!(plan.map_bounds.max_lat >= plan.view_bounds.max_lat);
    }

    #[test]
    fn test_plan_for_multipolygon_has_one_outline_per_part() {
        let perimeter = geojson::Value::MultiPolygon(vec![
            vec![vec![vec![-121.81, 39.89], vec![-121.80, 39.90], vec![-121.81, 39.90]]],
            vec![vec![vec![-121.70, 39.80], vec![-121.69, 39.81], vec![-121.70, 39.81]]],
        ]);
        let plan = RenderPlan::for_fire(&fire(perimeter), 12, DEFAULT_EXPAND_FACTOR).unwrap();
        assert_eq!(plan.outlines.len(), 2);
        assert_eq!(plan.tiles.zoom, 12);
    }

    #[test]
    fn test_mosaic_lists_every_tile_with_its_quadkey() {
        let plan = RenderPlan::for_fire(&fire(small_square()), DEFAULT_ZOOM, DEFAULT_EXPAND_FACTOR).unwrap();

        assert_eq!(plan.mosaic.len() as u64, plan.tiles.tile_count());
        let first = &plan.mosaic[0];
        assert_eq!((first.x, first.y), (plan.tiles.min_x, plan.tiles.min_y));
        assert_eq!((first.offset_x_px, first.offset_y_px), (0, 0));
        assert_eq!(first.quadkey, quadkey_from_tile(first.x, first.y, DEFAULT_ZOOM));
        assert_eq!(first.quadkey.len(), DEFAULT_ZOOM as usize);

        let last = plan.mosaic.last().unwrap();
        assert_eq!(last.offset_x_px + TILE_SIZE_PX, plan.width_px);
        assert_eq!(last.offset_y_px + TILE_SIZE_PX, plan.height_px);
    }

    #[test]
    fn test_no_plan_without_vertices() {
        let err = RenderPlan::for_fire(&fire(geojson::Value::Polygon(vec![])), 15, 2.2).unwrap_err();
        assert_eq!(err, RenderPlanError::NoVertices("4021".to_string()));
    }

    #[test]
    fn test_rejects_non_positive_or_non_finite_expand() {
        for factor in [-2.2, -1.0, 0.0, f64::NAN, f64::INFINITY] {
            let err = RenderPlan::for_fire(&fire(small_square()), 15, factor).unwrap_err();
            assert!(matches!(err, RenderPlanError::InvalidExpandFactor(_)));
        }
    }

    #[test]
    fn test_rejects_oversized_mosaic() {
        let err = RenderPlan::for_fire(&fire(small_square()), 15, 1_000.0).unwrap_err();
        assert!(matches!(err, RenderPlanError::TooManyTiles { max: MAX_MOSAIC_TILES, .. }));
    }
}
