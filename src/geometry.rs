//! Planar helpers shared by the perimeter adapter and the render planner.
//!
//! Everything here works on raw longitude/latitude degrees. Only the outer
//! ring of each polygon is considered; holes are ignored.

use geojson::{Position, Value};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Side length of a slippy-map tile in pixels.
pub const TILE_SIZE_PX: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoBounds {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl GeoBounds {
    pub const fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// Inclusive on every edge.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }

    pub fn center(&self) -> LngLat {
        LngLat {
            lng: (self.min_lon + self.max_lon) / 2.0,
            lat: (self.min_lat + self.max_lat) / 2.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileRange {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
    pub zoom: u8,
}

impl TileRange {
    pub fn columns(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn rows(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn tile_count(&self) -> u64 {
        u64::from(self.columns()) * u64::from(self.rows())
    }

    /// Row-major `(x, y)` of every tile in the range.
    pub fn tiles(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.min_y..=self.max_y).flat_map(move |y| (self.min_x..=self.max_x).map(move |x| (x, y)))
    }
}

/// Outer-ring vertices as `(lng, lat)`: ring 0 of a Polygon, or ring 0 of every
/// member of a MultiPolygon concatenated in order. Other geometry types yield nothing.
fn outer_ring_vertices(geometry: &Value) -> Vec<(f64, f64)> {
    fn lng_lat(position: &Position) -> Option<(f64, f64)> {
        match position.as_slice() {
            [lng, lat, ..] => Some((*lng, *lat)),
            _ => None,
        }
    }

    match geometry {
        Value::Polygon(rings) => rings
            .first()
            .map(|ring| ring.iter().filter_map(lng_lat).collect())
            .unwrap_or_default(),
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .filter_map(|rings| rings.first())
            .flat_map(|ring| ring.iter().filter_map(lng_lat))
            .collect(),
        _ => Vec::new(),
    }
}

/// Vertex mean of the outer ring(s).
///
/// For a MultiPolygon every sub-polygon's outer ring is pooled before
/// averaging, so a sub-polygon with more vertices pulls the result toward
/// itself. This is not an area centroid; map clients already position
/// markers against it, so keep it as is.
pub fn centroid(geometry: &Value) -> Option<LngLat> {
    let vertices = outer_ring_vertices(geometry);
    if vertices.is_empty() {
        return None;
    }

    let count = vertices.len() as f64;
    let (lng_sum, lat_sum) = vertices
        .iter()
        .fold((0.0, 0.0), |(lng, lat), (x, y)| (lng + x, lat + y));

    Some(LngLat {
        lng: lng_sum / count,
        lat: lat_sum / count,
    })
}

pub fn bounding_box(geometry: &Value) -> Option<GeoBounds> {
    let vertices = outer_ring_vertices(geometry);
    let (first_lng, first_lat) = *vertices.first()?;

    let init = GeoBounds::new(first_lng, first_lng, first_lat, first_lat);
    Some(vertices.iter().fold(init, |b, &(lng, lat)| GeoBounds {
        min_lon: b.min_lon.min(lng),
        max_lon: b.max_lon.max(lng),
        min_lat: b.min_lat.min(lat),
        max_lat: b.max_lat.max(lat),
    }))
}

/// Scales width and height by `factor` around the box center.
pub fn expand_bounds(bounds: &GeoBounds, factor: f64) -> GeoBounds {
    let center = bounds.center();
    let half_width = bounds.width() * factor / 2.0;
    let half_height = bounds.height() * factor / 2.0;

    GeoBounds {
        min_lon: center.lng - half_width,
        max_lon: center.lng + half_width,
        min_lat: center.lat - half_height,
        max_lat: center.lat + half_height,
    }
}

/// Web Mercator tile containing the point, as `(x, y)`.
///
/// Points past the antimeridian or the Mercator latitude limit are clamped to
/// the edge tiles of the grid.
pub fn degrees_to_tile(lat: f64, lon: f64, zoom: u8) -> (u32, u32) {
    let n = 2.0_f64.powi(zoom as i32);
    let lat_rad = lat.to_radians();

    let x = ((lon + 180.0) / 360.0 * n).clamp(0.0, n - 1.0) as u32;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).clamp(0.0, n - 1.0) as u32;

    (x, y)
}

/// Northwest corner of tile `(x, y)`, as `(lat, lon)`.
pub fn tile_to_degrees(x: u32, y: u32, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);

    let lon = x as f64 / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan();

    (lat_rad.to_degrees(), lon)
}

/// Bing Maps quadkey for an XYZ tile.
pub fn quadkey_from_tile(x: u32, y: u32, zoom: u8) -> String {
    (1..=zoom)
        .rev()
        .map(|level| {
            let mask = 1u32 << (level - 1);
            let mut digit = 0u8;
            if x & mask != 0 {
                digit += 1;
            }
            if y & mask != 0 {
                digit += 2;
            }
            char::from(b'0' + digit)
        })
        .collect()
}

/// Tiles covering `bounds` at `zoom`, inclusive on both ends.
///
/// Corners are ordered after conversion, so an inverted box still yields
/// `min <= max` on both axes.
pub fn tile_range(bounds: &GeoBounds, zoom: u8) -> TileRange {
    let (sw_x, sw_y) = degrees_to_tile(bounds.min_lat, bounds.min_lon, zoom);
    let (ne_x, ne_y) = degrees_to_tile(bounds.max_lat, bounds.max_lon, zoom);

    TileRange {
        min_x: sw_x.min(ne_x),
        max_x: sw_x.max(ne_x),
        min_y: sw_y.min(ne_y),
        max_y: sw_y.max(ne_y),
        zoom,
    }
}

/// Geographic extent of the mosaic stitched from `range`.
pub fn tile_range_bounds(range: &TileRange) -> GeoBounds {
    let (north, west) = tile_to_degrees(range.min_x, range.min_y, range.zoom);
    let (south, east) = tile_to_degrees(range.max_x + 1, range.max_y + 1, range.zoom);

    GeoBounds {
        min_lon: west,
        max_lon: east,
        min_lat: south,
        max_lat: north,
    }
}

/// Linear lon/lat to pixel mapping with the origin at the top-left corner.
///
/// No Mercator correction is applied. A zero-width or zero-height `map_bounds`
/// produces non-finite coordinates.
pub fn project_to_pixels(
    coordinates: &[Position],
    map_bounds: &GeoBounds,
    width: u32,
    height: u32,
) -> Vec<(f64, f64)> {
    coordinates
        .iter()
        .filter_map(|position| match position.as_slice() {
            [lon, lat, ..] => Some((*lon, *lat)),
            _ => None,
        })
        .map(|(lon, lat)| {
            let x_norm = (lon - map_bounds.min_lon) / map_bounds.width();
            let y_norm = (map_bounds.max_lat - lat) / map_bounds.height();
            (x_norm * width as f64, y_norm * height as f64)
        })
        .collect()
}
