//! Geographic primitives: points, great-circle distance, and grid cells.
//!
//! Location rooms are named after fixed 0.25° grid cells. A connection that
//! declares a location+radius joins every cell its circle touches, so a
//! broadcast for a point only has to look at that point's single cell room
//! and then apply the exact haversine check.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per statute mile.
const METERS_PER_MILE: f64 = 1_609.344;

/// Grid cell edge length in degrees.
pub const CELL_SIZE_DEG: f64 = 0.25;

/// Largest declarable radius, in miles. Larger values are rejected rather
/// than clamped so the client learns its request was out of bounds.
pub const MAX_RADIUS_MILES: f64 = 100.0;

/// A WGS-84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validate coordinate bounds: latitude −90..90, longitude −180..180.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.lat.is_finite() || self.lat < -90.0 || self.lat > 90.0 {
            return Err(CoreError::Validation(format!(
                "Latitude out of range: {}",
                self.lat
            )));
        }
        if !self.lng.is_finite() || self.lng < -180.0 || self.lng > 180.0 {
            return Err(CoreError::Validation(format!(
                "Longitude out of range: {}",
                self.lng
            )));
        }
        Ok(())
    }
}

/// Convert statute miles to meters.
pub fn miles_to_meters(miles: f64) -> f64 {
    miles * METERS_PER_MILE
}

/// Convert meters to statute miles.
pub fn meters_to_miles(meters: f64) -> f64 {
    meters / METERS_PER_MILE
}

/// Validate a declared radius in miles: positive, finite, capped.
pub fn validate_radius_miles(radius: f64) -> Result<(), CoreError> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(CoreError::Validation(format!(
            "Radius must be positive, got {radius}"
        )));
    }
    if radius > MAX_RADIUS_MILES {
        return Err(CoreError::Validation(format!(
            "Radius exceeds maximum of {MAX_RADIUS_MILES} miles"
        )));
    }
    Ok(())
}

/// Great-circle distance between two points, in meters (haversine).
pub fn haversine_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

// ---------------------------------------------------------------------------
// Grid cells
// ---------------------------------------------------------------------------

/// A fixed grid cell, identified by its integer column/row on the
/// [`CELL_SIZE_DEG`] grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeoCell {
    pub x: i32,
    pub y: i32,
}

impl GeoCell {
    /// The cell containing `point`.
    pub fn containing(point: &GeoPoint) -> Self {
        Self {
            x: (point.lng / CELL_SIZE_DEG).floor() as i32,
            y: (point.lat / CELL_SIZE_DEG).floor() as i32,
        }
    }

    /// Center of this cell.
    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lat: (self.y as f64 + 0.5) * CELL_SIZE_DEG,
            lng: (self.x as f64 + 0.5) * CELL_SIZE_DEG,
        }
    }

    /// The room name for this cell, e.g. `location:-394:117`.
    pub fn room_name(&self) -> String {
        format!("location:{}:{}", self.x, self.y)
    }
}

/// Every cell whose area may intersect the circle `(center, radius_m)`.
///
/// Over-approximates slightly (cells are included when their center is within
/// the radius plus half the cell diagonal); the exact haversine check at
/// broadcast time removes false positives. Never returns an empty set: the
/// center's own cell is always included.
pub fn cells_covering(center: &GeoPoint, radius_m: f64) -> Vec<GeoCell> {
    let lat_span_deg = radius_m / 111_320.0; // meters per degree of latitude
    let lng_scale = center.lat.to_radians().cos().max(0.01);
    let lng_span_deg = lat_span_deg / lng_scale;

    let home = GeoCell::containing(center);
    let x_cells = (lng_span_deg / CELL_SIZE_DEG).ceil() as i32;
    let y_cells = (lat_span_deg / CELL_SIZE_DEG).ceil() as i32;

    // Half-diagonal slack so edge-touching cells are not missed.
    let cell_half_diag_m = CELL_SIZE_DEG * 111_320.0 * std::f64::consts::SQRT_2 / 2.0;

    let mut cells = Vec::new();
    for dx in -x_cells..=x_cells {
        for dy in -y_cells..=y_cells {
            let cell = GeoCell {
                x: home.x + dx,
                y: home.y + dy,
            };
            if cell == home
                || haversine_meters(center, &cell.center()) <= radius_m + cell_half_diag_m
            {
                cells.push(cell);
            }
        }
    }
    cells
}
