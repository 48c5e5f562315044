use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean earth radius in metres, as used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

const METRES_PER_DEGREE_LAT: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
// Pads the pre-filter box so float rounding never drops a courier sitting right on the radius
const BOX_MARGIN: f64 = 1.01;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoPointError {
    #[error("Latitude must be between -90 and 90 degrees, got {0}")]
    InvalidLatitude(f64),
    #[error("Longitude must be between -180 and 180 degrees, got {0}")]
    InvalidLongitude(f64),
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoPointError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoPointError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoPointError::InvalidLongitude(longitude));
        }
        Ok(Self { latitude, longitude })
    }

    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance_m(self, other)
    }

    /// A box that fully contains the circle of `radius_m` metres around this point. Used as a cheap index pre-filter;
    /// callers must still check the exact distance.
    ///
    /// The box never wraps. If the circle reaches a pole or crosses the antimeridian, the box spans every longitude.
    pub fn bounding_box(&self, radius_m: f64) -> BoundingBox {
        let radius_m = radius_m * BOX_MARGIN;
        let d_lat = radius_m / METRES_PER_DEGREE_LAT;
        let min_latitude = self.latitude - d_lat;
        let max_latitude = self.latitude + d_lat;
        let all_longitudes = (-180.0, 180.0);
        let (min_longitude, max_longitude) = if min_latitude <= -90.0 || max_latitude >= 90.0 {
            all_longitudes
        } else {
            // Widest longitude offset of a spherical cap centred at this latitude
            let angular = radius_m / EARTH_RADIUS_M;
            let ratio = angular.sin() / self.latitude.to_radians().cos();
            let d_lon = ratio.min(1.0).asin().to_degrees();
            if self.longitude - d_lon < -180.0 || self.longitude + d_lon > 180.0 {
                all_longitudes
            } else {
                (self.longitude - d_lon, self.longitude + d_lon)
            }
        };
        BoundingBox {
            min_latitude: min_latitude.max(-90.0),
            max_latitude: max_latitude.min(90.0),
            min_longitude,
            max_longitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&point.latitude) &&
            (self.min_longitude..=self.max_longitude).contains(&point.longitude)
    }
}

/// Great-circle distance between two points, in metres.
pub fn haversine_distance_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}
