/// Largest absolute longitude accepted as plausible (degrees).
pub const MAX_ABS_LNG_DEG: f64 = 180.0;

/// Largest absolute latitude accepted as plausible (degrees).
///
/// Tighter than the geodetic 90° because the map renders in Web Mercator,
/// which cannot show the poles.
pub const MAX_ABS_LAT_DEG: f64 = 85.0;

/// Geographic position in degrees, longitude first (GeoJSON order).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    /// Both axes are finite and inside the plausible ranges.
    pub fn is_plausible(self) -> bool {
        looks_like_lng(self.lng) && looks_like_lat(self.lat)
    }

    pub fn swapped(self) -> Self {
        Self::new(self.lat, self.lng)
    }
}

pub fn looks_like_lng(v: f64) -> bool {
    v.is_finite() && v.abs() <= MAX_ABS_LNG_DEG
}

pub fn looks_like_lat(v: f64) -> bool {
    v.is_finite() && v.abs() <= MAX_ABS_LAT_DEG
}
