use crate::geo::LngLat;

/// Geographic bounding box (west, south, east, north) in degrees.
///
/// Used both for the visible map area and for the extent of a feature set.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Viewport {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Zero-area box around a single point.
    pub const fn around(p: LngLat) -> Self {
        Self::new(p.lng, p.lat, p.lng, p.lat)
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn enclosing(points: impl IntoIterator<Item = LngLat>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut b = Self::around(first);
        for p in points {
            b.extend(p);
        }
        Some(b)
    }

    pub fn extend(&mut self, p: LngLat) {
        self.west = self.west.min(p.lng);
        self.south = self.south.min(p.lat);
        self.east = self.east.max(p.lng);
        self.north = self.north.max(p.lat);
    }

    /// All enclosed points coincide; fitting the camera to this box would zoom in without limit.
    pub fn is_degenerate(&self) -> bool {
        self.north == self.south && self.east == self.west
    }

    pub fn contains(&self, p: LngLat) -> bool {
        (self.west..=self.east).contains(&p.lng) && (self.south..=self.north).contains(&p.lat)
    }

    pub fn center(&self) -> LngLat {
        LngLat::new(
            0.5 * (self.west + self.east),
            0.5 * (self.south + self.north),
        )
    }

    /// `lngMin,latMin,lngMax,latMax`, the order the listing endpoint expects.
    pub fn to_query(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }

    pub fn to_array(&self) -> [[f64; 2]; 2] {
        [[self.west, self.south], [self.east, self.north]]
    }
}

#[cfg(test)]
mod tests {
    use super::Viewport;
    use crate::geo::LngLat;

    #[test]
    fn enclosing_covers_all_points() {
        let b = Viewport::enclosing([
            LngLat::new(2.30, 48.86),
            LngLat::new(2.40, 48.82),
            LngLat::new(2.35, 48.90),
        ])
        .expect("non-empty");
        assert_eq!(b, Viewport::new(2.30, 48.82, 2.40, 48.90));
        assert!(!b.is_degenerate());
    }

    #[test]
    fn enclosing_empty_is_none() {
        assert!(Viewport::enclosing(std::iter::empty()).is_none());
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let p = LngLat::new(2.35, 48.85);
        let b = Viewport::enclosing([p, p, p]).expect("non-empty");
        assert!(b.is_degenerate());
        assert!(b.contains(p));
    }

    #[test]
    fn query_lists_west_south_east_north() {
        let v = Viewport::new(2.2, 48.8, 2.5, 48.95);
        assert_eq!(v.to_query(), "2.2,48.8,2.5,48.95");
    }

    #[test]
    fn center_is_midpoint() {
        let v = Viewport::new(0.0, 10.0, 4.0, 20.0);
        assert_eq!(v.center(), LngLat::new(2.0, 15.0));
    }
}
