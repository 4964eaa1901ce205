use serde::{Deserialize, Serialize};

/// Geographic position in degrees (WGS84).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Axis-aligned geographic rectangle.
///
/// The field layout is the backend's wire shape:
/// `{"lat": [south, north], "lon": [west, east]}`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub lat: [f64; 2],
    pub lon: [f64; 2],
}

impl Rect {
    /// Whole Web-Mercator world.
    pub const WORLD: Rect = Rect::from_bounds(-85.0, -180.0, 85.0, 180.0);

    pub const fn from_bounds(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            lat: [south, north],
            lon: [west, east],
        }
    }

    pub fn south(&self) -> f64 {
        self.lat[0]
    }

    pub fn north(&self) -> f64 {
        self.lat[1]
    }

    pub fn west(&self) -> f64 {
        self.lon[0]
    }

    pub fn east(&self) -> f64 {
        self.lon[1]
    }

    /// Inclusive containment test. Does not handle antimeridian wrap.
    pub fn contains(&self, p: LatLon) -> bool {
        p.lat >= self.south() && p.lat <= self.north() && p.lon >= self.west() && p.lon <= self.east()
    }
}

/// Clusterer query box in `[west, south, east, north]` order.
///
/// Unlike [`Rect`], `west > east` is meaningful here: it denotes a box that
/// crosses the antimeridian.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    /// Whole Web-Mercator world; the clusterer's default query box.
    pub const WORLD: BBox = BBox {
        west: -180.0,
        south: -85.0,
        east: 180.0,
        north: 85.0,
    };

    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }
}

impl From<Rect> for BBox {
    fn from(r: Rect) -> Self {
        BBox::new(r.west(), r.south(), r.east(), r.north())
    }
}

#[cfg(test)]
mod tests {
    use super::{BBox, LatLon, Rect};

    #[test]
    fn rect_wire_shape_is_lat_lon_pairs() {
        let r = Rect::from_bounds(37.9, 23.6, 38.1, 23.9);
        let json = serde_json::to_value(r).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"lat": [37.9, 38.1], "lon": [23.6, 23.9]})
        );
    }

    #[test]
    fn contains_is_inclusive() {
        let r = Rect::from_bounds(0.0, 0.0, 1.0, 1.0);
        assert!(r.contains(LatLon::new(0.0, 1.0)));
        assert!(r.contains(LatLon::new(0.5, 0.5)));
        assert!(!r.contains(LatLon::new(1.01, 0.5)));
    }

    #[test]
    fn bbox_from_rect_reorders_edges() {
        let r = Rect::from_bounds(-10.0, 20.0, 10.0, 30.0);
        assert_eq!(BBox::from(r), BBox::new(20.0, -10.0, 30.0, 10.0));
    }
}
