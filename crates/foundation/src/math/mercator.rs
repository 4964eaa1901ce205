//! Spherical Web-Mercator projection into the unit square.
//!
//! `x` grows eastwards from 0 at -180° to 1 at 180°; `y` grows southwards
//! from 0 at the northern clip latitude to 1 at the southern one. At zoom
//! `z` one unit spans `extent * 2^z` screen pixels.

use std::f64::consts::PI;

pub fn lon_to_x(lon: f64) -> f64 {
    lon / 360.0 + 0.5
}

pub fn lat_to_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

pub fn x_to_lon(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

pub fn y_to_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0).to_radians();
    360.0 * y2.exp().atan() / PI - 90.0
}

#[cfg(test)]
mod tests {
    use super::{lat_to_y, lon_to_x, x_to_lon, y_to_lat};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn origin_maps_to_center() {
        assert_close(lon_to_x(0.0), 0.5, 1e-12);
        assert_close(lat_to_y(0.0), 0.5, 1e-12);
    }

    #[test]
    fn projection_round_trips() {
        for (lat, lon) in [(37.98, 23.72), (-33.9, 151.2), (64.1, -21.9)] {
            assert_close(y_to_lat(lat_to_y(lat)), lat, 1e-9);
            assert_close(x_to_lon(lon_to_x(lon)), lon, 1e-9);
        }
    }

    #[test]
    fn poles_are_clamped() {
        assert_eq!(lat_to_y(90.0), 0.0);
        assert_eq!(lat_to_y(-90.0), 1.0);
    }

    #[test]
    fn north_is_up() {
        assert!(lat_to_y(45.0) < lat_to_y(-45.0));
    }
}
