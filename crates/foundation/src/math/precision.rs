//! Deterministic float ordering for sorting projected coordinates.

use core::cmp::Ordering;

/// Canonicalize a float before ordering: `-0.0` becomes `0.0` and every NaN
/// becomes the same NaN.
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Total ordering that does not depend on the sign of zero or NaN payloads.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}
