use foundation::LatLon;

use crate::index::Cluster;
use crate::point::Point;

/// Distance in degrees between an expanded cluster's centroid and each member.
pub const LEG_LENGTH_DEG: f64 = 0.0003;

/// One member of an expanded cluster, drawn at `position` with a leg back
/// to `anchor`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpiderLeg<'a> {
    pub point: &'a Point,
    pub anchor: LatLon,
    pub position: LatLon,
}

/// Lay the members of `cluster` out on a circle around its centroid.
///
/// Member `i` sits at angle `i * 2π / n`. Pure; recompute on every expansion.
pub fn spiderfy(cluster: &Cluster) -> Vec<SpiderLeg<'_>> {
    let anchor = cluster.centroid;
    let n = cluster.members().len();
    if n == 0 {
        return Vec::new();
    }
    let step = std::f64::consts::TAU / n as f64;

    cluster
        .members()
        .enumerate()
        .map(|(i, point)| {
            let angle = i as f64 * step;
            SpiderLeg {
                point,
                anchor,
                position: LatLon::new(
                    anchor.lat + LEG_LENGTH_DEG * angle.sin(),
                    anchor.lon + LEG_LENGTH_DEG * angle.cos(),
                ),
            }
        })
        .collect()
}
