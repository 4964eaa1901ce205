use crate::index::Cluster;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HeatPoint {
    pub lat: f64,
    pub lon: f64,
    pub intensity: f64,
}

/// Heat samples for every member of `clusters`, weighted by measure `k`.
///
/// Members without a value for `k` are skipped.
pub fn heat_points(clusters: &[Cluster], k: usize) -> Vec<HeatPoint> {
    clusters
        .iter()
        .flat_map(|c| c.members())
        .filter_map(|p| {
            p.measure(k).map(|intensity| HeatPoint {
                lat: p.lat,
                lon: p.lon,
                intensity,
            })
        })
        .collect()
}
