use std::sync::Arc;

use foundation::math::mercator::{lat_to_y, lon_to_x, x_to_lon, y_to_lat};
use foundation::{BBox, LatLon};

use crate::kd::{DEFAULT_NODE_SIZE, Entry, KdIndex};
use crate::point::Point;

/// Deepest zoom level the map offers; also the zoom at which clusters
/// become clickable and the per-point time-series breakdown is allowed.
pub const MAX_ZOOM: u8 = 16;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClusterOptions {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub min_points: u32,
    /// Merge radius in screen pixels.
    pub radius: f64,
    /// Tile extent in screen pixels.
    pub extent: f64,
    pub node_size: usize,
}

impl ClusterOptions {
    pub const fn new() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: MAX_ZOOM,
            min_points: 3,
            radius: 60.0,
            extent: 256.0,
            node_size: DEFAULT_NODE_SIZE,
        }
    }
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable handle of a merged cluster inside one [`ClusterIndex`].
///
/// `zoom` is the level the cluster was formed at; `index` its position in
/// that level. Handles are meaningless across rebuilds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId {
    pub zoom: u8,
    pub index: u32,
}

#[derive(Debug, Clone)]
struct Node {
    x: f64,
    y: f64,
    count: u32,
    digital: bool,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf(u32),
    /// Indices into the next finer level of the nodes merged into this one.
    Merged { id: ClusterId, children: Vec<u32> },
}

#[derive(Debug, Clone)]
struct Level {
    nodes: Vec<Node>,
    kd: KdIndex,
}

impl Level {
    fn new(nodes: Vec<Node>, node_size: usize) -> Self {
        let entries = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| Entry {
                id: i as u32,
                x: n.x,
                y: n.y,
            })
            .collect();
        Self {
            kd: KdIndex::build(entries, node_size),
            nodes,
        }
    }
}

/// Multi-resolution cluster tree over one batch of points.
///
/// Built once per batch: level `max_zoom + 1` holds the raw points, and each
/// coarser level is produced by greedy radius clustering of the level below.
/// Queries at any zoom reuse the levels.
#[derive(Debug, Clone)]
pub struct ClusterIndex {
    options: ClusterOptions,
    points: Arc<[Point]>,
    /// Indexed by zoom, `0..=max_zoom + 1`. Levels below `min_zoom` stay empty.
    levels: Vec<Level>,
}

/// A node of the cluster tree as seen at one zoom level.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// `None` for a degenerate cluster wrapping a single point.
    pub id: Option<ClusterId>,
    pub centroid: LatLon,
    pub member_count: u32,
    pub has_digital_member: bool,
    points: Arc<[Point]>,
    members: Vec<u32>,
}

impl Cluster {
    pub fn is_single(&self) -> bool {
        self.member_count == 1
    }

    /// Member points, in input order.
    pub fn members(&self) -> impl ExactSizeIterator<Item = &Point> + '_ {
        self.members.iter().map(|&i| &self.points[i as usize])
    }

    /// The wrapped point of a degenerate cluster.
    pub fn single_point(&self) -> Option<&Point> {
        if self.is_single() {
            self.members().next()
        } else {
            None
        }
    }
}

impl ClusterIndex {
    pub fn build(points: Vec<Point>) -> Self {
        Self::with_options(points, ClusterOptions::default())
    }

    pub fn with_options(points: Vec<Point>, options: ClusterOptions) -> Self {
        let points: Arc<[Point]> = points.into();
        let finest = usize::from(options.max_zoom) + 1;
        let mut levels: Vec<Level> = Vec::with_capacity(finest + 1);

        let mut current: Vec<Node> = points
            .iter()
            .enumerate()
            .map(|(i, p)| Node {
                x: lon_to_x(p.lon),
                y: lat_to_y(p.lat),
                count: 1,
                digital: p.digital,
                kind: NodeKind::Leaf(i as u32),
            })
            .collect();

        // Built finest-first, reversed at the end.
        let mut built = vec![Level::new(current.clone(), options.node_size)];
        for zoom in (options.min_zoom..=options.max_zoom).rev() {
            let finer = &built[built.len() - 1].kd;
            current = cluster_level(&current, finer, zoom, &options);
            built.push(Level::new(current.clone(), options.node_size));
        }

        for _ in 0..options.min_zoom {
            levels.push(Level::new(Vec::new(), options.node_size));
        }
        levels.extend(built.into_iter().rev());

        Self {
            options,
            points,
            levels,
        }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &Arc<[Point]> {
        &self.points
    }

    /// Clusters intersecting `bbox` at `zoom`.
    ///
    /// Longitudes are wrapped into `[-180, 180)`; boxes spanning 360° or more
    /// cover the whole world and boxes crossing the antimeridian are answered
    /// as two queries. Output order is deterministic for a given index.
    pub fn query(&self, bbox: BBox, zoom: u8) -> Vec<Cluster> {
        if self.points.is_empty() {
            return Vec::new();
        }

        let mut west = wrap_lon(bbox.west);
        let south = bbox.south.clamp(-90.0, 90.0);
        let mut east = if bbox.east == 180.0 {
            180.0
        } else {
            wrap_lon(bbox.east)
        };
        let north = bbox.north.clamp(-90.0, 90.0);

        if bbox.east - bbox.west >= 360.0 {
            west = -180.0;
            east = 180.0;
        } else if west > east {
            let mut out = self.query(BBox::new(west, south, 180.0, north), zoom);
            out.extend(self.query(BBox::new(-180.0, south, east, north), zoom));
            return out;
        }

        let level = &self.levels[self.limit_zoom(zoom)];
        level
            .kd
            .range(lon_to_x(west), lat_to_y(north), lon_to_x(east), lat_to_y(south))
            .into_iter()
            .map(|i| self.to_cluster(&level.nodes[i as usize]))
            .collect()
    }

    /// Nodes merged into `id`, one zoom level finer than where it formed.
    pub fn children(&self, id: ClusterId) -> Option<Vec<Cluster>> {
        let node = self.node(id)?;
        let NodeKind::Merged { children, .. } = &node.kind else {
            return None;
        };
        let finer = self.levels.get(usize::from(id.zoom) + 1)?;
        Some(
            children
                .iter()
                .map(|&c| self.to_cluster(&finer.nodes[c as usize]))
                .collect(),
        )
    }

    /// Zoom at which `id` splits into its children.
    pub fn expansion_zoom(&self, id: ClusterId) -> Option<u8> {
        let mut current = id;
        loop {
            let children = self.children(current)?;
            let zoom = current.zoom + 1;
            match children.as_slice() {
                [only] if zoom <= self.options.max_zoom => match only.id {
                    Some(next) => current = next,
                    None => return Some(zoom),
                },
                _ => return Some(zoom),
            }
        }
    }

    fn node(&self, id: ClusterId) -> Option<&Node> {
        self.levels
            .get(usize::from(id.zoom))?
            .nodes
            .get(id.index as usize)
    }

    fn limit_zoom(&self, zoom: u8) -> usize {
        usize::from(zoom.clamp(self.options.min_zoom, self.options.max_zoom + 1))
    }

    fn to_cluster(&self, node: &Node) -> Cluster {
        let (id, members) = match &node.kind {
            NodeKind::Leaf(i) => (None, vec![*i]),
            NodeKind::Merged { id, .. } => {
                let mut members = Vec::with_capacity(node.count as usize);
                self.collect_leaves(node, &mut members);
                members.sort_unstable();
                (Some(*id), members)
            }
        };
        Cluster {
            id,
            centroid: LatLon::new(y_to_lat(node.y), x_to_lon(node.x)),
            member_count: node.count,
            has_digital_member: node.digital,
            points: Arc::clone(&self.points),
            members,
        }
    }

    fn collect_leaves(&self, node: &Node, out: &mut Vec<u32>) {
        let mut stack: Vec<&Node> = vec![node];
        while let Some(n) = stack.pop() {
            match &n.kind {
                NodeKind::Leaf(i) => out.push(*i),
                NodeKind::Merged { id, children } => {
                    let finer = &self.levels[usize::from(id.zoom) + 1];
                    stack.extend(children.iter().map(|&c| &finer.nodes[c as usize]));
                }
            }
        }
    }
}

/// Greedy radius clustering of the level one finer than `zoom`.
fn cluster_level(finer: &[Node], kd: &KdIndex, zoom: u8, options: &ClusterOptions) -> Vec<Node> {
    let r = options.radius / (options.extent * 2f64.powi(i32::from(zoom)));
    let mut visited = vec![false; finer.len()];
    let mut out: Vec<Node> = Vec::with_capacity(finer.len());

    for (i, p) in finer.iter().enumerate() {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let neighbors: Vec<u32> = kd
            .within(p.x, p.y, r)
            .into_iter()
            .filter(|&n| !visited[n as usize])
            .collect();

        let origin = p.count;
        let total = origin
            + neighbors
                .iter()
                .map(|&n| finer[n as usize].count)
                .sum::<u32>();

        if total > origin && total >= options.min_points {
            let mut wx = p.x * f64::from(origin);
            let mut wy = p.y * f64::from(origin);
            let mut digital = p.digital;
            let mut children = Vec::with_capacity(neighbors.len() + 1);
            children.push(i as u32);

            for &n in &neighbors {
                let b = &finer[n as usize];
                visited[n as usize] = true;
                wx += b.x * f64::from(b.count);
                wy += b.y * f64::from(b.count);
                digital |= b.digital;
                children.push(n);
            }

            let id = ClusterId {
                zoom,
                index: out.len() as u32,
            };
            out.push(Node {
                x: wx / f64::from(total),
                y: wy / f64::from(total),
                count: total,
                digital,
                kind: NodeKind::Merged { id, children },
            });
        } else {
            out.push(p.clone());
            if total > 1 {
                for &n in &neighbors {
                    visited[n as usize] = true;
                    out.push(finer[n as usize].clone());
                }
            }
        }
    }

    out
}

fn wrap_lon(lon: f64) -> f64 {
    ((lon + 180.0) % 360.0 + 360.0) % 360.0 - 180.0
}

#[cfg(test)]
mod tests {
    use super::{Cluster, ClusterIndex, MAX_ZOOM};
    use crate::point::Point;
    use foundation::BBox;
    use proptest::prelude::*;

    fn total_members(clusters: &[Cluster]) -> u64 {
        clusters.iter().map(|c| u64::from(c.member_count)).sum()
    }

    fn athens_block(n: i64, digital_at: Option<i64>) -> Vec<Point> {
        (0..n)
            .map(|i| {
                Point::new(37.98 + i as f64 * 1e-5, 23.72 + i as f64 * 1e-5, i)
                    .with_digital(Some(i) == digital_at)
            })
            .collect()
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        let idx = ClusterIndex::build(Vec::new());
        assert!(idx.is_empty());
        assert!(idx.query(BBox::WORLD, 3).is_empty());
    }

    #[test]
    fn close_points_merge_at_low_zoom() {
        let idx = ClusterIndex::build(athens_block(10, None));
        let clusters = idx.query(BBox::WORLD, 2);
        assert_eq!(clusters.len(), 1);
        let c = &clusters[0];
        assert_eq!(c.member_count, 10);
        assert_eq!(c.members().len(), 10);
        assert!(c.id.is_some());
        assert!((c.centroid.lat - 37.98).abs() < 1e-3);
    }

    #[test]
    fn below_min_points_stay_individual() {
        let idx = ClusterIndex::build(athens_block(2, None));
        let clusters = idx.query(BBox::WORLD, 0);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(Cluster::is_single));
    }

    #[test]
    fn finest_level_is_raw_points() {
        let idx = ClusterIndex::build(athens_block(5, None));
        let clusters = idx.query(BBox::WORLD, MAX_ZOOM + 1);
        assert_eq!(clusters.len(), 5);
        assert_eq!(clusters[2].single_point().map(|p| p.row_id), Some(2));
    }

    #[test]
    fn digital_flag_is_or_of_members() {
        let idx = ClusterIndex::build(athens_block(20, Some(13)));
        let top = idx.query(BBox::WORLD, 0);
        assert_eq!(top.len(), 1);
        assert!(top[0].has_digital_member);

        let plain = ClusterIndex::build(athens_block(20, None));
        assert!(!plain.query(BBox::WORLD, 0)[0].has_digital_member);
    }

    #[test]
    fn children_and_expansion_zoom() {
        let idx = ClusterIndex::build(athens_block(10, None));
        let top = idx.query(BBox::WORLD, 0);
        let id = top[0].id.unwrap();
        let children = idx.children(id).unwrap();
        assert!(children.len() >= 2);
        assert_eq!(
            children.iter().map(|c| c.member_count).sum::<u32>(),
            top[0].member_count
        );
        assert_eq!(idx.expansion_zoom(id), Some(id.zoom + 1));
    }

    #[test]
    fn viewport_filters_clusters() {
        let mut points = athens_block(3, None);
        points.push(Point::new(-33.9, 151.2, 100));
        let idx = ClusterIndex::build(points);
        let around_sydney = BBox::new(150.0, -35.0, 152.0, -33.0);
        let hits = idx.query(around_sydney, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].single_point().map(|p| p.row_id), Some(100));
    }

    #[test]
    fn antimeridian_box_is_split() {
        let idx = ClusterIndex::build(vec![
            Point::new(0.0, 179.5, 1),
            Point::new(0.0, -179.5, 2),
            Point::new(0.0, 0.0, 3),
        ]);
        let hits = idx.query(BBox::new(179.0, -1.0, -179.0, 1.0), MAX_ZOOM + 1);
        let mut ids: Vec<i64> = hits
            .iter()
            .filter_map(|c| c.single_point().map(|p| p.row_id))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn query_is_deterministic() {
        let points = athens_block(50, Some(7));
        let a = ClusterIndex::build(points.clone()).query(BBox::WORLD, 12);
        let b = ClusterIndex::build(points).query(BBox::WORLD, 12);
        let key = |c: &Cluster| (c.member_count, c.centroid.lat.to_bits(), c.centroid.lon.to_bits());
        assert_eq!(a.iter().map(key).collect::<Vec<_>>(), b.iter().map(key).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn prop_member_counts_sum_to_input(
            coords in prop::collection::vec((-80.0..80.0f64, -179.0..179.0f64, any::<bool>()), 0..300),
            zoom in 0u8..=17,
        ) {
            let points: Vec<Point> = coords
                .iter()
                .enumerate()
                .map(|(i, &(lat, lon, d))| Point::new(lat, lon, i as i64).with_digital(d))
                .collect();
            let idx = ClusterIndex::build(points.clone());
            let clusters = idx.query(BBox::WORLD, zoom);
            prop_assert_eq!(total_members(&clusters), points.len() as u64);
            for c in &clusters {
                prop_assert_eq!(c.members().len() as u32, c.member_count);
                prop_assert_eq!(c.has_digital_member, c.members().any(|p| p.digital));
            }
        }
    }
}
