use foundation::math::precision::stable_total_cmp_f64;

/// Static 2D k-d index over projected points.
///
/// Entries are reordered in place into an implicit tree: every range of
/// more than `node_size` entries is split at its median on alternating axes.
/// The tree is never mutated after `build`.
///
/// Ordering contract:
/// - `range` and `within` return ids in ascending order.
#[derive(Debug, Clone)]
pub struct KdIndex {
    entries: Vec<Entry>,
    node_size: usize,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Entry {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

pub const DEFAULT_NODE_SIZE: usize = 64;

impl KdIndex {
    pub fn build(entries: Vec<Entry>, node_size: usize) -> Self {
        let node_size = node_size.max(1);
        let mut entries = entries;
        sort_node(&mut entries, node_size, 0);
        Self { entries, node_size }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of entries inside the inclusive box `[min_x, max_x] x [min_y, max_y]`.
    pub fn range(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<u32> {
        let inside = |e: &Entry| e.x >= min_x && e.x <= max_x && e.y >= min_y && e.y <= max_y;
        let mut hits = self.search(inside, |axis, e| {
            let (v, lo, hi) = if axis == 0 {
                (e.x, min_x, max_x)
            } else {
                (e.y, min_y, max_y)
            };
            (lo <= v, hi >= v)
        });
        hits.sort_unstable();
        hits
    }

    /// Ids of entries within Euclidean distance `r` of `(qx, qy)`.
    pub fn within(&self, qx: f64, qy: f64, r: f64) -> Vec<u32> {
        let r2 = r * r;
        let inside = |e: &Entry| {
            let dx = e.x - qx;
            let dy = e.y - qy;
            dx * dx + dy * dy <= r2
        };
        let mut hits = self.search(inside, |axis, e| {
            let (v, q) = if axis == 0 { (e.x, qx) } else { (e.y, qy) };
            (q - r <= v, q + r >= v)
        });
        hits.sort_unstable();
        hits
    }

    /// Stack-based descent. `sides` reports, for a split entry, whether the
    /// query can reach the lower and the upper half on that axis.
    fn search(
        &self,
        inside: impl Fn(&Entry) -> bool,
        sides: impl Fn(usize, &Entry) -> (bool, bool),
    ) -> Vec<u32> {
        let mut hits = Vec::new();
        if self.entries.is_empty() {
            return hits;
        }

        // (lo, hi, axis) over half-open entry ranges.
        let mut stack: Vec<(usize, usize, usize)> = vec![(0, self.entries.len(), 0)];

        while let Some((lo, hi, axis)) = stack.pop() {
            if hi - lo <= self.node_size {
                hits.extend(
                    self.entries[lo..hi]
                        .iter()
                        .filter(|e| inside(*e))
                        .map(|e| e.id),
                );
                continue;
            }

            let mid = lo + (hi - lo) / 2;
            let m = &self.entries[mid];
            if inside(m) {
                hits.push(m.id);
            }

            let (lower, upper) = sides(axis, m);
            let next = 1 - axis;
            if upper {
                stack.push((mid + 1, hi, next));
            }
            if lower {
                stack.push((lo, mid, next));
            }
        }

        hits
    }
}

fn sort_node(entries: &mut [Entry], node_size: usize, axis: usize) {
    if entries.len() <= node_size {
        return;
    }

    let mid = entries.len() / 2;
    entries.select_nth_unstable_by(mid, |a, b| {
        let (va, vb) = if axis == 0 { (a.x, b.x) } else { (a.y, b.y) };
        stable_total_cmp_f64(va, vb).then_with(|| a.id.cmp(&b.id))
    });

    let (lower, rest) = entries.split_at_mut(mid);
    sort_node(lower, node_size, 1 - axis);
    sort_node(&mut rest[1..], node_size, 1 - axis);
}
