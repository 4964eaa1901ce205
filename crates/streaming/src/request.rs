use serde::Serialize;

/// Parameter generation a request was issued under.
///
/// Bumped every time the view parameters change in a way that invalidates
/// in-flight requests. A small copyable handle so it can travel with every
/// task and event without allocation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(pub u64);

impl Generation {
    pub const ZERO: Generation = Generation(0);

    #[must_use]
    pub const fn next(self) -> Generation {
        Generation(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// The two request kinds that share a generation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Viewport query: points to cluster plus facets and counters.
    Cluster,
    /// Statistics and series over the drawn rectangle or viewport.
    Stats,
}

impl RequestKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            RequestKind::Cluster => "cluster",
            RequestKind::Stats => "stats",
        }
    }
}
