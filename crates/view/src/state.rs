use std::sync::Arc;

use cluster::{Cluster, ClusterIndex};
use serde::Serialize;
use streaming::{
    Dataset, Facets, Generation, GroupedStats, IndexStatus, RectStats, RequestKind, Row,
    SingleRectStats, TimeSeries,
};

use crate::params::ViewParameters;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    /// No dataset selected yet.
    #[default]
    Idle,
    /// Waiting for the metadata of `dataset`.
    Loading { dataset: String },
    Ready,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapMode {
    #[default]
    Markers,
    Heatmap,
}

/// Backend-side diagnostics of the last accepted cluster query.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
pub struct QueryInfo {
    pub fully_contained_tile_count: u64,
    pub tile_count: u64,
    pub point_count: u64,
    pub io_count: u64,
    pub total_tile_count: u64,
    pub total_point_count: u64,
    /// Round trip of the request.
    pub execution_ms: u64,
    /// Round trip plus clustering.
    pub total_ms: u64,
}

/// Last generation whose response was applied, per request kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Applied {
    pub cluster: Option<Generation>,
    pub stats: Option<Generation>,
}

impl Applied {
    pub fn get(&self, kind: RequestKind) -> Option<Generation> {
        match kind {
            RequestKind::Cluster => self.cluster,
            RequestKind::Stats => self.stats,
        }
    }

    pub fn set(&mut self, kind: RequestKind, generation: Generation) {
        match kind {
            RequestKind::Cluster => self.cluster = Some(generation),
            RequestKind::Stats => self.stats = Some(generation),
        }
    }
}

/// Immutable snapshot of everything the view shows.
///
/// Owned by [`ViewStore`](crate::store::ViewStore); everyone else reads
/// `Arc` snapshots and proposes events.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub phase: Phase,
    pub dataset: Option<Dataset>,
    pub datasets: Vec<Dataset>,
    pub params: Option<ViewParameters>,
    pub generation: Generation,
    pub applied: Applied,
    pub index_status: IndexStatus,

    pub cluster_index: Option<Arc<ClusterIndex>>,
    pub clusters: Arc<[Cluster]>,
    pub expanded_cluster: Option<usize>,

    pub facets: Facets,
    pub rect_stats: Option<RectStats>,
    pub cleaned_rect_stats: Option<RectStats>,
    pub single_stats: Option<SingleRectStats>,
    pub grouped_series: Vec<GroupedStats>,
    pub other_series: Vec<GroupedStats>,
    pub cleaned_series: Vec<GroupedStats>,
    pub time_series: Vec<TimeSeries>,
    pub selected_time_series: Option<i64>,
    pub query_info: QueryInfo,

    pub selected_point: Option<i64>,
    pub row: Option<Row>,
    pub map_mode: MapMode,
    /// Index into each point's measure vector shown by the heatmap.
    pub selected_measure: usize,
    /// Last non-fatal error; the view is kept as it was.
    pub error: Option<String>,
}

impl ViewState {
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    pub fn dataset_id(&self) -> Option<&str> {
        self.dataset.as_ref().map(|d| d.id.as_str())
    }

    pub fn time_series_offered(&self) -> bool {
        self.params
            .as_ref()
            .is_some_and(ViewParameters::time_series_offered)
    }

    pub fn expanded(&self) -> Option<&Cluster> {
        self.expanded_cluster.and_then(|i| self.clusters.get(i))
    }

    /// Compact, serializable view for logs and CLI output.
    pub fn summary(&self) -> ViewSummary {
        ViewSummary {
            phase: self.phase.clone(),
            dataset: self.dataset_id().map(str::to_string),
            generation: self.generation,
            applied: self.applied,
            index_status: self.index_status,
            clusters: self.clusters.len(),
            points: self.clusters.iter().map(|c| u64::from(c.member_count)).sum(),
            digital_clusters: self.clusters.iter().filter(|c| c.has_digital_member).count(),
            grouped_series: self.grouped_series.len(),
            time_series: self.time_series.len(),
            single_stats: self.single_stats,
            query_info: self.query_info,
            map_mode: self.map_mode,
            error: self.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSummary {
    pub phase: Phase,
    pub dataset: Option<String>,
    pub generation: Generation,
    pub applied: Applied,
    pub index_status: IndexStatus,
    pub clusters: usize,
    pub points: u64,
    pub digital_clusters: usize,
    pub grouped_series: usize,
    pub time_series: usize,
    pub single_stats: Option<SingleRectStats>,
    pub query_info: QueryInfo,
    pub map_mode: MapMode,
    pub error: Option<String>,
}
