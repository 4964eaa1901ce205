use std::collections::BTreeMap;

use cluster::MAX_ZOOM;
use foundation::{Rect, TimeRange};
use serde::Serialize;
use streaming::{AggregateFunction, ColumnId, Dataset, QueryRequest};

/// Zoom a freshly loaded dataset starts at.
pub const DEFAULT_ZOOM: u8 = 14;

/// Per-point time-series breakdown is offered from this zoom on.
pub const TIME_SERIES_MIN_ZOOM: u8 = MAX_ZOOM;

/// Everything that determines the backend's answer for the current view.
///
/// Equal parameters imply identical server results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewParameters {
    pub categorical_filters: BTreeMap<ColumnId, String>,
    /// Ordered group-by columns.
    pub group_by: Vec<ColumnId>,
    pub measure: Option<ColumnId>,
    pub aggregate: AggregateFunction,
    pub time_range: TimeRange,
    pub viewport: Rect,
    /// User-drawn selection; overrides the viewport for statistics only.
    pub drawn_rect: Option<Rect>,
    pub zoom: u8,
    pub time_series: bool,
}

impl ViewParameters {
    /// Defaults for a freshly selected dataset.
    pub fn for_dataset(dataset: &Dataset, now_ms: i64) -> Self {
        Self {
            categorical_filters: BTreeMap::new(),
            group_by: dataset.dimensions.first().copied().into_iter().collect(),
            measure: dataset.measure0,
            aggregate: AggregateFunction::Avg,
            time_range: TimeRange::until(now_ms),
            viewport: dataset.extent().unwrap_or(Rect::WORLD),
            drawn_rect: None,
            zoom: DEFAULT_ZOOM,
            time_series: false,
        }
    }

    pub fn time_series_offered(&self) -> bool {
        self.zoom >= TIME_SERIES_MIN_ZOOM
    }

    /// Rectangle statistics are computed over.
    pub fn stats_rect(&self) -> Rect {
        self.drawn_rect.unwrap_or(self.viewport)
    }

    /// Viewport query: always the viewport, carries zoom.
    pub fn cluster_query(&self) -> QueryRequest {
        self.request(self.viewport, Some(self.zoom))
    }

    /// Statistics query: drawn rectangle when present, no zoom.
    pub fn stats_query(&self) -> QueryRequest {
        self.request(self.stats_rect(), None)
    }

    fn request(&self, rect: Rect, zoom: Option<u8>) -> QueryRequest {
        QueryRequest {
            rect,
            zoom,
            categorical_filters: self.categorical_filters.clone(),
            group_by_cols: self.group_by.clone(),
            measure_col: self.measure,
            agg_type: self.aggregate,
            time_series_data_toggle: self.time_series,
            from: self.time_range.from,
            to: self.time_range.to,
        }
    }
}
