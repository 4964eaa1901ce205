//! Named, total, pure state transitions.
//!
//! `apply` returns `None` when an event does not apply to the current state
//! (wrong phase, stale generation, other dataset). The store keeps the old
//! snapshot in that case.

use cluster::{ClusterOptions, marker_style};
use streaming::{Dataset, Generation, IndexStatus, QueryResults, RequestKind, Row};

use crate::params::ViewParameters;
use crate::reconcile;
use crate::state::{MapMode, Phase, ViewState};

#[derive(Debug, Clone)]
pub enum Event {
    DatasetRequested {
        id: String,
    },
    DatasetLoaded {
        dataset: Dataset,
        now_ms: i64,
    },
    DatasetFailed {
        id: String,
        error: String,
    },
    DatasetsListed(Vec<Dataset>),
    ParamsChanged {
        params: ViewParameters,
        generation: Generation,
        clear_series: bool,
    },
    ClusterResolved {
        generation: Generation,
        results: QueryResults,
        execution_ms: u64,
    },
    StatsResolved {
        generation: Generation,
        results: QueryResults,
    },
    RequestFailed {
        generation: Generation,
        kind: RequestKind,
        error: String,
    },
    IndexStatusFetched {
        dataset: String,
        status: IndexStatus,
    },
    IndexReset {
        dataset: String,
    },
    ClusterExpanded(usize),
    ClusterCollapsed,
    RowRequested {
        row_id: i64,
    },
    RowFetched {
        dataset: String,
        row_id: i64,
        row: Row,
    },
    TimeSeriesSelected(Option<i64>),
    MapModeChanged(MapMode),
    MeasureSelected(usize),
    ErrorReported(String),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::DatasetRequested { .. } => "dataset_requested",
            Event::DatasetLoaded { .. } => "dataset_loaded",
            Event::DatasetFailed { .. } => "dataset_failed",
            Event::DatasetsListed(_) => "datasets_listed",
            Event::ParamsChanged { .. } => "params_changed",
            Event::ClusterResolved { .. } => "cluster_resolved",
            Event::StatsResolved { .. } => "stats_resolved",
            Event::RequestFailed { .. } => "request_failed",
            Event::IndexStatusFetched { .. } => "index_status_fetched",
            Event::IndexReset { .. } => "index_reset",
            Event::ClusterExpanded(_) => "cluster_expanded",
            Event::ClusterCollapsed => "cluster_collapsed",
            Event::RowRequested { .. } => "row_requested",
            Event::RowFetched { .. } => "row_fetched",
            Event::TimeSeriesSelected(_) => "time_series_selected",
            Event::MapModeChanged(_) => "map_mode_changed",
            Event::MeasureSelected(_) => "measure_selected",
            Event::ErrorReported(_) => "error_reported",
        }
    }
}

pub fn apply(state: &ViewState, event: Event, options: &ClusterOptions) -> Option<ViewState> {
    match event {
        Event::DatasetRequested { id } => Some(ViewState {
            phase: Phase::Loading { dataset: id },
            datasets: state.datasets.clone(),
            generation: state.generation.next(),
            ..ViewState::default()
        }),

        Event::DatasetLoaded { dataset, now_ms } => {
            match &state.phase {
                Phase::Loading { dataset: wanted } if *wanted == dataset.id => {}
                _ => return None,
            }
            let mut next = state.clone();
            next.phase = Phase::Ready;
            next.params = Some(ViewParameters::for_dataset(&dataset, now_ms));
            next.dataset = Some(dataset);
            next.index_status = IndexStatus::NOT_INITIALIZED;
            next.generation = state.generation.next();
            Some(next)
        }

        Event::DatasetFailed { id, error } => {
            match &state.phase {
                Phase::Loading { dataset } if *dataset == id => {}
                _ => return None,
            }
            let mut next = state.clone();
            next.error = Some(error);
            Some(next)
        }

        Event::DatasetsListed(datasets) => {
            let mut next = state.clone();
            next.datasets = datasets;
            Some(next)
        }

        Event::ParamsChanged {
            params,
            generation,
            clear_series,
        } => {
            if !state.is_ready() || generation <= state.generation {
                return None;
            }
            let mut next = state.clone();
            next.params = Some(params);
            next.generation = generation;
            if clear_series {
                next.grouped_series.clear();
            }
            Some(next)
        }

        Event::ClusterResolved {
            generation,
            results,
            execution_ms,
        } => reconcile::apply_cluster(state, generation, results, execution_ms, options),

        Event::StatsResolved {
            generation,
            results,
        } => reconcile::apply_stats(state, generation, results),

        Event::RequestFailed {
            generation,
            kind,
            error,
        } => reconcile::apply_failure(state, generation, kind, error),

        Event::IndexStatusFetched { dataset, status } => {
            if !state.is_ready() || state.dataset_id() != Some(dataset.as_str()) {
                return None;
            }
            // Frozen once initialized, until the next reset or dataset change.
            if state.index_status.is_initialized {
                return None;
            }
            let mut next = state.clone();
            next.index_status = status;
            Some(next)
        }

        Event::IndexReset { dataset } => {
            if !state.is_ready() || state.dataset_id() != Some(dataset.as_str()) {
                return None;
            }
            let mut next = state.clone();
            next.index_status = IndexStatus::NOT_INITIALIZED;
            if let Some(params) = next.params.as_mut() {
                params.drawn_rect = None;
            }
            next.generation = state.generation.next();
            Some(next)
        }

        Event::ClusterExpanded(index) => {
            // Only multi-member clusters drawn at max zoom open into legs.
            let zoom = state.params.as_ref()?.zoom;
            let cluster = state.clusters.get(index)?;
            if cluster.is_single()
                || !marker_style(cluster, zoom).is_clickable()
                || state.expanded_cluster == Some(index)
            {
                return None;
            }
            let mut next = state.clone();
            next.expanded_cluster = Some(index);
            Some(next)
        }

        Event::ClusterCollapsed => {
            state.expanded_cluster?;
            let mut next = state.clone();
            next.expanded_cluster = None;
            Some(next)
        }

        Event::RowRequested { row_id } => {
            if !state.is_ready() {
                return None;
            }
            let mut next = state.clone();
            next.selected_point = Some(row_id);
            next.row = None;
            Some(next)
        }

        Event::RowFetched {
            dataset,
            row_id,
            row,
        } => {
            if state.dataset_id() != Some(dataset.as_str()) || state.selected_point != Some(row_id)
            {
                return None;
            }
            let mut next = state.clone();
            next.row = Some(row);
            Some(next)
        }

        Event::TimeSeriesSelected(id) => {
            let mut next = state.clone();
            next.selected_time_series = id;
            Some(next)
        }

        Event::MapModeChanged(mode) => {
            let mut next = state.clone();
            next.map_mode = mode;
            Some(next)
        }

        Event::MeasureSelected(measure) => {
            let mut next = state.clone();
            next.selected_measure = measure;
            Some(next)
        }

        Event::ErrorReported(error) => {
            let mut next = state.clone();
            next.error = Some(error);
            Some(next)
        }
    }
}

#[cfg(test)]
mod tests {
    use cluster::{ClusterOptions, MAX_ZOOM, Point};
    use pretty_assertions::assert_eq;
    use streaming::{Dataset, IndexStatus, QueryResults};

    use super::{Event, apply};
    use crate::state::{Phase, ViewState};

    const OPTS: ClusterOptions = ClusterOptions::new();

    fn step(state: &ViewState, event: Event) -> ViewState {
        apply(state, event, &OPTS).unwrap()
    }

    fn loaded(id: &str) -> ViewState {
        let s = step(&ViewState::default(), Event::DatasetRequested { id: id.into() });
        step(
            &s,
            Event::DatasetLoaded {
                dataset: Dataset::new(id, id),
                now_ms: 1_000,
            },
        )
    }

    fn with_points(state: &ViewState, points: Vec<Point>) -> ViewState {
        step(
            state,
            Event::ClusterResolved {
                generation: state.generation,
                results: QueryResults {
                    points,
                    ..QueryResults::default()
                },
                execution_ms: 1,
            },
        )
    }

    #[test]
    fn dataset_switch_drops_late_metadata_and_results() {
        let a = loaded("a");
        let g_a = a.generation;
        let b = step(&a, Event::DatasetRequested { id: "b".into() });
        assert_eq!(
            b.phase,
            Phase::Loading {
                dataset: "b".into()
            }
        );
        assert!(b.params.is_none());

        // Metadata of the dataset that lost the race.
        let late = Event::DatasetLoaded {
            dataset: Dataset::new("a", "a"),
            now_ms: 1_000,
        };
        assert!(apply(&b, late, &OPTS).is_none());

        let b = step(
            &b,
            Event::DatasetLoaded {
                dataset: Dataset::new("b", "b"),
                now_ms: 1_000,
            },
        );
        let stale = Event::ClusterResolved {
            generation: g_a,
            results: QueryResults::default(),
            execution_ms: 1,
        };
        assert!(apply(&b, stale, &OPTS).is_none());
        let status = Event::IndexStatusFetched {
            dataset: "a".into(),
            status: IndexStatus::NOT_INITIALIZED,
        };
        assert!(apply(&b, status, &OPTS).is_none());
        assert_eq!(b.dataset_id(), Some("b"));
    }

    fn group(lat: f64, lon: f64, first_id: i64) -> Vec<Point> {
        (0..3)
            .map(|i| Point::new(lat, lon + i as f64 * 1e-7, first_id + i))
            .collect()
    }

    #[test]
    fn only_one_cluster_is_expanded() {
        let mut s = loaded("a");
        s.params.as_mut().unwrap().zoom = MAX_ZOOM;
        let mut points = group(10.0, 10.0, 1);
        points.extend(group(-10.0, -10.0, 10));
        let s = with_points(&s, points);
        assert_eq!(s.clusters.len(), 2);

        let s = step(&s, Event::ClusterExpanded(0));
        let s = step(&s, Event::ClusterExpanded(1));
        assert_eq!(s.expanded_cluster, Some(1));
        assert!(apply(&s, Event::ClusterExpanded(1), &OPTS).is_none());
        assert!(apply(&s, Event::ClusterExpanded(7), &OPTS).is_none());

        let s = step(&s, Event::ClusterCollapsed);
        assert_eq!(s.expanded_cluster, None);
        assert!(apply(&s, Event::ClusterCollapsed, &OPTS).is_none());
    }

    #[test]
    fn clusters_expand_only_when_clickable() {
        // Default zoom is below the max: clusters are not clickable yet.
        let s = with_points(&loaded("a"), group(10.0, 10.0, 1));
        assert_eq!(s.clusters.len(), 1);
        assert_eq!(s.clusters[0].member_count, 3);
        assert!(apply(&s, Event::ClusterExpanded(0), &OPTS).is_none());

        let mut s = loaded("a");
        s.params.as_mut().unwrap().zoom = MAX_ZOOM;
        let s = with_points(&s, vec![Point::new(10.0, 10.0, 1)]);
        assert!(s.clusters[0].is_single());
        assert!(apply(&s, Event::ClusterExpanded(0), &OPTS).is_none());
    }

    #[test]
    fn index_reset_clears_drawn_rect_and_status() {
        let mut s = loaded("a");
        s.params.as_mut().unwrap().drawn_rect = Some(foundation::Rect::WORLD);
        let s = step(
            &s,
            Event::IndexStatusFetched {
                dataset: "a".into(),
                status: IndexStatus {
                    is_initialized: true,
                    objects_indexed: 4,
                    object_count: 4,
                },
            },
        );
        assert!(s.index_status.is_initialized);

        let g = s.generation;
        let s = step(&s, Event::IndexReset { dataset: "a".into() });
        assert!(!s.index_status.is_initialized);
        assert_eq!(s.params.as_ref().unwrap().drawn_rect, None);
        assert!(s.generation > g);
    }

    #[test]
    fn row_only_lands_on_the_selected_point() {
        let s = step(&loaded("a"), Event::RowRequested { row_id: 7 });
        let other = Event::RowFetched {
            dataset: "a".into(),
            row_id: 8,
            row: vec![serde_json::json!(1)],
        };
        assert!(apply(&s, other, &OPTS).is_none());
        let s = step(
            &s,
            Event::RowFetched {
                dataset: "a".into(),
                row_id: 7,
                row: vec![serde_json::json!("x")],
            },
        );
        assert_eq!(s.row, Some(vec![serde_json::json!("x")]));
    }

    #[test]
    fn params_need_a_newer_generation() {
        let s = loaded("a");
        let params = s.params.clone().unwrap();
        let same = Event::ParamsChanged {
            params,
            generation: s.generation,
            clear_series: false,
        };
        assert!(apply(&s, same, &OPTS).is_none());
    }
}
