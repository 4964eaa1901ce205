//! Acceptance and application of query responses.
//!
//! A response is accepted only while the view is ready, its generation is
//! the current one and no response of the same kind was applied for that
//! generation yet. Everything else is dropped without touching the state.

use std::sync::Arc;
use std::time::Instant;

use cluster::{ClusterIndex, ClusterOptions};
use foundation::BBox;
use streaming::{Generation, QueryResults, RequestKind};
use tracing::debug;

use crate::state::ViewState;

pub fn accepts(state: &ViewState, generation: Generation, kind: RequestKind) -> bool {
    state.is_ready()
        && generation == state.generation
        && state.applied.get(kind) != Some(generation)
}

pub(crate) fn apply_cluster(
    state: &ViewState,
    generation: Generation,
    results: QueryResults,
    execution_ms: u64,
    options: &ClusterOptions,
) -> Option<ViewState> {
    if !accepts(state, generation, RequestKind::Cluster) {
        return None;
    }
    let zoom = state.params.as_ref()?.zoom;
    let drawn = state.params.as_ref().is_some_and(|p| p.drawn_rect.is_some());

    let QueryResults {
        points,
        facets,
        rect_stats,
        single_stats,
        series,
        other_series,
        cleaned_series,
        cleaned_rect_stats,
        time_series,
        fully_contained_tile_count,
        tile_count,
        point_count,
        io_count,
        total_tile_count,
        total_point_count,
    } = results;

    let started = Instant::now();
    let index = ClusterIndex::with_options(points, *options);
    let clusters = index.query(BBox::WORLD, zoom);
    let clustering_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    debug!(
        generation = %generation,
        points = index.len(),
        clusters = clusters.len(),
        clustering_ms,
        "clusters rebuilt"
    );

    let mut next = state.clone();
    next.cluster_index = Some(Arc::new(index));
    next.clusters = clusters.into();
    next.expanded_cluster = None;
    next.facets = facets;
    next.query_info.fully_contained_tile_count = fully_contained_tile_count;
    next.query_info.tile_count = tile_count;
    next.query_info.point_count = point_count;
    next.query_info.io_count = io_count;
    next.query_info.total_tile_count = total_tile_count;
    next.query_info.total_point_count = total_point_count;
    next.query_info.execution_ms = execution_ms;
    next.query_info.total_ms = execution_ms.saturating_add(clustering_ms);
    next.error = None;

    // A drawn rectangle owns the statistics; viewport numbers would clobber it.
    if !drawn {
        next.rect_stats = rect_stats;
        next.cleaned_rect_stats = cleaned_rect_stats;
        next.single_stats = single_stats;
        next.grouped_series = series;
        next.other_series = other_series;
        next.cleaned_series = cleaned_series;
        next.time_series = time_series;
    }
    next.applied.set(RequestKind::Cluster, generation);
    Some(next)
}

pub(crate) fn apply_stats(
    state: &ViewState,
    generation: Generation,
    results: QueryResults,
) -> Option<ViewState> {
    if !accepts(state, generation, RequestKind::Stats) {
        return None;
    }
    let mut next = state.clone();
    next.rect_stats = results.rect_stats;
    next.cleaned_rect_stats = results.cleaned_rect_stats;
    next.single_stats = results.single_stats;
    next.grouped_series = results.series;
    next.other_series = results.other_series;
    next.cleaned_series = results.cleaned_series;
    next.time_series = results.time_series;
    next.selected_time_series = None;
    next.error = None;
    next.applied.set(RequestKind::Stats, generation);
    Some(next)
}

/// A failed request still answers its generation; the view keeps what it
/// showed and records the error.
pub(crate) fn apply_failure(
    state: &ViewState,
    generation: Generation,
    kind: RequestKind,
    error: String,
) -> Option<ViewState> {
    if !accepts(state, generation, kind) {
        return None;
    }
    let mut next = state.clone();
    next.error = Some(error);
    next.applied.set(kind, generation);
    Some(next)
}
