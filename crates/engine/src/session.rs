//! Request coordination for one explorer view.
//!
//! A [`Session`] owns the [`ViewStore`] and is the only place results enter
//! it. Backend calls run as tokio tasks that report back over an unbounded
//! channel; [`Session::next`] and [`Session::pump`] apply those reports one
//! at a time, so the store never needs a lock.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use cluster::{ClusterOptions, HeatPoint, heat_points};
use foundation::{QuickRange, Rect, TimeRange};
use runtime::Metrics;
use streaming::{
    AggregateFunction, Backend, BackendError, ColumnId, Dataset, Generation, IndexStatus,
    QueryRequest, QueryResults, RequestKind, Row,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};
use view::query::{self, Built, DateRangeError, ParamChange};
use view::{Event, MapMode, Phase, ViewState, ViewStore};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::poller::Poller;

/// Completion report of a backend task.
#[derive(Debug)]
pub(crate) enum Message {
    DatasetFetched {
        id: String,
        result: Result<Dataset, BackendError>,
    },
    DatasetsFetched(Result<Vec<Dataset>, BackendError>),
    Status {
        dataset: String,
        epoch: u64,
        result: Result<IndexStatus, BackendError>,
    },
    ResetDone {
        dataset: String,
        epoch: u64,
        result: Result<(), BackendError>,
    },
    QueryDone {
        dataset: String,
        generation: Generation,
        kind: RequestKind,
        elapsed: Duration,
        result: Result<QueryResults, BackendError>,
    },
    RowFetched {
        dataset: String,
        row_id: i64,
        result: Result<Row, BackendError>,
    },
}

#[derive(Debug)]
struct InFlight {
    generation: Generation,
    kind: RequestKind,
    handle: JoinHandle<()>,
}

/// A refresh held back until the index is usable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Deferred {
    stats: bool,
}

pub struct Session {
    backend: Arc<dyn Backend>,
    config: EngineConfig,
    store: ViewStore,
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
    inflight: Vec<InFlight>,
    poller: Option<Poller>,
    /// Source of poller and reset epochs.
    epoch: u64,
    /// Epoch of the reset the session is waiting on.
    resetting: Option<u64>,
    deferred: Option<Deferred>,
    /// The first query since load or reset has been sent. The backend builds
    /// its index lazily on that query, so it is never deferred.
    primed: bool,
    metrics: Metrics,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, config: EngineConfig) -> Self {
        Self::with_options(backend, config, ClusterOptions::default())
    }

    pub fn with_options(
        backend: Arc<dyn Backend>,
        config: EngineConfig,
        options: ClusterOptions,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            config,
            store: ViewStore::new(options),
            tx,
            rx,
            inflight: Vec::new(),
            poller: None,
            epoch: 0,
            resetting: None,
            deferred: None,
            primed: false,
            metrics: Metrics::new(),
        }
    }

    pub fn state(&self) -> Arc<ViewState> {
        self.store.state()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_resetting(&self) -> bool {
        self.resetting.is_some()
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Nothing is in flight, held or deferred.
    pub fn is_settled(&self) -> bool {
        !matches!(self.store.state().phase, Phase::Loading { .. })
            && self.inflight.is_empty()
            && self.resetting.is_none()
            && self.deferred.is_none()
    }

    // ---- dataset lifecycle ----

    pub fn list_datasets(&mut self) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let timeout = self.config.request_timeout();
        tokio::spawn(async move {
            let result = bounded(timeout, backend.datasets()).await;
            let _ = tx.send(Message::DatasetsFetched(result));
        });
    }

    /// Drop everything tied to the current dataset and start loading `id`.
    pub fn select_dataset(&mut self, id: impl Into<String>) {
        let id = id.into();
        info!("selecting dataset {id}");
        if self.config.cancel_superseded {
            self.abort_all();
        }
        self.poller = None;
        self.resetting = None;
        self.deferred = None;
        self.primed = false;
        self.store.apply_now(Event::DatasetRequested { id: id.clone() });

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let timeout = self.config.request_timeout();
        tokio::spawn(async move {
            let result = bounded(timeout, backend.dataset(&id)).await;
            let _ = tx.send(Message::DatasetFetched { id, result });
        });
        self.list_datasets();
    }

    // ---- parameter changes ----

    /// Apply `change` and issue what it requires.
    ///
    /// Returns the new generation, or `None` when the parameters did not
    /// change and nothing was issued.
    pub fn change(&mut self, change: ParamChange) -> Result<Option<Generation>, EngineError> {
        let state = self.store.state();
        let current = ready_params(&state)?;
        let Some(Built { params, effects }) = query::build(current, change) else {
            debug!("parameters unchanged");
            return Ok(None);
        };

        let generation = state.generation.next();
        self.store.apply_now(Event::ParamsChanged {
            params,
            generation,
            clear_series: effects.clear_series,
        });
        if effects.reset_index {
            self.start_reset(effects.stats);
        } else {
            self.issue(effects.stats);
        }
        Ok(Some(generation))
    }

    pub fn set_viewport(&mut self, rect: Rect, zoom: u8) -> Result<Option<Generation>, EngineError> {
        self.change(ParamChange::Viewport { rect, zoom })
    }

    pub fn set_filter(
        &mut self,
        column: ColumnId,
        value: Option<String>,
    ) -> Result<Option<Generation>, EngineError> {
        self.change(ParamChange::Filter { column, value })
    }

    pub fn clear_filters(&mut self) -> Result<Option<Generation>, EngineError> {
        self.change(ParamChange::ClearFilters)
    }

    pub fn set_group_by(&mut self, columns: Vec<ColumnId>) -> Result<Option<Generation>, EngineError> {
        self.change(ParamChange::GroupBy(columns))
    }

    pub fn set_measure(&mut self, column: ColumnId) -> Result<Option<Generation>, EngineError> {
        self.change(ParamChange::Measure(column))
    }

    pub fn set_aggregate(
        &mut self,
        aggregate: AggregateFunction,
    ) -> Result<Option<Generation>, EngineError> {
        self.change(ParamChange::Aggregate(aggregate))
    }

    pub fn set_drawn_rect(&mut self, rect: Option<Rect>) -> Result<Option<Generation>, EngineError> {
        self.change(ParamChange::DrawnRect(rect))
    }

    pub fn set_time_series(&mut self, on: bool) -> Result<Option<Generation>, EngineError> {
        self.change(ParamChange::TimeSeries(on))
    }

    pub fn set_time_range(&mut self, range: TimeRange) -> Result<Option<Generation>, EngineError> {
        self.change(ParamChange::TimeRange(range))
    }

    pub fn quick_range(&mut self, range: QuickRange) -> Result<Option<Generation>, EngineError> {
        self.quick_range_at(range, now_ms())
    }

    pub fn quick_range_at(
        &mut self,
        range: QuickRange,
        now_ms: i64,
    ) -> Result<Option<Generation>, EngineError> {
        self.change(query::quick_range(range, now_ms))
    }

    /// Custom `"dd-mm-yyyy - dd-mm-yyyy"` range. Half-typed input is not an
    /// error, it just changes nothing.
    pub fn custom_range(&mut self, input: &str) -> Result<Option<Generation>, EngineError> {
        match query::parse_date_range(input) {
            Ok(range) => self.set_time_range(range),
            Err(DateRangeError::Incomplete) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Re-issue both queries for the current parameters under a new generation.
    pub fn refresh(&mut self) -> Result<Generation, EngineError> {
        let state = self.store.state();
        let params = ready_params(&state)?.clone();
        let generation = state.generation.next();
        self.store.apply_now(Event::ParamsChanged {
            params,
            generation,
            clear_series: false,
        });
        self.issue(true);
        Ok(generation)
    }

    /// Rebuild the backend index for the current dataset.
    pub fn reset_index(&mut self) -> Result<(), EngineError> {
        ready_params(&self.store.state())?;
        self.start_reset(true);
        Ok(())
    }

    // ---- view-only interactions ----

    pub fn expand_cluster(&mut self, index: usize) -> bool {
        self.store.apply_now(Event::ClusterExpanded(index))
    }

    pub fn collapse_cluster(&mut self) -> bool {
        self.store.apply_now(Event::ClusterCollapsed)
    }

    pub fn select_time_series(&mut self, id: Option<i64>) -> bool {
        self.store.apply_now(Event::TimeSeriesSelected(id))
    }

    pub fn set_map_mode(&mut self, mode: MapMode) -> bool {
        self.store.apply_now(Event::MapModeChanged(mode))
    }

    pub fn select_measure(&mut self, measure: usize) -> bool {
        self.store.apply_now(Event::MeasureSelected(measure))
    }

    /// Intensity points for the heatmap mode.
    pub fn heat_points(&self) -> Vec<HeatPoint> {
        let state = self.store.state();
        heat_points(&state.clusters, state.selected_measure)
    }

    /// Select a point and fetch its detail row.
    pub fn open_point(&mut self, row_id: i64) -> Result<(), EngineError> {
        let state = self.store.state();
        let dataset = state.dataset_id().ok_or(EngineError::NotReady)?.to_string();
        if !self.store.apply_now(Event::RowRequested { row_id }) {
            return Err(EngineError::NotReady);
        }

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let timeout = self.config.request_timeout();
        tokio::spawn(async move {
            let result = bounded(timeout, backend.object(&dataset, row_id)).await;
            let _ = tx.send(Message::RowFetched {
                dataset,
                row_id,
                result,
            });
        });
        Ok(())
    }

    /// Ask the backend for a forecast. The answer is only logged.
    pub fn forecast(&mut self, horizon: u32) -> Result<(), EngineError> {
        let state = self.store.state();
        let dataset = state.dataset_id().ok_or(EngineError::NotReady)?.to_string();
        let backend = Arc::clone(&self.backend);
        let timeout = self.config.request_timeout();
        tokio::spawn(async move {
            match bounded(timeout, backend.predict(&dataset, horizon)).await {
                Ok(forecast) => info!(%dataset, horizon, %forecast, "forecast received"),
                Err(err) => warn!(%dataset, horizon, "forecast failed: {err}"),
            }
        });
        Ok(())
    }

    // ---- event loop ----

    /// Apply every report that has already arrived. Never waits.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    /// Wait for the next report and apply it.
    pub async fn next(&mut self) -> Result<(), EngineError> {
        let message = self.rx.recv().await.ok_or(EngineError::Closed)?;
        self.handle(message);
        Ok(())
    }

    /// Process reports until `pred` holds for the view.
    pub async fn wait_for(
        &mut self,
        pred: impl Fn(&ViewState) -> bool,
        timeout: Duration,
    ) -> Result<Arc<ViewState>, EngineError> {
        self.wait_until(|s| pred(&s.store.state()), timeout).await?;
        Ok(self.store.state())
    }

    /// Process reports until nothing is in flight, held or deferred.
    pub async fn settle(&mut self, timeout: Duration) -> Result<Arc<ViewState>, EngineError> {
        self.wait_until(Session::is_settled, timeout).await?;
        Ok(self.store.state())
    }

    async fn wait_until(
        &mut self,
        done: impl Fn(&Session) -> bool,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        let deadline = time::Instant::now() + timeout;
        while !done(self) {
            time::timeout_at(deadline, self.next())
                .await
                .map_err(|_| EngineError::Timeout(timeout))??;
        }
        Ok(())
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::DatasetFetched { id, result } => self.on_dataset(id, result),
            Message::DatasetsFetched(result) => match result {
                Ok(datasets) => {
                    self.store.apply_now(Event::DatasetsListed(datasets));
                }
                Err(err) => warn!("dataset list failed: {err}"),
            },
            Message::Status {
                dataset,
                epoch,
                result,
            } => self.on_status(dataset, epoch, result),
            Message::ResetDone {
                dataset,
                epoch,
                result,
            } => self.on_reset(dataset, epoch, result),
            Message::QueryDone {
                dataset,
                generation,
                kind,
                elapsed,
                result,
            } => self.on_query(dataset, generation, kind, elapsed, result),
            Message::RowFetched {
                dataset,
                row_id,
                result,
            } => {
                let event = match result {
                    Ok(row) => Event::RowFetched {
                        dataset,
                        row_id,
                        row,
                    },
                    Err(err) => {
                        warn!(%dataset, row_id, "row fetch failed: {err}");
                        if self.store.state().selected_point != Some(row_id) {
                            return;
                        }
                        Event::ErrorReported(err.to_string())
                    }
                };
                self.store.apply_now(event);
            }
        }
    }

    fn on_dataset(&mut self, id: String, result: Result<Dataset, BackendError>) {
        match result {
            Ok(dataset) => {
                let loaded = self.store.apply_now(Event::DatasetLoaded {
                    dataset,
                    now_ms: now_ms(),
                });
                if !loaded {
                    debug!("dropping metadata of deselected dataset {id}");
                    return;
                }
                info!("dataset {id} loaded");
                self.start_polling(&id);
                self.issue(true);
            }
            Err(err) => {
                warn!("dataset {id} failed to load: {err}");
                self.store.apply_now(Event::DatasetFailed {
                    id,
                    error: err.to_string(),
                });
            }
        }
    }

    fn on_status(&mut self, dataset: String, epoch: u64, result: Result<IndexStatus, BackendError>) {
        if self.poller.as_ref().map(Poller::epoch) != Some(epoch) {
            debug!(%dataset, epoch, "dropping status of a stopped poller");
            return;
        }
        let status = match result {
            Ok(status) => status,
            Err(err) => {
                warn!(%dataset, "status poll failed: {err}");
                return;
            }
        };
        debug!(
            %dataset,
            indexed = status.objects_indexed,
            total = status.object_count,
            "index status"
        );
        self.store.apply_now(Event::IndexStatusFetched { dataset, status });
        if status.is_initialized {
            self.poller = None;
            if let Some(deferred) = self.deferred.take() {
                debug!("index ready, issuing deferred refresh");
                self.issue(deferred.stats);
            }
        }
    }

    fn on_reset(&mut self, dataset: String, epoch: u64, result: Result<(), BackendError>) {
        if self.resetting != Some(epoch) {
            debug!(%dataset, epoch, "dropping superseded reset");
            return;
        }
        self.resetting = None;
        match result {
            Ok(()) => {
                info!("index of {dataset} reset");
                self.store.apply_now(Event::IndexReset {
                    dataset: dataset.clone(),
                });
                self.primed = false;
            }
            Err(err) => {
                warn!("index reset of {dataset} failed: {err}");
                self.store.apply_now(Event::ErrorReported(err.to_string()));
            }
        }
        self.start_polling(&dataset);
        self.issue(true);
    }

    fn on_query(
        &mut self,
        dataset: String,
        generation: Generation,
        kind: RequestKind,
        elapsed: Duration,
        result: Result<QueryResults, BackendError>,
    ) {
        self.inflight.retain(|f| !(f.generation == generation && f.kind == kind));
        self.metrics.set_gauge("requests.in_flight", self.inflight.len() as i64);

        let execution_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.metrics.record_histogram(
            "query.latency_ms",
            i64::try_from(execution_ms).unwrap_or(i64::MAX),
        );

        if self.store.state().dataset_id() != Some(dataset.as_str()) {
            debug!(%dataset, %generation, kind = kind.as_str(), "response for another dataset");
            self.metrics.inc_counter("responses.stale", 1);
            return;
        }

        let event = match result {
            Ok(results) => match kind {
                RequestKind::Cluster => Event::ClusterResolved {
                    generation,
                    results,
                    execution_ms,
                },
                RequestKind::Stats => Event::StatsResolved {
                    generation,
                    results,
                },
            },
            Err(err) => {
                warn!(%generation, kind = kind.as_str(), "query failed: {err}");
                self.metrics.inc_counter("requests.failed", 1);
                Event::RequestFailed {
                    generation,
                    kind,
                    error: err.to_string(),
                }
            }
        };
        if self.store.apply_now(event) {
            debug!(%generation, kind = kind.as_str(), execution_ms, "response applied");
            self.metrics.inc_counter("responses.applied", 1);
        } else {
            debug!(%generation, kind = kind.as_str(), "stale response dropped");
            self.metrics.inc_counter("responses.stale", 1);
        }
    }

    /// Send the queries for the current generation, or hold them while the
    /// index is being reset or built.
    fn issue(&mut self, stats: bool) {
        let stats = stats || self.deferred.take().is_some_and(|d| d.stats);
        let state = self.store.state();
        let (Some(dataset), Some(params)) = (state.dataset_id(), state.params.as_ref()) else {
            return;
        };
        // Cluster responses never carry drawn-rect statistics.
        let stats = stats || params.drawn_rect.is_some();

        let not_ready = self.primed && !state.index_status.is_initialized;
        if self.resetting.is_some() || not_ready {
            debug!(generation = %state.generation, stats, "refresh deferred");
            self.deferred = Some(Deferred { stats });
            return;
        }
        self.primed = true;

        let generation = state.generation;
        if self.config.cancel_superseded {
            self.abort_older(generation);
        }
        self.spawn_query(dataset, generation, RequestKind::Cluster, params.cluster_query());
        if stats {
            self.spawn_query(dataset, generation, RequestKind::Stats, params.stats_query());
        }
        self.metrics.set_gauge("requests.in_flight", self.inflight.len() as i64);
    }

    fn spawn_query(
        &mut self,
        dataset: &str,
        generation: Generation,
        kind: RequestKind,
        request: QueryRequest,
    ) {
        debug!(%dataset, %generation, kind = kind.as_str(), "issuing query");
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let timeout = self.config.request_timeout();
        let dataset = dataset.to_string();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let result = bounded(timeout, backend.query(&dataset, &request)).await;
            let _ = tx.send(Message::QueryDone {
                dataset,
                generation,
                kind,
                elapsed: started.elapsed(),
                result,
            });
        });
        self.inflight.push(InFlight {
            generation,
            kind,
            handle,
        });
        self.metrics.inc_counter("requests.issued", 1);
    }

    /// Reset the backend index; every refresh waits for it.
    fn start_reset(&mut self, stats: bool) {
        let state = self.store.state();
        let Some(dataset) = state.dataset_id().map(str::to_string) else {
            return;
        };
        if self.resetting.is_some() {
            // The refresh after the pending reset picks up the latest params.
            self.issue(stats);
            return;
        }

        self.poller = None;
        if self.config.cancel_superseded {
            self.abort_all();
        }
        let epoch = self.next_epoch();
        self.resetting = Some(epoch);
        self.metrics.inc_counter("index.resets", 1);
        info!("resetting index of {dataset}");

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let timeout = self.config.request_timeout();
        tokio::spawn(async move {
            let result = bounded(timeout, backend.reset_index(&dataset)).await;
            let _ = tx.send(Message::ResetDone {
                dataset,
                epoch,
                result,
            });
        });
    }

    fn start_polling(&mut self, dataset: &str) {
        let epoch = self.next_epoch();
        self.poller = Some(Poller::start(
            Arc::clone(&self.backend),
            dataset.to_string(),
            epoch,
            self.config.poll_interval(),
            self.config.request_timeout(),
            self.tx.clone(),
        ));
    }

    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn abort_older(&mut self, generation: Generation) {
        let before = self.inflight.len();
        self.inflight.retain(|f| {
            let superseded = f.generation < generation;
            if superseded {
                f.handle.abort();
            }
            !superseded
        });
        let aborted = (before - self.inflight.len()) as u64;
        if aborted > 0 {
            debug!(aborted, %generation, "aborted superseded requests");
            self.metrics.inc_counter("requests.aborted", aborted);
        }
    }

    fn abort_all(&mut self) {
        for f in self.inflight.drain(..) {
            f.handle.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.abort_all();
    }
}

fn ready_params(state: &ViewState) -> Result<&view::ViewParameters, EngineError> {
    match (&state.phase, state.params.as_ref()) {
        (Phase::Ready, Some(params)) => Ok(params),
        _ => Err(EngineError::NotReady),
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, BackendError> {
    match time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Unavailable(format!(
            "no response within {timeout:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use cluster::{MAX_ZOOM, Point, spiderfy};
    use pretty_assertions::assert_eq;
    use streaming::{Call, Dataset, MemoryBackend};

    use super::Session;
    use crate::config::EngineConfig;

    const WAIT: Duration = Duration::from_secs(5);

    fn backend() -> Arc<MemoryBackend> {
        let mut d = Dataset::new("ds1", "Sensors");
        d.dimensions = vec![3];
        d.query_x_min = Some(23.0);
        d.query_x_max = Some(24.0);
        d.query_y_min = Some(37.0);
        d.query_y_max = Some(38.0);
        let backend = Arc::new(MemoryBackend::new());
        backend.insert_dataset(
            d,
            vec![
                Point::new(37.5, 23.5, 1),
                Point::new(37.500_000_1, 23.5, 2),
                Point::new(37.5, 23.500_000_1, 3).with_digital(true),
                Point::new(37.9, 23.9, 4),
            ],
        );
        backend
    }

    fn config() -> EngineConfig {
        EngineConfig {
            poll_interval_ms: 5,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn loads_and_clusters_the_viewport() {
        let backend = backend();
        let mut s = Session::new(backend.clone(), config());
        s.select_dataset("ds1");
        s.wait_for(|v| v.is_ready(), WAIT).await.unwrap();
        let state = s.settle(WAIT).await.unwrap();

        assert_eq!(state.clusters.len(), 2);
        let members: u32 = state.clusters.iter().map(|c| c.member_count).sum();
        assert_eq!(members, 4);
        assert_eq!(state.query_info.point_count, 4);
        assert_eq!(s.metrics().counter("requests.issued"), 2);

        let zooms: Vec<_> = backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Query(_, q) => Some(q.zoom),
                _ => None,
            })
            .collect();
        assert_eq!(zooms.len(), 2);
        assert!(zooms.contains(&Some(14)));
        assert!(zooms.contains(&None));

        let big = state
            .clusters
            .iter()
            .position(|c| c.member_count == 3)
            .unwrap();
        assert!(state.clusters[big].has_digital_member);
        // Clusters open into legs only at max zoom.
        assert!(!s.expand_cluster(big));

        let rect = state.params.as_ref().unwrap().viewport;
        s.set_viewport(rect, MAX_ZOOM).unwrap().unwrap();
        let state = s.settle(WAIT).await.unwrap();
        let big = state
            .clusters
            .iter()
            .position(|c| c.member_count == 3)
            .unwrap();
        assert!(s.expand_cluster(big));
        let state = s.state();
        assert_eq!(spiderfy(state.expanded().unwrap()).len(), 3);
    }

    #[tokio::test]
    async fn failed_backend_keeps_the_last_view() {
        let backend = backend();
        let mut s = Session::new(backend.clone(), config());
        s.select_dataset("ds1");
        s.wait_for(|v| v.is_ready(), WAIT).await.unwrap();
        s.settle(WAIT).await.unwrap();
        s.wait_for(|v| v.index_status.is_initialized, WAIT)
            .await
            .unwrap();

        backend.set_offline(Some("maintenance"));
        s.set_group_by(vec![]).unwrap().unwrap();
        let state = s.settle(WAIT).await.unwrap();
        assert_eq!(state.clusters.len(), 2);
        assert!(state.error.as_deref().unwrap().contains("maintenance"));
    }
}
