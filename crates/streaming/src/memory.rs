use std::collections::BTreeMap;

use cluster::Point;
use parking_lot::Mutex;
use serde_json::Value;

use crate::backend::{Backend, BackendError, BoxFuture};
use crate::protocol::{Dataset, IndexStatus, QueryRequest, QueryResults, Row};

/// A call recorded by [`MemoryBackend`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Dataset(String),
    Datasets,
    IndexStatus(String),
    ResetIndex(String),
    Query(String, QueryRequest),
    Object(String, i64),
    Predict(String, u32),
}

#[derive(Debug, Default)]
struct Entry {
    dataset: Option<Dataset>,
    points: Vec<Point>,
    /// Statistics and counters returned with every query; points are filled
    /// in per request.
    template: QueryResults,
    rows: BTreeMap<i64, Row>,
    /// Status polls needed after a reset before the index reports ready.
    polls_to_ready: u32,
    polls: u32,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, Entry>,
    calls: Vec<Call>,
    offline: Option<String>,
}

/// In-memory [`Backend`] for tests and offline demos.
///
/// Queries return the stored points inside the request rectangle together
/// with a fixed statistics template. The index becomes ready after a
/// configurable number of status polls, and `reset_index` starts it over.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_dataset(&self, dataset: Dataset, points: Vec<Point>) {
        let mut state = self.state.lock();
        let entry = state.entries.entry(dataset.id.clone()).or_default();
        entry.dataset = Some(dataset);
        entry.points = points;
    }

    pub fn set_template(&self, id: &str, template: QueryResults) {
        self.state
            .lock()
            .entries
            .entry(id.to_string())
            .or_default()
            .template = template;
    }

    pub fn insert_row(&self, id: &str, row_id: i64, row: Row) {
        self.state
            .lock()
            .entries
            .entry(id.to_string())
            .or_default()
            .rows
            .insert(row_id, row);
    }

    pub fn set_polls_to_ready(&self, id: &str, polls: u32) {
        let mut state = self.state.lock();
        let entry = state.entries.entry(id.to_string()).or_default();
        entry.polls_to_ready = polls;
        entry.polls = 0;
    }

    /// Fail every call with `reason` until cleared with `None`.
    pub fn set_offline(&self, reason: Option<&str>) {
        self.state.lock().offline = reason.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.state.lock().calls)
    }

    fn with_entry<T>(
        &self,
        call: Call,
        id: &str,
        f: impl FnOnce(&mut Entry) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if let Some(reason) = &state.offline {
            return Err(BackendError::Unavailable(reason.clone()));
        }
        match state.entries.get_mut(id) {
            Some(entry) if entry.dataset.is_some() => f(entry),
            _ => Err(BackendError::NotFound(id.to_string())),
        }
    }
}

fn status_of(entry: &Entry) -> IndexStatus {
    let total = entry.points.len() as u64;
    let ready = entry.polls >= entry.polls_to_ready;
    let indexed = if ready || entry.polls_to_ready == 0 {
        total
    } else {
        total * u64::from(entry.polls) / u64::from(entry.polls_to_ready)
    };
    IndexStatus {
        is_initialized: ready,
        objects_indexed: indexed,
        object_count: total,
    }
}

impl Backend for MemoryBackend {
    fn dataset(&self, id: &str) -> BoxFuture<'_, Result<Dataset, BackendError>> {
        let result = self.with_entry(Call::Dataset(id.to_string()), id, |e| {
            let mut dataset = e
                .dataset
                .clone()
                .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
            dataset.object_count = e.points.len() as u64;
            Ok(dataset)
        });
        Box::pin(async move { result })
    }

    fn datasets(&self) -> BoxFuture<'_, Result<Vec<Dataset>, BackendError>> {
        let mut state = self.state.lock();
        state.calls.push(Call::Datasets);
        let result = match &state.offline {
            Some(reason) => Err(BackendError::Unavailable(reason.clone())),
            None => Ok(state
                .entries
                .values()
                .filter_map(|e| e.dataset.clone())
                .collect()),
        };
        Box::pin(async move { result })
    }

    fn index_status(&self, id: &str) -> BoxFuture<'_, Result<IndexStatus, BackendError>> {
        let result = self.with_entry(Call::IndexStatus(id.to_string()), id, |e| {
            let status = status_of(e);
            if !status.is_initialized {
                e.polls += 1;
            }
            Ok(status)
        });
        Box::pin(async move { result })
    }

    fn reset_index(&self, id: &str) -> BoxFuture<'_, Result<(), BackendError>> {
        let result = self.with_entry(Call::ResetIndex(id.to_string()), id, |e| {
            e.polls = 0;
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn query(
        &self,
        id: &str,
        query: &QueryRequest,
    ) -> BoxFuture<'_, Result<QueryResults, BackendError>> {
        let result = self.with_entry(Call::Query(id.to_string(), query.clone()), id, |e| {
            let points: Vec<Point> = e
                .points
                .iter()
                .filter(|p| query.rect.contains(p.position()))
                .cloned()
                .collect();
            Ok(QueryResults {
                point_count: points.len() as u64,
                total_point_count: e.points.len() as u64,
                points,
                ..e.template.clone()
            })
        });
        Box::pin(async move { result })
    }

    fn object(&self, id: &str, row_id: i64) -> BoxFuture<'_, Result<Row, BackendError>> {
        let result = self.with_entry(Call::Object(id.to_string(), row_id), id, |e| {
            Ok(e.rows.get(&row_id).cloned().unwrap_or_default())
        });
        Box::pin(async move { result })
    }

    fn predict(&self, id: &str, horizon: u32) -> BoxFuture<'_, Result<Value, BackendError>> {
        let result = self.with_entry(Call::Predict(id.to_string(), horizon), id, |_| {
            Ok(Value::Null)
        });
        Box::pin(async move { result })
    }
}
