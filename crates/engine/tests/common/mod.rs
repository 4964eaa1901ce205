//! Backend whose queries and resets stay pending until the test releases
//! them, so responses can be delivered in any order.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use engine::{EngineConfig, Session};
use parking_lot::Mutex;
use serde_json::Value;
use streaming::{
    Backend, BackendError, BoxFuture, Dataset, IndexStatus, QueryRequest, QueryResults, Row,
};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Dataset(String),
    Datasets,
    Status(String),
    Reset(String),
    Query(String, QueryRequest),
    Object(String, i64),
    Predict(String, u32),
}

pub struct PendingQuery {
    pub dataset: String,
    pub request: QueryRequest,
    reply: oneshot::Sender<Result<QueryResults, BackendError>>,
}

impl PendingQuery {
    pub fn is_cluster(&self) -> bool {
        self.request.zoom.is_some()
    }

    pub fn reply(self, results: QueryResults) {
        let _ = self.reply.send(Ok(results));
    }

    pub fn fail(self, reason: &str) {
        let _ = self.reply.send(Err(BackendError::Unavailable(reason.to_string())));
    }
}

pub struct PendingReset {
    pub dataset: String,
    reply: oneshot::Sender<Result<(), BackendError>>,
}

impl PendingReset {
    pub fn complete(self) {
        let _ = self.reply.send(Ok(()));
    }
}

#[derive(Default)]
struct Inner {
    datasets: BTreeMap<String, Dataset>,
    ready: BTreeMap<String, bool>,
    calls: Vec<Call>,
    queries: Vec<PendingQuery>,
    resets: Vec<PendingReset>,
    hang_status: bool,
}

#[derive(Default)]
pub struct ScriptedBackend {
    inner: Mutex<Inner>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_dataset(&self, dataset: Dataset, index_ready: bool) {
        let mut inner = self.inner.lock();
        inner.ready.insert(dataset.id.clone(), index_ready);
        inner.datasets.insert(dataset.id.clone(), dataset);
    }

    pub fn set_ready(&self, id: &str, ready: bool) {
        self.inner.lock().ready.insert(id.to_string(), ready);
    }

    /// Make status polls never answer until cleared.
    pub fn hang_status(&self, hang: bool) {
        self.inner.lock().hang_status = hang;
    }

    pub fn status_calls(&self, id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Status(d) if d == id))
            .count()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    /// Issued queries, status polls left out.
    pub fn query_calls(&self) -> Vec<(String, QueryRequest)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Query(id, q) => Some((id, q)),
                _ => None,
            })
            .collect()
    }

    /// Calls without status polls, which depend on timing.
    pub fn ordered_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Status(_)))
            .collect()
    }

    pub fn pending_queries(&self) -> usize {
        self.inner.lock().queries.len()
    }

    pub fn take_queries(&self) -> Vec<PendingQuery> {
        std::mem::take(&mut self.inner.lock().queries)
    }

    pub fn take_resets(&self) -> Vec<PendingReset> {
        std::mem::take(&mut self.inner.lock().resets)
    }

    /// Let spawned tasks run until `n` queries are pending.
    pub async fn wait_queries(&self, n: usize) -> Vec<PendingQuery> {
        for _ in 0..1_000 {
            if self.pending_queries() >= n {
                return self.take_queries();
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {n} pending queries, got {}", self.pending_queries());
    }

    pub async fn wait_reset(&self) -> PendingReset {
        for _ in 0..1_000 {
            if let Some(reset) = self.inner.lock().resets.pop() {
                return reset;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected a pending reset");
    }
}

impl Backend for ScriptedBackend {
    fn dataset(&self, id: &str) -> BoxFuture<'_, Result<Dataset, BackendError>> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Dataset(id.to_string()));
        let result = inner
            .datasets
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()));
        Box::pin(async move { result })
    }

    fn datasets(&self) -> BoxFuture<'_, Result<Vec<Dataset>, BackendError>> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Datasets);
        let list = inner.datasets.values().cloned().collect();
        Box::pin(async move { Ok(list) })
    }

    fn index_status(&self, id: &str) -> BoxFuture<'_, Result<IndexStatus, BackendError>> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Status(id.to_string()));
        if inner.hang_status {
            return Box::pin(std::future::pending());
        }
        let ready = inner.ready.get(id).copied().unwrap_or(false);
        let status = IndexStatus {
            is_initialized: ready,
            objects_indexed: if ready { 10 } else { 3 },
            object_count: 10,
        };
        Box::pin(async move { Ok(status) })
    }

    fn reset_index(&self, id: &str) -> BoxFuture<'_, Result<(), BackendError>> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Reset(id.to_string()));
        inner.ready.insert(id.to_string(), false);
        inner.resets.push(PendingReset {
            dataset: id.to_string(),
            reply: tx,
        });
        Box::pin(async move {
            rx.await
                .unwrap_or_else(|_| Err(BackendError::Unavailable("dropped".into())))
        })
    }

    fn query(
        &self,
        id: &str,
        query: &QueryRequest,
    ) -> BoxFuture<'_, Result<QueryResults, BackendError>> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Query(id.to_string(), query.clone()));
        inner.queries.push(PendingQuery {
            dataset: id.to_string(),
            request: query.clone(),
            reply: tx,
        });
        Box::pin(async move {
            rx.await
                .unwrap_or_else(|_| Err(BackendError::Unavailable("dropped".into())))
        })
    }

    fn object(&self, id: &str, row_id: i64) -> BoxFuture<'_, Result<Row, BackendError>> {
        self.inner
            .lock()
            .calls
            .push(Call::Object(id.to_string(), row_id));
        let row = vec![Value::from(row_id), Value::from("detail")];
        Box::pin(async move { Ok(row) })
    }

    fn predict(&self, id: &str, horizon: u32) -> BoxFuture<'_, Result<Value, BackendError>> {
        self.inner
            .lock()
            .calls
            .push(Call::Predict(id.to_string(), horizon));
        Box::pin(async move { Ok(Value::Null) })
    }
}

pub fn dataset(id: &str) -> Dataset {
    let mut d = Dataset::new(id, id);
    d.dimensions = vec![3, 5, 7];
    d.measure0 = Some(16);
    d.query_x_min = Some(23.0);
    d.query_x_max = Some(24.0);
    d.query_y_min = Some(37.0);
    d.query_y_max = Some(38.0);
    d
}

pub fn config() -> EngineConfig {
    EngineConfig {
        poll_interval_ms: 5,
        cancel_superseded: false,
        ..EngineConfig::default()
    }
}

pub const WAIT: Duration = Duration::from_secs(5);

pub fn session(backend: &Arc<ScriptedBackend>) -> Session {
    Session::new(backend.clone(), config())
}

/// Select `id` and wait until its metadata is applied.
pub async fn loaded(backend: &Arc<ScriptedBackend>, id: &str) -> Session {
    let mut s = session(backend);
    s.select_dataset(id);
    s.wait_for(|v| v.is_ready(), WAIT).await.unwrap();
    s
}
