//! Backend abstraction.
//!
//! The engine talks to the dataset service only through [`Backend`], so the
//! same coordinator runs against the HTTP service or an in-memory fixture.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::protocol::{Dataset, IndexStatus, QueryRequest, QueryResults, Row};

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("dataset {0} not found")]
    NotFound(String),
    #[error("could not build HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// The dataset query service.
///
/// Implementations must be `Send + Sync` for use across async tasks.
/// Methods return boxed futures for dyn-compatibility; returned futures own
/// their arguments and borrow only `self`.
pub trait Backend: Send + Sync {
    /// `GET /datasets/{id}`
    fn dataset(&self, id: &str) -> BoxFuture<'_, Result<Dataset, BackendError>>;

    /// `GET /datasets/`
    fn datasets(&self) -> BoxFuture<'_, Result<Vec<Dataset>, BackendError>>;

    /// `GET /datasets/{id}/status`
    fn index_status(&self, id: &str) -> BoxFuture<'_, Result<IndexStatus, BackendError>>;

    /// `POST /datasets/{id}/reset-index`
    fn reset_index(&self, id: &str) -> BoxFuture<'_, Result<(), BackendError>>;

    /// `POST /datasets/{id}/query`
    fn query(
        &self,
        id: &str,
        query: &QueryRequest,
    ) -> BoxFuture<'_, Result<QueryResults, BackendError>>;

    /// `GET /datasets/{id}/objects/{rowId}`
    fn object(&self, id: &str, row_id: i64) -> BoxFuture<'_, Result<Row, BackendError>>;

    /// `POST /predict/{id}/{horizon}`
    fn predict(&self, id: &str, horizon: u32) -> BoxFuture<'_, Result<Value, BackendError>>;
}
