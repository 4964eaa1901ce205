use std::time::Duration;

use streaming::BackendError;
use view::DateRangeError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    DateRange(#[from] DateRangeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The operation needs a loaded dataset.
    #[error("no dataset is loaded")]
    NotReady,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The session's message channel closed underneath it.
    #[error("session channel closed")]
    Closed,
}
