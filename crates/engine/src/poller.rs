use std::sync::Arc;
use std::time::Duration;

use streaming::Backend;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::session::{Message, bounded};

/// Periodic index status poll for one dataset.
///
/// Each poll is bounded by `timeout`; a hung call counts as a failed poll.
/// The task ends on its own after the first initialized status. Dropping the
/// poller aborts it; results already queued carry the poller's `epoch` so
/// the session can tell them from a newer poller's.
#[derive(Debug)]
pub struct Poller {
    dataset: String,
    epoch: u64,
    handle: JoinHandle<()>,
}

impl Poller {
    pub(crate) fn start(
        backend: Arc<dyn Backend>,
        dataset: String,
        epoch: u64,
        period: Duration,
        timeout: Duration,
        tx: UnboundedSender<Message>,
    ) -> Self {
        let id = dataset.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let result = bounded(timeout, backend.index_status(&id)).await;
                let done = result.as_ref().is_ok_and(|s| s.is_initialized);
                let sent = tx.send(Message::Status {
                    dataset: id.clone(),
                    epoch,
                    result,
                });
                if done || sent.is_err() {
                    debug!(dataset = %id, epoch, "status polling finished");
                    break;
                }
            }
        });
        Self {
            dataset,
            epoch,
            handle,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            debug!(dataset = %self.dataset, epoch = self.epoch, "status polling cancelled");
        }
        self.handle.abort();
    }
}
