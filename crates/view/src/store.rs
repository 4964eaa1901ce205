use std::sync::Arc;

use cluster::ClusterOptions;
use runtime::event_queue::EventQueue;
use tracing::{debug, trace};

use crate::state::ViewState;
use crate::transition::{Event, apply};

/// Result of processing one queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub seq: u64,
    pub event: &'static str,
    pub applied: bool,
}

/// Single writer of [`ViewState`].
///
/// Events are queued and applied in arrival order. Readers hold `Arc`
/// snapshots that never change under them.
#[derive(Debug)]
pub struct ViewStore {
    state: Arc<ViewState>,
    queue: EventQueue<Event>,
    options: ClusterOptions,
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new(ClusterOptions::default())
    }
}

impl ViewStore {
    pub fn new(options: ClusterOptions) -> Self {
        Self {
            state: Arc::new(ViewState::default()),
            queue: EventQueue::new(),
            options,
        }
    }

    pub fn state(&self) -> Arc<ViewState> {
        Arc::clone(&self.state)
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn dispatch(&mut self, event: Event) -> u64 {
        let seq = self.queue.push(event);
        trace!(seq, "event queued");
        seq
    }

    /// Apply every queued event in order.
    pub fn process(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(self.queue.len());
        while let Some(queued) = self.queue.pop() {
            let name = queued.event.name();
            let applied = self.step(queued.event);
            debug!(seq = queued.seq, event = name, applied, "event processed");
            outcomes.push(Outcome {
                seq: queued.seq,
                event: name,
                applied,
            });
        }
        outcomes
    }

    /// Queue `event`, flush the queue and report whether `event` applied.
    pub fn apply_now(&mut self, event: Event) -> bool {
        let seq = self.dispatch(event);
        self.process()
            .into_iter()
            .find(|o| o.seq == seq)
            .is_some_and(|o| o.applied)
    }

    fn step(&mut self, event: Event) -> bool {
        match apply(&self.state, event, &self.options) {
            Some(next) => {
                self.state = Arc::new(next);
                true
            }
            None => false,
        }
    }
}
