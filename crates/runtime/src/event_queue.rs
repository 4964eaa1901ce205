use std::collections::VecDeque;

/// FIFO queue of pending state transitions.
///
/// Producers push events as they arrive; the single owner of the state
/// pops and applies them strictly in push order. Sequence numbers are
/// assigned on push so traces can correlate queued and applied events.
#[derive(Debug)]
pub struct EventQueue<E> {
    items: VecDeque<Queued<E>>,
    next_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queued<E> {
    pub seq: u64,
    pub event: E,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            next_seq: 0,
        }
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: E) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.items.push_back(Queued { seq, event });
        seq
    }

    pub fn pop(&mut self) -> Option<Queued<E>> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::EventQueue;

    #[test]
    fn pops_in_push_order() {
        let mut q = EventQueue::new();
        q.push("a");
        q.push("b");
        q.push("c");
        let order: Vec<_> = std::iter::from_fn(|| q.pop()).map(|e| e.event).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn sequence_numbers_keep_counting_after_pop() {
        let mut q = EventQueue::new();
        q.push(1);
        q.push(2);
        assert_eq!(q.pop().map(|e| e.seq), Some(0));
        assert_eq!(q.pop().map(|e| e.seq), Some(1));
        assert!(q.is_empty());
        assert_eq!(q.push(3), 2);
        assert_eq!(q.len(), 1);
    }
}
