use serde::Serialize;
use std::collections::BTreeMap;

/// Deterministic metrics aggregation.
///
/// Keys are static names so call sites stay greppable; sorted maps keep
/// snapshots stable for logs and CLI output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<&'static str, u64>,
    gauges: BTreeMap<&'static str, i64>,
    histograms: BTreeMap<&'static str, Histogram>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Histogram {
    pub count: u64,
    pub sum: i64,
    pub min: i64,
    pub max: i64,
}

impl Histogram {
    pub fn record(&mut self, value: i64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<&'static str, u64>,
    pub gauges: BTreeMap<&'static str, i64>,
    pub histograms: BTreeMap<&'static str, Histogram>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc_counter(&mut self, name: &'static str, by: u64) {
        *self.counters.entry(name).or_insert(0) += by;
    }

    pub fn gauge(&self, name: &str) -> Option<i64> {
        self.gauges.get(name).copied()
    }

    pub fn set_gauge(&mut self, name: &'static str, value: i64) {
        self.gauges.insert(name, value);
    }

    pub fn record_histogram(&mut self, name: &'static str, value: i64) {
        self.histograms.entry(name).or_default().record(value);
    }

    pub fn histogram(&self, name: &str) -> Option<Histogram> {
        self.histograms.get(name).copied()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.clone(),
            gauges: self.gauges.clone(),
            histograms: self.histograms.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Histogram, Metrics};

    #[test]
    fn counters_accumulate() {
        let mut m = Metrics::new();
        m.inc_counter("requests.issued", 1);
        m.inc_counter("requests.issued", 2);
        assert_eq!(m.counter("requests.issued"), 3);
        assert_eq!(m.counter("missing"), 0);
    }

    #[test]
    fn gauges_overwrite() {
        let mut m = Metrics::new();
        assert_eq!(m.gauge("generation"), None);
        m.set_gauge("generation", 10);
        m.set_gauge("generation", 11);
        assert_eq!(m.gauge("generation"), Some(11));
    }

    #[test]
    fn histogram_tracks_min_max_mean() {
        let mut h = Histogram::default();
        assert_eq!(h.mean(), None);
        h.record(5);
        h.record(-2);
        h.record(9);
        assert_eq!(h.count, 3);
        assert_eq!((h.min, h.max), (-2, 9));
        assert_eq!(h.mean(), Some(4.0));
    }

    #[test]
    fn snapshot_serializes_sorted() {
        let mut m = Metrics::new();
        m.inc_counter("b", 1);
        m.inc_counter("a", 1);
        m.record_histogram("latency_ms", 12);

        let json = serde_json::to_string(&m.snapshot()).unwrap();
        assert!(json.starts_with(r#"{"counters":{"a":1,"b":1}"#), "{json}");
        assert!(json.contains(r#""latency_ms":{"count":1"#), "{json}");
    }
}
