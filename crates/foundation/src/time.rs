use serde::{Deserialize, Serialize};

/// Time primitives. All timestamps are Unix epoch milliseconds.
pub const DAY_MS: i64 = 24 * 3600 * 1000;
/// Quick-select months are a fixed 30 days.
pub const MONTH_MS: i64 = 30 * DAY_MS;
/// Quick-select years are a fixed 365 days.
pub const YEAR_MS: i64 = 365 * DAY_MS;

/// Half-open time window `[from, to)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    pub const fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// Everything from the epoch up to `to`.
    pub const fn until(to: i64) -> Self {
        Self { from: 0, to }
    }

    pub fn contains(&self, t: i64) -> bool {
        t >= self.from && t < self.to
    }

    pub fn duration(&self) -> i64 {
        (self.to - self.from).max(0)
    }
}

/// Quick-select presets for the time filter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuickRange {
    All,
    TwoYears,
    OneYear,
    SixMonths,
    ThreeMonths,
    OneMonth,
}

impl QuickRange {
    pub const ALL: [QuickRange; 6] = [
        QuickRange::All,
        QuickRange::TwoYears,
        QuickRange::OneYear,
        QuickRange::SixMonths,
        QuickRange::ThreeMonths,
        QuickRange::OneMonth,
    ];

    /// How far before `now` the window ends.
    pub const fn offset_ms(self) -> i64 {
        match self {
            QuickRange::All => 0,
            QuickRange::TwoYears => 2 * YEAR_MS,
            QuickRange::OneYear => YEAR_MS,
            QuickRange::SixMonths => 6 * MONTH_MS,
            QuickRange::ThreeMonths => 3 * MONTH_MS,
            QuickRange::OneMonth => MONTH_MS,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            QuickRange::All => "All",
            QuickRange::TwoYears => "2Y",
            QuickRange::OneYear => "1Y",
            QuickRange::SixMonths => "6M",
            QuickRange::ThreeMonths => "3M",
            QuickRange::OneMonth => "1M",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|q| q.label().eq_ignore_ascii_case(label.trim()))
    }

    pub const fn range(self, now_ms: i64) -> TimeRange {
        TimeRange::until(now_ms - self.offset_ms())
    }
}
