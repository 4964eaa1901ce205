//! Pure composition of view parameters from user interactions.

use chrono::NaiveDate;
use foundation::{QuickRange, Rect, TimeRange};
use streaming::{AggregateFunction, ColumnId};

use crate::params::ViewParameters;

/// One user interaction that alters the view parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamChange {
    Viewport { rect: Rect, zoom: u8 },
    /// Set (`Some`) or clear (`None`) the filter on one categorical column.
    Filter { column: ColumnId, value: Option<String> },
    ClearFilters,
    GroupBy(Vec<ColumnId>),
    Measure(ColumnId),
    Aggregate(AggregateFunction),
    TimeRange(TimeRange),
    DrawnRect(Option<Rect>),
    TimeSeries(bool),
}

/// What issuing a change requires besides the cluster query.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    /// The backend index must be reset before any further query.
    pub reset_index: bool,
    /// A statistics query is needed.
    pub stats: bool,
    /// Grouped series are stale enough to drop right away.
    pub clear_series: bool,
}

impl Effects {
    pub fn merge(self, other: Effects) -> Effects {
        Effects {
            reset_index: self.reset_index || other.reset_index,
            stats: self.stats || other.stats,
            clear_series: self.clear_series || other.clear_series,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Built {
    pub params: ViewParameters,
    pub effects: Effects,
}

/// Apply `change` to `current`.
///
/// Returns `None` when the change leaves the parameters as they are.
pub fn build(current: &ViewParameters, change: ParamChange) -> Option<Built> {
    let mut params = current.clone();
    let mut effects = Effects::default();

    match change {
        ParamChange::Viewport { rect, zoom } => {
            params.viewport = rect;
            params.zoom = zoom;
            if !params.time_series_offered() && params.time_series {
                params.time_series = false;
                effects.stats = true;
            }
        }
        ParamChange::Filter { column, value } => {
            match value {
                Some(v) => params.categorical_filters.insert(column, v),
                None => params.categorical_filters.remove(&column),
            };
            effects.stats = true;
        }
        ParamChange::ClearFilters => {
            params.categorical_filters.clear();
            effects.stats = true;
        }
        ParamChange::GroupBy(columns) => {
            effects.clear_series = columns.len() != params.group_by.len();
            for c in &columns {
                params.categorical_filters.remove(c);
            }
            params.group_by = columns;
            effects.stats = true;
        }
        ParamChange::Measure(column) => {
            params.measure = Some(column);
            effects.stats = true;
        }
        ParamChange::Aggregate(f) => {
            params.aggregate = f;
            effects.stats = true;
        }
        ParamChange::TimeRange(range) => {
            params.time_range = range;
            effects.reset_index = true;
            effects.stats = true;
        }
        ParamChange::DrawnRect(rect) => {
            params.drawn_rect = rect;
            effects.stats = true;
        }
        ParamChange::TimeSeries(on) => {
            params.time_series = on && params.time_series_offered();
            effects.stats = true;
        }
    }

    (params != *current).then_some(Built { params, effects })
}

/// Quick-select time filter relative to `now_ms`.
pub fn quick_range(range: QuickRange, now_ms: i64) -> ParamChange {
    ParamChange::TimeRange(range.range(now_ms))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateRangeError {
    #[error("date range is incomplete")]
    Incomplete,
    #[error("invalid date {0:?}, expected dd-mm-yyyy")]
    InvalidDate(String),
    #[error("date range ends before it starts")]
    Reversed,
}

/// Parse `"dd-mm-yyyy - dd-mm-yyyy"` into UTC-midnight timestamps.
///
/// `Incomplete` is returned while the user is still typing the second date;
/// callers treat it as "no change".
pub fn parse_date_range(input: &str) -> Result<TimeRange, DateRangeError> {
    let Some((start, end)) = input.split_once(" - ") else {
        return Err(DateRangeError::Incomplete);
    };
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() || end.is_empty() {
        return Err(DateRangeError::Incomplete);
    }

    let range = TimeRange::new(utc_midnight_ms(start)?, utc_midnight_ms(end)?);
    if range.from > range.to {
        return Err(DateRangeError::Reversed);
    }
    Ok(range)
}

fn utc_midnight_ms(date: &str) -> Result<i64, DateRangeError> {
    let day = NaiveDate::parse_from_str(date, "%d-%m-%Y")
        .map_err(|_| DateRangeError::InvalidDate(date.to_string()))?;
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DateRangeError::InvalidDate(date.to_string()))?;
    Ok(midnight.and_utc().timestamp_millis())
}
