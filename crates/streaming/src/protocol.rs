//! Wire types for the dataset query backend.
//!
//! Everything here mirrors the backend's JSON (camelCase keys). Lists the
//! backend may send as `null` decode to empty; statistics objects whose key
//! set depends on the dataset keep their fields in an ordered map.

use std::collections::BTreeMap;

use cluster::Point;
use foundation::{Rect, TimeRange};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Column index into a dataset's `headers`.
pub type ColumnId = u32;

/// Distinct values per categorical column, for filter widgets.
pub type Facets = BTreeMap<ColumnId, Vec<String>>;

/// A detail row, aligned with the dataset's `headers`.
pub type Row = Vec<Value>;

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub headers: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub dimensions: Vec<ColumnId>,
    #[serde(default)]
    pub measure0: Option<ColumnId>,
    #[serde(default)]
    pub measure1: Option<ColumnId>,
    #[serde(default)]
    pub object_count: u64,
    #[serde(default)]
    pub query_x_min: Option<f64>,
    #[serde(default)]
    pub query_x_max: Option<f64>,
    #[serde(default)]
    pub query_y_min: Option<f64>,
    #[serde(default)]
    pub query_y_max: Option<f64>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            headers: Vec::new(),
            dimensions: Vec::new(),
            measure0: None,
            measure1: None,
            object_count: 0,
            query_x_min: None,
            query_x_max: None,
            query_y_min: None,
            query_y_max: None,
        }
    }

    /// Initial map extent, when the backend reports one.
    pub fn extent(&self) -> Option<Rect> {
        Some(Rect::from_bounds(
            self.query_y_min?,
            self.query_x_min?,
            self.query_y_max?,
            self.query_x_max?,
        ))
    }

    pub fn header(&self, column: ColumnId) -> Option<&str> {
        self.headers.get(column as usize).map(String::as_str)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub is_initialized: bool,
    #[serde(default)]
    pub objects_indexed: u64,
    #[serde(default)]
    pub object_count: u64,
}

impl IndexStatus {
    pub const NOT_INITIALIZED: IndexStatus = IndexStatus {
        is_initialized: false,
        objects_indexed: 0,
        object_count: 0,
    };

    /// Indexing progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.is_initialized {
            1.0
        } else if self.object_count == 0 {
            0.0
        } else {
            (self.objects_indexed as f64 / self.object_count as f64).min(1.0)
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    #[default]
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

/// Body of `POST /datasets/{id}/query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub rect: Rect,
    /// Present on cluster queries only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<u8>,
    #[serde(default)]
    pub categorical_filters: BTreeMap<ColumnId, String>,
    #[serde(default)]
    pub group_by_cols: Vec<ColumnId>,
    #[serde(default)]
    pub measure_col: Option<ColumnId>,
    #[serde(default)]
    pub agg_type: AggregateFunction,
    #[serde(default)]
    pub time_series_data_toggle: bool,
    pub from: i64,
    pub to: i64,
}

impl QueryRequest {
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.from, self.to)
    }
}

/// Multi-measure statistics over a rectangle.
///
/// The backend sends per-measure keys (`min0`, `mean1`, ...) plus a few
/// cross-measure ones, so fields are kept as an ordered map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RectStats(pub BTreeMap<String, Value>);

impl RectStats {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    fn indexed(&self, prefix: &str, i: usize) -> Option<f64> {
        self.get(&format!("{prefix}{i}"))
    }

    pub fn count(&self) -> Option<u64> {
        self.0.get("count").and_then(Value::as_u64)
    }

    pub fn min(&self, i: usize) -> Option<f64> {
        self.indexed("min", i)
    }

    pub fn max(&self, i: usize) -> Option<f64> {
        self.indexed("max", i)
    }

    pub fn mean(&self, i: usize) -> Option<f64> {
        self.indexed("mean", i)
    }

    pub fn variance(&self, i: usize) -> Option<f64> {
        self.indexed("variance", i)
    }

    pub fn standard_deviation(&self, i: usize) -> Option<f64> {
        self.indexed("standardDeviation", i)
    }

    pub fn pearson_correlation(&self) -> Option<f64> {
        self.get("pearsonCorrelation")
    }

    pub fn covariance(&self) -> Option<f64> {
        self.get("covariance")
    }
}

/// Single-measure statistics over a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SingleRectStats {
    pub count: u64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub variance: f64,
    pub standard_deviation: f64,
}

/// One group of a grouped aggregate. Keys depend on the group-by columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupedStats(pub BTreeMap<String, Value>);

impl GroupedStats {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    #[serde(default)]
    pub name: String,
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub data_points: Vec<DataPoint>,
    #[serde(default)]
    pub digital: bool,
}

/// Response of `POST /datasets/{id}/query`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResults {
    #[serde(default, deserialize_with = "cluster::deserialize_points")]
    pub points: Vec<Point>,
    #[serde(default, deserialize_with = "nullable")]
    pub facets: Facets,
    #[serde(default)]
    pub rect_stats: Option<RectStats>,
    #[serde(default)]
    pub single_stats: Option<SingleRectStats>,
    #[serde(default, deserialize_with = "nullable")]
    pub series: Vec<GroupedStats>,
    #[serde(default, deserialize_with = "nullable")]
    pub other_series: Vec<GroupedStats>,
    #[serde(default, deserialize_with = "nullable")]
    pub cleaned_series: Vec<GroupedStats>,
    #[serde(default)]
    pub cleaned_rect_stats: Option<RectStats>,
    #[serde(default, deserialize_with = "nullable")]
    pub time_series: Vec<TimeSeries>,
    #[serde(default)]
    pub fully_contained_tile_count: u64,
    #[serde(default)]
    pub tile_count: u64,
    #[serde(default)]
    pub point_count: u64,
    #[serde(default)]
    pub io_count: u64,
    #[serde(default)]
    pub total_tile_count: u64,
    #[serde(default)]
    pub total_point_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cluster_query_serializes_zoom_and_stats_query_omits_it() {
        let mut q = QueryRequest {
            rect: Rect::from_bounds(37.0, 23.0, 38.0, 24.0),
            zoom: Some(14),
            categorical_filters: BTreeMap::from([(3, "north".to_string())]),
            group_by_cols: vec![3],
            measure_col: Some(16),
            agg_type: AggregateFunction::Avg,
            time_series_data_toggle: false,
            from: 0,
            to: 1_000,
        };
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "rect": {"lat": [37.0, 38.0], "lon": [23.0, 24.0]},
                "zoom": 14,
                "categoricalFilters": {"3": "north"},
                "groupByCols": [3],
                "measureCol": 16,
                "aggType": "AVG",
                "timeSeriesDataToggle": false,
                "from": 0,
                "to": 1000
            })
        );

        q.zoom = None;
        let json = serde_json::to_value(&q).unwrap();
        assert!(json.get("zoom").is_none());
    }

    #[test]
    fn query_results_tolerate_nulls_and_missing_fields() {
        let json = r#"{
            "points": [[37.9, 23.7, null, [1.5], 11, true]],
            "facets": {"3": ["a", "b"]},
            "series": null,
            "rectStats": {"count": 4, "mean0": 2.5, "pearsonCorrelation": 0.9},
            "singleStats": {"count": 4, "mean": 2.5, "min": 1, "max": 4, "variance": 1.25, "standardDeviation": 1.118},
            "timeSeries": [{"name": "s", "id": 11, "dataPoints": [{"timestamp": 5, "value": 1.0}], "digital": true}],
            "pointCount": 1
        }"#;
        let r: QueryResults = serde_json::from_str(json).unwrap();
        assert_eq!(r.points.len(), 1);
        assert_eq!(r.points[0].row_id, 11);
        assert!(r.series.is_empty());
        assert_eq!(r.facets.get(&3).map(Vec::len), Some(2));
        let stats = r.rect_stats.unwrap();
        assert_eq!(stats.count(), Some(4));
        assert_eq!(stats.mean(0), Some(2.5));
        assert_eq!(stats.mean(1), None);
        assert_eq!(stats.pearson_correlation(), Some(0.9));
        assert_eq!(r.single_stats.map(|s| s.min), Some(1.0));
        assert_eq!(r.time_series[0].data_points[0].timestamp, 5);
        assert_eq!(r.point_count, 1);
        assert_eq!(r.tile_count, 0);
    }

    #[test]
    fn one_bad_point_does_not_fail_the_response() {
        let json = r#"{"points": [[37.9, 23.7, null, null, 11], [37.9, 23.7, null, "?", null]]}"#;
        let r: QueryResults = serde_json::from_str(json).unwrap();
        assert_eq!(r.points.len(), 1);
        assert_eq!(r.points[0].row_id, 11);
    }

    #[test]
    fn dataset_extent_needs_all_bounds() {
        let mut d: Dataset = serde_json::from_str(
            r#"{"id": "ds1", "name": "Sensors", "headers": ["a"], "dimensions": [3, 5],
                "measure0": 16, "objectCount": 10,
                "queryXMin": 23.0, "queryXMax": 24.0, "queryYMin": 37.0, "queryYMax": 38.0}"#,
        )
        .unwrap();
        assert_eq!(d.extent(), Some(Rect::from_bounds(37.0, 23.0, 38.0, 24.0)));
        assert_eq!(d.header(0), Some("a"));
        d.query_x_min = None;
        assert_eq!(d.extent(), None);
    }

    #[test]
    fn index_progress() {
        let s = IndexStatus {
            is_initialized: false,
            objects_indexed: 25,
            object_count: 100,
        };
        assert_eq!(s.progress(), 0.25);
        assert_eq!(IndexStatus::NOT_INITIALIZED.progress(), 0.0);
    }
}
