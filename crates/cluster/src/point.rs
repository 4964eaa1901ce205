use core::fmt;

use foundation::LatLon;
use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

/// One data row as returned by a viewport query.
///
/// On the wire a point is a positional tuple
/// `[lat, lon, reserved, values, key, isDigital]`. Slot 3 carries the row's
/// measure values when it is an array; slot 4 is the key used for detail
/// lookups. Older backends put a numeric row id in slot 3 and leave slot 4
/// empty, so decoding falls back to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
    pub row_id: i64,
    /// Measure values in dataset order; `None` where the backend sent null.
    pub measures: Vec<Option<f64>>,
    pub digital: bool,
}

impl Point {
    pub fn new(lat: f64, lon: f64, row_id: i64) -> Self {
        Self {
            lat,
            lon,
            row_id,
            measures: Vec::new(),
            digital: false,
        }
    }

    pub fn with_digital(mut self, digital: bool) -> Self {
        self.digital = digital;
        self
    }

    pub fn with_measures(mut self, measures: impl IntoIterator<Item = f64>) -> Self {
        self.measures = measures.into_iter().map(Some).collect();
        self
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }

    pub fn measure(&self, k: usize) -> Option<f64> {
        self.measures.get(k).copied().flatten()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Slot {
    Num(f64),
    Flag(bool),
    List(Vec<Option<f64>>),
    Other(IgnoredAny),
}

impl Slot {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Slot::Num(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        self.as_f64().map(|v| v as i64)
    }

    fn as_flag(&self) -> bool {
        match self {
            Slot::Flag(b) => *b,
            Slot::Num(v) => *v != 0.0,
            _ => false,
        }
    }
}

fn decode(slots: &[Slot]) -> Result<Point, &'static str> {
    let slot = |i: usize| slots.get(i);
    let lat = slot(0)
        .and_then(Slot::as_f64)
        .ok_or("point tuple has no numeric latitude")?;
    let lon = slot(1)
        .and_then(Slot::as_f64)
        .ok_or("point tuple has no numeric longitude")?;
    let row_id = slot(4)
        .and_then(Slot::as_i64)
        .or_else(|| slot(3).and_then(Slot::as_i64))
        .ok_or("point tuple has no numeric row id in slot 3 or 4")?;
    let measures = match slot(3) {
        Some(Slot::List(values)) => values.clone(),
        _ => Vec::new(),
    };
    let digital = slot(5).is_some_and(Slot::as_flag);

    Ok(Point {
        lat,
        lon,
        row_id,
        measures,
        digital,
    })
}

struct SlotsVisitor;

impl<'de> Visitor<'de> for SlotsVisitor {
    type Value = Vec<Slot>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a point tuple [lat, lon, reserved, values, key, isDigital]")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<Slot>, A::Error> {
        let mut slots = Vec::with_capacity(seq.size_hint().unwrap_or(6));
        while let Some(slot) = seq.next_element::<Slot>()? {
            slots.push(slot);
        }
        Ok(slots)
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let slots = deserializer.deserialize_seq(SlotsVisitor)?;
        decode(&slots).map_err(de::Error::custom)
    }
}

/// A list entry that may or may not be a usable point.
struct Decoded(Result<Point, &'static str>);

impl<'de> Deserialize<'de> for Decoded {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let slots = deserializer.deserialize_seq(SlotsVisitor)?;
        Ok(Decoded(decode(&slots)))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Tuple(Decoded),
    Other(IgnoredAny),
}

/// Decode a point list, skipping entries that are not valid point tuples.
///
/// A single malformed row must not cost the whole response; skipped entries
/// are logged. `null` decodes to an empty list.
pub fn deserialize_points<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Point>, D::Error> {
    let entries = Option::<Vec<Entry>>::deserialize(deserializer)?.unwrap_or_default();
    let mut points = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match entry {
            Entry::Tuple(Decoded(Ok(point))) => points.push(point),
            Entry::Tuple(Decoded(Err(reason))) => warn!(index, "skipping point: {reason}"),
            Entry::Other(_) => warn!(index, "skipping point: not a tuple"),
        }
    }
    Ok(points)
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut t = serializer.serialize_tuple(6)?;
        t.serialize_element(&self.lat)?;
        t.serialize_element(&self.lon)?;
        t.serialize_element(&Option::<()>::None)?;
        t.serialize_element(&self.measures)?;
        t.serialize_element(&self.row_id)?;
        t.serialize_element(&self.digital)?;
        t.end()
    }
}

#[cfg(test)]
mod tests {
    use super::{Point, deserialize_points};
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_measure_vector_and_key() {
        let p: Point =
            serde_json::from_str(r#"[37.98, 23.72, [0, 1], [12.5, 3.0], 4096, true]"#).unwrap();
        assert_eq!(
            p,
            Point::new(37.98, 23.72, 4096)
                .with_measures(vec![12.5, 3.0])
                .with_digital(true)
        );
    }

    #[test]
    fn falls_back_to_numeric_slot_three() {
        let p: Point = serde_json::from_str(r#"[1.0, 2.0, null, 77, null, false]"#).unwrap();
        assert_eq!(p.row_id, 77);
        assert!(p.measures.is_empty());
        assert!(!p.digital);
    }

    #[test]
    fn missing_digital_flag_is_false() {
        let p: Point = serde_json::from_str(r#"[1.0, 2.0, null, 5]"#).unwrap();
        assert_eq!(p.row_id, 5);
        assert!(!p.digital);
    }

    #[test]
    fn rejects_tuple_without_row_id() {
        let err = serde_json::from_str::<Point>(r#"[1.0, 2.0, null, "x", null]"#).unwrap_err();
        assert!(err.to_string().contains("row id"), "{err}");
    }

    #[test]
    fn null_measures_stay_positional() {
        let p: Point = serde_json::from_str(r#"[1.0, 2.0, null, [null, 4.5], 8, false]"#).unwrap();
        assert_eq!(p.measures, vec![None, Some(4.5)]);
        assert_eq!(p.measure(0), None);
        assert_eq!(p.measure(1), Some(4.5));
    }

    #[test]
    fn point_lists_skip_unusable_rows() {
        let json = r#"[
            [1.0, 2.0, null, [1.5], 10, true],
            [1.0, 2.0, null, "x", null],
            "garbage",
            null,
            ["north", 2.0, null, null, 12],
            [3.0, 4.0, null, null, 11]
        ]"#;
        let mut de = serde_json::Deserializer::from_str(json);
        let points = deserialize_points(&mut de).unwrap();
        let ids: Vec<i64> = points.iter().map(|p| p.row_id).collect();
        assert_eq!(ids, vec![10, 11]);
        assert!(points[0].digital);
    }

    #[test]
    fn null_point_list_is_empty() {
        let mut de = serde_json::Deserializer::from_str("null");
        assert!(deserialize_points(&mut de).unwrap().is_empty());
    }

    #[test]
    fn serializes_in_wire_slot_order() {
        let p = Point::new(1.0, 2.0, 9).with_measures(vec![4.0]);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "[1.0,2.0,null,[4.0],9,false]");
        let back: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
