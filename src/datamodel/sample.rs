use super::Timestamp;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A sample value exactly as Prometheus sent it. Prometheus encodes values as
/// strings (`"1"`, `"NaN"`, `"+Inf"`); nothing here parses them unless asked.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Text(String),
    Number(serde_json::Number),
}

impl SampleValue {
    /// Only strings and numbers are sample values.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(SampleValue::Text(text.clone())),
            Value::Number(number) => Some(SampleValue::Number(number.clone())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SampleValue::Text(text) => Some(text),
            SampleValue::Number(_) => None,
        }
    }

    /// Explicit numeric reading, using Prometheus' spelling of special floats.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Number(number) => number.as_f64(),
            SampleValue::Text(text) => match text.as_str() {
                "+Inf" | "Inf" => Some(f64::INFINITY),
                "-Inf" => Some(f64::NEG_INFINITY),
                "NaN" => Some(f64::NAN),
                other => other.parse().ok(),
            },
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SampleValue::Text(text) => Value::String(text.clone()),
            SampleValue::Number(number) => Value::Number(number.clone()),
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Text(text) => f.write_str(text),
            SampleValue::Number(number) => write!(f, "{}", number),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub timestamp: Timestamp,
    pub value: SampleValue,
}

/// The points of one series, strictly ordered by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: Vec<TimeSeriesPoint>,
}

impl Series {
    /// On duplicate timestamps the last point wins.
    pub fn from_points(points: impl IntoIterator<Item = TimeSeriesPoint>) -> Self {
        let by_time: BTreeMap<Timestamp, SampleValue> = points
            .into_iter()
            .map(|point| (point.timestamp, point.value))
            .collect();
        Self::from_map(by_time)
    }

    fn from_map(by_time: BTreeMap<Timestamp, SampleValue>) -> Self {
        Self {
            points: by_time
                .into_iter()
                .map(|(timestamp, value)| TimeSeriesPoint { timestamp, value })
                .collect(),
        }
    }

    /// Union of both series; `other` wins on equal timestamps.
    pub fn merge(self, other: Series) -> Series {
        let mut by_time: BTreeMap<Timestamp, SampleValue> = self
            .points
            .into_iter()
            .map(|point| (point.timestamp, point.value))
            .collect();
        for point in other.points {
            by_time.insert(point.timestamp, point.value);
        }
        Self::from_map(by_time)
    }

    pub fn get(&self, timestamp: Timestamp) -> Option<&SampleValue> {
        self.points
            .binary_search_by_key(&timestamp, |point| point.timestamp)
            .ok()
            .map(|i| &self.points[i].value)
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.points.iter().map(|point| point.timestamp)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(micros: i64, value: &str) -> TimeSeriesPoint {
        TimeSeriesPoint {
            timestamp: Timestamp::from_unix_microseconds(micros),
            value: SampleValue::Text(value.to_string()),
        }
    }

    #[test]
    fn test_value_kept_as_received() {
        assert_eq!(
            SampleValue::from_json(&json!("1")),
            Some(SampleValue::Text("1".to_string()))
        );
        let number = SampleValue::from_json(&json!(1.5)).unwrap();
        assert!(matches!(number, SampleValue::Number(_)));
        assert_eq!(number.to_string(), "1.5");
        assert_eq!(SampleValue::from_json(&json!(null)), None);
        assert_eq!(SampleValue::from_json(&json!(true)), None);
        assert_eq!(SampleValue::from_json(&json!([1])), None);
    }

    #[test]
    fn test_to_f64() {
        assert_eq!(SampleValue::Text("1".to_string()).to_f64(), Some(1.0));
        assert_eq!(
            SampleValue::Text("+Inf".to_string()).to_f64(),
            Some(f64::INFINITY)
        );
        assert!(SampleValue::Text("NaN".to_string()).to_f64().unwrap().is_nan());
        assert_eq!(SampleValue::Text("abc".to_string()).to_f64(), None);
    }

    #[test]
    fn test_series_sorted_and_deduplicated() {
        let series = Series::from_points(vec![point(3, "c"), point(1, "a"), point(3, "d")]);
        let times: Vec<i64> = series.timestamps().map(|t| t.unix_microseconds()).collect();
        assert_eq!(times, vec![1, 3]);
        assert_eq!(
            series.get(Timestamp::from_unix_microseconds(3)),
            Some(&SampleValue::Text("d".to_string()))
        );
        assert_eq!(series.get(Timestamp::from_unix_microseconds(2)), None);
    }

    #[test]
    fn test_series_merge() {
        let a = Series::from_points(vec![point(1, "a"), point(2, "b")]);
        let b = Series::from_points(vec![point(2, "B"), point(4, "d")]);
        let merged = a.merge(b);
        assert_eq!(merged.len(), 3);
        assert_eq!(
            merged.get(Timestamp::from_unix_microseconds(2)),
            Some(&SampleValue::Text("B".to_string()))
        );
    }
}
