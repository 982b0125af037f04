//! Decoding of `/api/v1/query` response bodies.
//!
//! See <https://prometheus.io/docs/prometheus/latest/querying/api/> for the
//! envelope and the result shapes.

use crate::datamodel::{
    LabelSet, ResultTable, ResultTableBuilder, SampleValue, Series, TimeSeriesPoint, Timestamp,
};
use crate::error::{PromBenchError, Result};
use serde_json::{Map, Value};

/// How the entries of `data.result` carry their samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    /// Range query: every entry has a `values` list of `[timestamp, value]`.
    Matrix,
    /// Every other result type: the entry's single `value` pair.
    SinglePoint,
    /// `scalar` and `string` results have no series entries at all.
    Unsupported(String),
}

impl ResultShape {
    pub fn from_result_type(result_type: &str) -> Self {
        match result_type {
            "matrix" => ResultShape::Matrix,
            "scalar" | "string" => ResultShape::Unsupported(result_type.to_string()),
            _ => ResultShape::SinglePoint,
        }
    }
}

/// Turns a query response body into a [`ResultTable`].
///
/// Either the whole body decodes or an error is returned; a table is never
/// built from part of a response.
pub struct ResultDecoder;

impl ResultDecoder {
    /// `query` is only used to label a server-side query error.
    pub fn decode(query: &str, body: &str) -> Result<ResultTable> {
        let document: Value = serde_json::from_str(body)?;
        Self::decode_value(query, &document)
    }

    pub fn decode_value(query: &str, document: &Value) -> Result<ResultTable> {
        let status = required_str(document, "status")?;
        match status {
            "success" => {}
            "error" => {
                return Err(PromBenchError::QueryExecution {
                    query: query.to_string(),
                    error_type: document
                        .get("errorType")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    message: required_str(document, "error")?.to_string(),
                });
            }
            other => {
                return Err(PromBenchError::UnknownStatus {
                    status: other.to_string(),
                });
            }
        }

        let data = required(document, "data")?;
        let shape = ResultShape::from_result_type(required_str(data, "resultType")?);
        if let ResultShape::Unsupported(result_type) = shape {
            return Err(PromBenchError::UnsupportedResultType { result_type });
        }
        let result = required(data, "result")?
            .as_array()
            .ok_or_else(|| PromBenchError::invalid_field("result", "is not an array"))?;

        let mut builder = ResultTableBuilder::new();
        for entry in result {
            let (labels, series) = decode_entry(entry, &shape)?;
            builder.add(labels, series);
        }
        Ok(builder.build())
    }
}

fn required<'a>(object: &'a Value, field: &'static str) -> Result<&'a Value> {
    object
        .get(field)
        .ok_or_else(|| PromBenchError::missing_field(field))
}

fn required_str<'a>(object: &'a Value, field: &'static str) -> Result<&'a str> {
    required(object, field)?
        .as_str()
        .ok_or_else(|| PromBenchError::invalid_field(field, "is not a string"))
}

fn decode_entry(entry: &Value, shape: &ResultShape) -> Result<(LabelSet, Series)> {
    let metric = required(entry, "metric")?
        .as_object()
        .ok_or_else(|| PromBenchError::invalid_field("metric", "is not an object"))?;
    let labels = decode_labels(metric)?;

    let points = match shape {
        ResultShape::Matrix => required(entry, "values")?
            .as_array()
            .ok_or_else(|| PromBenchError::invalid_field("values", "is not an array"))?
            .iter()
            .map(|pair| decode_point(pair, "values"))
            .collect::<Result<Vec<_>>>()?,
        _ => vec![decode_point(required(entry, "value")?, "value")?],
    };

    Ok((labels, Series::from_points(points)))
}

fn decode_labels(metric: &Map<String, Value>) -> Result<LabelSet> {
    metric
        .iter()
        .map(|(name, value)| match value.as_str() {
            Some(value) => Ok((name.as_str(), value)),
            None => Err(PromBenchError::invalid_field(
                "metric",
                format!("label {} is not a string", name),
            )),
        })
        .collect::<Result<Vec<_>>>()
        .map(LabelSet::from_pairs)
}

fn decode_point(pair: &Value, field: &'static str) -> Result<TimeSeriesPoint> {
    let Some([timestamp, value]) = pair.as_array().map(Vec::as_slice) else {
        return Err(PromBenchError::invalid_field(
            field,
            "is not a [timestamp, value] pair",
        ));
    };
    let seconds = timestamp
        .as_f64()
        .ok_or_else(|| PromBenchError::invalid_field(field, "timestamp is not a number"))?;
    let timestamp = Timestamp::from_unix_seconds_f64(seconds)
        .ok_or_else(|| PromBenchError::invalid_field(field, "timestamp is out of range"))?;
    let value = SampleValue::from_json(value).ok_or_else(|| {
        PromBenchError::invalid_field(field, "value is neither a string nor a number")
    })?;
    Ok(TimeSeriesPoint { timestamp, value })
}
