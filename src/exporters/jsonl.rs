use crate::datamodel::ResultTable;
use anyhow::Result;
use serde_json::{Map, Value, json};

/// Converter for ResultTable to JSON Lines format
pub struct JsonlConverter;

impl JsonlConverter {
    /// One JSON object per sample, series after series. Missing cells produce
    /// no line.
    pub fn to_jsonl(table: &ResultTable) -> Result<String> {
        let mut jsonl_output = String::new();

        for (labels, series) in table.columns() {
            let labels: Map<String, Value> = labels
                .iter()
                .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
                .collect();
            for point in series.points() {
                let line = json!({
                    "labels": labels,
                    "timestamp": point.timestamp.to_rfc3339(),
                    "unix_seconds": point.timestamp.unix_seconds(),
                    "value": point.value.to_json(),
                });
                jsonl_output.push_str(&line.to_string());
                jsonl_output.push('\n');
            }
        }

        Ok(jsonl_output)
    }
}
