use crate::datamodel::ResultTable;
use anyhow::Result;

/// Quote a CSV field when it contains a separator, a quote or a newline
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Converter for ResultTable to CSV format
pub struct CsvConverter;

impl CsvConverter {
    /// One row per timestamp, one column per label set. Missing cells are empty.
    pub fn to_csv(table: &ResultTable) -> Result<String> {
        let mut csv_output = String::from("timestamp");
        for labels in table.label_sets() {
            csv_output.push(',');
            csv_output.push_str(&escape_csv_field(&labels.to_string()));
        }
        csv_output.push('\n');

        for (timestamp, cells) in table.rows() {
            csv_output.push_str(&timestamp.to_rfc3339());
            for cell in cells {
                csv_output.push(',');
                if let Some(value) = cell {
                    csv_output.push_str(&escape_csv_field(&value.to_string()));
                }
            }
            csv_output.push('\n');
        }

        Ok(csv_output)
    }
}
