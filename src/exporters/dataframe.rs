use crate::datamodel::ResultTable;
use anyhow::Result;
use polars::prelude::*;

/// Converter for ResultTable to a polars DataFrame, for tabular consumers
/// (grouping, rolling windows) downstream.
pub struct DataFrameConverter;

impl DataFrameConverter {
    /// A `timestamp` column (microsecond datetimes) followed by one string
    /// column per label set, named after its selector form. Missing cells
    /// are nulls.
    pub fn to_dataframe(table: &ResultTable) -> Result<DataFrame> {
        let microseconds: Vec<i64> = table
            .index()
            .iter()
            .map(|timestamp| timestamp.unix_microseconds())
            .collect();
        let timestamp = Series::new("timestamp".into(), microseconds)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;

        let mut columns: Vec<Column> = Vec::with_capacity(table.num_columns() + 1);
        columns.push(timestamp.into_column());
        for (labels, series) in table.columns() {
            let cells: Vec<Option<String>> = table
                .index()
                .iter()
                .map(|&timestamp| series.get(timestamp).map(|value| value.to_string()))
                .collect();
            columns.push(Column::new(labels.to_string().into(), cells));
        }

        Ok(DataFrame::new(columns)?)
    }
}
