pub mod label_set;
pub mod result_table;
pub mod sample;
pub mod timestamp;

pub use label_set::LabelSet;
pub use result_table::{ResultTable, ResultTableBuilder};
pub use sample::{SampleValue, Series, TimeSeriesPoint};
pub use timestamp::{PromDateTime, Timestamp};
