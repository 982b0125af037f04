pub mod csv;
pub mod dataframe;
pub mod jsonl;

pub use csv::CsvConverter;
pub use dataframe::DataFrameConverter;
pub use jsonl::JsonlConverter;
