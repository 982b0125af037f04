#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod datamodel;
pub mod error;
pub mod exporters;
pub mod parsing;
pub mod session;
pub mod supervisor;

pub use datamodel::{LabelSet, ResultTable};
pub use error::PromBenchError;
pub use session::MetricsSession;
