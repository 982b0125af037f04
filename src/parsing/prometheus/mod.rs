pub mod query_response;

pub use query_response::{ResultDecoder, ResultShape};
