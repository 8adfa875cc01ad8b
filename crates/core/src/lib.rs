pub mod domain;

pub use domain::record::{escape_newlines, FailureRecord, GenerationRecord};
pub use domain::source::SourceRow;
