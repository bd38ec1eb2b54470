//! Batch processing - recipient records and the submission driver

pub mod driver;
pub mod records;

pub use driver::{BatchReport, SubmissionDriver};
pub use records::{MintRequest, RecordSource};
