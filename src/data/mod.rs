//! Data storage modules.
pub mod storage;

pub use storage::{batch_file_name, CsvLayout, CsvLog};
