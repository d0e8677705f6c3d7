//! Data access and serialization.

pub mod rows;
pub mod yaml;

pub use rows::{fetch_rows_by_table, JsonFileRowSource, RowSource};
pub use yaml::to_yaml;
