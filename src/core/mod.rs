//! Core data types and I/O operations.

pub mod loaders;
pub mod table;
pub mod writers;

pub use loaders::LoaderError;
pub use table::{Table, TableError, Value};
pub use writers::{write_table_csv, WriteError};
