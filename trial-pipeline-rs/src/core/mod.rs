//! Core data types, I/O operations and pure transforms.

pub mod loaders;
pub mod pipeline;
pub mod transforms;
pub mod writers;

pub use loaders::{LoaderError, Table};
pub use pipeline::{ArrayJob, ArrayReport, TableJob, TableReport};
pub use transforms::TransformError;
pub use writers::{write_csv_table, write_npy, WriteError};
