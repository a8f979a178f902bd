//! Multi-step data processing modules.

pub mod collecting;
pub mod filtering;
pub mod merging;

// Re-export key types for convenience
pub use collecting::{
    add_constant_column, collect_csv_files, concat_tables, metadata_path_for, scalar_to_cell,
    CollectError, CollectSummary,
};
pub use filtering::{filter_rows, filter_valid_trials, parse_flag, FilterError};
pub use merging::{merge_mat_files, merge_npy_files, save_merged, MergeError, MergeSummary};
