//! Batch transforms for per-trial behavioral data.
//!
//! This crate provides tools for:
//! - Squaring integers and greeting users (course warm-up commands)
//! - Standardizing and normalizing NumPy `.npy` arrays
//! - Collecting per-trial CSV files into one table tagged with session metadata
//! - Filtering CSV rows by a boolean flag column
//! - Stacking per-trial `.npy` / `.mat` arrays along a new trial axis
//!
//! # Example
//!
//! ```no_run
//! use trial_pipeline::core::{pipeline::ArrayJob, transforms::normalize};
//!
//! let report = ArrayJob::new("trace.npy", "trace_norm.npy", normalize).run().unwrap();
//! println!("normalized {:?}", report.output_shape);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{CollectConfig, FilterConfig, MergeConfig, NormalizeConfig, PipelineConfig};
pub use core::loaders::Table;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
