//! Collect per-trial CSV files into one table tagged with session metadata.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::config::CollectConfig;
use crate::core::loaders::{list_files, load_csv_table, load_metadata, Table};
use crate::core::writers::write_csv_table;

/// Errors that can occur while collecting CSV files.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("No CSV files found in {folder}")]
    NoFilesFound { folder: PathBuf },

    #[error("Header mismatch in {path}: expected [{expected}], found [{found}]")]
    HeaderMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Metadata field '{field}' missing from {path}")]
    MissingField { path: PathBuf, field: String },

    #[error("Metadata field '{field}' in {path} is not a scalar value")]
    NonScalarField { path: PathBuf, field: String },

    #[error("Column '{0}' already exists in the collected table")]
    DuplicateColumn(String),
}

/// Summary of a finished collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectSummary {
    /// Input files, in concatenation order.
    pub files: Vec<PathBuf>,
    /// Total number of rows written.
    pub rows: usize,
    /// Metadata sidecar that was read.
    pub metadata_path: PathBuf,
    /// Value written into the metadata column.
    pub metadata_value: String,
}

/// Locate the metadata sidecar for a trial directory.
///
/// The sidecar sits next to the directory, not inside it:
/// `data/session/trials/` resolves to `data/session/metadata.json`.
pub fn metadata_path_for(input_dir: &Path, file_name: &str) -> PathBuf {
    if input_dir.file_name().is_some() {
        return input_dir.with_file_name(file_name);
    }

    // "." or "..": resolve to a real directory name first
    match fs::canonicalize(input_dir) {
        Ok(resolved) => resolved.with_file_name(file_name),
        Err(_) => input_dir.join("..").join(file_name),
    }
}

/// Render a JSON scalar as CSV cell text.
///
/// Booleans use the `True`/`False` spelling and `null` becomes an empty
/// cell. Arrays and objects have no cell representation.
pub fn scalar_to_cell(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Concatenate tables row-wise.
///
/// Every table must have exactly the first table's header. Rows keep their
/// per-file labels and appear in input order.
pub fn concat_tables(tables: Vec<(PathBuf, Table)>) -> std::result::Result<Table, CollectError> {
    let mut iter = tables.into_iter();
    let (_, mut combined) = match iter.next() {
        Some(first) => first,
        None => return Ok(Table::default()),
    };

    for (path, table) in iter {
        if table.headers != combined.headers {
            return Err(CollectError::HeaderMismatch {
                path,
                expected: combined.headers.iter().collect::<Vec<_>>().join(","),
                found: table.headers.iter().collect::<Vec<_>>().join(","),
            });
        }
        combined.rows.extend(table.rows);
        combined.row_labels.extend(table.row_labels);
    }

    Ok(combined)
}

/// Append a column holding the same value on every row.
pub fn add_constant_column(
    table: &mut Table,
    name: &str,
    value: &str,
) -> std::result::Result<(), CollectError> {
    if table.column_index(name).is_some() {
        return Err(CollectError::DuplicateColumn(name.to_string()));
    }

    table.headers.push_field(name);
    for row in &mut table.rows {
        row.push_field(value);
    }
    Ok(())
}

/// Read the configured scalar field from the metadata sidecar.
fn read_metadata_field(path: &Path, field: &str) -> Result<String> {
    let metadata = load_metadata(path).context("loading metadata")?;

    let value = metadata.get(field).ok_or_else(|| CollectError::MissingField {
        path: path.to_path_buf(),
        field: field.to_string(),
    })?;

    let cell = scalar_to_cell(value).ok_or_else(|| CollectError::NonScalarField {
        path: path.to_path_buf(),
        field: field.to_string(),
    })?;

    Ok(cell)
}

/// Collect every CSV file in `input_dir` into `output`.
///
/// Files are read in name order unless `config.sort_files` is off, checked
/// for identical headers, concatenated, and tagged with a
/// `config.metadata_field` column read from the sibling metadata file.
///
/// # Arguments
///
/// * `input_dir` - Directory holding one CSV file per trial
/// * `output` - Path of the combined CSV file
/// * `config` - Metadata location, field name, ordering and index options
/// * `pattern` - Optional regex the file names must match
/// * `progress` - Advanced once per file read
pub fn collect_csv_files(
    input_dir: &Path,
    output: &Path,
    config: &CollectConfig,
    pattern: Option<&Regex>,
    progress: &ProgressBar,
) -> Result<CollectSummary> {
    let metadata_path = metadata_path_for(input_dir, &config.metadata_file);
    let metadata_value = read_metadata_field(&metadata_path, &config.metadata_field)
        .with_context(|| format!("reading metadata '{}'", metadata_path.display()))?;
    debug!(
        "Metadata {} = {:?} from {}",
        config.metadata_field,
        metadata_value,
        metadata_path.display()
    );

    let files = list_files(input_dir, "csv", pattern, config.sort_files)
        .with_context(|| format!("listing CSV files in '{}'", input_dir.display()))?;
    if files.is_empty() {
        return Err(CollectError::NoFilesFound {
            folder: input_dir.to_path_buf(),
        }
        .into());
    }
    if !config.sort_files {
        warn!("Collecting in directory order; row order may differ between machines");
    }

    progress.set_length(files.len() as u64);
    let mut tables = Vec::with_capacity(files.len());
    for path in &files {
        let table = load_csv_table(path)
            .with_context(|| format!("loading trial CSV '{}'", path.display()))?;
        debug!("{}: {} rows", path.display(), table.len());
        tables.push((path.clone(), table));
        progress.inc(1);
    }

    let mut combined = concat_tables(tables).context("concatenating trial tables")?;
    add_constant_column(&mut combined, &config.metadata_field, &metadata_value)
        .context("adding metadata column")?;

    write_csv_table(output, &combined, config.write_index)
        .with_context(|| format!("saving collected table '{}'", output.display()))?;
    info!(
        "Collected {} rows from {} files -> {}",
        combined.len(),
        files.len(),
        output.display()
    );

    Ok(CollectSummary {
        rows: combined.len(),
        files,
        metadata_path,
        metadata_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::load_csv_table;
    use csv::StringRecord;
    use tempfile::TempDir;

    /// Lay out `<root>/session/trials/*.csv` plus `<root>/session/metadata.json`.
    fn setup_session(root: &Path, metadata: &str, trials: &[(&str, &str)]) -> PathBuf {
        let session = root.join("session");
        let trials_dir = session.join("trials");
        fs::create_dir_all(&trials_dir).unwrap();
        fs::write(session.join("metadata.json"), metadata).unwrap();
        for (name, content) in trials {
            fs::write(trials_dir.join(name), content).unwrap();
        }
        trials_dir
    }

    const TRIAL_A: &str = "trial,rt\n1,0.30\n2,0.41\n3,0.28\n";
    const TRIAL_B: &str = "trial,rt\n4,0.50\n5,0.33\n6,0.39\n";

    #[test]
    fn test_metadata_path_for_sibling() {
        assert_eq!(
            metadata_path_for(Path::new("data/session/trials/"), "metadata.json"),
            PathBuf::from("data/session/metadata.json")
        );
        assert_eq!(
            metadata_path_for(Path::new("data/session/trials"), "meta.json"),
            PathBuf::from("data/session/meta.json")
        );
    }

    #[test]
    fn test_metadata_path_for_dot_components() {
        let temp_dir = TempDir::new().unwrap();
        let session = temp_dir.path().join("session");
        fs::create_dir_all(session.join("trials/raw")).unwrap();

        // `trials/raw/..` has no final name; it resolves to `trials`
        let resolved = metadata_path_for(&session.join("trials/raw/.."), "metadata.json");
        assert_eq!(
            resolved,
            fs::canonicalize(&session).unwrap().join("metadata.json")
        );

        // A bare relative `.` is resolved against the working directory
        let cwd = fs::canonicalize(".").unwrap();
        assert_eq!(
            metadata_path_for(Path::new("."), "metadata.json"),
            cwd.with_file_name("metadata.json")
        );
    }

    #[test]
    fn test_collect_skips_hidden_resource_forks() {
        let temp_dir = TempDir::new().unwrap();
        let trials_dir = setup_session(
            temp_dir.path(),
            r#"{"session_date": "2024-01-01"}"#,
            &[("trial_01.csv", TRIAL_A)],
        );
        fs::write(trials_dir.join("._trial_01.csv"), [0u8, 5, 22, 7, 0xff, 0xfe]).unwrap();
        let output = temp_dir.path().join("all.csv");

        let summary = collect_csv_files(
            &trials_dir,
            &output,
            &CollectConfig::default(),
            None,
            &ProgressBar::hidden(),
        )
        .unwrap();

        assert_eq!(summary.files.len(), 1);
        assert_eq!(summary.rows, 3);
    }

    #[test]
    fn test_scalar_to_cell() {
        assert_eq!(scalar_to_cell(&Value::from("2024-01-01")), Some("2024-01-01".to_string()));
        assert_eq!(scalar_to_cell(&Value::from(3)), Some("3".to_string()));
        assert_eq!(scalar_to_cell(&Value::from(true)), Some("True".to_string()));
        assert_eq!(scalar_to_cell(&Value::Null), Some(String::new()));
        assert_eq!(scalar_to_cell(&serde_json::json!([1, 2])), None);
    }

    #[test]
    fn test_concat_tables_header_mismatch() {
        let a = Table::new(StringRecord::from(vec!["trial", "rt"]));
        let b = Table::new(StringRecord::from(vec!["trial", "choice"]));

        let err = concat_tables(vec![
            (PathBuf::from("a.csv"), a),
            (PathBuf::from("b.csv"), b),
        ])
        .unwrap_err();

        assert!(matches!(err, CollectError::HeaderMismatch { ref path, .. } if path == Path::new("b.csv")));
    }

    #[test]
    fn test_add_constant_column_duplicate() {
        let mut table = Table::new(StringRecord::from(vec!["session_date"]));
        let err = add_constant_column(&mut table, "session_date", "x").unwrap_err();
        assert!(matches!(err, CollectError::DuplicateColumn(_)));
    }

    #[test]
    fn test_collect_two_files_six_rows() {
        let temp_dir = TempDir::new().unwrap();
        let trials_dir = setup_session(
            temp_dir.path(),
            r#"{"session_date": "2024-01-01"}"#,
            &[("trial_01.csv", TRIAL_A), ("trial_02.csv", TRIAL_B)],
        );
        let output = temp_dir.path().join("out/behavior.csv");

        let summary = collect_csv_files(
            &trials_dir,
            &output,
            &CollectConfig::default(),
            None,
            &ProgressBar::hidden(),
        )
        .unwrap();

        assert_eq!(summary.rows, 6);
        assert_eq!(summary.files.len(), 2);
        assert_eq!(summary.metadata_value, "2024-01-01");

        let table = load_csv_table(&output).unwrap();
        assert_eq!(table.headers, StringRecord::from(vec!["trial", "rt", "session_date"]));
        assert_eq!(table.len(), 6);
        let date_idx = table.column_index("session_date").unwrap();
        assert!(table.column_values(date_idx).iter().all(|v| *v == "2024-01-01"));
        assert_eq!(table.column_values(0), vec!["1", "2", "3", "4", "5", "6"]);
    }

    #[test]
    fn test_collect_with_index_restarts_per_file() {
        let temp_dir = TempDir::new().unwrap();
        let trials_dir = setup_session(
            temp_dir.path(),
            r#"{"session_date": "2024-01-01"}"#,
            &[("a.csv", "x\n1\n2\n"), ("b.csv", "x\n3\n")],
        );
        let output = temp_dir.path().join("indexed.csv");
        let config = CollectConfig {
            write_index: true,
            ..CollectConfig::default()
        };

        collect_csv_files(&trials_dir, &output, &config, None, &ProgressBar::hidden()).unwrap();

        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            ",x,session_date\n0,1,2024-01-01\n1,2,2024-01-01\n0,3,2024-01-01\n"
        );
    }

    #[test]
    fn test_collect_pattern_and_custom_field() {
        let temp_dir = TempDir::new().unwrap();
        let trials_dir = setup_session(
            temp_dir.path(),
            r#"{"session_date": "2024-01-01", "subject": 12}"#,
            &[("trial_01.csv", TRIAL_A), ("summary.csv", "other\n1\n")],
        );
        let output = temp_dir.path().join("subject.csv");
        let config = CollectConfig {
            metadata_field: "subject".to_string(),
            ..CollectConfig::default()
        };
        let pattern = Regex::new(r"^trial_").unwrap();

        let summary = collect_csv_files(
            &trials_dir,
            &output,
            &config,
            Some(&pattern),
            &ProgressBar::hidden(),
        )
        .unwrap();

        assert_eq!(summary.rows, 3);
        let table = load_csv_table(&output).unwrap();
        let idx = table.column_index("subject").unwrap();
        assert!(table.column_values(idx).iter().all(|v| *v == "12"));
    }

    #[test]
    fn test_collect_missing_metadata_fails() {
        let temp_dir = TempDir::new().unwrap();
        let trials_dir = temp_dir.path().join("trials");
        fs::create_dir_all(&trials_dir).unwrap();
        fs::write(trials_dir.join("t.csv"), TRIAL_A).unwrap();
        let output = temp_dir.path().join("out.csv");

        let err = collect_csv_files(
            &trials_dir,
            &output,
            &CollectConfig::default(),
            None,
            &ProgressBar::hidden(),
        )
        .unwrap_err();

        assert!(format!("{err:#}").contains("metadata.json"));
        assert!(!output.exists());
    }

    #[test]
    fn test_collect_missing_field_fails() {
        let temp_dir = TempDir::new().unwrap();
        let trials_dir = setup_session(temp_dir.path(), r#"{"subject": 1}"#, &[("t.csv", TRIAL_A)]);

        let err = collect_csv_files(
            &trials_dir,
            &temp_dir.path().join("out.csv"),
            &CollectConfig::default(),
            None,
            &ProgressBar::hidden(),
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CollectError>(),
            Some(CollectError::MissingField { .. })
        ));
    }

    #[test]
    fn test_collect_empty_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let trials_dir = setup_session(temp_dir.path(), r#"{"session_date": "d"}"#, &[]);

        let err = collect_csv_files(
            &trials_dir,
            &temp_dir.path().join("out.csv"),
            &CollectConfig::default(),
            None,
            &ProgressBar::hidden(),
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CollectError>(),
            Some(CollectError::NoFilesFound { .. })
        ));
    }

    #[test]
    fn test_collect_schema_mismatch_fails() {
        let temp_dir = TempDir::new().unwrap();
        let trials_dir = setup_session(
            temp_dir.path(),
            r#"{"session_date": "d"}"#,
            &[("a.csv", TRIAL_A), ("b.csv", "trial,choice\n1,left\n")],
        );

        let err = collect_csv_files(
            &trials_dir,
            &temp_dir.path().join("out.csv"),
            &CollectConfig::default(),
            None,
            &ProgressBar::hidden(),
        )
        .unwrap_err();

        assert!(format!("{err:#}").contains("b.csv"));
    }
}
