//! Data validation utilities.
//!
//! Walks a data directory and checks every map spec (`.ron` / `.json`) and
//! tech requirement table (`*tech*.ron`) it finds.

use std::path::{Path, PathBuf};

use thiserror::Error;

use rts_terrain::error::TerrainError;
use rts_terrain::map_spec::MapSpec;
use rts_terrain::tech_gate::TerrainTechGate;

/// Validation failures.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The directory could not be walked.
    #[error("Failed to read directory '{path}': {source}")]
    Io {
        /// Directory path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// One or more files failed to load.
    #[error("{failed} of {checked} data files failed validation")]
    Failed {
        /// Files checked.
        checked: usize,
        /// Files that failed.
        failed: usize,
    },
}

/// Outcome for one file.
#[derive(Debug)]
pub struct FileReport {
    /// File path.
    pub path: PathBuf,
    /// Fatal load error, if any.
    pub error: Option<TerrainError>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

/// Outcome for a directory.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Per-file results in path order.
    pub files: Vec<FileReport>,
}

impl ValidationReport {
    /// Files that failed to load.
    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.error.is_some())
    }

    /// Total warnings across all files.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.files.iter().map(|f| f.warnings.len()).sum()
    }
}

/// Validate a single data file.
#[must_use]
pub fn validate_file(path: &Path) -> FileReport {
    let is_tech_table = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains("tech"));

    let (error, warnings) = if is_tech_table {
        match TerrainTechGate::load_requirements(path) {
            Ok(gate) => {
                let warnings = gate
                    .requirements()
                    .iter()
                    .filter(|(_, req)| req.target_feature.is_none() && req.target_biome.is_none())
                    .map(|(id, _)| format!("tech '{id}' has no feature or biome target"))
                    .collect();
                (None, warnings)
            }
            Err(e) => (Some(e), Vec::new()),
        }
    } else {
        match MapSpec::load(path) {
            Ok(spec) => (None, spec.lint()),
            Err(e) => (Some(e), Vec::new()),
        }
    };

    FileReport {
        path: path.to_path_buf(),
        error,
        warnings,
    }
}

/// Validate all RON and JSON data files under a directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or any data file fails
/// to load. Lint warnings alone do not fail validation.
pub fn validate_data_directory(path: &Path) -> Result<ValidationReport, ValidationError> {
    let mut files = Vec::new();
    collect_data_files(path, &mut files)?;
    files.sort();

    let mut report = ValidationReport::default();
    for file in files {
        let result = validate_file(&file);
        match &result.error {
            Some(e) => tracing::error!(file = %file.display(), error = %e, "Invalid data file"),
            None => {
                for warning in &result.warnings {
                    tracing::warn!(file = %file.display(), "{warning}");
                }
                tracing::debug!(file = %file.display(), "Data file OK");
            }
        }
        report.files.push(result);
    }

    let failed = report.failures().count();
    if failed > 0 {
        return Err(ValidationError::Failed {
            checked: report.files.len(),
            failed,
        });
    }
    Ok(report)
}

fn collect_data_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ValidationError> {
    let io_err = |source| ValidationError::Io {
        path: dir.display().to_string(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_data_files(&path, out)?;
        } else if matches!(path.extension().and_then(|e| e.to_str()), Some("ron" | "json")) {
            out.push(path);
        }
    }
    Ok(())
}
