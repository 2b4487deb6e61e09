pub mod library_file;
pub mod statistics;
pub mod verdict;
pub mod audio_properties;
pub mod deletion;
pub mod vetting;

use thiserror;

use crate::store::StoreError;

pub use library_file::LibraryFile;
pub use statistics::LibraryStatistics;
pub use verdict::{DuplicateVerdict, MatchType};
pub use audio_properties::{AudioProperties, BitrateMode};
pub use deletion::{DeletionGroup, DeletionPlan, ValidationLevel, ValidationResult};
pub use vetting::VettingSession;

/// Raised at component boundaries when a caller-supplied value cannot be
/// accepted. Never propagated past the boundary that raised it.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("file_path cannot be empty")]
    EmptyPath,

    #[error("year {0} is outside the valid range 1000-9999")]
    YearOutOfRange(i32),

    #[error("duration cannot be negative, got {0}")]
    NegativeDuration(f64),

    #[error("file_size cannot be negative, got {0}")]
    NegativeFileSize(i64),

    #[error("threshold must be between 0.0 and 1.0, got {0}")]
    ThresholdOutOfRange(f64),

    #[error("confidence must be between 0.0 and 1.0, got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("limit must be between {min} and {max}, got {got}")]
    LimitOutOfRange { min: i64, max: i64, got: i64 },

    #[error("column name '{0}' is not in the write whitelist")]
    UnknownColumn(String),
}

/// Outcome of one row within a batch save. `batch_index` is the row's
/// position in the original input slice, preserved even when the batch
/// degrades to per-row fallback so callers can correlate errors back to
/// their source data.
#[derive(Debug)]
pub struct BatchSaveOutcome {
    pub batch_index: usize,
    pub result: Result<i64, StoreError>,
}

#[derive(Debug)]
pub struct BatchSaveReport {
    pub outcomes: Vec<BatchSaveOutcome>,
}

impl BatchSaveReport {
    pub fn new() -> Self {
        Self { outcomes: Vec::new() }
    }

    pub fn successful_ids(&self) -> Vec<i64> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok().copied())
            .collect()
    }

    pub fn failed(&self) -> Vec<&BatchSaveOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .collect()
    }
}

impl Default for BatchSaveReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a batch soft/hard delete, keyed by path rather than id since
/// deletes are addressed by `file_path` throughout the Store contract.
#[derive(Debug)]
pub struct BatchDeleteReport {
    pub deleted_paths: Vec<String>,
    pub failed: Vec<(String, StoreError)>,
}

impl BatchDeleteReport {
    pub fn new() -> Self {
        Self { deleted_paths: Vec::new(), failed: Vec::new() }
    }
}

impl Default for BatchDeleteReport {
    fn default() -> Self {
        Self::new()
    }
}
