use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DuplicateVerdict, LibraryFile, ValidationError};

/// Persisted summary of one vetting run, one row per call to `vet_folder`.
/// This is the `vetting_history` shape; the richer in-memory
/// [`VettingReport`] is what the Vetter builds while scanning and is
/// reduced to this before being handed to the Store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VettingSession {
    pub id: Option<i64>,
    pub import_folder: String,
    pub total_files: i64,
    pub duplicates_found: i64,
    pub new_songs: i64,
    pub uncertain_matches: i64,
    pub threshold_used: f64,
    pub vetted_at: DateTime<Utc>,
}

impl VettingSession {
    pub fn new(
        import_folder: String,
        total_files: i64,
        duplicates_found: i64,
        new_songs: i64,
        uncertain_matches: i64,
        threshold_used: f64,
    ) -> Result<Self, ValidationError> {
        if import_folder.trim().is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        if !(0.0..=1.0).contains(&threshold_used) {
            return Err(ValidationError::ThresholdOutOfRange(threshold_used));
        }

        Ok(Self {
            id: None,
            import_folder,
            total_files,
            duplicates_found,
            new_songs,
            uncertain_matches,
            threshold_used,
            vetted_at: Utc::now(),
        })
    }
}

/// One candidate file paired with the verdict the Detector returned for
/// it, kept together for the duplicates/uncertain buckets of a report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VettedMatch {
    pub candidate: LibraryFile,
    pub verdict: DuplicateVerdict,
}

/// Full result of scanning an import folder against the index: every
/// candidate sorted into exactly one of three buckets. Categorization
/// order matters — a file with `is_uncertain()` true lands in `uncertain`
/// even if `verdict.is_duplicate` is also true, since an operator still
/// needs to look at it before it's treated as either a keep or a delete.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VettingReport {
    pub import_folder: String,
    pub total_files: i64,
    pub threshold: f64,
    pub duplicates: Vec<VettedMatch>,
    pub new_songs: Vec<LibraryFile>,
    pub uncertain: Vec<VettedMatch>,
    pub scan_duration: f64,
    pub vetted_at: DateTime<Utc>,
}

impl VettingReport {
    pub fn duplicate_count(&self) -> i64 {
        self.duplicates.len() as i64
    }

    pub fn new_count(&self) -> i64 {
        self.new_songs.len() as i64
    }

    pub fn uncertain_count(&self) -> i64 {
        self.uncertain.len() as i64
    }

    fn percentage(count: i64, total: i64) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let pct = (count as f64 / total as f64) * 100.0;
        ((pct * 100.0).round() / 100.0).min(100.0)
    }

    pub fn duplicate_percentage(&self) -> f64 {
        Self::percentage(self.duplicate_count(), self.total_files)
    }

    pub fn new_percentage(&self) -> f64 {
        Self::percentage(self.new_count(), self.total_files)
    }

    pub fn to_session(&self) -> Result<VettingSession, ValidationError> {
        VettingSession::new(
            self.import_folder.clone(),
            self.total_files,
            self.duplicate_count(),
            self.new_count(),
            self.uncertain_count(),
            self.threshold,
        )
    }
}
