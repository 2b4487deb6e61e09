use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::LibraryFile;

/// Severity of a single validator checkpoint. `Warning` is surfaced to the
/// operator but does not block execution; `Info` records a checkpoint that
/// passed cleanly; only `Error` blocks execution.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ValidationLevel {
    Error,
    Warning,
    Info,
}

/// One checkpoint's verdict. `checkpoint` names which of the seven
/// validator rules produced it, for display and for tests that assert on
/// a specific failure mode rather than just "plan is invalid". `details`
/// carries the structured context the reference attaches to every result
/// (the file path(s) involved, sizes, permission bits) so the exported
/// plan JSON is a full audit trail, not just a list of problems.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub level: ValidationLevel,
    pub checkpoint: String,
    pub message: String,
    pub details: Value,
}

impl ValidationResult {
    pub fn error(checkpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: ValidationLevel::Error, checkpoint: checkpoint.into(), message: message.into(), details: json!({}) }
    }

    pub fn warning(checkpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: ValidationLevel::Warning, checkpoint: checkpoint.into(), message: message.into(), details: json!({}) }
    }

    pub fn info(checkpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: ValidationLevel::Info, checkpoint: checkpoint.into(), message: message.into(), details: json!({}) }
    }

    /// Attaches a structured details payload, mirroring the reference's
    /// per-checkpoint `details={...}` dict.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.level == ValidationLevel::Error
    }
}

/// One set of duplicates sharing a single file worth keeping. `group_id`
/// is `"{keeper_stem[:20]}_{timestamp:%Y%m%d_%H%M%S}"`, stable for the
/// lifetime of a single plan (every group in one plan run shares the same
/// `created_at`, so two groups only collide if they also share a keeper
/// stem — acceptable since they'd then also share a backup subdirectory).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletionGroup {
    pub group_id: String,
    pub keeper: LibraryFile,
    pub deletes: Vec<LibraryFile>,
    pub reason: String,
}

impl DeletionGroup {
    pub fn new(keeper: LibraryFile, deletes: Vec<LibraryFile>, reason: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let stem = keeper
            .as_path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "group".to_string());
        let truncated: String = stem.chars().take(20).collect();

        Self {
            group_id: format!("{truncated}_{}", created_at.format("%Y%m%d_%H%M%S")),
            keeper,
            deletes,
            reason: reason.into(),
        }
    }

    pub fn bytes_reclaimed(&self) -> i64 {
        self.deletes.iter().map(LibraryFile::file_size).sum()
    }
}

/// A reviewed-but-not-yet-executed batch of deletion groups, produced by
/// the Deletion Planner and consumed by its own execution step (or
/// exported to JSON/CSV for an operator to review offline first).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletionPlan {
    pub groups: Vec<DeletionGroup>,
    pub created_at: DateTime<Utc>,
    pub dry_run: bool,
}

impl DeletionPlan {
    pub fn new(groups: Vec<DeletionGroup>, dry_run: bool) -> Self {
        Self { groups, created_at: Utc::now(), dry_run }
    }

    pub fn total_deletes(&self) -> usize {
        self.groups.iter().map(|g| g.deletes.len()).sum()
    }

    pub fn total_bytes_reclaimed(&self) -> i64 {
        self.groups.iter().map(DeletionGroup::bytes_reclaimed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::library_file::NewLibraryFile;
    use std::path::PathBuf;

    fn file(path: &str, size: i64) -> LibraryFile {
        LibraryFile::new(NewLibraryFile {
            file_path: PathBuf::from(path),
            artist: None,
            title: None,
            album: None,
            year: None,
            duration: None,
            file_format: "mp3".to_string(),
            file_size: size,
            metadata_hash: "h".to_string(),
            file_content_hash: "c".to_string(),
            file_mtime: Utc::now(),
        })
        .unwrap()
    }

    #[test]
    fn group_id_combines_keeper_stem_and_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
        let group = DeletionGroup::new(file("/music/One More Time", 10), vec![file("/b", 10)], "exact_file", ts);
        assert_eq!(group.group_id, "One More Time_20260102_030405");
    }

    #[test]
    fn group_id_truncates_long_stems_to_twenty_chars() {
        let ts = Utc::now();
        let group = DeletionGroup::new(file("/this-is-a-very-long-filename-stem", 10), vec![file("/b", 10)], "r", ts);
        let stem_part = group.group_id.split('_').next().unwrap();
        assert_eq!(stem_part.chars().count(), 20);
    }

    #[test]
    fn bytes_reclaimed_sums_deletes_not_keeper() {
        let group = DeletionGroup::new(
            file("/keep", 1000),
            vec![file("/dup1", 100), file("/dup2", 50)],
            "exact_metadata",
            Utc::now(),
        );
        assert_eq!(group.bytes_reclaimed(), 150);
    }

    #[test]
    fn plan_totals_aggregate_across_groups() {
        let now = Utc::now();
        let groups = vec![
            DeletionGroup::new(file("/keep1", 10), vec![file("/d1", 30)], "r", now),
            DeletionGroup::new(file("/keep2", 10), vec![file("/d2", 20), file("/d3", 5)], "r", now),
        ];
        let plan = DeletionPlan::new(groups, true);
        assert_eq!(plan.total_deletes(), 3);
        assert_eq!(plan.total_bytes_reclaimed(), 55);
    }
}
