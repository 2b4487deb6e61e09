//! The Deletion Planner (C7): groups duplicates under a keeper, runs the
//! seven-point validator, and executes a backup-then-delete plan.
//! Grounded byte-for-byte on
//! `original_source/library/safe_delete.py::SafeDeleteManager`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::collaborators::read_raw_tags;
use crate::domain::audio_properties::AudioProperties;
use crate::domain::{DeletionGroup, DeletionPlan, LibraryFile, ValidationLevel, ValidationResult};
use crate::progress::ProgressSink;
use crate::quality::{calculate_quality_score, rank_duplicate_group};

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not create backup root {0}")]
    BackupRootCreation(PathBuf),
}

/// Bitrate patterns recognized in a filename, in priority order, mirroring
/// the reference's best-effort `\d{3}kbps` / `\d{3}k` / `\d{3}\s*kbps`
/// checks. This is a signal of last resort — stream-derived bitrate
/// (when available) should always be preferred by callers.
fn bitrate_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)(\d{3})kbps").unwrap(),
            Regex::new(r"(?i)(\d{3})k").unwrap(),
            Regex::new(r"(?i)(\d{3})\s*kbps").unwrap(),
        ]
    })
}

pub fn parse_bitrate_from_filename(name: &str) -> Option<u32> {
    for pattern in bitrate_patterns() {
        if let Some(caps) = pattern.captures(name) {
            if let Some(m) = caps.get(1) {
                if let Ok(value) = m.as_str().parse::<u32>() {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// Runs every one of the seven checkpoints against a single group and
/// returns the accumulated results. Does not short-circuit: every
/// checkpoint runs even after an earlier one fails, since an operator
/// reviewing a rejected group wants to see every problem at once.
pub fn validate_group(group: &DeletionGroup) -> Vec<ValidationResult> {
    use serde_json::json;

    let mut results = Vec::new();

    // 1. Keeper exists.
    let keeper_path = group.keeper.as_path();
    if group.keeper.file_path().trim().is_empty() || !keeper_path.is_file() {
        results.push(ValidationResult::error("keeper_exists", format!("keeper {} does not exist", group.keeper.file_path())));
    } else {
        let size_bytes = std::fs::metadata(keeper_path).map(|m| m.len()).unwrap_or(0);
        results.push(
            ValidationResult::info("keeper_exists", format!("Keep file validated: {}", group.keeper.filename()))
                .with_details(json!({ "keep_file": group.keeper.file_path(), "size_bytes": size_bytes })),
        );
    }

    // 2. Deletions non-empty.
    if group.deletes.is_empty() {
        results.push(ValidationResult::error("deletions_non_empty", "group has no files to delete"));
    } else {
        results.push(
            ValidationResult::info("deletions_non_empty", format!("{} file(s) marked for deletion", group.deletes.len()))
                .with_details(json!({ "delete_count": group.deletes.len() })),
        );
    }

    // 3. Quality sanity: a delete file with a higher filename-parsed
    // bitrate than the keeper is a foot-gun, but never blocks the plan.
    let keeper_bitrate = parse_bitrate_from_filename(group.keeper.filename());
    let mut any_quality_warning = false;
    for delete in &group.deletes {
        if let (Some(keeper_kbps), Some(delete_kbps)) = (keeper_bitrate, parse_bitrate_from_filename(delete.filename())) {
            if delete_kbps > keeper_kbps {
                any_quality_warning = true;
                results.push(ValidationResult::warning(
                    "quality_sanity",
                    format!(
                        "{} appears to be {delete_kbps}kbps, higher than keeper's {keeper_kbps}kbps",
                        delete.filename()
                    ),
                ));
            }
        }
    }
    if !any_quality_warning {
        results.push(ValidationResult::info("quality_sanity", "No higher quality files being deleted").with_details(json!({})));
    }

    // 4. Delete paths exist.
    let mut missing: HashSet<&str> = HashSet::new();
    let mut any_missing = false;
    for delete in &group.deletes {
        if !delete.as_path().is_file() {
            any_missing = true;
            missing.insert(delete.file_path());
            results.push(ValidationResult::error("delete_paths_exist", format!("{} does not exist", delete.file_path())));
        }
    }
    if !any_missing {
        results.push(
            ValidationResult::info("delete_paths_exist", format!("All {} file(s) to delete verified", group.deletes.len()))
                .with_details(json!({ "verified_count": group.deletes.len() })),
        );
    }

    // 5. Not self-deletion, after path resolution.
    let keeper_resolved = std::fs::canonicalize(keeper_path).unwrap_or_else(|_| keeper_path.to_path_buf());
    let mut any_self_deletion = false;
    for delete in &group.deletes {
        let delete_resolved = std::fs::canonicalize(delete.as_path()).unwrap_or_else(|_| delete.as_path().to_path_buf());
        if delete_resolved == keeper_resolved {
            any_self_deletion = true;
            results.push(ValidationResult::error(
                "not_self_deletion",
                format!("{} resolves to the same file as the keeper", delete.file_path()),
            ));
        }
    }
    if !any_self_deletion {
        results.push(
            ValidationResult::info("not_self_deletion", "Keep file will be preserved")
                .with_details(json!({ "keep_file": group.keeper.file_path() })),
        );
    }

    // 6. Permissions: parent writable and file itself writable, skipping
    // files checkpoint 4 already flagged missing.
    let mut any_permission_error = false;
    for delete in &group.deletes {
        if missing.contains(delete.file_path()) {
            continue;
        }
        if !is_writable(delete.as_path()) {
            any_permission_error = true;
            results.push(ValidationResult::error("permissions", format!("{} is not writable", delete.file_path())));
        }
    }
    if !any_permission_error {
        results.push(ValidationResult::info("permissions", "All file permissions verified").with_details(json!({ "permissions_ok": true })));
    }

    // 7. Backup space: warning only, never blocks, degrades gracefully on
    // any I/O error computing free space.
    if let Some(first) = group.deletes.first() {
        let parent = first.as_path().parent().unwrap_or(Path::new("."));
        let total_size: i64 = group.deletes.iter().map(LibraryFile::file_size).sum();
        let needed = 2 * total_size;
        match available_space(parent) {
            Ok(free) if (free as i64) < needed => {
                results.push(ValidationResult::warning(
                    "backup_space",
                    format!("only {free} bytes free, plan needs ~{needed} for a safe backup"),
                ));
            }
            Ok(_) => {
                results.push(
                    ValidationResult::info("backup_space", "Sufficient disk space for backup")
                        .with_details(json!({ "total_size": total_size })),
                );
            }
            Err(e) => {
                warn!("could not determine free space near {}: {e}", parent.display());
            }
        }
    } else {
        results.push(ValidationResult::info("backup_space", "Sufficient disk space for backup").with_details(json!({ "total_size": 0 })));
    }

    results
}

fn is_writable(path: &Path) -> bool {
    let file_writable = std::fs::metadata(path).map(|m| !m.permissions().readonly()).unwrap_or(false);
    let parent_writable = path
        .parent()
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false);
    file_writable && parent_writable
}

fn available_space(path: &Path) -> std::io::Result<u64> {
    fs4::available_space(path)
}

pub fn group_is_executable(results: &[ValidationResult]) -> bool {
    !results.iter().any(ValidationResult::is_blocking)
}

/// Builds a plan from pre-grouped keeper/delete sets, running the
/// validator over every group up front so the caller can inspect
/// `validation_results` before deciding whether to execute.
pub fn build_plan(groups: Vec<(LibraryFile, Vec<LibraryFile>, String)>, dry_run: bool) -> (DeletionPlan, Vec<Vec<ValidationResult>>) {
    let created_at = Utc::now();
    let mut deletion_groups = Vec::with_capacity(groups.len());
    let mut all_results = Vec::with_capacity(groups.len());

    for (keeper, deletes, reason) in groups {
        let group = DeletionGroup::new(keeper, deletes, reason, created_at);
        let results = validate_group(&group);
        all_results.push(results);
        deletion_groups.push(group);
    }

    (DeletionPlan::new(deletion_groups, dry_run), all_results)
}

/// Re-derives a quality score for an already-indexed file by re-reading
/// its tags from disk. The Store only persists what the Quality Scorer
/// needs to rank duplicates (format, size, mtime), not the full
/// `AudioProperties` set, so the Planner pays this re-read cost once per
/// file at plan-build time rather than widening the schema for a value
/// only the Planner consumes.
fn score_library_file(file: &LibraryFile) -> u8 {
    let tags = read_raw_tags(file.as_path()).unwrap_or_default();
    let props = AudioProperties {
        file_format: file.file_format().to_string(),
        bitrate_kbps: tags.bitrate_kbps,
        sample_rate: tags.sample_rate_hz,
        channels: tags.channels,
        bitrate_mode: tags.bitrate_mode,
        duration: file.duration(),
        file_size: file.file_size(),
    };
    calculate_quality_score(&props, file.file_mtime())
}

/// Clusters an already-indexed, active library by exact-match axis and
/// ranks each cluster into a keeper + deletion candidates. Metadata-hash
/// clusters are considered first; any file left over (a singleton on the
/// metadata axis) is then clustered by content hash, since two files
/// with different tags but identical audio bytes are still duplicates.
pub fn group_duplicates_in_library(files: &[LibraryFile]) -> Vec<(LibraryFile, Vec<LibraryFile>, String)> {
    let mut groups = Vec::new();
    let mut claimed: HashSet<&str> = HashSet::new();

    let mut by_metadata: std::collections::HashMap<&str, Vec<&LibraryFile>> = std::collections::HashMap::new();
    for file in files {
        by_metadata.entry(file.metadata_hash()).or_default().push(file);
    }

    for cluster in by_metadata.values().filter(|c| c.len() > 1) {
        let (keeper, deletes) = rank_duplicate_group(cluster, |f| score_library_file(*f), |f| f.file_size());
        for f in cluster {
            claimed.insert(f.file_path());
        }
        groups.push((keeper.clone(), deletes.into_iter().cloned().collect(), "exact_metadata".to_string()));
    }

    let mut by_content: std::collections::HashMap<&str, Vec<&LibraryFile>> = std::collections::HashMap::new();
    for file in files {
        if claimed.contains(file.file_path()) {
            continue;
        }
        by_content.entry(file.file_content_hash()).or_default().push(file);
    }

    for cluster in by_content.values().filter(|c| c.len() > 1) {
        let (keeper, deletes) = rank_duplicate_group(cluster, |f| score_library_file(*f), |f| f.file_size());
        groups.push((keeper.clone(), deletes.into_iter().cloned().collect(), "exact_file".to_string()));
    }

    groups
}

#[derive(Debug, Default, Clone)]
pub struct DeletionStats {
    pub groups_total: usize,
    pub groups_succeeded: usize,
    pub groups_failed: usize,
    pub files_deleted: usize,
    pub files_failed: usize,
    pub bytes_freed: i64,
    pub backup_dir: Option<PathBuf>,
    pub errors: Vec<(String, String)>,
    pub cancelled: bool,
}

/// Executes every group in `plan` against `backup_root`, in order,
/// stopping early only on cancellation (checked between groups, never
/// mid-group, so a backup-then-delete pair always completes together).
pub struct DeletionPlanner<'a> {
    validations: &'a [Vec<ValidationResult>],
}

impl<'a> DeletionPlanner<'a> {
    pub fn new(validations: &'a [Vec<ValidationResult>]) -> Self {
        Self { validations }
    }

    pub fn execute(
        &self,
        plan: &DeletionPlan,
        backup_root: &Path,
        progress: &dyn ProgressSink,
        mut should_cancel: impl FnMut() -> bool,
    ) -> Result<DeletionStats, PlannerError> {
        let mut stats = DeletionStats { groups_total: plan.groups.len(), ..Default::default() };

        if plan.groups.is_empty() {
            return Ok(stats);
        }

        let backup_dir = if plan.dry_run {
            None
        } else {
            let dir = backup_root.join(format!("backup_{}", Utc::now().format("%Y%m%d_%H%M%S")));
            create_backup_dir(&dir)?;
            Some(dir)
        };
        stats.backup_dir = backup_dir.clone();

        progress.set_length(plan.groups.len() as u64);

        for (index, group) in plan.groups.iter().enumerate() {
            if should_cancel() {
                stats.cancelled = true;
                break;
            }

            let results = &self.validations[index];
            if !group_is_executable(results) {
                stats.groups_failed += 1;
                stats.errors.push((group.group_id.clone(), "group failed validation, skipped entirely".to_string()));
                progress.inc(1);
                continue;
            }

            let mut group_had_failure = false;

            for delete in &group.deletes {
                match self.process_one(delete, backup_dir.as_deref(), plan.dry_run) {
                    Ok(()) => {
                        stats.files_deleted += 1;
                        stats.bytes_freed += delete.file_size();
                    }
                    Err(e) => {
                        group_had_failure = true;
                        stats.files_failed += 1;
                        stats.errors.push((delete.file_path().to_string(), e.to_string()));
                        warn!("{}: {e}", delete.file_path());
                    }
                }
            }

            if group_had_failure {
                stats.groups_failed += 1;
            } else {
                stats.groups_succeeded += 1;
            }

            progress.inc(1);
        }

        info!(
            "deletion plan executed: {}/{} groups succeeded, {} files deleted, {} bytes freed{}",
            stats.groups_succeeded,
            stats.groups_total,
            stats.files_deleted,
            stats.bytes_freed,
            if plan.dry_run { " (dry run)" } else { "" }
        );

        Ok(stats)
    }

    /// Backs up then deletes one file. In dry-run mode, both phases are
    /// simulated (existence is re-checked, nothing is copied or removed)
    /// but the caller still counts it as a successful "would-have" delete.
    fn process_one(&self, file: &LibraryFile, backup_dir: Option<&Path>, dry_run: bool) -> Result<(), PlannerError> {
        let path = file.as_path();
        if !path.is_file() {
            return Err(PlannerError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "file vanished before execution")));
        }

        if dry_run {
            return Ok(());
        }

        let backup_dir = backup_dir.expect("real execution always has a backup dir");
        backup_one(path, backup_dir)?;
        std::fs::remove_file(path)?;
        Ok(())
    }
}

fn create_backup_dir(dir: &Path) -> Result<(), PlannerError> {
    std::fs::create_dir_all(dir).map_err(|_| PlannerError::BackupRootCreation(dir.to_path_buf()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700));
    }

    Ok(())
}

/// Copies `source` into `backup_dir`, disambiguating filename collisions
/// with a numeric `_{n}` suffix before the extension.
fn backup_one(source: &Path, backup_dir: &Path) -> Result<PathBuf, PlannerError> {
    let destination = unique_destination(source, backup_dir);
    std::fs::copy(source, &destination)?;
    Ok(destination)
}

fn unique_destination(source: &Path, backup_dir: &Path) -> PathBuf {
    let file_name = source.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("file"));
    let stem = source.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "file".to_string());
    let ext = source.extension().map(|e| e.to_string_lossy().into_owned());

    let mut candidate = backup_dir.join(&file_name);
    let mut n = 1;
    while candidate.exists() {
        let name = match &ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        candidate = backup_dir.join(name);
        n += 1;
    }
    candidate
}

/// JSON snapshot of the plan (groups + validation_results), exportable at
/// any time regardless of whether the plan has been executed yet.
pub fn export_plan_json(plan: &DeletionPlan, validations: &[Vec<ValidationResult>]) -> Result<String, serde_json::Error> {
    #[derive(serde::Serialize)]
    struct GroupSnapshot<'a> {
        group_id: &'a str,
        keeper: &'a LibraryFile,
        deletes: &'a [LibraryFile],
        reason: &'a str,
        validation_results: &'a [ValidationResult],
    }

    #[derive(serde::Serialize)]
    struct PlanSnapshot<'a> {
        created_at: chrono::DateTime<Utc>,
        dry_run: bool,
        groups: Vec<GroupSnapshot<'a>>,
    }

    let groups = plan
        .groups
        .iter()
        .zip(validations)
        .map(|(group, results)| GroupSnapshot {
            group_id: &group.group_id,
            keeper: &group.keeper,
            deletes: &group.deletes,
            reason: &group.reason,
            validation_results: results,
        })
        .collect();

    serde_json::to_string_pretty(&PlanSnapshot { created_at: plan.created_at, dry_run: plan.dry_run, groups })
}

/// One row per KEEP/DELETE action, mirroring the JSON snapshot's content
/// without pulling in a `csv` crate dependency for a handful of
/// comma-joined fields.
pub fn export_session_csv(plan: &DeletionPlan, stats: &DeletionStats) -> String {
    let mut out = String::from("group_id,action,path,file_size,reason\n");
    for group in &plan.groups {
        out.push_str(&format!("{},KEEP,{},{},{}\n", group.group_id, csv_escape(group.keeper.file_path()), group.keeper.file_size(), csv_escape(&group.reason)));
        for delete in &group.deletes {
            out.push_str(&format!("{},DELETE,{},{},{}\n", group.group_id, csv_escape(delete.file_path()), delete.file_size(), csv_escape(&group.reason)));
        }
    }
    out.push_str(&format!(
        "# summary,groups_total={},groups_succeeded={},groups_failed={},files_deleted={},bytes_freed={}\n",
        stats.groups_total, stats.groups_succeeded, stats.groups_failed, stats.files_deleted, stats.bytes_freed
    ));
    out
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::library_file::NewLibraryFile;
    use tempfile::tempdir;

    fn file_at(path: &Path, size: i64) -> LibraryFile {
        LibraryFile::new(NewLibraryFile {
            file_path: path.to_path_buf(),
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
    fn parses_known_bitrate_patterns() {
        assert_eq!(parse_bitrate_from_filename("Song - 320kbps.mp3"), Some(320));
        assert_eq!(parse_bitrate_from_filename("Song 128k.mp3"), Some(128));
        assert_eq!(parse_bitrate_from_filename("Song.mp3"), None);
    }

    #[test]
    fn self_deletion_is_blocked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.mp3");
        std::fs::write(&path, b"data").unwrap();

        let keeper = file_at(&path, 4);
        let delete = file_at(&path, 4);
        let group = DeletionGroup::new(keeper, vec![delete], "dup", Utc::now());

        let results = validate_group(&group);
        assert!(results.iter().any(|r| r.checkpoint == "not_self_deletion" && r.is_blocking()));
        assert!(!group_is_executable(&results));
    }

    #[test]
    fn missing_delete_target_is_an_error() {
        let dir = tempdir().unwrap();
        let keeper_path = dir.path().join("keep.mp3");
        std::fs::write(&keeper_path, b"data").unwrap();

        let keeper = file_at(&keeper_path, 4);
        let delete = file_at(&dir.path().join("gone.mp3"), 4);
        let group = DeletionGroup::new(keeper, vec![delete], "dup", Utc::now());

        let results = validate_group(&group);
        assert!(results.iter().any(|r| r.checkpoint == "delete_paths_exist"));
        assert!(!group_is_executable(&results));
    }

    #[test]
    fn valid_group_executes_and_backs_up_before_deleting() {
        let dir = tempdir().unwrap();
        let keeper_path = dir.path().join("keep.flac");
        let delete_path = dir.path().join("dup.mp3");
        std::fs::write(&keeper_path, b"keeper-bytes").unwrap();
        std::fs::write(&delete_path, b"dup-bytes").unwrap();

        let keeper = file_at(&keeper_path, 12);
        let delete = file_at(&delete_path, 9);
        let group = DeletionGroup::new(keeper, vec![delete], "exact_file", Utc::now());
        let validations = vec![validate_group(&group)];
        assert!(group_is_executable(&validations[0]));

        let plan = DeletionPlan::new(vec![group], false);
        let planner = DeletionPlanner::new(&validations);
        let backup_root = tempdir().unwrap();

        let stats = planner.execute(&plan, backup_root.path(), &crate::progress::NoOpProgressSink, || false).unwrap();

        assert_eq!(stats.files_deleted, 1);
        assert_eq!(stats.groups_succeeded, 1);
        assert!(!delete_path.exists());
        assert!(keeper_path.exists());

        let backup_dir = stats.backup_dir.unwrap();
        assert!(backup_dir.join("dup.mp3").exists());
    }

    #[test]
    fn dry_run_counts_without_touching_the_filesystem() {
        let dir = tempdir().unwrap();
        let keeper_path = dir.path().join("keep.flac");
        let delete_path = dir.path().join("dup.mp3");
        std::fs::write(&keeper_path, b"keeper-bytes").unwrap();
        std::fs::write(&delete_path, b"dup-bytes").unwrap();

        let keeper = file_at(&keeper_path, 12);
        let delete = file_at(&delete_path, 9);
        let group = DeletionGroup::new(keeper, vec![delete], "exact_file", Utc::now());
        let validations = vec![validate_group(&group)];

        let plan = DeletionPlan::new(vec![group], true);
        let planner = DeletionPlanner::new(&validations);
        let backup_root = tempdir().unwrap();

        let stats = planner.execute(&plan, backup_root.path(), &crate::progress::NoOpProgressSink, || false).unwrap();

        assert_eq!(stats.files_deleted, 1);
        assert!(delete_path.exists(), "dry run must not delete anything");
        assert!(stats.backup_dir.is_none());
    }

    #[test]
    fn a_passing_group_records_an_info_result_per_checkpoint_with_details() {
        let dir = tempdir().unwrap();
        let keeper_path = dir.path().join("keep.flac");
        let delete_path = dir.path().join("dup.mp3");
        std::fs::write(&keeper_path, b"keeper-bytes").unwrap();
        std::fs::write(&delete_path, b"dup-bytes").unwrap();

        let keeper = file_at(&keeper_path, 12);
        let delete = file_at(&delete_path, 9);
        let group = DeletionGroup::new(keeper, vec![delete], "exact_file", Utc::now());

        let results = validate_group(&group);
        assert!(group_is_executable(&results));

        for checkpoint in [
            "keeper_exists",
            "deletions_non_empty",
            "quality_sanity",
            "delete_paths_exist",
            "not_self_deletion",
            "permissions",
        ] {
            let info = results
                .iter()
                .find(|r| r.checkpoint == checkpoint && r.level == ValidationLevel::Info)
                .unwrap_or_else(|| panic!("expected an info result for {checkpoint}"));
            assert!(!info.message.is_empty());
        }

        let keeper_info = results.iter().find(|r| r.checkpoint == "keeper_exists" && r.level == ValidationLevel::Info).unwrap();
        assert_eq!(keeper_info.details["size_bytes"], 12);
    }

    #[test]
    fn a_group_with_a_blocking_error_is_skipped_entirely() {
        let dir = tempdir().unwrap();
        let keeper_path = dir.path().join("keep.mp3");
        std::fs::write(&keeper_path, b"data").unwrap();

        let keeper = file_at(&keeper_path, 4);
        let missing_delete = file_at(&dir.path().join("gone.mp3"), 4);
        let group = DeletionGroup::new(keeper, vec![missing_delete], "dup", Utc::now());
        let validations = vec![validate_group(&group)];
        assert!(!group_is_executable(&validations[0]));

        let plan = DeletionPlan::new(vec![group], false);
        let planner = DeletionPlanner::new(&validations);
        let backup_root = tempdir().unwrap();

        let stats = planner.execute(&plan, backup_root.path(), &crate::progress::NoOpProgressSink, || false).unwrap();

        assert_eq!(stats.files_deleted, 0);
        assert_eq!(stats.groups_failed, 1);
    }
}
