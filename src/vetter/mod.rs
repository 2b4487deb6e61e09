//! The Vetter (C5): runs the Detector over every file in an import
//! folder, partitions the results into new/duplicate/uncertain buckets,
//! and persists a session summary. Grounded on
//! `original_source/library/vetter.py::ImportVetter`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use log::warn;
use thiserror::Error;
use walkdir::WalkDir;

use crate::collaborators::{read_raw_tags, RawTags};
use crate::detector::{Detector, DetectorError, DEFAULT_FUZZY_THRESHOLD};
use crate::domain::library_file::NewLibraryFile;
use crate::domain::vetting::{VettedMatch, VettingReport};
use crate::domain::{LibraryFile, ValidationError};
use crate::fingerprint::{content_fingerprint, metadata_fingerprint, FingerprintError};
use crate::progress::ProgressSink;
use crate::store::{LibraryStore, StoreError};

const SUPPORTED_AUDIO_FORMATS: [&str; 8] = ["mp3", "flac", "m4a", "wav", "ogg", "opus", "aiff", "aif"];

#[derive(Debug, Error)]
pub enum VetterError {
    #[error("import folder {0} does not exist or is not a directory")]
    InvalidImportFolder(PathBuf),

    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Vetter<'a> {
    store: &'a LibraryStore,
}

impl<'a> Vetter<'a> {
    pub fn new(store: &'a LibraryStore) -> Self {
        Self { store }
    }

    /// Walks `import_folder`, classifies every supported audio file
    /// against the index, and partitions results into duplicates/new/
    /// uncertain. Categorization order matters: a verdict's uncertain
    /// band is checked *before* `is_duplicate`, so a borderline fuzzy
    /// match never lands directly in the duplicates bucket.
    pub async fn vet_folder(
        &self,
        import_folder: &Path,
        fuzzy_threshold: f64,
        use_fuzzy: bool,
        use_content_hash: bool,
        progress: &dyn ProgressSink,
    ) -> Result<VettingReport, VetterError> {
        let started = Instant::now();

        if !import_folder.is_dir() {
            return Err(VetterError::InvalidImportFolder(import_folder.to_path_buf()));
        }

        let candidates = scan_import_folder(import_folder);
        progress.set_length(candidates.len() as u64);

        let detector = Detector::new(self.store);

        let mut duplicates = Vec::new();
        let mut new_songs = Vec::new();
        let mut uncertain = Vec::new();
        let mut total_files = 0i64;

        for path in &candidates {
            progress.set_message(&path.display().to_string());

            match build_candidate(path) {
                Ok(candidate) => {
                    total_files += 1;
                    let verdict = detector.check_file(&candidate, fuzzy_threshold, use_fuzzy, use_content_hash).await?;

                    if verdict.is_uncertain() {
                        uncertain.push(VettedMatch { candidate, verdict });
                    } else if verdict.is_duplicate {
                        duplicates.push(VettedMatch { candidate, verdict });
                    } else {
                        new_songs.push(candidate);
                    }
                }
                Err(e) => {
                    warn!("{}: could not extract candidate fingerprint, skipping: {e}", path.display());
                }
            }

            progress.inc(1);
        }

        progress.finish("vetting complete");

        let report = VettingReport {
            import_folder: import_folder.to_string_lossy().into_owned(),
            total_files,
            threshold: fuzzy_threshold,
            duplicates,
            new_songs,
            uncertain,
            scan_duration: started.elapsed().as_secs_f64(),
            vetted_at: Utc::now(),
        };

        if let Err(e) = self.persist(&report).await {
            warn!("failed to persist vetting session (vetting itself still succeeded): {e}");
        }

        Ok(report)
    }

    async fn persist(&self, report: &VettingReport) -> Result<(), VetterError> {
        let session = report.to_session().map_err(|e| {
            warn!("could not build a vetting session record: {e}");
            e
        });

        if let Ok(session) = session {
            self.store.save_vetting_result(&session).await?;
        }
        Ok(())
    }

    pub async fn recent_sessions(&self, limit: i64) -> Result<Vec<crate::domain::VettingSession>, VetterError> {
        Ok(self.store.get_vetting_history(limit).await?)
    }

    /// Writes one absolute path per line to `path`, pre-checking that the
    /// parent directory is writable so a failed export surfaces before
    /// any work is wasted building the file content.
    pub fn export_new_songs(&self, report: &VettingReport, path: &Path) -> Result<(), VetterError> {
        check_writable(path)?;
        let mut out = std::fs::File::create(path)?;
        writeln!(out, "# new songs found in {}", report.import_folder)?;
        for file in &report.new_songs {
            writeln!(out, "{}", file.file_path())?;
        }
        Ok(())
    }

    pub fn export_duplicates(&self, report: &VettingReport, path: &Path) -> Result<(), VetterError> {
        check_writable(path)?;
        let mut out = std::fs::File::create(path)?;
        writeln!(out, "# duplicates found in {}", report.import_folder)?;
        for matched in &report.duplicates {
            writeln!(
                out,
                "{}\t# matches {} (confidence {:.2})",
                matched.candidate.file_path(),
                matched.verdict.matched_file.as_ref().map(LibraryFile::file_path).unwrap_or("?"),
                matched.verdict.confidence()
            )?;
        }
        Ok(())
    }

    pub fn export_uncertain(&self, report: &VettingReport, path: &Path) -> Result<(), VetterError> {
        check_writable(path)?;
        let mut out = std::fs::File::create(path)?;
        writeln!(out, "# uncertain matches found in {}", report.import_folder)?;
        for matched in &report.uncertain {
            writeln!(
                out,
                "{}\t# possible match {} (confidence {:.2})",
                matched.candidate.file_path(),
                matched.verdict.matched_file.as_ref().map(LibraryFile::file_path).unwrap_or("?"),
                matched.verdict.confidence()
            )?;
        }
        Ok(())
    }
}

/// Result of a [`Vetter::delete_duplicates`] call.
#[derive(Clone, Debug, Default)]
pub struct DeleteDuplicatesOutcome {
    pub deleted: usize,
    pub failed: usize,
    pub failures: Vec<(String, String)>,
}

impl<'a> Vetter<'a> {
    /// Deletes every candidate file in `report.duplicates`, skipping
    /// `report.uncertain` entirely — those still need a human to decide.
    /// Grounded on `original_source/library/vetter.py::delete_duplicates`:
    /// tolerant of files that vanished since the report was built, and
    /// dry-run capable (verifies existence without removing anything).
    /// Confirmation is the caller's job, the same way `Plan Execute`
    /// confirms before calling `DeletionPlanner::execute`.
    pub fn delete_duplicates(&self, report: &VettingReport, dry_run: bool, progress: &dyn ProgressSink) -> DeleteDuplicatesOutcome {
        let mut outcome = DeleteDuplicatesOutcome::default();
        if report.duplicates.is_empty() {
            return outcome;
        }

        progress.set_length(report.duplicates.len() as u64);

        for matched in &report.duplicates {
            let path_str = matched.candidate.file_path();
            let path = Path::new(path_str);
            progress.set_message(&path.display().to_string());

            if !path.exists() {
                warn!("{}: file not found (already deleted?), skipping", path.display());
                outcome.failed += 1;
                outcome.failures.push((path_str.to_string(), "file not found".to_string()));
                progress.inc(1);
                continue;
            }

            if dry_run {
                outcome.deleted += 1;
            } else {
                match std::fs::remove_file(path) {
                    Ok(()) => outcome.deleted += 1,
                    Err(e) => {
                        warn!("{}: failed to delete: {e}", path.display());
                        outcome.failed += 1;
                        outcome.failures.push((path_str.to_string(), e.to_string()));
                    }
                }
            }

            progress.inc(1);
        }

        progress.finish(if dry_run { "dry run complete" } else { "duplicate deletion complete" });
        outcome
    }
}

fn check_writable(path: &Path) -> Result<(), VetterError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let probe_writable = std::fs::metadata(parent).map(|m| !m.permissions().readonly()).unwrap_or(false);
    if !probe_writable {
        return Err(VetterError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("{} is not writable", parent.display()),
        )));
    }
    Ok(())
}

fn scan_import_folder(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|ext| SUPPORTED_AUDIO_FORMATS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
        })
        .collect()
}

/// Builds a transient, not-yet-persisted `LibraryFile` for a single
/// candidate so the Detector can compare it against the index without
/// ever writing it to the Store.
fn build_candidate(path: &Path) -> Result<LibraryFile, VetterError> {
    let metadata = std::fs::metadata(path)?;
    let mtime = metadata.modified().map(chrono::DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
    let file_size = metadata.len() as i64;

    let RawTags { artist, title, album, year, duration, .. } = read_raw_tags(path).unwrap_or_default();

    let file_format = path.extension().and_then(|e| e.to_str()).unwrap_or("unknown").to_lowercase();
    let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
    let metadata_hash = metadata_fingerprint(artist.as_deref(), title.as_deref(), filename.as_deref());
    let file_content_hash = content_fingerprint(path)?.as_key();

    let file = LibraryFile::new(NewLibraryFile {
        file_path: path.to_path_buf(),
        artist,
        title,
        album,
        year: year.filter(|y| (1000..=9999).contains(y)),
        duration: duration.filter(|d| *d >= 0.0),
        file_format,
        file_size,
        metadata_hash,
        file_content_hash,
        file_mtime: mtime,
    })?;
    Ok(file)
}

pub const DEFAULT_THRESHOLD: f64 = DEFAULT_FUZZY_THRESHOLD;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::verdict::{DuplicateVerdict, MatchType};
    use crate::progress::NoOpProgressSink;
    use crate::store::test_helpers::prepare_store;

    #[test]
    fn scan_import_folder_filters_unsupported_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let found = scan_import_folder(dir.path());
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("a.mp3"));
    }

    fn report_with_one_duplicate(candidate_path: &Path) -> VettingReport {
        let candidate = build_candidate(candidate_path).unwrap();
        let verdict = DuplicateVerdict::new(true, 0.99, MatchType::ExactFile, None, Vec::new()).unwrap();
        VettingReport {
            import_folder: candidate_path.parent().unwrap().to_string_lossy().into_owned(),
            total_files: 1,
            threshold: DEFAULT_THRESHOLD,
            duplicates: vec![VettedMatch { candidate, verdict }],
            new_songs: Vec::new(),
            uncertain: Vec::new(),
            scan_duration: 0.0,
            vetted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delete_duplicates_removes_flagged_files_and_skips_uncertain() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("dup.mp3");
        std::fs::write(&target, b"x").unwrap();

        let report = report_with_one_duplicate(&target);
        let store = prepare_store().await;
        let vetter = Vetter::new(&store);

        let outcome = vetter.delete_duplicates(&report, false, &NoOpProgressSink);
        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.failed, 0);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn delete_duplicates_dry_run_leaves_files_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("dup.mp3");
        std::fs::write(&target, b"x").unwrap();

        let report = report_with_one_duplicate(&target);
        let store = prepare_store().await;
        let vetter = Vetter::new(&store);

        let outcome = vetter.delete_duplicates(&report, true, &NoOpProgressSink);
        assert_eq!(outcome.deleted, 1);
        assert!(target.exists());
    }

    #[tokio::test]
    async fn delete_duplicates_reports_failure_for_already_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("dup.mp3");
        std::fs::write(&target, b"x").unwrap();
        let report = report_with_one_duplicate(&target);
        std::fs::remove_file(&target).unwrap();

        let store = prepare_store().await;
        let vetter = Vetter::new(&store);

        let outcome = vetter.delete_duplicates(&report, false, &NoOpProgressSink);
        assert_eq!(outcome.deleted, 0);
        assert_eq!(outcome.failed, 1);
    }
}
