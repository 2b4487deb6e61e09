//! Walks a directory tree, tags every audio file it finds, and reconciles
//! the result against the Store: new paths are inserted, changed paths
//! are re-tagged and updated, unchanged paths are skipped without
//! touching the filesystem or the tag reader again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{info, warn};
use rayon::prelude::*;
use thiserror::Error;
use walkdir::WalkDir;

use crate::collaborators::{read_raw_tags, RawTags};
use crate::domain::library_file::NewLibraryFile;
use crate::domain::LibraryFile;
use crate::fingerprint::{content_fingerprint, metadata_fingerprint, FingerprintError};
use crate::progress::ProgressSink;
use crate::store::{LibraryStore, StoreError};

pub const DEFAULT_BATCH_SIZE: usize = 300;
const MIN_VALID_YEAR: i32 = 1000;
const MAX_VALID_YEAR: i32 = 9999;

const SUPPORTED_AUDIO_FORMATS: [&str; 8] = ["mp3", "flac", "m4a", "wav", "ogg", "opus", "aiff", "aif"];

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("root directory {0} does not exist or is not a directory")]
    InvalidRoot(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
}

/// Non-fatal problem hit while scanning a single entry. Collected
/// alongside successful descriptors rather than aborting the walk.
#[derive(Debug, Error)]
pub enum ScanWarning {
    #[error("walkdir error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("could not read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

#[derive(Debug, Default)]
pub struct IndexReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub duration: f64,
}

pub struct Indexer<'a> {
    store: &'a LibraryStore,
    batch_size: usize,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a LibraryStore) -> Self {
        Self { store, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Incremental pass: unchanged `(mtime, size)` pairs are skipped
    /// without re-reading tags. Pass `force_rescan = true` to ignore that
    /// skip decision and re-tag every file regardless of whether it
    /// looks unchanged.
    pub async fn index_library(
        &self,
        root: &Path,
        force_rescan: bool,
        progress: &dyn ProgressSink,
    ) -> Result<IndexReport, IndexError> {
        let started = Instant::now();

        if !root.is_dir() {
            return Err(IndexError::InvalidRoot(root.to_path_buf()));
        }

        let (candidates, scan_warnings) = scan_directory(root);
        for warning in &scan_warnings {
            warn!("{warning}");
        }

        progress.set_length(candidates.len() as u64);

        let mut report = IndexReport::default();
        let mut pending_inserts: Vec<NewLibraryFile> = Vec::new();
        let mut pending_updates: Vec<(i64, NewLibraryFile)> = Vec::new();

        for chunk in candidates.chunks(self.batch_size) {
            let paths: Vec<String> = chunk.iter().map(|p| p.to_string_lossy().into_owned()).collect();
            let existing = self.store.batch_get_files_by_paths(&paths).await?;

            // Cheap stat-and-skip pass stays sequential; only the files that
            // actually need re-tagging (the expensive tag read + content
            // hash) are handed to rayon below.
            let mut to_extract: Vec<(&PathBuf, Option<i64>, DateTime<Utc>, i64)> = Vec::new();
            for path in chunk {
                let path_str = path.to_string_lossy().into_owned();

                let metadata = match std::fs::metadata(path) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("skipping {}: {e}", path.display());
                        report.errors += 1;
                        progress.inc(1);
                        continue;
                    }
                };
                let mtime: DateTime<Utc> = metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
                let size = metadata.len() as i64;

                if !force_rescan {
                    if let Some(existing_file) = existing.get(&path_str) {
                        if is_file_unchanged(existing_file, mtime, size) {
                            report.skipped += 1;
                            progress.inc(1);
                            continue;
                        }
                    }
                }

                let existing_id = existing.get(&path_str).map(|f| f.id().expect("persisted row has id"));
                to_extract.push((path, existing_id, mtime, size));
            }

            // Tag reading and content hashing are the expensive, CPU/IO-bound
            // step; rayon fans them out across the pool's worker threads
            // while this async task keeps ownership of every Store write.
            let extracted: Vec<(&Path, Option<i64>, Result<NewLibraryFile, FingerprintError>)> = to_extract
                .par_iter()
                .map(|&(path, existing_id, mtime, size)| (path.as_path(), existing_id, extract_fields(path, size, mtime)))
                .collect();

            for (path, existing_id, result) in extracted {
                let fresh = match result {
                    Ok(fields) => fields,
                    Err(e) => {
                        warn!("failed to extract metadata for {}: {e}", path.display());
                        report.errors += 1;
                        progress.inc(1);
                        continue;
                    }
                };

                match existing_id {
                    Some(id) => pending_updates.push((id, fresh)),
                    None => pending_inserts.push(fresh),
                }

                progress.inc(1);
            }

            report.added += self.flush_inserts(&mut pending_inserts, &mut report.errors).await?;
            report.updated += self.flush_updates(&mut pending_updates).await?;
        }

        report.added += self.flush_inserts(&mut pending_inserts, &mut report.errors).await?;
        report.updated += self.flush_updates(&mut pending_updates).await?;

        report.duration = started.elapsed().as_secs_f64();
        info!(
            "indexed {}: {} added, {} updated, {} skipped, {} errors in {:.2}s",
            root.display(),
            report.added,
            report.updated,
            report.skipped,
            report.errors,
            report.duration
        );

        Ok(report)
    }

    async fn flush_inserts(&self, pending: &mut Vec<NewLibraryFile>, errors: &mut usize) -> Result<usize, IndexError> {
        if pending.is_empty() {
            return Ok(0);
        }

        let mut files = Vec::with_capacity(pending.len());
        for params in std::mem::take(pending) {
            match LibraryFile::new(params) {
                Ok(file) => files.push(file),
                Err(e) => {
                    warn!("rejected a scanned file at the validation boundary: {e}");
                    *errors += 1;
                }
            }
        }

        let report = self.store.batch_add_files(&files).await?;
        for outcome in report.failed() {
            warn!("failed to persist scanned file (batch index {}): {}", outcome.batch_index, outcome.result.as_ref().unwrap_err());
            *errors += 1;
        }
        Ok(report.successful_ids().len())
    }

    async fn flush_updates(&self, pending: &mut Vec<(i64, NewLibraryFile)>) -> Result<usize, IndexError> {
        if pending.is_empty() {
            return Ok(0);
        }

        let mut updated = 0;
        for (id, fresh) in std::mem::take(pending) {
            let mut columns = HashMap::new();
            columns.insert("artist", crate::store::ColumnUpdate::Text(fresh.artist.clone()));
            columns.insert("title", crate::store::ColumnUpdate::Text(fresh.title.clone()));
            columns.insert("album", crate::store::ColumnUpdate::Text(fresh.album.clone()));
            columns.insert("year", crate::store::ColumnUpdate::Int(fresh.year.map(|y| y as i64)));
            columns.insert("duration", crate::store::ColumnUpdate::Float(fresh.duration));
            columns.insert("file_format", crate::store::ColumnUpdate::Text(Some(fresh.file_format.clone())));
            columns.insert("file_size", crate::store::ColumnUpdate::Int(Some(fresh.file_size)));
            columns.insert("metadata_hash", crate::store::ColumnUpdate::Text(Some(fresh.metadata_hash.clone())));
            columns.insert("file_content_hash", crate::store::ColumnUpdate::Text(Some(fresh.file_content_hash.clone())));
            columns.insert("file_mtime", crate::store::ColumnUpdate::Timestamp(Some(fresh.file_mtime)));

            self.store.update_file(id, columns).await?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Confirms every active indexed path still exists on disk, soft
    /// deleting any that don't. Returns the paths found missing.
    pub async fn verify(&self) -> Result<Vec<String>, IndexError> {
        let active = self.store.get_all_files(true).await?;
        let missing: Vec<String> = active
            .iter()
            .filter(|f| !Path::new(f.file_path()).exists())
            .map(|f| f.file_path().to_string())
            .collect();

        if !missing.is_empty() {
            self.store.batch_mark_inactive(&missing).await?;
        }

        Ok(missing)
    }
}

/// A changed path is always re-tagged rather than trusted: mtime/size
/// drift is the cheapest signal available but stat errors must force a
/// rescan rather than silently keep stale metadata.
fn is_file_unchanged(existing: &LibraryFile, mtime: DateTime<Utc>, size: i64) -> bool {
    existing.file_mtime() == mtime && existing.file_size() == size
}

fn scan_directory(root: &Path) -> (Vec<PathBuf>, Vec<ScanWarning>) {
    let mut candidates = Vec::new();
    let mut warnings = Vec::new();

    let walker = WalkDir::new(root).min_depth(1).follow_links(false).sort_by_file_name();

    for entry in walker {
        match entry {
            Err(e) => warnings.push(ScanWarning::Walk(e)),
            Ok(entry) => {
                let path = entry.path();

                if is_hidden(entry.file_name()) {
                    continue;
                }
                if path.is_dir() {
                    continue;
                }
                if is_supported_format(path) {
                    candidates.push(path.to_path_buf());
                }
            }
        }
    }

    (candidates, warnings)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

fn is_supported_format(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_AUDIO_FORMATS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Clamps a tag-reported year to `None` (with a warning) rather than
/// letting an out-of-range value reach `LibraryFile::new`'s validation
/// boundary, per the boundary behavior "year outside 1000-9999 stored as
/// null, warning logged" rather than the whole file being dropped.
fn sanitize_year(year: Option<i32>, path: &Path) -> Option<i32> {
    match year {
        Some(y) if !(MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&y) => {
            warn!("{}: year {y} is out of range, storing as null", path.display());
            None
        }
        other => other,
    }
}

fn sanitize_duration(duration: Option<f64>, path: &Path) -> Option<f64> {
    match duration {
        Some(d) if d < 0.0 => {
            warn!("{}: negative duration {d}, storing as null", path.display());
            None
        }
        other => other,
    }
}

fn extract_fields(path: &Path, file_size: i64, mtime: DateTime<Utc>) -> Result<NewLibraryFile, FingerprintError> {
    let RawTags { artist, title, album, year, duration, .. } = read_raw_tags(path).unwrap_or_else(|e| {
        warn!("{}: tag read failed, indexing with blank metadata: {e}", path.display());
        RawTags::default()
    });

    let year = sanitize_year(year, path);
    let duration = sanitize_duration(duration, path);

    let file_format = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("unknown")
        .to_lowercase();

    let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
    let metadata_hash = metadata_fingerprint(artist.as_deref(), title.as_deref(), filename.as_deref());
    let file_content_hash = content_fingerprint(path)?.as_key();

    Ok(NewLibraryFile {
        file_path: path.to_path_buf(),
        artist,
        title,
        album,
        year,
        duration,
        file_format,
        file_size,
        metadata_hash,
        file_content_hash,
        file_mtime: mtime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_supported_extensions_case_insensitively() {
        assert!(is_supported_format(Path::new("/music/a.MP3")));
        assert!(is_supported_format(Path::new("/music/a.flac")));
        assert!(!is_supported_format(Path::new("/music/a.txt")));
    }

    #[test]
    fn unchanged_file_requires_both_mtime_and_size_to_match() {
        use crate::domain::library_file::NewLibraryFile;
        let mtime = Utc::now();
        let file = LibraryFile::new(NewLibraryFile {
            file_path: PathBuf::from("/music/a.mp3"),
            artist: None,
            title: None,
            album: None,
            year: None,
            duration: None,
            file_format: "mp3".to_string(),
            file_size: 100,
            metadata_hash: "h".to_string(),
            file_content_hash: "c".to_string(),
            file_mtime: mtime,
        })
        .unwrap();

        assert!(is_file_unchanged(&file, mtime, 100));
        assert!(!is_file_unchanged(&file, mtime, 101));
    }

    #[test]
    fn sanitize_year_nulls_out_of_range_values() {
        let path = Path::new("/music/a.mp3");
        assert_eq!(sanitize_year(Some(50), path), None);
        assert_eq!(sanitize_year(Some(2020), path), Some(2020));
        assert_eq!(sanitize_year(None, path), None);
    }

    #[test]
    fn sanitize_duration_nulls_negative_values() {
        let path = Path::new("/music/a.mp3");
        assert_eq!(sanitize_duration(Some(-1.0), path), None);
        assert_eq!(sanitize_duration(Some(120.0), path), Some(120.0));
    }
}
