pub mod similarity;

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::domain::verdict::ScoredMatch;
use crate::domain::{DuplicateVerdict, LibraryFile, MatchType, ValidationError};
use crate::fingerprint::{content_fingerprint, metadata_fingerprint, FingerprintError};
use crate::store::{HashAxis, LibraryStore, StoreError};

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

/// Case-insensitive, lowercased suffixes stripped before two titles are
/// compared. Order matters only in that each is applied once; the list
/// mirrors the reference implementation's exact set so the fuzzy
/// threshold doesn't need recalibrating against a different set.
const TITLE_ADORNMENTS: [&str; 7] = [
    " (original mix)",
    " (radio edit)",
    " (album version)",
    " (extended)",
    " [official]",
    " [hd]",
    " - remastered",
];

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("fuzzy_threshold must be between 0.0 and 1.0, got {0}")]
    ThresholdOutOfRange(f64),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub struct Detector<'a> {
    store: &'a LibraryStore,
}

impl<'a> Detector<'a> {
    pub fn new(store: &'a LibraryStore) -> Self {
        Self { store }
    }

    /// Three-tier match against the index: exact metadata hash, exact
    /// content hash, then fuzzy title similarity within same-artist
    /// candidates. Self-exclusion by resolved path applies at every
    /// tier — a file already present in the index, re-checked against
    /// itself, must never be reported as its own duplicate.
    pub async fn check_file(
        &self,
        candidate: &LibraryFile,
        fuzzy_threshold: f64,
        use_fuzzy: bool,
        use_content_hash: bool,
    ) -> Result<DuplicateVerdict, DetectorError> {
        if !(0.0..=1.0).contains(&fuzzy_threshold) {
            return Err(DetectorError::ThresholdOutOfRange(fuzzy_threshold));
        }

        let self_path = candidate.file_path();

        if let Some(exact) = self.store.get_file_by_metadata_hash(candidate.metadata_hash()).await? {
            if exact.file_path() != self_path {
                return Ok(DuplicateVerdict::new(
                    true,
                    1.0,
                    MatchType::ExactMetadata,
                    Some(exact.clone()),
                    vec![ScoredMatch { file: exact, confidence: 1.0 }],
                )?);
            }
        }

        if use_content_hash {
            if let Some(exact) = self.store.get_file_by_content_hash(candidate.file_content_hash()).await? {
                if exact.file_path() != self_path {
                    return Ok(DuplicateVerdict::new(
                        true,
                        1.0,
                        MatchType::ExactFile,
                        Some(exact.clone()),
                        vec![ScoredMatch { file: exact, confidence: 1.0 }],
                    )?);
                }
            }
        }

        if use_fuzzy {
            if let (Some(artist), Some(title)) = (candidate.artist(), candidate.title()) {
                if !artist.trim().is_empty() && !title.trim().is_empty() {
                    let candidates = self.store.search_by_artist_title(Some(artist), None).await?;
                    let matches = fuzzy_matches(candidate, &candidates, title, fuzzy_threshold);

                    if let Some((best_file, best_score)) = matches.first() {
                        let all_matches = matches
                            .iter()
                            .map(|(file, score)| ScoredMatch { file: file.clone(), confidence: *score })
                            .collect();

                        return Ok(DuplicateVerdict::new(
                            *best_score >= fuzzy_threshold,
                            *best_score,
                            MatchType::FuzzyMetadata,
                            Some(best_file.clone()),
                            all_matches,
                        )?);
                    }
                }
            }
        }

        Ok(DuplicateVerdict::none())
    }

    /// Checks many candidates against the index as a first-class batch
    /// operation: tiers 1 and 2 each issue a single `IN (...)` query over
    /// every candidate's hash rather than one round trip per candidate,
    /// and tier 3 caches `search_by_artist_title` per distinct artist. A
    /// candidate resolved at an earlier tier never reaches a later one.
    pub async fn check_batch(
        &self,
        candidates: &[LibraryFile],
        fuzzy_threshold: f64,
        use_fuzzy: bool,
        use_content_hash: bool,
    ) -> Result<Vec<(String, DuplicateVerdict)>, DetectorError> {
        if !(0.0..=1.0).contains(&fuzzy_threshold) {
            return Err(DetectorError::ThresholdOutOfRange(fuzzy_threshold));
        }

        let mut verdicts: Vec<Option<DuplicateVerdict>> = vec![None; candidates.len()];

        let metadata_hashes: Vec<String> = candidates.iter().map(|c| c.metadata_hash().to_string()).collect();
        let metadata_matches = self.store.get_batch_by_hashes(&metadata_hashes, HashAxis::Metadata).await?;

        let mut unresolved: Vec<usize> = Vec::with_capacity(candidates.len());
        for (index, candidate) in candidates.iter().enumerate() {
            let self_path = candidate.file_path();
            let hit = metadata_matches
                .get(candidate.metadata_hash())
                .and_then(|matches| matches.iter().find(|m| m.file_path() != self_path));

            match hit {
                Some(exact) => {
                    verdicts[index] = Some(DuplicateVerdict::new(
                        true,
                        1.0,
                        MatchType::ExactMetadata,
                        Some(exact.clone()),
                        vec![ScoredMatch { file: exact.clone(), confidence: 1.0 }],
                    )?);
                }
                None => unresolved.push(index),
            }
        }

        if use_content_hash && !unresolved.is_empty() {
            let content_hashes: Vec<String> = unresolved.iter().map(|&i| candidates[i].file_content_hash().to_string()).collect();
            let content_matches = self.store.get_batch_by_hashes(&content_hashes, HashAxis::Content).await?;

            let mut still_unresolved = Vec::with_capacity(unresolved.len());
            for index in unresolved {
                let candidate = &candidates[index];
                let self_path = candidate.file_path();
                let hit = content_matches
                    .get(candidate.file_content_hash())
                    .and_then(|matches| matches.iter().find(|m| m.file_path() != self_path));

                match hit {
                    Some(exact) => {
                        verdicts[index] = Some(DuplicateVerdict::new(
                            true,
                            1.0,
                            MatchType::ExactFile,
                            Some(exact.clone()),
                            vec![ScoredMatch { file: exact.clone(), confidence: 1.0 }],
                        )?);
                    }
                    None => still_unresolved.push(index),
                }
            }
            unresolved = still_unresolved;
        }

        if use_fuzzy {
            let mut artist_cache: HashMap<String, Vec<LibraryFile>> = HashMap::new();

            for index in unresolved {
                let candidate = &candidates[index];
                let (Some(artist), Some(title)) = (candidate.artist(), candidate.title()) else { continue };
                if artist.trim().is_empty() || title.trim().is_empty() {
                    continue;
                }

                let cache_key = artist.to_lowercase();
                if !artist_cache.contains_key(&cache_key) {
                    let fetched = self.store.search_by_artist_title(Some(artist), None).await?;
                    artist_cache.insert(cache_key.clone(), fetched);
                }
                let same_artist = &artist_cache[&cache_key];
                let matches = fuzzy_matches(candidate, same_artist, title, fuzzy_threshold);

                if let Some((best_file, best_score)) = matches.first() {
                    let all_matches = matches.iter().map(|(file, score)| ScoredMatch { file: file.clone(), confidence: *score }).collect();
                    verdicts[index] = Some(DuplicateVerdict::new(
                        *best_score >= fuzzy_threshold,
                        *best_score,
                        MatchType::FuzzyMetadata,
                        Some(best_file.clone()),
                        all_matches,
                    )?);
                }
            }
        }

        Ok(candidates
            .iter()
            .zip(verdicts)
            .map(|(candidate, verdict)| (candidate.file_path().to_string(), verdict.unwrap_or_else(DuplicateVerdict::none)))
            .collect())
    }

    /// Builds the fingerprint pair a fresh (not-yet-indexed) candidate
    /// file needs before it can be checked, mirroring the extraction the
    /// Indexer performs so the two agree on what "the same metadata"
    /// means.
    pub fn fingerprint_candidate(path: &Path, artist: Option<&str>, title: Option<&str>) -> Result<(String, String), FingerprintError> {
        let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
        let metadata_hash = metadata_fingerprint(artist, title, filename.as_deref());
        let content_hash = content_fingerprint(path)?.as_key();
        Ok((metadata_hash, content_hash))
    }
}

fn normalize_title(text: &str) -> String {
    let mut normalized = text.to_lowercase().trim().to_string();
    for adornment in TITLE_ADORNMENTS {
        normalized = normalized.replace(adornment, "");
    }
    normalized
}

fn fuzzy_matches<'c>(
    candidate: &LibraryFile,
    pool: &'c [LibraryFile],
    title: &str,
    threshold: f64,
) -> Vec<(LibraryFile, f64)> {
    let normalized_candidate_title = normalize_title(title);
    let self_path = candidate.file_path();

    let mut matches: Vec<(LibraryFile, f64)> = pool
        .iter()
        .filter(|other| other.file_path() != self_path)
        .filter_map(|other| {
            let other_title = other.title()?;
            let score = similarity::ratio(&normalized_candidate_title, &normalize_title(other_title));
            if score >= threshold {
                Some((other.clone(), score))
            } else {
                None
            }
        })
        .collect();

    matches.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::library_file::NewLibraryFile;
    use crate::store::test_helpers::prepare_store;
    use chrono::Utc;

    #[test]
    fn normalize_title_strips_all_known_adornments() {
        assert_eq!(normalize_title("Song Name (Radio Edit)"), "song name");
        assert_eq!(normalize_title("Another Song [Official]"), "another song");
        assert_eq!(normalize_title("Classic Track - Remastered"), "classic track");
    }

    #[test]
    fn normalize_title_lowercases_and_trims() {
        assert_eq!(normalize_title("  Loud TITLE  "), "loud title");
    }

    fn candidate(path: &str, artist: &str, title: &str, metadata_hash: &str, content_hash: &str) -> LibraryFile {
        LibraryFile::new(NewLibraryFile {
            file_path: path.into(),
            artist: Some(artist.to_string()),
            title: Some(title.to_string()),
            album: None,
            year: Some(2020),
            duration: Some(180.0),
            file_format: "mp3".to_string(),
            file_size: 4096,
            metadata_hash: metadata_hash.to_string(),
            file_content_hash: content_hash.to_string(),
            file_mtime: Utc::now(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn check_batch_resolves_exact_metadata_and_content_tiers_without_self_matches() {
        let store = prepare_store().await;

        store.add_file(&candidate("/indexed/a.mp3", "Daft Punk", "One More Time", "meta-a", "content-a")).await.unwrap();
        store.add_file(&candidate("/indexed/b.mp3", "Daft Punk", "Around the World", "meta-b", "content-b")).await.unwrap();

        let detector = Detector::new(&store);
        let candidates = vec![
            candidate("/import/a-copy.mp3", "Daft Punk", "One More Time", "meta-a", "different-content"),
            candidate("/import/b-copy.mp3", "Daft Punk", "Around the World", "different-meta", "content-b"),
            candidate("/import/new.mp3", "Someone Else", "Brand New Song", "meta-new", "content-new"),
        ];

        let results = detector.check_batch(&candidates, DEFAULT_FUZZY_THRESHOLD, true, true).await.unwrap();
        assert_eq!(results.len(), 3);

        assert_eq!(results[0].0, "/import/a-copy.mp3");
        assert_eq!(results[0].1.match_type, MatchType::ExactMetadata);
        assert!(results[0].1.is_duplicate);

        assert_eq!(results[1].0, "/import/b-copy.mp3");
        assert_eq!(results[1].1.match_type, MatchType::ExactFile);
        assert!(results[1].1.is_duplicate);

        assert_eq!(results[2].0, "/import/new.mp3");
        assert!(!results[2].1.is_duplicate);
    }

    #[tokio::test]
    async fn check_batch_excludes_self_matches_when_candidate_is_already_indexed() {
        let store = prepare_store().await;

        let indexed = candidate("/indexed/a.mp3", "Daft Punk", "One More Time", "meta-a", "content-a");
        store.add_file(&indexed).await.unwrap();

        let detector = Detector::new(&store);
        let results = detector.check_batch(&[indexed], DEFAULT_FUZZY_THRESHOLD, true, true).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(!results[0].1.is_duplicate, "a file must never be reported as its own duplicate");
    }
}
