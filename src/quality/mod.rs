//! The Quality Scorer (C6): a pure function from `AudioProperties` to a
//! 0-100 score, plus the ranking rule the Deletion Planner uses to pick a
//! keeper out of a duplicate group. Grounded byte-for-byte on
//! `original_source/library/quality_analyzer.py`.

use chrono::{DateTime, Utc};

use crate::domain::audio_properties::{AudioProperties, BitrateMode};

const RECENT_DAYS: i64 = 365;
const SEMI_RECENT_DAYS: i64 = 1825;

/// Human-readable bucket for a score, used only for display.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
    Unknown,
}

pub fn quality_tier(score: u8) -> QualityTier {
    match score {
        80..=255 => QualityTier::Excellent,
        60..=79 => QualityTier::Good,
        40..=59 => QualityTier::Fair,
        1..=39 => QualityTier::Poor,
        0 => QualityTier::Unknown,
    }
}

fn format_score(format: &str) -> u8 {
    match format.to_lowercase().as_str() {
        "flac" | "alac" => 40,
        "wav" | "aiff" | "aif" => 38,
        "ape" | "wv" | "tta" => 37,
        "dsd" | "dsf" => 36,
        "aac" | "m4a" => 22,
        "mp3" => 20,
        "vorbis" | "ogg" | "opus" => 18,
        "wma" => 15,
        _ => 10,
    }
}

fn bitrate_score(props: &AudioProperties) -> u8 {
    if props.is_lossless() {
        return 30;
    }

    let Some(bitrate) = props.bitrate_kbps else {
        return 5;
    };

    let base = (30.0 * (bitrate as f64 / 320.0).min(1.0)).round() as u8;
    let bonus = if props.bitrate_mode == BitrateMode::Variable { 2 } else { 0 };
    (base + bonus).min(30)
}

fn sample_rate_score(props: &AudioProperties) -> u8 {
    let Some(rate) = props.sample_rate else {
        return 10;
    };

    if rate >= 96_000 {
        20
    } else if rate >= 48_000 {
        15
    } else if rate >= 44_100 {
        10
    } else {
        (10.0 * (rate as f64 / 44_100.0)).round() as u8
    }
}

fn recency_score(mtime: DateTime<Utc>) -> u8 {
    let age_days = (Utc::now() - mtime).num_days();
    if age_days < RECENT_DAYS {
        10
    } else if age_days < SEMI_RECENT_DAYS {
        5
    } else {
        0
    }
}

/// Sums the four weighted axes, clamped to `[0, 100]`. `mtime` is passed
/// separately from `AudioProperties` since recency is evaluated against
/// "now", not a stored property of the file.
pub fn calculate_quality_score(props: &AudioProperties, mtime: DateTime<Utc>) -> u8 {
    let total = format_score(&props.file_format) as u16
        + bitrate_score(props) as u16
        + sample_rate_score(props) as u16
        + recency_score(mtime) as u16;

    total.min(100) as u8
}

/// One file's score alongside the timestamp it was computed against, so
/// the ranking step doesn't need to re-derive recency.
#[derive(Clone, Debug)]
pub struct ScoredFile<T> {
    pub item: T,
    pub score: u8,
}

/// Sorts a duplicate group by `(score, file_size)` descending; the head
/// is the keeper, the tail is the deletion candidate list. `file_size` is
/// the tiebreaker when two files score identically, preferring the
/// physically larger file.
pub fn rank_duplicate_group<T: Clone>(
    files: &[T],
    score_of: impl Fn(&T) -> u8,
    size_of: impl Fn(&T) -> i64,
) -> (T, Vec<T>) {
    assert!(!files.is_empty(), "rank_duplicate_group requires at least one file");

    let mut ranked: Vec<&T> = files.iter().collect();
    ranked.sort_by(|a, b| (score_of(b), size_of(b)).cmp(&(score_of(a), size_of(a))));

    let keeper = ranked[0].clone();
    let deletions = ranked[1..].iter().map(|f| (*f).clone()).collect();
    (keeper, deletions)
}

/// Reporting convenience for a whole duplicate set (not a new algorithm):
/// the keep/delete split plus a few aggregate figures the CLI's `vet` and
/// `plan` subcommands display.
#[derive(Clone, Debug)]
pub struct DuplicateSetAnalysis<T> {
    pub keep: T,
    pub delete: Vec<T>,
    pub quality_range: (u8, u8),
    pub size_saved_bytes: i64,
    pub lossless_count: usize,
    pub vbr_count: usize,
}

pub fn analyze_duplicate_set(
    files: &[AudioProperties],
    mtimes: &[DateTime<Utc>],
) -> DuplicateSetAnalysis<AudioProperties> {
    assert_eq!(files.len(), mtimes.len(), "each file needs a paired mtime");
    assert!(!files.is_empty(), "analyze_duplicate_set requires at least one file");

    let scores: Vec<u8> = files.iter().zip(mtimes).map(|(f, m)| calculate_quality_score(f, *m)).collect();

    let indices: Vec<usize> = (0..files.len()).collect();
    let (keep_idx, delete_idxs) = {
        let (keeper, deletions) = rank_duplicate_group(&indices, |i| scores[*i], |i| files[*i].file_size);
        (keeper, deletions)
    };

    let keep = files[keep_idx].clone();
    let delete: Vec<AudioProperties> = delete_idxs.iter().map(|i| files[*i].clone()).collect();

    let min_score = *scores.iter().min().unwrap();
    let max_score = *scores.iter().max().unwrap();
    let size_saved_bytes = delete.iter().map(|f| f.file_size).sum();
    let lossless_count = files.iter().filter(|f| f.is_lossless()).count();
    let vbr_count = files.iter().filter(|f| f.bitrate_mode == BitrateMode::Variable).count();

    DuplicateSetAnalysis {
        keep,
        delete,
        quality_range: (min_score, max_score),
        size_saved_bytes,
        lossless_count,
        vbr_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(format: &str, bitrate: Option<u32>, sample_rate: Option<u32>, size: i64) -> AudioProperties {
        AudioProperties {
            file_format: format.to_string(),
            bitrate_kbps: bitrate,
            sample_rate,
            channels: Some(2),
            bitrate_mode: BitrateMode::Constant,
            duration: Some(200.0),
            file_size: size,
        }
    }

    #[test]
    fn lossless_format_scores_higher_than_mp3() {
        let flac = props("flac", None, Some(96_000), 1);
        let mp3 = props("mp3", Some(320), Some(44_100), 1);
        let now = Utc::now();
        assert!(calculate_quality_score(&flac, now) > calculate_quality_score(&mp3, now));
    }

    #[test]
    fn higher_bitrate_never_scores_lower_p10() {
        let low = props("mp3", Some(128), Some(44_100), 1);
        let high = props("mp3", Some(320), Some(44_100), 1);
        let now = Utc::now();
        assert!(calculate_quality_score(&high, now) >= calculate_quality_score(&low, now));
    }

    #[test]
    fn lossless_non_flac_formats_get_the_full_bitrate_score_despite_no_bitrate_tag() {
        let ape = props("ape", None, Some(44_100), 1);
        assert_eq!(bitrate_score(&ape), 30);
    }

    #[test]
    fn vbr_bonus_is_clamped_at_max_bitrate_score() {
        let mut cbr = props("mp3", Some(320), Some(44_100), 1);
        cbr.bitrate_mode = BitrateMode::Constant;
        let mut vbr = cbr.clone();
        vbr.bitrate_mode = BitrateMode::Variable;

        assert_eq!(bitrate_score(&cbr), 30);
        assert_eq!(bitrate_score(&vbr), 30);
    }

    #[test]
    fn ranking_prefers_score_then_size() {
        let a = props("mp3", Some(128), Some(44_100), 500);
        let b = props("flac", None, Some(96_000), 2000);
        let c = props("flac", None, Some(96_000), 1000);

        let now = Utc::now();
        let items = vec![("a", a), ("b", b), ("c", c)];
        let (keeper, deletes) = rank_duplicate_group(
            &items,
            |(_, p)| calculate_quality_score(p, now),
            |(_, p)| p.file_size,
        );

        assert_eq!(keeper.0, "b");
        assert_eq!(deletes.len(), 2);
        assert_eq!(deletes[0].0, "c");
        assert_eq!(deletes[1].0, "a");
    }

    #[test]
    fn quality_tier_buckets() {
        assert_eq!(quality_tier(90), QualityTier::Excellent);
        assert_eq!(quality_tier(65), QualityTier::Good);
        assert_eq!(quality_tier(45), QualityTier::Fair);
        assert_eq!(quality_tier(10), QualityTier::Poor);
        assert_eq!(quality_tier(0), QualityTier::Unknown);
    }
}
