use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the whole library's shape, persisted to `library_stats`
/// after every index run and surfaced by the `stats` CLI command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LibraryStatistics {
    pub total_files: i64,
    pub total_size: i64,
    pub formats_breakdown: HashMap<String, i64>,
    pub artists_count: i64,
    pub albums_count: i64,
    pub last_index_time: DateTime<Utc>,
    pub index_duration: f64,
    pub created_at: DateTime<Utc>,
}

impl LibraryStatistics {
    /// Derives a fresh snapshot from the active library, the way the
    /// `stats` CLI command and the post-index persistence step both need.
    /// `index_duration` is threaded through from the caller rather than
    /// timed here, since this function has no business owning a clock.
    pub fn from_library(files: &[crate::domain::LibraryFile], index_duration: f64) -> Self {
        let mut formats_breakdown: HashMap<String, i64> = HashMap::new();
        let mut artists: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut albums: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut total_size = 0i64;

        for file in files {
            *formats_breakdown.entry(file.file_format().to_string()).or_insert(0) += 1;
            total_size += file.file_size();

            if let Some(artist) = file.artist() {
                if !artist.trim().is_empty() {
                    artists.insert(artist.trim().to_lowercase());
                }
            }
            if let Some(album) = file.album() {
                if !album.trim().is_empty() {
                    albums.insert(album.trim().to_lowercase());
                }
            }
        }

        let now = Utc::now();
        Self {
            total_files: files.len() as i64,
            total_size,
            formats_breakdown,
            artists_count: artists.len() as i64,
            albums_count: albums.len() as i64,
            last_index_time: now,
            index_duration,
            created_at: now,
        }
    }

    pub fn total_size_gb(&self) -> f64 {
        self.total_size as f64 / (1024.0 * 1024.0 * 1024.0)
    }

    pub fn average_file_size_mb(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        (self.total_size as f64 / self.total_files as f64) / (1024.0 * 1024.0)
    }

    /// Each format's share of `total_files`, rounded to 2 decimals the way
    /// the vetting percentages are, for consistent display formatting.
    pub fn format_percentages(&self) -> HashMap<String, f64> {
        if self.total_files == 0 {
            return HashMap::new();
        }

        self.formats_breakdown
            .iter()
            .map(|(format, count)| {
                let pct = (*count as f64 / self.total_files as f64) * 100.0;
                (format.clone(), (pct * 100.0).round() / 100.0)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::library_file::NewLibraryFile;
    use crate::domain::LibraryFile;
    use std::path::PathBuf;

    fn file(path: &str, format: &str, size: i64, artist: Option<&str>, album: Option<&str>) -> LibraryFile {
        LibraryFile::new(NewLibraryFile {
            file_path: PathBuf::from(path),
            artist: artist.map(str::to_string),
            title: Some("Title".to_string()),
            album: album.map(str::to_string),
            year: Some(2020),
            duration: Some(180.0),
            file_format: format.to_string(),
            file_size: size,
            metadata_hash: "h".to_string(),
            file_content_hash: "c".to_string(),
            file_mtime: Utc::now(),
        })
        .unwrap()
    }

    #[test]
    fn from_library_aggregates_formats_and_counts_distinct_artists_case_insensitively() {
        let files = vec![
            file("/a.flac", "flac", 100, Some("Daft Punk"), Some("Discovery")),
            file("/b.flac", "flac", 200, Some("daft punk"), Some("Discovery")),
            file("/c.mp3", "mp3", 50, Some("Other Artist"), None),
        ];

        let stats = LibraryStatistics::from_library(&files, 1.5);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_size, 350);
        assert_eq!(stats.formats_breakdown.get("flac"), Some(&2));
        assert_eq!(stats.formats_breakdown.get("mp3"), Some(&1));
        assert_eq!(stats.artists_count, 2);
        assert_eq!(stats.albums_count, 1);
        assert_eq!(stats.index_duration, 1.5);
    }

    #[test]
    fn from_library_handles_empty_set() {
        let stats = LibraryStatistics::from_library(&[], 0.0);
        assert_eq!(stats.total_files, 0);
        assert_eq!(stats.total_size, 0);
        assert!(stats.formats_breakdown.is_empty());
    }

    fn sample() -> LibraryStatistics {
        let mut formats_breakdown = HashMap::new();
        formats_breakdown.insert("flac".to_string(), 3);
        formats_breakdown.insert("mp3".to_string(), 1);

        LibraryStatistics {
            total_files: 4,
            total_size: 4 * 1024 * 1024 * 1024,
            formats_breakdown,
            artists_count: 2,
            albums_count: 2,
            last_index_time: Utc::now(),
            index_duration: 12.5,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn total_size_gb_converts_bytes() {
        let stats = sample();
        assert!((stats.total_size_gb() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn average_file_size_handles_empty_library() {
        let mut stats = sample();
        stats.total_files = 0;
        stats.total_size = 0;
        assert_eq!(stats.average_file_size_mb(), 0.0);
    }

    #[test]
    fn format_percentages_sum_to_roughly_one_hundred() {
        let stats = sample();
        let pcts = stats.format_percentages();
        let total: f64 = pcts.values().sum();
        assert!((total - 100.0).abs() < 0.01);
    }
}
