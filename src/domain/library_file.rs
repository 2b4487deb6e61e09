use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ValidationError;

const MIN_VALID_YEAR: i32 = 1000;
const MAX_VALID_YEAR: i32 = 9999;

/// Canonical record of an audio file in the index. `id` is `None` until the
/// Store assigns one on insert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LibraryFile {
    id: Option<i64>,

    file_path: String,
    filename: String,

    artist: Option<String>,
    title: Option<String>,
    album: Option<String>,
    year: Option<i32>,
    duration: Option<f64>,

    file_format: String,
    file_size: i64,

    metadata_hash: String,
    file_content_hash: String,

    indexed_at: DateTime<Utc>,
    file_mtime: DateTime<Utc>,
    last_verified: Option<DateTime<Utc>>,

    is_active: bool,
}

/// Construction parameters for a freshly scanned file, before it has been
/// assigned a Store id.
pub struct NewLibraryFile {
    pub file_path: PathBuf,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub duration: Option<f64>,
    pub file_format: String,
    pub file_size: i64,
    pub metadata_hash: String,
    pub file_content_hash: String,
    pub file_mtime: DateTime<Utc>,
}

impl LibraryFile {
    /// Builds a new, not-yet-persisted record. Mirrors the defaulting and
    /// sanity checks `LibraryFile.__post_init__` performs on the Python
    /// side: out-of-range years and negative durations are rejected rather
    /// than silently nulled, since the Store's write boundary is the right
    /// place to enforce `ValidationError`, not a logged-and-ignored warning.
    pub fn new(params: NewLibraryFile) -> Result<Self, ValidationError> {
        if params.file_path.as_os_str().is_empty() {
            return Err(ValidationError::EmptyPath);
        }

        if let Some(year) = params.year {
            if !(MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&year) {
                return Err(ValidationError::YearOutOfRange(year));
            }
        }

        if let Some(duration) = params.duration {
            if duration < 0.0 {
                return Err(ValidationError::NegativeDuration(duration));
            }
        }

        if params.file_size < 0 {
            return Err(ValidationError::NegativeFileSize(params.file_size));
        }

        let filename = params
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            id: None,
            file_path: params.file_path.to_string_lossy().into_owned(),
            filename,
            artist: params.artist,
            title: params.title,
            album: params.album,
            year: params.year,
            duration: params.duration,
            file_format: params.file_format,
            file_size: params.file_size,
            metadata_hash: params.metadata_hash,
            file_content_hash: params.file_content_hash,
            indexed_at: Utc::now(),
            file_mtime: params.file_mtime,
            last_verified: None,
            is_active: true,
        })
    }

    /// Reconstructs a record read back from the Store. Skips the
    /// `NewLibraryFile` validation since a persisted row was already valid
    /// when it was written; the Store's `FromRow` mapping calls this.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_row(
        id: i64,
        file_path: String,
        filename: String,
        artist: Option<String>,
        title: Option<String>,
        album: Option<String>,
        year: Option<i32>,
        duration: Option<f64>,
        file_format: String,
        file_size: i64,
        metadata_hash: String,
        file_content_hash: String,
        indexed_at: DateTime<Utc>,
        file_mtime: DateTime<Utc>,
        last_verified: Option<DateTime<Utc>>,
        is_active: bool,
    ) -> Self {
        Self {
            id: Some(id),
            file_path,
            filename,
            artist,
            title,
            album,
            year,
            duration,
            file_format,
            file_size,
            metadata_hash,
            file_content_hash,
            indexed_at,
            file_mtime,
            last_verified,
            is_active,
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.file_path)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn file_format(&self) -> &str {
        &self.file_format
    }

    pub fn file_size(&self) -> i64 {
        self.file_size
    }

    pub fn metadata_hash(&self) -> &str {
        &self.metadata_hash
    }

    pub fn file_content_hash(&self) -> &str {
        &self.file_content_hash
    }

    pub fn indexed_at(&self) -> DateTime<Utc> {
        self.indexed_at
    }

    pub fn file_mtime(&self) -> DateTime<Utc> {
        self.file_mtime
    }

    pub fn last_verified(&self) -> Option<DateTime<Utc>> {
        self.last_verified
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn display_name(&self) -> String {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => format!("{artist} - {title}"),
            _ => self.filename.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> NewLibraryFile {
        NewLibraryFile {
            file_path: PathBuf::from("/music/a.flac"),
            artist: Some("Daft Punk".to_string()),
            title: Some("One More Time".to_string()),
            album: None,
            year: Some(2001),
            duration: Some(320.5),
            file_format: "flac".to_string(),
            file_size: 4096,
            metadata_hash: "deadbeef".to_string(),
            file_content_hash: "4096_cafebabe".to_string(),
            file_mtime: Utc::now(),
        }
    }

    #[test]
    fn rejects_empty_path() {
        let mut params = sample_params();
        params.file_path = PathBuf::new();
        assert!(matches!(LibraryFile::new(params), Err(ValidationError::EmptyPath)));
    }

    #[test]
    fn rejects_year_out_of_range() {
        let mut params = sample_params();
        params.year = Some(999);
        assert!(matches!(LibraryFile::new(params), Err(ValidationError::YearOutOfRange(999))));
    }

    #[test]
    fn rejects_negative_duration() {
        let mut params = sample_params();
        params.duration = Some(-1.0);
        assert!(LibraryFile::new(params).is_err());
    }

    #[test]
    fn display_name_falls_back_to_filename_when_untagged() {
        let mut params = sample_params();
        params.artist = None;
        params.title = None;
        let file = LibraryFile::new(params).unwrap();
        assert_eq!(file.display_name(), "a.flac");
    }

    #[test]
    fn display_name_joins_artist_and_title_when_both_present() {
        let file = LibraryFile::new(sample_params()).unwrap();
        assert_eq!(file.display_name(), "Daft Punk - One More Time");
    }
}
