//! Metadata and content fingerprinting shared between the Indexer and the
//! Detector so the two always agree on what makes two files "the same".

use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::warn;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const DEFAULT_CHUNK_SIZE: usize = 65536;
const MIN_FILE_SIZE_FOR_TWO_CHUNKS: u64 = (DEFAULT_CHUNK_SIZE * 2) as u64;
const MIDDLE_CHUNK_THRESHOLD: u64 = (DEFAULT_CHUNK_SIZE * 4) as u64;
const MAX_FILE_SIZE_FOR_HASHING: u64 = 10 * 1024 * 1024 * 1024;
const NO_METADATA_HASH_MARKER: &str = "NO_METADATA_HASH";

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("chunk_size must be positive, got {0}")]
    InvalidChunkSize(i64),
}

/// MD5 digest of normalized `artist|title`, or a digest of the filename
/// stem when both tags are empty so that untagged files never collide
/// with each other under the same key.
pub fn metadata_fingerprint(artist: Option<&str>, title: Option<&str>, filename: Option<&str>) -> String {
    let artist_norm = artist.unwrap_or("").trim().to_lowercase();
    let title_norm = title.unwrap_or("").trim().to_lowercase();

    if artist_norm.is_empty() && title_norm.is_empty() {
        return match filename {
            Some(name) => {
                let stem = Path::new(name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_lowercase())
                    .unwrap_or_else(|| name.to_lowercase());
                let key = format!("NO_METADATA:{stem}");
                format!("{:x}", md5::compute(key.as_bytes()))
            }
            None => NO_METADATA_HASH_MARKER.to_string(),
        };
    }

    let key = format!("{artist_norm}|{title_norm}");
    format!("{:x}", md5::compute(key.as_bytes()))
}

/// Content fingerprint of a file, sampling head/middle/tail chunks and
/// prefixing the file size for extra collision resistance. A file that
/// cannot be read produces [`ContentFingerprint::HashFailed`] keyed on a
/// digest of its own path, rather than a single shared sentinel: two
/// unreadable files must never be reported as content-duplicates of each
/// other just because they both failed to hash.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ContentFingerprint {
    Hashed { file_size: u64, digest: String },
    TooLarge { file_size: u64 },
    HashFailed { path_digest: u64 },
}

impl ContentFingerprint {
    /// Canonical string form stored in `file_content_hash` and compared
    /// for exact-content matches. `HashFailed` values never compare equal
    /// to one another because `path_digest` is derived from the path.
    pub fn as_key(&self) -> String {
        match self {
            ContentFingerprint::Hashed { file_size, digest } => format!("{file_size}_{digest}"),
            ContentFingerprint::TooLarge { file_size } => format!("{file_size}_FILE_TOO_LARGE"),
            ContentFingerprint::HashFailed { path_digest } => format!("HASH_FAILED_{path_digest:016x}"),
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, ContentFingerprint::Hashed { .. })
    }
}

fn path_digest(path: &Path) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

pub fn content_fingerprint(path: &Path) -> Result<ContentFingerprint, FingerprintError> {
    content_fingerprint_with_chunk_size(path, DEFAULT_CHUNK_SIZE)
}

pub fn content_fingerprint_with_chunk_size(
    path: &Path,
    chunk_size: usize,
) -> Result<ContentFingerprint, FingerprintError> {
    if chunk_size == 0 {
        return Err(FingerprintError::InvalidChunkSize(chunk_size as i64));
    }

    let file_size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!("cannot stat {} for hashing: {e}", path.display());
            return Ok(ContentFingerprint::HashFailed { path_digest: path_digest(path) });
        }
    };

    if file_size > MAX_FILE_SIZE_FOR_HASHING {
        warn!("file too large to hash: {} ({file_size} bytes)", path.display());
        return Ok(ContentFingerprint::TooLarge { file_size });
    }

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!("cannot open {} for hashing: {e}", path.display());
            return Ok(ContentFingerprint::HashFailed { path_digest: path_digest(path) });
        }
    };

    let mut hasher = Sha256::new();
    hasher.update(file_size.to_string().as_bytes());

    let mut buf = vec![0u8; chunk_size];

    let n = match file.read(&mut buf) {
        Ok(n) => n,
        Err(e) => {
            warn!("i/o error reading {}: {e}", path.display());
            return Ok(ContentFingerprint::HashFailed { path_digest: path_digest(path) });
        }
    };
    hasher.update(&buf[..n]);

    if file_size >= MIDDLE_CHUNK_THRESHOLD {
        let middle_pos = file_size / 2;
        match file.seek(SeekFrom::Start(middle_pos)) {
            Ok(_) => match file.read(&mut buf) {
                Ok(n) => hasher.update(&buf[..n]),
                Err(e) => warn!("could not read middle chunk from {}: {e}", path.display()),
            },
            Err(e) => warn!("could not seek to middle of {}: {e}", path.display()),
        }
    }

    if file_size >= MIN_FILE_SIZE_FOR_TWO_CHUNKS {
        match file.seek(SeekFrom::End(-(chunk_size as i64))) {
            Ok(_) => match file.read(&mut buf) {
                Ok(n) => hasher.update(&buf[..n]),
                Err(e) => warn!("could not read tail chunk from {}: {e}", path.display()),
            },
            Err(e) => warn!("could not seek to tail of {}: {e}", path.display()),
        }
    }

    let digest = format!("{:x}", hasher.finalize());
    Ok(ContentFingerprint::Hashed { file_size, digest })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn metadata_fingerprint_is_case_and_whitespace_insensitive() {
        let a = metadata_fingerprint(Some(" The Beatles "), Some("Hey Jude"), None);
        let b = metadata_fingerprint(Some("the beatles"), Some("hey jude"), None);
        assert_eq!(a, b);
    }

    #[test]
    fn metadata_fingerprint_falls_back_to_filename_when_untagged() {
        let a = metadata_fingerprint(None, None, Some("track01.mp3"));
        let b = metadata_fingerprint(None, None, Some("track02.mp3"));
        assert_ne!(a, b);
    }

    #[test]
    fn metadata_fingerprint_uses_marker_when_nothing_available() {
        assert_eq!(metadata_fingerprint(None, None, None), NO_METADATA_HASH_MARKER);
    }

    #[test]
    fn content_fingerprint_hashes_small_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let fp = content_fingerprint(file.path()).unwrap();
        assert!(fp.is_usable());
        assert!(fp.as_key().starts_with("11_"));
    }

    #[test]
    fn content_fingerprint_is_deterministic() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"deterministic content").unwrap();
        let a = content_fingerprint(file.path()).unwrap();
        let b = content_fingerprint(file.path()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn content_fingerprint_missing_file_is_unique_per_path() {
        let a = content_fingerprint(Path::new("/nonexistent/one.mp3")).unwrap();
        let b = content_fingerprint(Path::new("/nonexistent/two.mp3")).unwrap();
        assert_ne!(a.as_key(), b.as_key());
        assert!(!a.is_usable());
    }
}
