//! The audio metadata reader collaborator (C8): given a path, returns the
//! tag + stream-property fields the rest of the crate needs. Out of scope
//! per the spec ("provided by an external tag reader"), but has to live
//! somewhere concrete — this module is that concrete, swappable seam,
//! implemented via `lofty`'s `Probe`, the same crate
//! `domain/audiofile.rs::AudioFileMetadata::extract_or_default` already
//! used for the reference crate's own (different) tagging needs.

use std::path::Path;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use thiserror::Error;

use crate::domain::audio_properties::BitrateMode;

#[derive(Debug, Error)]
pub enum TagReadError {
    #[error("could not probe or read tags: {0}")]
    Lofty(#[from] lofty::error::LoftyError),
}

/// Everything the Fingerprinter, Indexer, and Quality Scorer need from one
/// file, read in a single pass so no caller probes the same file twice.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawTags {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub duration: Option<f64>,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate_hz: Option<u32>,
    pub channels: Option<u8>,
    pub bitrate_mode: BitrateMode,
}

/// Reads tags and stream properties from a file. A read failure is
/// reported as `Err` rather than silently defaulted, so callers in the
/// Indexer's per-file loop can count it as an extraction error (per
/// §4.3's error policy) instead of quietly indexing a file with blank
/// metadata and no sign anything went wrong.
pub fn read_raw_tags(path: &Path) -> Result<RawTags, TagReadError> {
    let tagged = Probe::open(path)?.read()?;
    let properties = tagged.properties();

    let duration = Some(properties.duration().as_secs_f64());
    let bitrate_kbps = properties.audio_bitrate().or_else(|| properties.overall_bitrate());
    let sample_rate_hz = properties.sample_rate();
    let channels = properties.channels();

    let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
        return Ok(RawTags {
            duration,
            bitrate_kbps,
            sample_rate_hz,
            channels,
            bitrate_mode: BitrateMode::Unknown,
            ..Default::default()
        });
    };

    Ok(RawTags {
        artist: tag.artist().map(|s| s.to_string()),
        title: tag.title().map(|s| s.to_string()),
        album: tag.album().map(|s| s.to_string()),
        year: tag.year().map(|y| y as i32),
        duration,
        bitrate_kbps,
        sample_rate_hz,
        channels,
        // lofty doesn't surface VBR/CBR/ABR directly across formats; left
        // as a best-effort `Unknown` until a format-specific probe is
        // worth adding (see Checkpoint 3's filename-pattern fallback).
        bitrate_mode: BitrateMode::Unknown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_surfaces_as_tag_read_error() {
        let result = read_raw_tags(Path::new("/nonexistent/path/to/song.mp3"));
        assert!(result.is_err());
    }
}
