use serde::{Deserialize, Serialize};

/// Encoding mode as reported by the tag reader, used by the Quality Scorer's
/// small VBR bonus. `Unknown` covers formats lofty can't determine this for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum BitrateMode {
    Constant,
    Variable,
    Unknown,
}

/// The subset of a file's audio properties the Quality Scorer weighs.
/// Distinct from `LibraryFile` because it carries fields (bitrate, sample
/// rate, channels, bitrate mode) the index doesn't persist — they're
/// read fresh from the tag at scoring time rather than stored, since they
/// only matter when two files are already known to be duplicates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioProperties {
    pub file_format: String,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub bitrate_mode: BitrateMode,
    pub duration: Option<f64>,
    pub file_size: i64,
}

impl AudioProperties {
    pub fn is_lossless(&self) -> bool {
        matches!(
            self.file_format.to_lowercase().as_str(),
            "flac" | "alac" | "wav" | "aiff" | "aif" | "ape" | "wv" | "tta" | "dsd" | "dsf"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_lossless_formats() {
        let props = AudioProperties {
            file_format: "FLAC".to_string(),
            bitrate_kbps: None,
            sample_rate: Some(44100),
            channels: Some(2),
            bitrate_mode: BitrateMode::Unknown,
            duration: Some(200.0),
            file_size: 1024,
        };
        assert!(props.is_lossless());
    }

    #[test]
    fn ape_and_dsf_count_as_lossless() {
        let mut props = AudioProperties {
            file_format: "ape".to_string(),
            bitrate_kbps: None,
            sample_rate: Some(44100),
            channels: Some(2),
            bitrate_mode: BitrateMode::Unknown,
            duration: Some(200.0),
            file_size: 1024,
        };
        assert!(props.is_lossless());
        props.file_format = "dsf".to_string();
        assert!(props.is_lossless());
    }

    #[test]
    fn mp3_is_not_lossless() {
        let props = AudioProperties {
            file_format: "mp3".to_string(),
            bitrate_kbps: Some(320),
            sample_rate: Some(44100),
            channels: Some(2),
            bitrate_mode: BitrateMode::Constant,
            duration: Some(200.0),
            file_size: 1024,
        };
        assert!(!props.is_lossless());
    }
}
