use serde::{Deserialize, Serialize};

use super::{LibraryFile, ValidationError};

const CERTAIN_THRESHOLD: f64 = 0.95;
const UNCERTAIN_THRESHOLD: f64 = 0.70;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MatchType {
    ExactMetadata,
    FuzzyMetadata,
    ExactFile,
    None,
}

/// A single candidate match surfaced alongside the verdict's primary
/// `matched_file`, carrying its own similarity score so a caller can
/// inspect runner-up matches without re-running the Detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub file: LibraryFile,
    pub confidence: f64,
}

/// Outcome of checking one candidate file against the index. Confidence
/// bands take precedence over `is_duplicate` when a caller asks whether a
/// file is safe to treat as new: a `FuzzyMetadata` match below the
/// uncertain band is reported as a duplicate but should still prompt a
/// human before deletion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    confidence: f64,
    pub match_type: MatchType,
    pub matched_file: Option<LibraryFile>,
    pub all_matches: Vec<ScoredMatch>,
}

impl DuplicateVerdict {
    pub fn new(
        is_duplicate: bool,
        confidence: f64,
        match_type: MatchType,
        matched_file: Option<LibraryFile>,
        all_matches: Vec<ScoredMatch>,
    ) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::ConfidenceOutOfRange(confidence));
        }

        Ok(Self {
            is_duplicate,
            confidence,
            match_type,
            matched_file,
            all_matches,
        })
    }

    pub fn none() -> Self {
        Self {
            is_duplicate: false,
            confidence: 0.0,
            match_type: MatchType::None,
            matched_file: None,
            all_matches: Vec::new(),
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn is_certain(&self) -> bool {
        self.confidence >= CERTAIN_THRESHOLD
    }

    pub fn is_uncertain(&self) -> bool {
        self.confidence >= UNCERTAIN_THRESHOLD && self.confidence < CERTAIN_THRESHOLD
    }

    pub fn get_best_match(&self) -> Option<&LibraryFile> {
        self.matched_file.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_confidence_out_of_range() {
        let result = DuplicateVerdict::new(true, 1.2, MatchType::ExactFile, None, Vec::new());
        assert!(matches!(result, Err(ValidationError::ConfidenceOutOfRange(_))));
    }

    #[test]
    fn certain_and_uncertain_bands_are_exclusive() {
        let certain = DuplicateVerdict::new(true, 0.95, MatchType::ExactMetadata, None, Vec::new()).unwrap();
        assert!(certain.is_certain());
        assert!(!certain.is_uncertain());

        let uncertain = DuplicateVerdict::new(true, 0.80, MatchType::FuzzyMetadata, None, Vec::new()).unwrap();
        assert!(!uncertain.is_certain());
        assert!(uncertain.is_uncertain());

        let new = DuplicateVerdict::none();
        assert!(!new.is_certain());
        assert!(!new.is_uncertain());
    }
}
