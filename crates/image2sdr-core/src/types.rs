//! Core domain types for image2sdr.

use serde::{Deserialize, Serialize};

/// A sparse fingerprint carrying a scalar weight.
///
/// One of these is produced per resolved concept: the concept's fingerprint
/// positions, weighted by the classifier's confidence in that concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedSdr {
    /// Active bit indexes. Order is not significant.
    pub sdr: Vec<u32>,

    /// Contribution weight, nominally in `[0, 1]`.
    pub weight: f64,
}

impl WeightedSdr {
    /// Create a new weighted SDR.
    pub fn new(sdr: Vec<u32>, weight: f64) -> Self {
        Self { sdr, weight }
    }

    /// Check whether this SDR contributes any bits.
    pub fn is_empty(&self) -> bool {
        self.sdr.is_empty()
    }
}

/// A labelled concept returned by the image classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Concept label, e.g. "dog" or "hard hat".
    pub name: String,

    /// Classifier confidence in `[0, 1]`.
    pub value: f64,
}

impl Concept {
    /// Create a new concept.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Normalized single-word lookup term for this concept.
    ///
    /// Returns `None` for blank labels and for multi-word labels such as
    /// "hard hat" or "no people", which have no single-term fingerprint.
    pub fn term(&self) -> Option<String> {
        let name = self.name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return None;
        }
        Some(name.to_lowercase())
    }
}

/// Semantic fingerprint of a single term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Active positions in the fingerprint space.
    pub positions: Vec<u32>,
}

impl Fingerprint {
    /// Create a new fingerprint.
    pub fn new(positions: Vec<u32>) -> Self {
        Self { positions }
    }

    /// Attach a weight, producing a merge input.
    pub fn weighted(self, weight: f64) -> WeightedSdr {
        WeightedSdr::new(self.positions, weight)
    }
}

/// An uploaded image awaiting classification.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Client-supplied file name, if any.
    pub file_name: Option<String>,

    /// Raw image bytes.
    pub data: Vec<u8>,
}

impl ImageUpload {
    /// Create a new upload.
    pub fn new(file_name: Option<String>, data: Vec<u8>) -> Self {
        Self { file_name, data }
    }
}

/// Response body of a successful encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdrResponse {
    /// Ascending active bit indexes.
    pub sdr: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concept_term() {
        assert_eq!(Concept::new("Dog", 0.9).term().as_deref(), Some("dog"));
        assert_eq!(Concept::new("  Canine ", 0.9).term().as_deref(), Some("canine"));
        assert_eq!(Concept::new("hard hat", 0.9).term(), None);
        assert_eq!(Concept::new("no\tpeople", 0.9).term(), None);
        assert_eq!(Concept::new("   ", 0.9).term(), None);
    }

    #[test]
    fn test_fingerprint_weighted() {
        let weighted = Fingerprint::new(vec![4, 8, 15]).weighted(0.75);
        assert_eq!(weighted.sdr, vec![4, 8, 15]);
        assert_eq!(weighted.weight, 0.75);
        assert!(!weighted.is_empty());
        assert!(WeightedSdr::new(Vec::new(), 1.0).is_empty());
    }

    #[test]
    fn test_weighted_sdr_json() {
        let parsed: Vec<WeightedSdr> =
            serde_json::from_str(r#"[{"sdr":[1,2,3],"weight":0.5}]"#).unwrap();
        assert_eq!(parsed, vec![WeightedSdr::new(vec![1, 2, 3], 0.5)]);
    }
}
