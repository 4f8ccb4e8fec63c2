//! In-memory collaborators for tests and offline runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use image2sdr_core::{Classifier, Concept, Fingerprint, FingerprintResolver, Result, SdrError};

/// A classifier answering from a fixed table keyed by image bytes.
///
/// Images missing from the table get the default concepts.
pub struct StaticClassifier {
    /// `None` marks an image whose classification fails.
    by_image: HashMap<Vec<u8>, Option<Vec<Concept>>>,
    default: Vec<Concept>,
    calls: AtomicUsize,
}

impl StaticClassifier {
    /// Create a classifier returning `default` for every image.
    pub fn new(default: Vec<Concept>) -> Self {
        Self {
            by_image: HashMap::new(),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    /// Return `concepts` for this exact image.
    pub fn with_image(mut self, image: impl Into<Vec<u8>>, concepts: Vec<Concept>) -> Self {
        self.by_image.insert(image.into(), Some(concepts));
        self
    }

    /// Fail classification of this exact image.
    pub fn with_failure(mut self, image: impl Into<Vec<u8>>) -> Self {
        self.by_image.insert(image.into(), None);
        self
    }

    /// Number of classify calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for StaticClassifier {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Classifier for StaticClassifier {
    async fn classify(&self, image: &[u8]) -> Result<Vec<Concept>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.by_image.get(image) {
            Some(Some(concepts)) => Ok(concepts.clone()),
            Some(None) => Err(SdrError::upstream("static", "classification failed")),
            None => Ok(self.default.clone()),
        }
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// A fingerprint resolver answering from a fixed term table.
#[derive(Default)]
pub struct StaticResolver {
    /// `None` marks a term whose lookup fails.
    fingerprints: HashMap<String, Option<Vec<u32>>>,
    lookups: Mutex<Vec<String>>,
}

impl StaticResolver {
    /// Create an empty resolver; every term is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `term` to `positions`.
    pub fn with_term(mut self, term: impl Into<String>, positions: Vec<u32>) -> Self {
        self.fingerprints.insert(term.into(), Some(positions));
        self
    }

    /// Fail lookups of `term`.
    pub fn with_failure(mut self, term: impl Into<String>) -> Self {
        self.fingerprints.insert(term.into(), None);
        self
    }

    /// Terms looked up so far, in call order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups
            .lock()
            .map(|terms| terms.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FingerprintResolver for StaticResolver {
    async fn fingerprint(&self, term: &str) -> Result<Option<Fingerprint>> {
        if let Ok(mut lookups) = self.lookups.lock() {
            lookups.push(term.to_string());
        }
        match self.fingerprints.get(term) {
            Some(Some(positions)) => Ok(Some(Fingerprint::new(positions.clone()))),
            Some(None) => Err(SdrError::upstream("static", format!("lookup of '{}' failed", term))),
            None => Ok(None),
        }
    }

    fn name(&self) -> &str {
        "static"
    }
}
