//! Core traits defining the interfaces to the upstream collaborators.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Concept, Fingerprint};

/// Image classifier producing weighted textual concepts.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify raw image bytes.
    ///
    /// A response without concepts is `Ok(vec![])`. Transport failures and
    /// non-success statuses are errors; callers decide whether to degrade.
    async fn classify(&self, image: &[u8]) -> Result<Vec<Concept>>;

    /// Short service name used in logs.
    fn name(&self) -> &str;
}

/// Semantic fingerprint lookup for single-word terms.
#[async_trait]
pub trait FingerprintResolver: Send + Sync {
    /// Resolve a lowercased single-word term.
    ///
    /// `Ok(None)` means the service knows no fingerprint for the term.
    async fn fingerprint(&self, term: &str) -> Result<Option<Fingerprint>>;

    /// Short service name used in logs.
    fn name(&self) -> &str;
}
