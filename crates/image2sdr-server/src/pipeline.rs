//! Image to SDR pipeline: classify, resolve fingerprints, merge.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use image2sdr_core::{
    Classifier, Concept, FingerprintResolver, ImageUpload, Result, SdrError, ServiceConfig,
    WeightedSdr,
};
use image2sdr_merge::SdrMerger;
use image2sdr_upstream::{ClarifaiClassifier, CorticalIoResolver};

/// Default hard timeout for one encode.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Distinct single-word lookup terms with their confidences.
///
/// Multi-word and blank concepts are dropped. When a term repeats, the
/// first occurrence's confidence is kept.
pub fn qualifying_terms(concepts: &[Concept]) -> Vec<(String, f64)> {
    let mut seen = HashSet::new();
    concepts
        .iter()
        .filter_map(|concept| concept.term().map(|term| (term, concept.value)))
        .filter(|(term, _)| seen.insert(term.clone()))
        .collect()
}

/// Turns uploaded images into a merged SDR.
///
/// Every image is classified concurrently, then every qualifying concept of
/// the first image is resolved concurrently, then the fingerprints are
/// merged. A failed upstream call contributes nothing instead of failing
/// the request.
pub struct Image2SdrService {
    classifier: Arc<dyn Classifier>,
    resolver: Arc<dyn FingerprintResolver>,
    merger: SdrMerger,
    request_timeout: Duration,
}

impl Image2SdrService {
    /// Create a service from its collaborators.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        resolver: Arc<dyn FingerprintResolver>,
        merger: SdrMerger,
    ) -> Self {
        Self {
            classifier,
            resolver,
            merger,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Set the hard timeout for one encode.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Create a service talking to Clarifai and Cortical.io.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let upstream_timeout = Duration::from_secs(config.server.upstream_timeout_secs);

        let classifier = ClarifaiClassifier::new(&config.clarifai, upstream_timeout)?;
        let resolver = CorticalIoResolver::new(&config.cortical_io, upstream_timeout)?;
        let merger = SdrMerger::from_config(config)?;

        info!(
            "Pipeline configured: sdr_size={}, sparsity={}, retina={}",
            merger.sdr_size(),
            merger.sparsity(),
            config.cortical_io.retina
        );

        Ok(Self::new(Arc::new(classifier), Arc::new(resolver), merger)
            .with_request_timeout(Duration::from_secs(config.server.request_timeout_secs)))
    }

    /// Merge parameters in use.
    pub fn merger(&self) -> &SdrMerger {
        &self.merger
    }

    /// Encode uploaded images into one SDR.
    pub async fn encode(&self, images: Vec<ImageUpload>) -> Result<Vec<u32>> {
        if images.is_empty() {
            return Err(SdrError::MissingFiles);
        }

        // Dropping the pipeline future aborts every in-flight upstream task
        tokio::time::timeout(self.request_timeout, self.run(images))
            .await
            .map_err(|_| SdrError::Timeout {
                secs: self.request_timeout.as_secs(),
            })
    }

    async fn run(&self, images: Vec<ImageUpload>) -> Vec<u32> {
        let start = Instant::now();
        let image_count = images.len();

        let mut per_image = self.classify_all(images).await;

        // Only the first image is merged; see DESIGN.md
        if image_count > 1 {
            debug!("{} additional image(s) classified but not merged", image_count - 1);
        }
        let concepts = if per_image.is_empty() {
            Vec::new()
        } else {
            per_image.swap_remove(0)
        };

        let terms = qualifying_terms(&concepts);
        debug!(
            "{} concept(s), {} qualifying term(s)",
            concepts.len(),
            terms.len()
        );

        let weighted = self.resolve_all(terms).await;
        let sdr = self.merger.merge(&weighted);

        info!(
            "Encoded {} image(s) from {} fingerprint(s) into {} bits in {}ms",
            image_count,
            weighted.len(),
            sdr.len(),
            start.elapsed().as_millis()
        );

        sdr
    }

    /// Classify every image concurrently; result order follows upload order.
    async fn classify_all(&self, images: Vec<ImageUpload>) -> Vec<Vec<Concept>> {
        let mut results = vec![Vec::new(); images.len()];
        let mut tasks = JoinSet::new();

        for (position, image) in images.into_iter().enumerate() {
            let classifier = Arc::clone(&self.classifier);
            tasks.spawn(async move {
                let result = classifier.classify(&image.data).await;
                (position, image.file_name, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, _, Ok(concepts))) => results[position] = concepts,
                Ok((position, file_name, Err(e))) => {
                    warn!(
                        service = self.classifier.name(),
                        position,
                        file = file_name.as_deref().unwrap_or("-"),
                        error = %e,
                        "classification failed; image contributes no concepts"
                    );
                }
                Err(e) => warn!("Classification task aborted: {}", e),
            }
        }

        results
    }

    /// Resolve every term concurrently into weighted fingerprints.
    async fn resolve_all(&self, terms: Vec<(String, f64)>) -> Vec<WeightedSdr> {
        let mut resolved: Vec<Option<WeightedSdr>> = vec![None; terms.len()];
        let mut tasks = JoinSet::new();

        for (position, (term, weight)) in terms.into_iter().enumerate() {
            let resolver = Arc::clone(&self.resolver);
            tasks.spawn(async move {
                let result = resolver.fingerprint(&term).await;
                (position, term, weight, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, _, weight, Ok(Some(fingerprint)))) => {
                    resolved[position] = Some(fingerprint.weighted(weight));
                }
                Ok((_, term, _, Ok(None))) => {
                    debug!(term = %term, "no fingerprint for term");
                }
                Ok((_, term, _, Err(e))) => {
                    warn!(
                        service = self.resolver.name(),
                        term = %term,
                        error = %e,
                        "fingerprint lookup failed; term contributes nothing"
                    );
                }
                Err(e) => warn!("Fingerprint task aborted: {}", e),
            }
        }

        resolved.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image2sdr_upstream::{StaticClassifier, StaticResolver};

    fn upload(data: &[u8]) -> ImageUpload {
        ImageUpload::new(Some("image.jpg".to_string()), data.to_vec())
    }

    fn service(
        classifier: StaticClassifier,
        resolver: StaticResolver,
        sdr_size: usize,
        sparsity: f64,
    ) -> (Image2SdrService, Arc<StaticClassifier>, Arc<StaticResolver>) {
        let classifier = Arc::new(classifier);
        let resolver = Arc::new(resolver);
        let service = Image2SdrService::new(
            classifier.clone(),
            resolver.clone(),
            SdrMerger::new(sdr_size, sparsity).unwrap(),
        );
        (service, classifier, resolver)
    }

    #[test]
    fn test_qualifying_terms() {
        let concepts = vec![
            Concept::new("Dog", 0.9),
            Concept::new("hard hat", 0.8),
            Concept::new(" canine ", 0.7),
            Concept::new("dog", 0.2),
            Concept::new("", 0.6),
        ];
        assert_eq!(
            qualifying_terms(&concepts),
            vec![("dog".to_string(), 0.9), ("canine".to_string(), 0.7)]
        );
    }

    #[tokio::test]
    async fn test_encode_merges_fingerprints() {
        let (service, _, resolver) = service(
            StaticClassifier::new(vec![
                Concept::new("dog", 0.9),
                Concept::new("no people", 0.8),
                Concept::new("Canine", 0.5),
            ]),
            StaticResolver::new()
                .with_term("dog", vec![1, 2, 3])
                .with_term("canine", vec![3, 4]),
            10,
            0.3,
        );

        // Scores: 1=0.9, 2=0.9, 3=1.4, 4=0.5
        let sdr = service.encode(vec![upload(b"img")]).await.unwrap();
        assert_eq!(sdr, vec![1, 2, 3]);

        let mut lookups = resolver.lookups();
        lookups.sort();
        assert_eq!(lookups, vec!["canine", "dog"]);
    }

    #[tokio::test]
    async fn test_encode_requires_images() {
        let (service, _, _) = service(StaticClassifier::default(), StaticResolver::new(), 10, 0.5);
        let err = service.encode(Vec::new()).await.unwrap_err();
        assert!(matches!(err, SdrError::MissingFiles));
    }

    #[tokio::test]
    async fn test_failed_classification_degrades() {
        let (service, _, resolver) = service(
            StaticClassifier::default().with_failure(b"bad".to_vec()),
            StaticResolver::new().with_term("dog", vec![1]),
            10,
            0.5,
        );

        let sdr = service.encode(vec![upload(b"bad")]).await.unwrap();
        assert!(sdr.is_empty());
        assert!(resolver.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_failed_lookup_degrades() {
        let (service, _, _) = service(
            StaticClassifier::new(vec![Concept::new("dog", 0.9), Concept::new("cat", 0.8)]),
            StaticResolver::new()
                .with_term("dog", vec![7, 9])
                .with_failure("cat"),
            10,
            1.0,
        );

        let sdr = service.encode(vec![upload(b"img")]).await.unwrap();
        assert_eq!(sdr, vec![7, 9]);
    }

    #[tokio::test]
    async fn test_only_first_image_merged() {
        let (service, classifier, resolver) = service(
            StaticClassifier::default()
                .with_image(b"first".to_vec(), vec![Concept::new("dog", 0.9)])
                .with_image(b"second".to_vec(), vec![Concept::new("cat", 0.9)]),
            StaticResolver::new()
                .with_term("dog", vec![1, 2])
                .with_term("cat", vec![5, 6]),
            10,
            1.0,
        );

        let sdr = service
            .encode(vec![upload(b"first"), upload(b"second")])
            .await
            .unwrap();
        assert_eq!(sdr, vec![1, 2]);
        assert_eq!(classifier.calls(), 2);
        assert_eq!(resolver.lookups(), vec!["dog"]);
    }

    struct SlowClassifier;

    #[async_trait]
    impl Classifier for SlowClassifier {
        async fn classify(&self, _image: &[u8]) -> Result<Vec<Concept>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_encode_timeout() {
        let service = Image2SdrService::new(
            Arc::new(SlowClassifier),
            Arc::new(StaticResolver::new()),
            SdrMerger::new(10, 0.5).unwrap(),
        )
        .with_request_timeout(Duration::from_millis(50));

        let err = service.encode(vec![upload(b"img")]).await.unwrap_err();
        assert!(matches!(err, SdrError::Timeout { .. }));
        assert_eq!(err.error_code(), "TIMEOUT");
    }

    async fn spawn_terms_server(app: axum::Router) -> Option<String> {
        let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                eprintln!("skipping pipeline test: local socket bind is not permitted");
                return None;
            }
            Err(err) => panic!("failed to bind terms server: {err}"),
        };
        let addr = listener.local_addr().ok()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Some(format!("http://{addr}"))
    }

    #[tokio::test]
    async fn test_hanging_lookup_keeps_other_terms() {
        use axum::extract::Query;
        use axum::routing::get;
        use image2sdr_core::CorticalIoConfig;
        use std::collections::HashMap;

        let app = axum::Router::new().route(
            "/rest/terms",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                if params.get("term").map(String::as_str) == Some("cat") {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                axum::Json(serde_json::json!([{"fingerprint": {"positions": [4, 5]}}]))
            }),
        );
        let Some(base) = spawn_terms_server(app).await else {
            return;
        };
        let config = CorticalIoConfig {
            url: format!("{base}/rest/"),
            ..Default::default()
        };
        let resolver = CorticalIoResolver::new(&config, Duration::from_millis(200)).unwrap();

        let service = Image2SdrService::new(
            Arc::new(StaticClassifier::new(vec![
                Concept::new("dog", 0.9),
                Concept::new("cat", 0.8),
            ])),
            Arc::new(resolver),
            SdrMerger::new(10, 1.0).unwrap(),
        )
        .with_request_timeout(Duration::from_secs(3));

        let started = Instant::now();
        let sdr = service.encode(vec![upload(b"img")]).await.unwrap();
        assert_eq!(sdr, vec![4, 5]);
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
