//! HTTP surface: POST /image (multipart) -> {"sdr": [...]}.
//!
//! A request without image files is answered with 400. Upstream failures
//! never surface here; they only shrink the merged SDR.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn, Instrument};
use ulid::Ulid;

use image2sdr_core::{ImageUpload, Result, SdrError, SdrResponse, ServiceConfig};

use crate::pipeline::Image2SdrService;

/// CORS preflight cache lifetime.
const PREFLIGHT_MAX_AGE_SECS: u64 = 600;

/// Error returned by handlers, rendered as `{error, details, code}`.
#[derive(Debug)]
pub struct ApiError(pub SdrError);

impl From<SdrError> for ApiError {
    fn from(err: SdrError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    details: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SdrError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            SdrError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            err if err.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error = if status == StatusCode::BAD_REQUEST {
            "Bad request"
        } else {
            status.canonical_reason().unwrap_or("Error")
        };

        let body = ErrorBody {
            error: error.to_string(),
            details: self.0.to_string(),
            code: self.0.error_code(),
        };
        (status, Json(body)).into_response()
    }
}

/// Response body for the health endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sdr_size: usize,
    pub sparsity: f64,
    pub max_bits: usize,
}

#[derive(Clone)]
struct AppState {
    service: Arc<Image2SdrService>,
}

/// Body-limit hits become 413; anything else is a malformed upload.
fn upload_error(context: &str, err: MultipartError) -> SdrError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        SdrError::PayloadTooLarge {
            message: err.to_string(),
        }
    } else {
        SdrError::invalid_argument(format!("{}: {}", context, err))
    }
}

/// Collect every multipart field that carries a file name.
async fn read_images(mut multipart: Multipart) -> Result<Vec<ImageUpload>> {
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error("Malformed upload", e))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| upload_error(&format!("Failed to read '{}'", file_name), e))?;
        images.push(ImageUpload::new(Some(file_name), data.to_vec()));
    }

    Ok(images)
}

async fn handle_image(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<SdrResponse>, ApiError> {
    let request_id = Ulid::new();
    encode_upload(&state, multipart)
        .instrument(info_span!("image", %request_id))
        .await
}

async fn encode_upload(
    state: &AppState,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<SdrResponse>, ApiError> {
    let multipart = multipart.map_err(|rejection| {
        debug!("Not a multipart upload: {}", rejection);
        SdrError::MissingFiles
    })?;

    let images = read_images(multipart).await?;
    if images.is_empty() {
        return Err(SdrError::MissingFiles.into());
    }
    info!("Received {} image(s)", images.len());

    let sdr = state.service.encode(images).await?;
    Ok(Json(SdrResponse { sdr }))
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let merger = state.service.merger();
    Json(HealthResponse {
        status: "healthy",
        sdr_size: merger.sdr_size(),
        sparsity: merger.sparsity(),
        max_bits: merger.target_bits(),
    })
}

/// Build the service router.
///
/// CORS accepts any origin. Request tracing is enabled outside production.
pub fn router(service: Image2SdrService, config: &ServiceConfig) -> Router {
    let state = AppState {
        service: Arc::new(service),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::DELETE,
            Method::POST,
            Method::OPTIONS,
        ])
        .max_age(Duration::from_secs(PREFLIGHT_MAX_AGE_SECS));

    let app = Router::new()
        .route("/image", post(handle_image))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(cors)
        .with_state(state);

    if config.is_production() {
        app
    } else {
        app.layer(TraceLayer::new_for_http())
    }
}

/// Run the HTTP server until Ctrl+C or SIGTERM.
pub async fn run_http(config: &ServiceConfig) -> Result<()> {
    let service = Image2SdrService::from_config(config)?;
    let app = router(service, config);

    let bind_addr = config.bind_address();
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        "image2sdr listening on {} (environment={})",
        bind_addr, config.environment
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("image2sdr stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
