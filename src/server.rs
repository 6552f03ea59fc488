use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    errors::{AnnotatorError, Result},
    package::{BoxCenter, LocateRequest, ScoringResponse},
    traits::ObjectDetector,
    AnnotationPipeline,
};

type SharedPipeline<D> = Arc<AnnotationPipeline<D>>;

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

/// Builds the application router around a shared pipeline.
pub fn router<D: ObjectDetector + 'static>(
    pipeline: SharedPipeline<D>,
    max_body_bytes: usize,
) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/annotate/", post(annotate::<D>))
        .route("/annotate", post(annotate::<D>))
        .route("/score", post(score::<D>))
        .route("/predict", post(predict::<D>))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

/// Binds `addr` and serves until Ctrl+C.
pub async fn serve<D: ObjectDetector + 'static>(
    pipeline: SharedPipeline<D>,
    addr: SocketAddr,
    max_body_bytes: usize,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(pipeline, max_body_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Runs CPU-bound pipeline work off the async executor.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AnnotatorError::inference("pipeline task", e))?
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Direct upload: multipart image in, JPEG out. Failures are plain server
/// errors without a structured body.
async fn annotate<D: ObjectDetector + 'static>(
    State(pipeline): State<SharedPipeline<D>>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AnnotatorError::validation(UPLOAD_FIELD, e.body_text()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let data = field
                .bytes()
                .await
                .map_err(|e| AnnotatorError::validation(UPLOAD_FIELD, e.body_text()))?;
            upload = Some(data);
            break;
        }
    }
    let data = upload.ok_or_else(|| AnnotatorError::validation(UPLOAD_FIELD, "is required"))?;

    let jpeg = run_blocking(move || pipeline.annotate_to_jpeg(&data)).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response())
}

/// JSON scoring: always answers 200 with either the annotated shape or the
/// error shape, including when the body itself could not be read.
async fn score<D: ObjectDetector + 'static>(
    State(pipeline): State<SharedPipeline<D>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Json<ScoringResponse> {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let err = AnnotatorError::validation("request body", rejection.body_text());
            error!("Error during processing: {err}");
            return Json(ScoringResponse::failed(&err));
        }
    };
    let response = run_blocking(move || Ok(pipeline.score(&body)))
        .await
        .unwrap_or_else(|e| {
            error!("Error during processing: {e}");
            ScoringResponse::failed(&e)
        });
    Json(response)
}

/// Remote inference: fetch the image at `image_url` and return box centers.
async fn predict<D: ObjectDetector + 'static>(
    State(pipeline): State<SharedPipeline<D>>,
    body: Bytes,
) -> Result<Json<Vec<BoxCenter>>> {
    let request: LocateRequest = serde_json::from_slice(&body)
        .map_err(|e| AnnotatorError::validation("request body", e.to_string()))?;
    let centers = run_blocking(move || pipeline.locate_url(&request.image_url)).await?;
    Ok(Json(centers))
}

impl IntoResponse for AnnotatorError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!("request failed ({}): {self}", self.kind());
        (status, self.to_string()).into_response()
    }
}
