use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    http::header,
    response::{Html, IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use std::convert::Infallible;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::models::{
    messages, ExtractTextRequest, HealthResponse, ImageDataResponse, ProcessUrlRequest,
};
use super::state::AppState;
use crate::error::{AppError, Result};
use crate::gateway::ChatRequest;
use crate::metrics::METRICS;
use crate::relay::relay;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Multipart field carrying the upload
const IMAGE_FIELD: &str = "image";

fn record(endpoint: &str, start: Instant, success: bool) {
    METRICS.record_request(endpoint, success, start.elapsed().as_secs_f64());
}

/// Front-end page
///
/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Liveness probe
///
/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.gateway.model().to_string(),
    })
}

/// Prometheus exposition
///
/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.export_prometheus(),
    )
}

/// Ask the model about an image and stream its answer
///
/// POST /api/extract-text
pub async fn extract_text(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ExtractTextRequest>, JsonRejection>,
) -> Result<Response> {
    let start = Instant::now();

    let Json(request) = payload.map_err(|rejection| {
        record("extract_text", start, false);
        AppError::rejected(rejection.status(), rejection.body_text())
    })?;

    let Some(extraction) = request.into_extraction() else {
        record("extract_text", start, false);
        return Err(AppError::validation(messages::NO_IMAGE_DATA));
    };

    let request_id = Uuid::new_v4();
    info!(
        "Extract-text request {}: image_len={}, question_len={}, thinking={}",
        request_id,
        extraction.image.len(),
        extraction.question.chars().count(),
        extraction.enable_thinking
    );

    let chat = ChatRequest::new(
        state.gateway.model(),
        extraction.image,
        extraction.question,
        extraction.enable_thinking,
    );

    let chunks = match state.gateway.stream_chat(chat).await {
        Ok(chunks) => chunks,
        Err(e) => {
            record("extract_text", start, false);
            error!("Failed to open model stream for {}: {}", request_id, e);
            return Err(AppError::Gateway(e));
        }
    };

    record("extract_text", start, true);
    info!("Relaying model stream for {}", request_id);

    let frames = relay(chunks, state.relay).map(|event| Ok::<_, Infallible>(event.to_frame()));

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

/// Normalize an uploaded image into a JPEG data URL
///
/// POST /api/upload-image
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageDataResponse>> {
    let start = Instant::now();

    let result = read_and_normalize(&state, multipart).await;
    record("upload_image", start, result.is_ok());

    let image_data = result?;
    Ok(Json(ImageDataResponse::ok(image_data, messages::UPLOAD_SUCCEEDED)))
}

async fn read_and_normalize(
    state: &AppState,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<String> {
    let mut multipart =
        multipart.map_err(|rejection| AppError::rejected(rejection.status(), rejection.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::rejected(e.status(), e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        // Plain form values named `image` are not files
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(AppError::validation(messages::NO_FILE_SELECTED));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
        if bytes.is_empty() {
            return Err(AppError::validation(messages::EMPTY_IMAGE_FILE));
        }

        info!("Upload received: file={}, bytes={}", file_name, bytes.len());

        return state.normalizer.normalize_async(bytes).await.map_err(|e| {
            warn!("Image normalization failed for {}: {}", file_name, e);
            AppError::Decode(e)
        });
    }

    Err(AppError::validation(messages::NO_IMAGE_FILE))
}

/// Pass an externally hosted image URL through unchanged
///
/// POST /api/process-url
pub async fn process_url(
    payload: std::result::Result<Json<ProcessUrlRequest>, JsonRejection>,
) -> Result<Json<ImageDataResponse>> {
    let start = Instant::now();

    let url = match payload {
        Ok(Json(ProcessUrlRequest { url: Some(url) })) if !url.is_empty() => url,
        Ok(_) => {
            record("process_url", start, false);
            return Err(AppError::validation(messages::NO_IMAGE_URL));
        }
        Err(rejection) => {
            record("process_url", start, false);
            return Err(AppError::rejected(rejection.status(), rejection.body_text()));
        }
    };

    info!("Process-url request: url_len={}", url.len());
    record("process_url", start, true);

    Ok(Json(ImageDataResponse::ok(url, messages::URL_PROCESSED)))
}
