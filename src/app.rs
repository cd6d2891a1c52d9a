//! HTTP API for the imagery table.
//!
//! Each endpoint deserialises and validates its request data, takes a
//! snapshot of the table and calls a pure function from [crate::inspector]
//! or [crate::animation]. CPU-bound work runs on the blocking thread pool.

use crate::animation;
use crate::app_state::{ReloadOutcome, SharedAppState};
use crate::dataset::{Column, SCHEMA};
use crate::error::AquaviewError;
use crate::inspector;
use crate::metrics;
use crate::models;
use crate::validated_json::ValidatedJson;

use axum::{
    extract::{Json, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::normalize_path::NormalizePath;
use tower_http::trace::TraceLayer;

static HEADER_FRAMES: header::HeaderName = header::HeaderName::from_static("x-aquaview-frames");
static HEADER_FRAME_MS: header::HeaderName = header::HeaderName::from_static("x-aquaview-frame-ms");

/// Filename suggested for CSV downloads.
const CSV_FILENAME: &str = "modis_aqua_data.csv";

/// The table's CSV export as a downloadable response.
struct CsvDownload(Bytes);

impl IntoResponse for CsvDownload {
    fn into_response(self) -> Response {
        (
            [
                (&header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
                (
                    &header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{CSV_FILENAME}\""),
                ),
            ],
            self.0,
        )
            .into_response()
    }
}

/// An encoded animation as a downloadable response, with its frame count and
/// timing exposed as headers.
struct GifDownload(animation::Animation);

impl IntoResponse for GifDownload {
    fn into_response(self) -> Response {
        (
            [
                (&header::CONTENT_TYPE, mime::IMAGE_GIF.to_string()),
                (
                    &header::CONTENT_DISPOSITION,
                    format!(
                        "attachment; filename=\"{}\"",
                        animation::filename(self.0.frames)
                    ),
                ),
                (&HEADER_FRAMES, self.0.frames.to_string()),
                (&HEADER_FRAME_MS, self.0.frame_duration_ms.to_string()),
            ],
            self.0.gif,
        )
            .into_response()
    }
}

/// The service type served by the application.
pub type Service = NormalizePath<Router>;

/// Build the service, with trailing slashes normalised away.
pub fn service(state: SharedAppState) -> Service {
    NormalizePath::trim_trailing_slash(router(state))
}

/// Build the API router.
pub fn router(state: SharedAppState) -> Router {
    fn v1() -> Router<SharedAppState> {
        Router::new()
            .route("/summary", get(summary))
            .route("/preview", post(preview))
            .route("/describe", get(describe))
            .route("/csv", get(csv))
            .route("/animate", post(animate))
            .route("/reload", post(reload))
    }

    Router::new()
        .route("/.well-known/aquaview-schema", get(schema))
        .nest("/v1", v1())
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .on_request(metrics::request_counter)
                    .on_response(metrics::record_response_metrics),
            ),
        )
}

/// The table schema, derived columns included.
async fn schema() -> Json<&'static [Column]> {
    Json(SCHEMA)
}

async fn summary(State(state): State<SharedAppState>) -> Json<models::TableSummary> {
    Json(inspector::summary(&state.dataset.table()))
}

async fn preview(
    State(state): State<SharedAppState>,
    ValidatedJson(mode): ValidatedJson<models::PreviewMode>,
) -> Result<Json<models::Preview>, AquaviewError> {
    let table = state.dataset.table();
    Ok(Json(inspector::preview(&table, &mode)?))
}

async fn describe(State(state): State<SharedAppState>) -> Json<models::DescribeReport> {
    Json(inspector::describe(&state.dataset.table()))
}

async fn csv(State(state): State<SharedAppState>) -> Result<CsvDownload, AquaviewError> {
    let table = state.dataset.table();
    let state = Arc::clone(&state);
    let bytes = tokio::task::spawn_blocking(move || state.dataset.csv(&table)).await??;
    Ok(CsvDownload(bytes))
}

async fn animate(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::AnimationRequest>,
) -> Result<GifDownload, AquaviewError> {
    let (m0, m1) = request.months;
    tracing::info!(
        years = ?request.years,
        fps = %request.fps,
        "building animation for {} to {}",
        models::month_name(m0).unwrap_or("?"),
        models::month_name(m1).unwrap_or("?"),
    );
    let table = state.dataset.table();
    let animation = tokio::task::spawn_blocking(move || {
        animation::build_animation(&table, &request, |fraction| {
            tracing::debug!(fraction, "animation progress");
        })
    })
    .await??;
    metrics::record_animation(animation.frames);
    Ok(GifDownload(animation))
}

async fn reload(State(state): State<SharedAppState>) -> Result<Json<ReloadOutcome>, AquaviewError> {
    let state = Arc::clone(&state);
    let outcome = tokio::task::spawn_blocking(move || state.dataset.reload()).await??;
    metrics::DATASET_RELOADS.inc();
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use crate::dataset::to_msgpack;
    use crate::test_utils;

    use axum::{
        body::Body,
        http::{self, Request, StatusCode},
    };
    use image::codecs::gif::GifDecoder;
    use image::AnimationDecoder;
    use std::io::Cursor;
    use tower::ServiceExt;

    fn test_state(dir: &tempfile::TempDir) -> SharedAppState {
        let path = dir.path().join("modis.msgpack");
        std::fs::write(&path, to_msgpack(test_utils::test_table().records()).unwrap()).unwrap();
        AppState::new(path, "image").unwrap()
    }

    async fn get_request(state: SharedAppState, uri: &str) -> Response {
        router(state)
            .oneshot(
                Request::builder()
                    .method(http::Method::GET)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn post_request(state: SharedAppState, uri: &str, body: &str) -> Response {
        router(state)
            .oneshot(
                Request::builder()
                    .method(http::Method::POST)
                    .uri(uri)
                    .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        hyper::body::to_bytes(response.into_body())
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn schema_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let response = get_request(test_state(&dir), "/.well-known/aquaview-schema").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let columns = json.as_array().unwrap();
        assert_eq!(columns.len(), SCHEMA.len());
        assert_eq!(columns[0]["name"], "granule_id");
        assert_eq!(columns[0]["kind"], "str");
        assert_eq!(columns[5]["kind"], "image");
    }

    #[tokio::test]
    async fn summary_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let response = get_request(test_state(&dir), "/v1/summary").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["rows"], 3);
        assert_eq!(json["columns"], 8);
        assert!(json["memory_bytes"].as_u64().unwrap() > 0);
        assert_eq!(json["column_types"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn preview_endpoint_head() {
        let dir = tempfile::tempdir().unwrap();
        let response =
            post_request(test_state(&dir), "/v1/preview", r#"{"mode": "head", "rows": 2}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let rows = json["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["granule_id"], "A");
        assert_eq!(rows[0]["year"], 2020);
        assert_eq!(rows[0]["month"], 6);
        assert_eq!(rows[0]["has_image"], true);
    }

    #[tokio::test]
    async fn preview_endpoint_slice_out_of_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"mode": "slice", "start": 1, "end": 9}"#;
        let response = post_request(test_state(&dir), "/v1/preview", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(
            json["error"]["message"],
            "preview request is not valid for this table"
        );
    }

    #[tokio::test]
    async fn preview_endpoint_invalid_request() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"mode": "sample", "size": 0}"#;
        let response = post_request(test_state(&dir), "/v1/preview", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "request data is not valid");
    }

    #[tokio::test]
    async fn describe_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let response = get_request(test_state(&dir), "/v1/describe").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let year = json["numeric"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["column"] == "year")
            .unwrap()
            .clone();
        assert_eq!(year["count"], 3);
        assert_eq!(year["min"], 2019.0);
        assert_eq!(year["max"], 2020.0);
        let granules = json["non_numeric"]
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["column"] == "granule_id")
            .unwrap()
            .clone();
        assert_eq!(granules["unique"], 3);
    }

    #[tokio::test]
    async fn csv_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let response = get_request(test_state(&dir), "/v1/csv").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"modis_aqua_data.csv\""
        );
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        let header_line = body.lines().next().unwrap();
        assert_eq!(
            header_line,
            "granule_id,start_date,satellite,resolution_km,cloud_fraction,image,year,month"
        );
        assert_eq!(body.lines().count(), 4);
    }

    #[tokio::test]
    async fn animate_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"years": [2019, 2020], "months": [1, 12], "fps": 5.0}"#;
        let response = post_request(test_state(&dir), "/v1/animate", body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&header::CONTENT_TYPE], "image/gif");
        assert_eq!(response.headers()[&HEADER_FRAMES], "3");
        assert_eq!(response.headers()[&HEADER_FRAME_MS], "200");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"modis_aqua_animation_3frames.gif\""
        );
        let gif = body_bytes(response).await;
        let decoder = GifDecoder::new(Cursor::new(gif.as_slice())).unwrap();
        let frames = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].buffer().width(), 800);
        assert_eq!(frames[0].buffer().height(), 600);
    }

    #[tokio::test]
    async fn animate_endpoint_too_few_frames() {
        let dir = tempfile::tempdir().unwrap();
        // Only one granule falls in June.
        let body = r#"{"years": [2019, 2020], "months": [6, 6], "fps": 5.0}"#;
        let response = post_request(test_state(&dir), "/v1/animate", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(
            json["error"]["message"],
            "need at least 2 frames to create an animation (1 selected)"
        );
    }

    #[tokio::test]
    async fn animate_endpoint_unsupported_fps() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"years": [2019, 2020], "months": [1, 12], "fps": 3.0}"#;
        let response = post_request(test_state(&dir), "/v1/animate", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn animate_endpoint_inverted_years() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"years": [2021, 2019], "months": [1, 12], "fps": 5.0}"#;
        let response = post_request(test_state(&dir), "/v1/animate", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "request data is not valid");
    }

    #[tokio::test]
    async fn reload_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let response = post_request(Arc::clone(&state), "/v1/reload", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["generation"], 2);
        assert_eq!(json["rows"], 3);
        assert_eq!(state.dataset.generation(), 2);
    }

    #[tokio::test]
    async fn metrics_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let response = get_request(test_state(&dir), "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
