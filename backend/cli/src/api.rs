use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use reelchat_core::{ReelError, VideoError};
use reelchat_media::VideoPreview;
use reelchat_understanding::VideoChatService;

/// Shared application state for API handlers.
pub struct AppState {
    pub service: VideoChatService,
}

/// Build the Axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/system", get(system))
        .route("/api/videos/info", post(video_info))
        .route("/api/videos/encode", post(encode_video))
        .route("/api/chat", post(chat))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    pub path: PathBuf,
    #[serde(default)]
    pub fps: Option<u32>,
    #[serde(default)]
    pub force_packing: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub path: PathBuf,
    pub question: String,
    #[serde(default)]
    pub fps: Option<u32>,
    #[serde(default)]
    pub force_packing: Option<usize>,
}

/// Handler failure rendered as `{ "error": ... }`.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let status = status_for(&err);
        let message = format!("{err:#}");
        tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        Self { status, message }
    }
}

/// Status for a handler failure, from the first typed error in its chain.
fn status_for(err: &anyhow::Error) -> StatusCode {
    for cause in err.chain() {
        if let Some(video) = cause.downcast_ref::<VideoError>() {
            return match video {
                VideoError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                VideoError::Open { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
        }
        if let Some(reel) = cause.downcast_ref::<ReelError>() {
            return match reel {
                ReelError::Video(VideoError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
                ReelError::Video(VideoError::Open { .. }) => StatusCode::NOT_FOUND,
                ReelError::Video(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ReelError::Provider { .. } => StatusCode::BAD_GATEWAY,
                ReelError::Config(_) | ReelError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
    }
    StatusCode::INTERNAL_SERVER_ERROR
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "reelchat",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Provider, device and encoder settings.
async fn system(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.service.system_info())
}

/// Stream properties plus a human-readable preview.
async fn video_info(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VideoRequest>,
) -> Result<Json<Value>, ApiError> {
    let info = state.service.video_info(&req.path).await?;
    Ok(Json(json!({
        "info": info,
        "preview": VideoPreview::from(&info),
    })))
}

/// Run the encoder and report the plan and temporal groups.
async fn encode_video(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VideoRequest>,
) -> Result<Json<Value>, ApiError> {
    let encoded = state
        .service
        .process_video(&req.path, req.fps, req.force_packing)
        .await?;
    Ok(Json(json!({
        "summary": encoded.summary(),
        "indices": encoded.indices(),
    })))
}

/// Encode the video and answer one question about it.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question cannot be empty"));
    }
    let response = state
        .service
        .chat_with_video(&req.path, &req.question, req.fps, req.force_packing)
        .await?;
    Ok(Json(json!({
        "answer": response.content,
        "provider": response.provider,
        "model": response.model,
        "tokensUsed": response.tokens_used,
        "latencyMs": response.latency_ms,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelchat_core::SamplingConfig;
    use reelchat_media::{SyntheticBackend, SyntheticVideo, VideoEncoder};
    use reelchat_understanding::{ChatOptions, MockVisionProvider};

    fn state_with(path: &std::path::Path, video: SyntheticVideo) -> Arc<AppState> {
        let backend = SyntheticBackend::new().with_video(path, video);
        let encoder = Arc::new(VideoEncoder::new(SamplingConfig::default(), Arc::new(backend)));
        let provider = Arc::new(MockVisionProvider::new("mock").with_response("a red square"));
        let service = VideoChatService::new(encoder, provider, ChatOptions::default());
        Arc::new(AppState { service })
    }

    fn video_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"synthetic").unwrap();
        path
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn encode_returns_groups() {
        let dir = tempfile::tempdir().unwrap();
        let path = video_file(&dir);
        let state = state_with(&path, SyntheticVideo::new(30.0, 300));

        let Json(body) = encode_video(
            State(state),
            Json(VideoRequest {
                path,
                fps: Some(5),
                force_packing: None,
            }),
        )
        .await
        .ok()
        .unwrap();
        assert_eq!(body["summary"]["frameCount"], 50);
        assert_eq!(body["indices"].as_array().unwrap().len(), 50);
    }

    #[tokio::test]
    async fn chat_answers_question() {
        let dir = tempfile::tempdir().unwrap();
        let path = video_file(&dir);
        let state = state_with(&path, SyntheticVideo::new(30.0, 300));

        let Json(body) = chat(
            State(state),
            Json(ChatRequest {
                path,
                question: "What is shown?".into(),
                fps: None,
                force_packing: None,
            }),
        )
        .await
        .ok()
        .unwrap();
        assert_eq!(body["answer"], "a red square");
        assert_eq!(body["provider"], "mock");
    }

    #[tokio::test]
    async fn missing_video_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.mp4");
        let state = state_with(&path, SyntheticVideo::new(30.0, 300));

        let err = video_info(
            State(state),
            Json(VideoRequest {
                path,
                fps: None,
                force_packing: None,
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn zero_fps_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = video_file(&dir);
        let state = state_with(&path, SyntheticVideo::new(30.0, 300));

        let err = encode_video(
            State(state),
            Json(VideoRequest {
                path,
                fps: Some(0),
                force_packing: None,
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn provider_failure_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let path = video_file(&dir);
        let backend = SyntheticBackend::new().with_video(&path, SyntheticVideo::new(30.0, 300));
        let encoder = Arc::new(VideoEncoder::new(SamplingConfig::default(), Arc::new(backend)));
        let provider = Arc::new(MockVisionProvider::new("mock").failing_on("boom"));
        let service = VideoChatService::new(encoder, provider, ChatOptions::default());

        let err = chat(
            State(Arc::new(AppState { service })),
            Json(ChatRequest {
                path,
                question: "boom".into(),
                fps: None,
                force_packing: None,
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn untyped_failure_is_internal_error() {
        let err = ApiError::from(anyhow::anyhow!("disk full"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(anyhow::Error::from(ReelError::Config("bad".into())));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(
            anyhow::Error::from(VideoError::decode(3, "corrupt")).context("Failed to process video"),
        );
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = video_file(&dir);
        let state = state_with(&path, SyntheticVideo::new(30.0, 300));

        let err = chat(
            State(state),
            Json(ChatRequest {
                path,
                question: "  ".into(),
                fps: None,
                force_packing: None,
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
