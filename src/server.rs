//! HTTP surface for the broadcast.
//!
//! | Path | Description |
//! |------|-------------|
//! | `/radio/stream` | Live WAV stream: header, then raw 16-bit PCM, held open |
//! | `/radio/info` | JSON status (`status`, `current_track`, levels, ...) |
//! | `/radio/now-playing` | JSON `{track, is_paused}` |
//! | `/radio/add_sponsored?audio_file=...` | Queue a sponsored message (GET or POST) |
//! | `/health` | Liveness probe |
//!
//! Every handler gets the same [`Broadcast`] handle through router state; a
//! client that disconnects only drops its own [`Subscription`](crate::Subscription).

use std::future::Future;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::broadcast::{Broadcast, BroadcastInfo};

/// Path of the audio stream.
pub const STREAM_PATH: &str = "/radio/stream";

/// Build the router for `broadcast`.
pub fn router(broadcast: Broadcast) -> Router {
    Router::new()
        .route(STREAM_PATH, get(handle_stream))
        .route("/radio/info", get(handle_info))
        .route("/radio/now-playing", get(handle_now_playing))
        .route(
            "/radio/add_sponsored",
            get(handle_add_sponsored).post(handle_add_sponsored),
        )
        .route("/health", get(|| async { "OK" }))
        .with_state(broadcast)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    broadcast: Broadcast,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("radio listening on http://{addr}{STREAM_PATH}");
    }
    axum::serve(listener, router(broadcast))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn handle_stream(State(broadcast): State<Broadcast>) -> Response {
    let body = Body::from_stream(broadcast.subscribe().into_stream());
    (
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (header::CACHE_CONTROL, "no-cache"),
            (
                header::CONTENT_DISPOSITION,
                "inline; filename=\"radio-stream.wav\"",
            ),
        ],
        body,
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct InfoResponse {
    #[serde(flatten)]
    info: BroadcastInfo,
    stream_url: &'static str,
    format: &'static str,
}

async fn handle_info(State(broadcast): State<Broadcast>) -> Json<InfoResponse> {
    Json(InfoResponse {
        info: broadcast.broadcast_info(),
        stream_url: STREAM_PATH,
        format: "WAV",
    })
}

#[derive(Debug, Serialize)]
struct NowPlaying {
    track: String,
    is_paused: bool,
}

async fn handle_now_playing(State(broadcast): State<Broadcast>) -> Json<NowPlaying> {
    let (track, is_paused) = broadcast.current_track();
    Json(NowPlaying { track, is_paused })
}

#[derive(Debug, Deserialize)]
struct AddSponsored {
    audio_file: Option<String>,
}

async fn handle_add_sponsored(
    State(broadcast): State<Broadcast>,
    Query(params): Query<AddSponsored>,
) -> Response {
    match params.audio_file.filter(|p| !p.trim().is_empty()) {
        Some(path) => {
            let queued = broadcast.add_sponsored_message(path);
            Json(serde_json::json!({ "success": true, "queued": queued })).into_response()
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "success": false,
                "message": "missing 'audio_file' query parameter",
            })),
        )
            .into_response(),
    }
}
