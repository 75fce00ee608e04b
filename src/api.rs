use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

use crate::dispatch::Dispatcher;
use crate::errors::{LedgerError, LedgerResult};
use crate::queue::QueuePublisher;
use crate::services::Services;
use crate::types::Envelope;

#[derive(Clone)]
struct AppState {
    services: Arc<Services>,
    dispatcher: Arc<Dispatcher>,
    queue: Arc<QueuePublisher>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct AcceptedResponse {
    request_id: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Ops surface. The queue remains the primary ingress; these endpoints
/// dispatch an envelope synchronously, enqueue one, or read back a cached
/// response.
pub async fn serve(
    services: Arc<Services>,
    dispatcher: Arc<Dispatcher>,
    queue: Arc<QueuePublisher>,
    addr: SocketAddr,
) -> LedgerResult<()> {
    let state = AppState {
        services,
        dispatcher,
        queue,
    };
    let router = Router::new()
        .route("/health", get(health))
        .route("/v1/blockchain", post(dispatch_envelope))
        .route("/v1/blockchain/queue", post(enqueue_envelope))
        .route("/v1/blockchain/responses/:request_id", get(response_by_id))
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!(?addr, "ops API listening");
    axum::serve(listener, router)
        .await
        .map_err(|err| LedgerError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn dispatch_envelope(
    State(state): State<AppState>,
    Json(envelope): Json<Envelope>,
) -> Result<Json<Envelope>, (StatusCode, Json<ErrorResponse>)> {
    let dispatcher = state.dispatcher.clone();
    tokio::task::spawn_blocking(move || dispatcher.dispatch(&envelope))
        .await
        .map(Json)
        .map_err(|err| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            )
        })
}

async fn enqueue_envelope(
    State(state): State<AppState>,
    Json(envelope): Json<Envelope>,
) -> Result<(StatusCode, Json<AcceptedResponse>), (StatusCode, Json<ErrorResponse>)> {
    let request_id = envelope.request_id.clone();
    state.queue.publish(&envelope).await.map_err(|err| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
    })?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { request_id })))
}

async fn response_by_id(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<Envelope>, (StatusCode, Json<ErrorResponse>)> {
    match state.services.cache.get_json::<Envelope>(&request_id) {
        Ok(Some(envelope)) => Ok(Json(envelope)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no response for request: {request_id}"),
            }),
        )),
        Err(err) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )),
    }
}
