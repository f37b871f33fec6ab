//! HTTP and WebSocket control surface.
//!
//! | Method | Path | Action |
//! |---|---|---|
//! | GET | `/health` | liveness plus session counts |
//! | GET | `/sessions` | every registered session |
//! | GET | `/sessions/{id}` | one session |
//! | POST | `/sessions/{id}` | start a fresh session |
//! | POST | `/sessions/{id}/restore` | start a session from its stored auth |
//! | DELETE | `/sessions/{id}` | stop a session, keep its record |
//! | DELETE | `/sessions/{id}/record` | stop a session and delete its record |
//! | GET | `/ws` | event stream (routed only when enabled) |

use std::future::Future;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use sessiond::{HubError, SessionEvent, SessionSummary};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::app::App;

/// [`HubError`] as an HTTP response: `{"error": "..."}` with a matching status.
#[derive(Debug)]
pub struct ApiError(HubError);

impl From<HubError> for ApiError {
	fn from(err: HubError) -> Self {
		Self(err)
	}
}

impl ApiError {
	fn status(&self) -> StatusCode {
		match self.0 {
			HubError::NotFound(_) => StatusCode::NOT_FOUND,
			HubError::DuplicateSession(_) => StatusCode::CONFLICT,
			HubError::InvalidSessionId(_) => StatusCode::BAD_REQUEST,
			HubError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			warn!(target = "sessiond.http", error = %self.0, %status, "request failed");
		}
		(status, Json(json!({ "error": self.0.to_string() }))).into_response()
	}
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(app: App) -> Router {
	let mut router = Router::new()
		.route("/health", get(health))
		.route("/sessions", get(list_sessions))
		.route("/sessions/{id}", get(get_session).post(create_session).delete(stop_session))
		.route("/sessions/{id}/restore", post(restore_session))
		.route("/sessions/{id}/record", delete(delete_session));
	if app.broadcast.is_some() {
		router = router.route("/ws", get(events_socket));
	}
	router.with_state(app)
}

/// Serves until `shutdown` resolves, then stops every session.
pub async fn serve(listener: TcpListener, app: App, shutdown: impl Future<Output = ()> + Send + 'static) -> std::io::Result<()> {
	let manager = app.manager.clone();
	if let Ok(addr) = listener.local_addr() {
		info!(target = "sessiond.http", %addr, websocket = app.broadcast.is_some(), "listening");
	}

	let result = axum::serve(listener, router(app)).with_graceful_shutdown(shutdown).await;
	manager.shutdown().await;
	result
}

async fn health(State(app): State<App>) -> Json<serde_json::Value> {
	Json(json!({
		"status": "ok",
		"sessions": app.manager.sessions().len(),
		"active": app.manager.list_active().len(),
	}))
}

async fn list_sessions(State(app): State<App>) -> Json<Vec<SessionSummary>> {
	Json(app.manager.sessions())
}

async fn get_session(State(app): State<App>, Path(id): Path<String>) -> ApiResult<Json<SessionSummary>> {
	Ok(Json(app.manager.session(&id)?))
}

async fn create_session(State(app): State<App>, Path(id): Path<String>) -> ApiResult<(StatusCode, Json<SessionSummary>)> {
	app.manager.create_session(&id).await?;
	info!(target = "sessiond.http", session_id = %id, "session creation requested");
	Ok((StatusCode::ACCEPTED, Json(app.manager.session(&id)?)))
}

async fn restore_session(State(app): State<App>, Path(id): Path<String>) -> ApiResult<(StatusCode, Json<SessionSummary>)> {
	app.manager.restore_session(&id).await?;
	info!(target = "sessiond.http", session_id = %id, "session restore requested");
	Ok((StatusCode::ACCEPTED, Json(app.manager.session(&id)?)))
}

async fn stop_session(State(app): State<App>, Path(id): Path<String>) -> ApiResult<Json<SessionSummary>> {
	Ok(Json(app.manager.stop_session(&id).await?))
}

async fn delete_session(State(app): State<App>, Path(id): Path<String>) -> ApiResult<StatusCode> {
	app.manager.delete_session(&id).await?;
	Ok(StatusCode::NO_CONTENT)
}

async fn events_socket(State(app): State<App>, ws: WebSocketUpgrade) -> Response {
	match app.broadcast {
		Some(sink) => {
			let events = sink.subscribe();
			ws.on_upgrade(move |socket| forward_events(socket, events)).into_response()
		}
		None => StatusCode::NOT_FOUND.into_response(),
	}
}

async fn forward_events(socket: WebSocket, mut events: broadcast::Receiver<SessionEvent>) {
	let (mut tx, mut rx) = socket.split();
	debug!(target = "sessiond.http", "websocket subscriber connected");

	loop {
		tokio::select! {
			event = events.recv() => match event {
				Ok(event) => {
					let text = match serde_json::to_string(&event) {
						Ok(text) => text,
						Err(err) => {
							warn!(target = "sessiond.http", error = %err, "failed to encode event");
							continue;
						}
					};
					if tx.send(Message::Text(text.into())).await.is_err() {
						break;
					}
				}
				Err(RecvError::Lagged(skipped)) => {
					warn!(target = "sessiond.http", skipped, "websocket subscriber lagged; events dropped");
				}
				Err(RecvError::Closed) => break,
			},
			incoming = rx.next() => match incoming {
				Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
				Some(Ok(_)) => {}
			},
		}
	}

	let _ = tx.close().await;
	debug!(target = "sessiond.http", "websocket subscriber disconnected");
}
