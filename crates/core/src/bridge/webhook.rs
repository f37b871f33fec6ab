//! HTTP webhook sink.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use sessiond_protocol::{EventType, SessionEvent};
use tracing::debug;

use super::sink::EventSink;
use crate::error::{HubError, Result};

/// POSTs each event as JSON to a fixed URL.
///
/// Any transport error or non-2xx status counts as a failed delivery.
#[derive(Debug, Clone)]
pub struct WebhookSink {
	client: reqwest::Client,
	url: reqwest::Url,
	events: Option<HashSet<EventType>>,
}

impl WebhookSink {
	pub fn new(url: &str, timeout: Duration) -> Result<Self> {
		let url = reqwest::Url::parse(url).map_err(|e| HubError::Config(format!("webhook url {url:?}: {e}")))?;
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| HubError::Config(format!("Failed to create HTTP client: {}", e)))?;
		Ok(Self { client, url, events: None })
	}

	/// Restricts delivery to `events`.
	pub fn with_events(mut self, events: impl IntoIterator<Item = EventType>) -> Self {
		self.events = Some(events.into_iter().collect());
		self
	}

	pub fn url(&self) -> &str {
		self.url.as_str()
	}

	fn failure(&self, message: String) -> HubError {
		HubError::Delivery {
			sink: self.name().to_string(),
			message,
		}
	}
}

#[async_trait]
impl EventSink for WebhookSink {
	fn name(&self) -> &str {
		"webhook"
	}

	fn accepts(&self, event_type: EventType) -> bool {
		self.events.as_ref().is_none_or(|events| events.contains(&event_type))
	}

	async fn deliver(&self, event: &SessionEvent) -> Result<()> {
		let response = self
			.client
			.post(self.url.clone())
			.json(event)
			.send()
			.await
			.map_err(|e| self.failure(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			return Err(self.failure(format!("unexpected status {status}")));
		}

		debug!(
			target = "sessiond.bridge",
			session_id = %event.session_id,
			event_type = %event.event_type,
			%status,
			"webhook delivered"
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use axum::Router;
	use axum::extract::State;
	use axum::http::StatusCode;
	use axum::routing::post;
	use serde_json::json;
	use tokio::net::TcpListener;
	use tokio::sync::mpsc;

	use super::*;

	async fn spawn_receiver(status: StatusCode) -> (String, mpsc::UnboundedReceiver<serde_json::Value>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let app = Router::new()
			.route(
				"/hook",
				post(move |State(tx): State<Arc<mpsc::UnboundedSender<serde_json::Value>>>, axum::Json(body): axum::Json<serde_json::Value>| async move {
					let _ = tx.send(body);
					status
				}),
			)
			.with_state(Arc::new(tx));

		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			let _ = axum::serve(listener, app).await;
		});
		(format!("http://{addr}/hook"), rx)
	}

	#[tokio::test]
	async fn posts_normalized_payload() {
		let (url, mut bodies) = spawn_receiver(StatusCode::OK).await;
		let sink = WebhookSink::new(&url, Duration::from_secs(5)).unwrap();

		let event = SessionEvent {
			session_id: "alice".into(),
			event_type: EventType::Ready,
			timestamp: 1,
			data: json!({}),
		};
		sink.deliver(&event).await.unwrap();

		let body = bodies.recv().await.unwrap();
		assert_eq!(body, json!({ "sessionId": "alice", "eventType": "ready", "timestamp": 1, "data": {} }));
	}

	#[tokio::test]
	async fn non_success_status_is_a_delivery_failure() {
		let (url, _bodies) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
		let sink = WebhookSink::new(&url, Duration::from_secs(5)).unwrap();

		let err = sink.deliver(&SessionEvent::new("bob", EventType::Message, json!({}))).await.unwrap_err();
		assert!(matches!(err, HubError::Delivery { ref sink, .. } if sink == "webhook"), "unexpected error: {err}");
	}

	#[test]
	fn event_filter_limits_accepted_types() {
		let sink = WebhookSink::new("http://127.0.0.1:9/hook", Duration::from_secs(1))
			.unwrap()
			.with_events([EventType::Ready]);
		assert!(sink.accepts(EventType::Ready));
		assert!(!sink.accepts(EventType::Message));
	}
}
