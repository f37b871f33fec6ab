mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use common::{ProbeStore, record};
use serde_json::Value;
use sessiond::{ClientFactory, EventBridge, EventType, ManagerOptions, SessionManager, WebhookSink};
use sessiond_runtime::fake::{FakeConnector, FakeScript};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

async fn spawn_hook(status: StatusCode) -> anyhow::Result<(String, mpsc::UnboundedReceiver<Value>)> {
	let (tx, rx) = mpsc::unbounded_channel::<Value>();
	let app = Router::new()
		.route(
			"/events",
			post(move |State(tx): State<mpsc::UnboundedSender<Value>>, axum::Json(body): axum::Json<Value>| async move {
				let _ = tx.send(body);
				status
			}),
		)
		.with_state(tx);

	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let addr = listener.local_addr()?;
	tokio::spawn(async move {
		let _ = axum::serve(listener, app).await;
	});
	Ok((format!("http://{addr}/events"), rx))
}

async fn next_body(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
	tokio::time::timeout(Duration::from_secs(5), rx.recv())
		.await
		.expect("webhook not called in time")
		.expect("hook server gone")
}

#[tokio::test]
async fn restore_outcomes_are_posted_to_webhook() -> anyhow::Result<()> {
	let (url, mut bodies) = spawn_hook(StatusCode::OK).await?;
	let store = Arc::new(ProbeStore::with_records([record("alice"), record("bob")]));
	let connector = FakeConnector::new();
	connector.script("bob", FakeScript::fail("logged out"));

	let webhook = WebhookSink::new(&url, Duration::from_secs(5))?;
	let bridge = EventBridge::new(store.clone()).with_sink(Arc::new(webhook));
	let manager = SessionManager::new(store, ClientFactory::new(Arc::new(connector)), bridge, ManagerOptions::default());

	manager.restore_all().await?.settle_all().await;

	let mut received = vec![next_body(&mut bodies).await, next_body(&mut bodies).await];
	received.sort_by_key(|b| b["sessionId"].as_str().map(str::to_string));

	assert_eq!(received[0]["sessionId"], "alice");
	assert_eq!(received[0]["eventType"], "ready");
	assert_eq!(received[1]["sessionId"], "bob");
	assert_eq!(received[1]["eventType"], "authFailure");
	assert!(received[1]["data"]["reason"].as_str().unwrap_or_default().contains("logged out"));
	assert!(received[0]["timestamp"].as_u64().is_some());
	Ok(())
}

#[tokio::test]
async fn failing_webhook_does_not_affect_sessions() -> anyhow::Result<()> {
	let (url, mut bodies) = spawn_hook(StatusCode::SERVICE_UNAVAILABLE).await?;
	let store = Arc::new(ProbeStore::default());
	let webhook = WebhookSink::new(&url, Duration::from_secs(5))?.with_events([EventType::Ready]);
	let bridge = EventBridge::new(store.clone()).with_sink(Arc::new(webhook));
	let manager = SessionManager::new(store, ClientFactory::new(Arc::new(FakeConnector::new())), bridge, ManagerOptions::default());

	manager.create_session("carol").await?.ready().await?;
	manager.create_session("dave").await?.ready().await?;

	next_body(&mut bodies).await;
	next_body(&mut bodies).await;
	assert_eq!(manager.list_active(), ["carol", "dave"]);
	Ok(())
}
