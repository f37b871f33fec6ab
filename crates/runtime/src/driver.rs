//! Driver process lifecycle.
//!
//! Each session gets its own driver process. The host writes
//! [`DriverCommand`]s to the driver's stdin and reads [`DriverMessage`]s from
//! its stdout, one JSON object per line. Until the driver reports `ready` or
//! `authFailure`, those two messages resolve [`MessagingClient::initialize`];
//! afterwards every message is surfaced as a [`ClientEvent`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use sessiond_protocol::{DriverCommand, DriverMessage, decode_line, encode_line};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::{ClientConnector, ClientEvent, ClientOptions, ClientParts, MessagingClient};
use crate::error::{ClientError, Result};

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type StartupSignal = std::result::Result<(), String>;

/// Connector that launches `program args...` once per session.
#[derive(Debug, Clone)]
pub struct DriverConnector {
	program: PathBuf,
	args: Vec<String>,
	shutdown_grace: Duration,
}

impl DriverConnector {
	pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
		Self {
			program: program.into(),
			args,
			shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
		}
	}

	/// Sets how long `shutdown` waits for the driver to exit before killing it.
	pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
		self.shutdown_grace = grace;
		self
	}
}

#[async_trait]
impl ClientConnector for DriverConnector {
	async fn connect(&self, options: ClientOptions) -> Result<ClientParts> {
		let mut cmd = Command::new(&self.program);
		cmd.args(&self.args)
			.env("SESSIOND_SESSION_ID", &options.session_id)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::inherit())
			.kill_on_drop(true);

		#[cfg(unix)]
		cmd.process_group(0);

		let mut child = cmd.spawn().map_err(|source| ClientError::Spawn {
			program: self.program.display().to_string(),
			source,
		})?;

		let stdin = child
			.stdin
			.take()
			.ok_or_else(|| ClientError::Protocol("driver stdin was not captured".into()))?;
		let stdout = child
			.stdout
			.take()
			.ok_or_else(|| ClientError::Protocol("driver stdout was not captured".into()))?;

		debug!(
			target = "sessiond.driver",
			session_id = %options.session_id,
			pid = ?child.id(),
			"driver spawned"
		);

		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let (startup_tx, startup_rx) = oneshot::channel();
		let reader = tokio::spawn(read_driver_output(options.session_id.clone(), stdout, startup_tx, events_tx));

		let client = DriverClient {
			options,
			child,
			stdin: Some(stdin),
			startup: Some(startup_rx),
			reader,
			shutdown_grace: self.shutdown_grace,
		};

		Ok(ClientParts {
			client: Box::new(client),
			events: events_rx,
		})
	}
}

struct DriverClient {
	options: ClientOptions,
	child: Child,
	stdin: Option<ChildStdin>,
	startup: Option<oneshot::Receiver<StartupSignal>>,
	reader: JoinHandle<()>,
	shutdown_grace: Duration,
}

impl DriverClient {
	async fn send(&mut self, command: &DriverCommand) -> Result<()> {
		let stdin = self.stdin.as_mut().ok_or_else(|| ClientError::Protocol("driver stdin already closed".into()))?;
		let line = encode_line(command).map_err(|e| ClientError::Protocol(format!("Failed to encode driver command: {e}")))?;
		stdin.write_all(line.as_bytes()).await?;
		stdin.flush().await?;
		Ok(())
	}
}

#[async_trait]
impl MessagingClient for DriverClient {
	async fn initialize(&mut self) -> Result<()> {
		let startup = self
			.startup
			.take()
			.ok_or_else(|| ClientError::Protocol("driver already initialized".into()))?;

		let command = DriverCommand::Initialize {
			session_id: self.options.session_id.clone(),
			auth: self.options.auth.blob().cloned(),
			backup_interval_ms: self.options.backup_interval.as_millis() as u64,
		};
		self.send(&command).await?;

		match startup.await {
			Ok(Ok(())) => Ok(()),
			Ok(Err(message)) => Err(ClientError::Startup(message)),
			Err(_) => Err(ClientError::Startup("driver exited before reporting ready".into())),
		}
	}

	async fn shutdown(&mut self) -> Result<()> {
		if self.stdin.is_some() {
			if let Err(err) = self.send(&DriverCommand::Shutdown).await {
				debug!(
					target = "sessiond.driver",
					session_id = %self.options.session_id,
					error = %err,
					"shutdown command not delivered"
				);
			}
			self.stdin = None;
		}

		match tokio::time::timeout(self.shutdown_grace, self.child.wait()).await {
			Ok(status) => {
				debug!(target = "sessiond.driver", session_id = %self.options.session_id, status = ?status.ok(), "driver exited");
			}
			Err(_) => {
				warn!(
					target = "sessiond.driver",
					session_id = %self.options.session_id,
					grace_ms = self.shutdown_grace.as_millis() as u64,
					"driver ignored shutdown; killing"
				);
				self.child.kill().await?;
			}
		}

		self.reader.abort();
		Ok(())
	}
}

impl Drop for DriverClient {
	fn drop(&mut self) {
		self.reader.abort();
	}
}

async fn read_driver_output(
	session_id: String,
	stdout: ChildStdout,
	startup_tx: oneshot::Sender<StartupSignal>,
	events_tx: mpsc::UnboundedSender<ClientEvent>,
) {
	let mut startup_tx = Some(startup_tx);
	let mut lines = BufReader::new(stdout).lines();

	loop {
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(err) => {
				warn!(target = "sessiond.driver", session_id = %session_id, error = %err, "failed reading driver output");
				break;
			}
		};

		if line.trim().is_empty() {
			continue;
		}

		let message: DriverMessage = match decode_line(&line) {
			Ok(message) => message,
			Err(err) => {
				warn!(target = "sessiond.driver", session_id = %session_id, error = %err, "ignoring malformed driver line");
				continue;
			}
		};

		let event = match (message, startup_tx.take()) {
			(DriverMessage::Ready, Some(tx)) => {
				let _ = tx.send(Ok(()));
				continue;
			}
			(DriverMessage::AuthFailure { message }, Some(tx)) => {
				let _ = tx.send(Err(message));
				continue;
			}
			(message, pending) => {
				startup_tx = pending;
				into_client_event(message)
			}
		};

		if events_tx.send(event).is_err() {
			break;
		}
	}

	debug!(target = "sessiond.driver", session_id = %session_id, "driver output closed");
}

fn into_client_event(message: DriverMessage) -> ClientEvent {
	match message {
		DriverMessage::Ready => ClientEvent::Ready,
		DriverMessage::Qr { code } => ClientEvent::Qr(code),
		DriverMessage::AuthFailure { message } => ClientEvent::AuthFailure(message),
		DriverMessage::Disconnected { reason } => ClientEvent::Disconnected(reason),
		DriverMessage::Message { payload } => ClientEvent::Message(payload),
		DriverMessage::Backup { auth } => ClientEvent::AuthBackup(auth),
	}
}
