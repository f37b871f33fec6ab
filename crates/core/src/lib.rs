//! Multi-tenant session core.
//!
//! Keeps many independent messaging sessions alive in one process: persisted
//! auth state lives in a [`SessionStore`], running clients live in the
//! [`SessionRegistry`], and the [`SessionManager`] brings sessions up at boot
//! and on demand, fanning their events out through the [`EventBridge`].
//!
//! ```ignore
//! let store: Arc<dyn SessionStore> = Arc::new(FileStore::new(".sessiond/sessions"));
//! let bridge = EventBridge::new(store.clone()).with_sink(Arc::new(BroadcastSink::default()));
//! let factory = ClientFactory::new(Arc::new(connector));
//! let manager = SessionManager::new(store, factory, bridge, ManagerOptions::default());
//!
//! let report = manager.restore_all().await?;
//! manager.create_session("alice").await?.ready().await?;
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod factory;
pub mod manager;
pub mod registry;
pub mod session_id;
pub mod store;

pub use bridge::{BroadcastSink, EventBridge, EventSink, LinkState, WebhookSink};
pub use config::{DriverConfig, HubConfig, RestorePolicy, StoreConfig};
pub use error::{HubError, Result};
pub use factory::{BuildOutcome, ClientFactory, ClientStartup, StartupResult};
pub use manager::{BringUp, ManagerOptions, RestoreReport, SessionManager};
pub use registry::{Registration, SessionHandle, SessionRegistry};
pub use session_id::{MAX_SESSION_ID_LEN, validate_session_id};
pub use sessiond_protocol::{AuthBlob, EventType, SessionEvent, SessionStatus, SessionSummary};
pub use store::{FileStore, MemoryStore, SessionRecord, SessionStore};
