pub mod arena;
pub mod role;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig, dao::account_store::AccountStore, error::ServiceError,
    services::moderation::ModerationClient, state::arena::Arena,
};

/// Cheaply cloneable handle on the central application state.
pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a connected player socket.
pub struct PlayerConnection {
    /// Connection id, also the player's arena key.
    pub id: Uuid,
    /// Outbound channel drained by the connection's writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Process-wide shared background, overwritten by any accepted change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundState {
    /// An accepted uploaded image.
    Image(Vec<u8>),
    /// The fixed placeholder shown after a moderation-flagged upload.
    Placeholder,
}

/// Central application state storing live connections, the arena authority,
/// and collaborator handles.
///
/// Every mutation of the arena (player map, wolf role, cooldown clock) is
/// serialized through its mutex; broadcasts are enqueued before the lock is
/// released so clients never observe stale orderings.
pub struct AppState {
    config: AppConfig,
    arena: Mutex<Arena>,
    connections: DashMap<Uuid, PlayerConnection>,
    background: RwLock<Option<BackgroundState>>,
    account_store: RwLock<Option<Arc<dyn AccountStore>>>,
    degraded: watch::Sender<bool>,
    moderation: Option<Arc<ModerationClient>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, moderation: Option<ModerationClient>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            arena: Mutex::new(Arena::new(config.clone())),
            config,
            connections: DashMap::new(),
            background: RwLock::new(None),
            account_store: RwLock::new(None),
            degraded: degraded_tx,
            moderation: moderation.map(Arc::new),
        })
    }

    /// Immutable gameplay tuning.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The serialized arena authority.
    pub fn arena(&self) -> &Mutex<Arena> {
        &self.arena
    }

    /// Registry of active player sockets keyed by connection id.
    pub fn connections(&self) -> &DashMap<Uuid, PlayerConnection> {
        &self.connections
    }

    /// Moderation collaborator, absent when unconfigured (uploads fail closed).
    pub fn moderation(&self) -> Option<&Arc<ModerationClient>> {
        self.moderation.as_ref()
    }

    /// Snapshot of the current shared background.
    pub async fn background(&self) -> Option<BackgroundState> {
        self.background.read().await.clone()
    }

    /// Writable slot for the shared background.
    pub fn background_slot(&self) -> &RwLock<Option<BackgroundState>> {
        &self.background
    }

    /// Obtain a handle to the current account store, if one is installed.
    pub async fn account_store(&self) -> Option<Arc<dyn AccountStore>> {
        let guard = self.account_store.read().await;
        guard.as_ref().cloned()
    }

    /// Account store handle, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_account_store(&self) -> Result<Arc<dyn AccountStore>, ServiceError> {
        self.account_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new account store implementation and leave degraded mode.
    pub async fn set_account_store(&self, store: Arc<dyn AccountStore>) {
        {
            let mut guard = self.account_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current account store and enter degraded mode.
    pub async fn clear_account_store(&self) {
        {
            let mut guard = self.account_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.account_store.read().await;
        guard.is_none()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }
}
