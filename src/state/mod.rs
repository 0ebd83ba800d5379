/// Domain view of games, players and entries.
pub mod game;
/// Event fan-out rooms.
pub mod rooms;
/// Phase lifecycle.
pub mod state_machine;
/// Applying phase transitions inside store transactions.
pub mod transitions;

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::{
    auth::IdentityGate, config::AppConfig, dao::game_store::GameStore, error::ServiceError,
};

pub use self::rooms::{Room, RoomRegistry};

/// Handle to [`AppState`] shared by every request and connection.
pub type SharedState = Arc<AppState>;

/// Central application state: the store handle, the room registry and the
/// credential gate.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    rooms: RoomRegistry,
    config: Arc<AppConfig>,
    identity: IdentityGate,
    store_timeout: Duration,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: Arc<AppConfig>, identity: IdentityGate) -> SharedState {
        let store_timeout = config.store_timeout();
        Arc::new(Self {
            game_store: RwLock::new(None),
            rooms: RoomRegistry::new(),
            config,
            identity,
            store_timeout,
        })
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current game store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        let mut guard = self.game_store.write().await;
        *guard = Some(store);
        info!("game store installed");
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        let mut guard = self.game_store.write().await;
        if guard.take().is_some() {
            warn!("game store removed; entering degraded mode");
        }
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.game_store.read().await;
        guard.is_none()
    }

    /// Room membership table used by the event fan-out.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Shared immutable configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Credential issuer and verifier.
    pub fn identity(&self) -> &IdentityGate {
        &self.identity
    }

    /// Run a store operation under the configured timeout. A timed-out operation is
    /// dropped, which rolls back any transaction it held.
    pub async fn with_store_timeout<F, T>(&self, work: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        match timeout(self.store_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(limit = ?self.store_timeout, "store operation timed out");
                Err(ServiceError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dao::game_store::memory::MemoryGameStore;

    use super::*;

    fn state_with_timeout(limit: Duration) -> SharedState {
        let config = AppConfig::new(AppConfig::default().hints().to_vec(), limit, limit);
        AppState::new(
            Arc::new(config),
            IdentityGate::new("test-secret", Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = state_with_timeout(Duration::from_secs(1));
        assert!(state.is_degraded().await);
        assert!(matches!(
            state.require_game_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_game_store(Arc::new(MemoryGameStore::new()))
            .await;
        assert!(!state.is_degraded().await);

        state.clear_game_store().await;
        assert!(state.is_degraded().await);
    }

    #[tokio::test]
    async fn slow_store_work_times_out() {
        let state = state_with_timeout(Duration::from_millis(20));
        let result = state
            .with_store_timeout(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Timeout)));
    }
}
