//! Keeps the account store connected, flipping degraded mode on failures.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{account_store::AccountStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend and keep the shared state in degraded mode
/// while it is unavailable.
///
/// Once connected, the store is polled for health; a failing probe triggers a
/// bounded in-place reconnect loop before falling back to a full reconnect.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn AccountStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        state.set_account_store(store.clone()).await;
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;

        monitor(&state, store).await;

        // The monitor only returns after reconnect attempts are exhausted.
        state.clear_account_store().await;
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll the store's health until it fails beyond recovery.
async fn monitor(state: &SharedState, store: Arc<dyn AccountStore>) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !try_reconnect(state, store.as_ref()).await {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    return;
                }
                state.update_degraded(false);
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

/// Bounded in-place reconnect loop; flips degraded mode on the first failure.
async fn try_reconnect(state: &SharedState, store: &dyn AccountStore) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!("storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "storage reconnect failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}
