//! Periodic flush of in-session traveled distance into durable accounts.
//!
//! The accumulator is taken under the arena lock before any I/O; a failed
//! persist credits the distance back to the session if it still exists, so a
//! later sweep (or the leave path) retries it. One account failing never
//! aborts the sweep for the others.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    services::{events, stats_service},
    state::SharedState,
};

/// Run the reconciliation sweep forever at the configured interval.
pub async fn run(state: SharedState) {
    let mut ticker = tokio::time::interval(state.config().stat_flush_interval);
    // The first tick fires immediately; skip it so startup does not race the
    // storage supervisor.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        flush_all(&state).await;
    }
}

/// Flush pending distance for every live registered session.
///
/// Also invoked once at graceful shutdown so "eventually saved" does not
/// silently drop the last session's worth of movement.
pub async fn flush_all(state: &SharedState) {
    let pending: Vec<(Uuid, String, f64)> = {
        let mut arena = state.arena().lock().await;
        let registered: Vec<(Uuid, String)> = arena
            .iter()
            .filter_map(|(id, entry)| entry.identity.handle().map(|h| (id, h.to_owned())))
            .collect();

        registered
            .into_iter()
            .filter_map(|(id, handle)| {
                let pixels = arena.take_pending_distance(id)?;
                (pixels > 0.0).then_some((id, handle, pixels))
            })
            .collect()
    };

    if pending.is_empty() {
        return;
    }
    debug!(sessions = pending.len(), "flushing pending distance");

    for (id, handle, pixels) in pending {
        match stats_service::flush_distance(state, &handle, pixels).await {
            Ok(update) => events::notify_unlocks(state, id, &update.newly_unlocked),
            Err(err) => {
                warn!(handle = %handle, error = %err, "distance flush failed; re-crediting session");
                let mut arena = state.arena().lock().await;
                if !arena.credit_pending_distance(id, pixels) {
                    warn!(handle = %handle, "session gone; dropping unflushed distance");
                }
            }
        }
    }
}
