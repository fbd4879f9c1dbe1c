//! Periodic sweep evicting a wolf that stopped moving.
//!
//! A solo player is never evicted: there is nobody to hand the role to, and
//! an idle lone player is not hurting anyone.

use std::time::Instant;

use tracing::info;
use uuid::Uuid;

use crate::{
    dto::ws::{LobbyKickReason, ServerMessage},
    services::{events, session_service},
    state::SharedState,
};

/// Run the AFK sweep forever at the configured interval.
pub async fn run(state: SharedState) {
    let mut ticker = tokio::time::interval(state.config().afk_sweep_interval);
    loop {
        ticker.tick().await;
        sweep(&state).await;
    }
}

/// Single sweep pass: evict the wolf if it idled past the threshold.
pub async fn sweep(state: &SharedState) {
    let stale: Option<Uuid> = {
        let arena = state.arena().lock().await;
        match arena.wolf_idle_for(Instant::now()) {
            Some((holder, idle))
                if arena.len() >= 2 && idle >= state.config().afk_threshold =>
            {
                Some(holder)
            }
            _ => None,
        }
    };

    let Some(id) = stale else {
        return;
    };

    info!(id = %id, "wolf idle past threshold; sending back to lobby");
    // Tell the evicted player specifically why they were removed, then run
    // the same removal path as a normal disconnect.
    events::send_to(
        state,
        id,
        &ServerMessage::ForcedToLobby {
            reason: LobbyKickReason::Afk,
        },
    );
    session_service::remove_from_arena(state, id).await;
}
