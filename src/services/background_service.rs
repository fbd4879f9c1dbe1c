//! Shared-background change gate: per-connection cooldowns in front of the
//! external moderation check.
//!
//! Failure handling is deliberately asymmetric: a moderation transport error
//! leaves the cooldown untouched so the player can retry immediately, while
//! a flagged verdict replaces the background with the placeholder and arms
//! the long punitive cooldown.

use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::ServerMessage,
    services::{events, stats_service},
    state::{BackgroundState, SharedState},
};

fn reject(state: &SharedState, id: Uuid, reason: impl Into<String>) {
    events::send_to(
        state,
        id,
        &ServerMessage::UploadRejected {
            reason: reason.into(),
        },
    );
}

/// Install a new shared background and broadcast it.
///
/// The write guard is held across the broadcast enqueue so concurrent
/// changes cannot reorder what clients observe.
async fn install_background(state: &SharedState, background: BackgroundState) {
    let mut slot = state.background_slot().write().await;
    *slot = Some(background.clone());
    events::broadcast_background(state, &background);
}

/// Handle a `changeBackground` request from a connection.
pub async fn request_change(state: &SharedState, id: Uuid, image: Vec<u8>) {
    let now = Instant::now();
    {
        let arena = state.arena().lock().await;
        if !arena.contains(id) {
            // Stale request from a connection that already left the game.
            return;
        }
        if let Some(remaining) = arena.upload_block_remaining(id, now) {
            let seconds = remaining.as_secs().max(1);
            reject(
                state,
                id,
                format!("please wait {seconds}s before changing the background again"),
            );
            return;
        }
    }

    let Some(moderation) = state.moderation().cloned() else {
        // Fail closed: without a moderation collaborator no upload goes through.
        reject(state, id, "background moderation is not configured");
        return;
    };

    let verdict = match moderation.check_image(&image).await {
        Ok(verdict) => verdict,
        Err(err) => {
            warn!(id = %id, error = %err, "moderation check failed");
            // Transient: no cooldown change, the player may retry right away.
            reject(state, id, "moderation service unavailable, try again");
            return;
        }
    };

    if verdict.flagged(state.config().moderation_flag_threshold) {
        info!(id = %id, "background upload flagged by moderation");
        {
            let mut arena = state.arena().lock().await;
            if !arena.contains(id) {
                // Disconnected while the check was in flight; drop silently.
                return;
            }
            arena.set_upload_block(id, Instant::now() + state.config().upload_penalty_cooldown);
        }
        install_background(state, BackgroundState::Placeholder).await;
        reject(state, id, "image rejected by moderation");
        return;
    }

    let handle = {
        let mut arena = state.arena().lock().await;
        let Some(entry) = arena.get(id) else {
            return;
        };
        let handle = entry.identity.handle().map(str::to_owned);
        arena.set_upload_block(id, Instant::now() + state.config().upload_cooldown);
        handle
    };

    install_background(state, BackgroundState::Image(image)).await;

    if let Some(handle) = handle {
        match stats_service::record_background_change(state, &handle).await {
            Ok(update) => events::notify_unlocks(state, id, &update.newly_unlocked),
            Err(err) => {
                warn!(handle = %handle, error = %err, "failed to persist background change counter")
            }
        }
    }
}
