//! Fan-out of server events to connected player sockets.
//!
//! Payloads are serialized once and enqueued on each connection's writer
//! channel. Enqueueing is synchronous so callers can broadcast while still
//! holding the arena lock, guaranteeing that per-connection delivery order
//! matches mutation order.

use axum::extract::ws::Message;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::ws::{AchievementSummary, ServerMessage, SkinSummary},
    services::achievement_service::AchievementDef,
    state::{BackgroundState, SharedState},
};

fn payload(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(error = %err, "failed to serialize server message `{message:?}`");
            None
        }
    }
}

/// Send a message to a single connection. Unknown ids are a no-op: the
/// target may have disconnected while the triggering work was in flight.
pub fn send_to(state: &SharedState, id: Uuid, message: &ServerMessage) {
    let Some(connection) = state.connections().get(&id) else {
        return;
    };
    if let Some(payload) = payload(message) {
        let _ = connection.tx.send(Message::Text(payload.into()));
    }
}

/// Send a message to every connection.
pub fn broadcast_all(state: &SharedState, message: &ServerMessage) {
    let Some(payload) = payload(message) else {
        return;
    };
    for connection in state.connections().iter() {
        let _ = connection.tx.send(Message::Text(payload.clone().into()));
    }
}

/// Send a message to every connection except `except` (typically the
/// originator, who already knows).
pub fn broadcast_except(state: &SharedState, except: Uuid, message: &ServerMessage) {
    let Some(payload) = payload(message) else {
        return;
    };
    for connection in state.connections().iter() {
        if connection.id == except {
            continue;
        }
        let _ = connection.tx.send(Message::Text(payload.clone().into()));
    }
}

/// Broadcast the new wolf (or vacancy) to everyone.
pub fn broadcast_role_changed(state: &SharedState, wolf: Option<Uuid>) {
    broadcast_all(state, &ServerMessage::RoleChanged { wolf });
}

/// Broadcast the new shared background to everyone.
pub fn broadcast_background(state: &SharedState, background: &BackgroundState) {
    broadcast_all(
        state,
        &ServerMessage::BackgroundChanged {
            background: background.into(),
        },
    );
}

/// Push newly unlocked achievements and their cosmetics to one player.
pub fn notify_unlocks(state: &SharedState, id: Uuid, newly: &[&'static AchievementDef]) {
    if newly.is_empty() {
        return;
    }

    let achievements = newly
        .iter()
        .map(|def| AchievementSummary {
            id: def.id.to_owned(),
            name: def.name.to_owned(),
            description: def.description.to_owned(),
        })
        .collect();
    send_to(state, id, &ServerMessage::AchievementUnlocked { achievements });

    let skins: Vec<SkinSummary> = newly
        .iter()
        .filter_map(|def| def.reward.as_ref())
        .map(|reward| SkinSummary {
            skin: reward.skin.to_owned(),
            name: reward.name.to_owned(),
        })
        .collect();
    if !skins.is_empty() {
        send_to(state, id, &ServerMessage::CosmeticsUnlocked { skins });
    }
}
