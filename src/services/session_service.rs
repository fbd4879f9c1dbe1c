//! WebSocket connection lifecycle and inbound message dispatch.
//!
//! Each socket gets a server-assigned connection id, a dedicated writer task,
//! and an entry in the connection registry. Arena mutations happen under the
//! arena mutex with their broadcasts enqueued before the lock is released;
//! account I/O runs after the lock is dropped and re-checks session existence
//! in its continuations.

use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        validation,
        ws::{ClientMessage, PlayerSummary, ServerMessage},
    },
    services::{background_service, events, stats_service},
    state::{
        PlayerConnection, SharedState,
        arena::{PlayerIdentity, RoleHandoff, random_hex_color},
    },
};

/// Handle the full lifecycle for an individual player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let conn_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    state.connections().insert(
        conn_id,
        PlayerConnection {
            id: conn_id,
            tx: outbound_tx.clone(),
        },
    );
    info!(id = %conn_id, "player connected");

    send_initial_state(&state, conn_id).await;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(msg) => dispatch(&state, conn_id, msg).await,
                Err(err) => {
                    warn!(id = %conn_id, error = %err, "failed to parse client message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(id = %conn_id, "player closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(id = %conn_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.connections().remove(&conn_id);
    remove_from_arena(&state, conn_id).await;
    info!(id = %conn_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Push the session snapshot, role holder, and background to a fresh socket.
async fn send_initial_state(state: &SharedState, id: Uuid) {
    let (players, wolf) = {
        let arena = state.arena().lock().await;
        let players = arena
            .iter()
            .map(|(pid, entry)| PlayerSummary::from_entry(pid, entry))
            .collect::<Vec<_>>();
        (players, arena.wolf())
    };

    events::send_to(
        state,
        id,
        &ServerMessage::FullSessionSnapshot {
            self_id: id,
            players,
            wolf,
        },
    );
    events::send_to(state, id, &ServerMessage::CurrentRoleHolder { wolf });

    if let Some(background) = state.background().await {
        events::send_to(
            state,
            id,
            &ServerMessage::BackgroundChanged {
                background: (&background).into(),
            },
        );
    }
}

async fn dispatch(state: &SharedState, id: Uuid, message: ClientMessage) {
    match message {
        ClientMessage::Join { handle } => handle_join(state, id, handle).await,
        ClientMessage::Leave => remove_from_arena(state, id).await,
        ClientMessage::Move { x, y } => handle_move(state, id, x, y).await,
        ClientMessage::TagAttempt { target } => handle_tag(state, id, target).await,
        ClientMessage::ChangeBackground { image } => {
            background_service::request_change(state, id, image).await;
        }
        ClientMessage::ChangeCosmetic { skin } => handle_cosmetic(state, id, skin).await,
        ClientMessage::RedeemCode { code } => handle_redeem(state, id, code).await,
        ClientMessage::Unknown => debug!(id = %id, "ignoring unknown client message"),
    }
}

async fn handle_join(state: &SharedState, id: Uuid, handle: Option<String>) {
    // Idempotent join guard, checked before any counter is bumped. Messages
    // from one socket are handled sequentially, so this cannot race a second
    // join from the same connection.
    {
        let arena = state.arena().lock().await;
        if arena.contains(id) {
            debug!(id = %id, "ignoring duplicate join");
            return;
        }
    }

    let (identity, skin, join_unlocks) = match handle {
        Some(raw) => {
            if let Err(err) = validation::validate_handle(&raw) {
                warn!(id = %id, error = %err, "rejecting join with invalid handle");
                return;
            }
            match stats_service::register_join(state, &raw).await {
                Ok(update) => {
                    let skin = update
                        .account
                        .selected_skin
                        .clone()
                        .unwrap_or_else(|| random_hex_color(&mut rand::rng()));
                    (
                        PlayerIdentity::Registered(raw),
                        skin,
                        update.newly_unlocked,
                    )
                }
                Err(err) => {
                    // The game stays playable without storage; the session just
                    // loses its account binding.
                    warn!(id = %id, handle = %raw, error = %err, "account unavailable; joining as guest");
                    (
                        PlayerIdentity::Guest,
                        random_hex_color(&mut rand::rng()),
                        Vec::new(),
                    )
                }
            }
        }
        None => (
            PlayerIdentity::Guest,
            random_hex_color(&mut rand::rng()),
            Vec::new(),
        ),
    };

    {
        let mut arena = state.arena().lock().await;
        let mut rng = rand::rng();
        let Some(outcome) = arena.join(id, identity, skin.clone(), &mut rng, Instant::now())
        else {
            debug!(id = %id, "ignoring duplicate join");
            return;
        };

        info!(id = %id, "player joined the game");
        events::broadcast_all(
            state,
            &ServerMessage::NewPlayerJoined {
                player: PlayerSummary {
                    id,
                    x: outcome.x,
                    y: outcome.y,
                    skin,
                },
            },
        );
        if outcome.became_wolf {
            events::broadcast_role_changed(state, Some(id));
        }
    }

    events::notify_unlocks(state, id, &join_unlocks);
}

async fn handle_move(state: &SharedState, id: Uuid, x: f64, y: f64) {
    let mut arena = state.arena().lock().await;
    if let Some(outcome) = arena.apply_move(id, x, y, Instant::now()) {
        events::broadcast_except(
            state,
            id,
            &ServerMessage::PlayerMoved {
                id,
                x: outcome.x,
                y: outcome.y,
            },
        );
    }
}

async fn handle_tag(state: &SharedState, id: Uuid, target: Uuid) {
    let stats_work = {
        let mut arena = state.arena().lock().await;
        match arena.tag_attempt(id, target, Instant::now()) {
            Err(rejection) => {
                // Misses are frequent and expected; never reported to the client.
                debug!(id = %id, target = %target, %rejection, "tag attempt rejected");
                return;
            }
            Ok(transfer) => {
                events::broadcast_role_changed(state, Some(transfer.next));
                events::broadcast_all(
                    state,
                    &ServerMessage::TagVisualEffect {
                        x: transfer.impact_x,
                        y: transfer.impact_y,
                        skin: transfer.target_skin.clone(),
                    },
                );

                let tagger = arena
                    .get(transfer.previous)
                    .and_then(|e| e.identity.handle().map(str::to_owned));
                let tagged = arena
                    .get(transfer.next)
                    .and_then(|e| e.identity.handle().map(str::to_owned));
                (transfer, tagger, tagged)
            }
        }
    };

    let (transfer, tagger, tagged) = stats_work;

    // Guests are excluded from persistence; only registered participants get
    // counters and achievement evaluation.
    if let Some(handle) = tagger {
        match stats_service::record_tag_inflicted(state, &handle).await {
            Ok(update) => events::notify_unlocks(state, transfer.previous, &update.newly_unlocked),
            Err(err) => warn!(handle = %handle, error = %err, "failed to record inflicted tag"),
        }
    }
    if let Some(handle) = tagged {
        match stats_service::record_times_tagged(state, &handle).await {
            Ok(update) => events::notify_unlocks(state, transfer.next, &update.newly_unlocked),
            Err(err) => warn!(handle = %handle, error = %err, "failed to record received tag"),
        }
    }
}

async fn handle_cosmetic(state: &SharedState, id: Uuid, skin: String) {
    let identity = {
        let arena = state.arena().lock().await;
        let Some(entry) = arena.get(id) else {
            return;
        };
        entry.identity.clone()
    };

    let allowed = if validation::is_hex_color(&skin) {
        true
    } else {
        match &identity {
            PlayerIdentity::Guest => false,
            PlayerIdentity::Registered(handle) => {
                match stats_service::owns_skin(state, handle, &skin).await {
                    Ok(owned) => owned,
                    Err(err) => {
                        warn!(handle = %handle, error = %err, "failed to verify skin ownership");
                        false
                    }
                }
            }
        }
    };

    if !allowed {
        // Not user-actionable: dropped silently, like tag misses.
        debug!(id = %id, skin = %skin, "ignoring cosmetic change for unowned skin");
        return;
    }

    {
        let mut arena = state.arena().lock().await;
        if !arena.set_skin(id, skin.clone()) {
            return;
        }
        events::broadcast_all(state, &ServerMessage::CosmeticChanged { id, skin: skin.clone() });
    }

    if let PlayerIdentity::Registered(handle) = &identity
        && let Err(err) = stats_service::persist_selected_skin(state, handle, &skin).await
    {
        warn!(handle = %handle, error = %err, "failed to persist selected skin");
    }
}

async fn handle_redeem(state: &SharedState, id: Uuid, code: String) {
    let identity = {
        let arena = state.arena().lock().await;
        arena.get(id).map(|entry| entry.identity.clone())
    };

    let reason = match identity {
        None => "join the game before redeeming codes".to_owned(),
        Some(PlayerIdentity::Guest) => "sign in to redeem codes".to_owned(),
        Some(PlayerIdentity::Registered(handle)) => {
            match stats_service::redeem_code(state, &handle, &code).await {
                Ok(stats_service::RedeemOutcome::Accepted(entry)) => {
                    info!(id = %id, handle = %handle, code = %entry.code, "secret code redeemed");
                    events::send_to(
                        state,
                        id,
                        &ServerMessage::CodeAccepted {
                            reward_name: entry.name.to_owned(),
                        },
                    );
                    events::send_to(
                        state,
                        id,
                        &ServerMessage::CosmeticsUnlocked {
                            skins: vec![crate::dto::ws::SkinSummary {
                                skin: entry.skin.to_owned(),
                                name: entry.name.to_owned(),
                            }],
                        },
                    );
                    return;
                }
                Ok(stats_service::RedeemOutcome::Rejected(rejection)) => rejection.to_string(),
                Err(err) => {
                    warn!(handle = %handle, error = %err, "code redemption hit storage failure");
                    "account service unavailable, try again".to_owned()
                }
            }
        }
    };

    events::send_to(state, id, &ServerMessage::CodeRejected { reason });
}

/// Remove a player from the arena, broadcasting the removal and any role
/// handoff, then flush their pending distance.
///
/// Shared by explicit `leave`, socket disconnect, and the AFK eviction path;
/// a no-op when the connection never joined (or already left).
pub async fn remove_from_arena(state: &SharedState, id: Uuid) {
    let flush = {
        let mut arena = state.arena().lock().await;
        let mut rng = rand::rng();
        let Some(outcome) = arena.remove(id, &mut rng, Instant::now()) else {
            return;
        };

        events::broadcast_all(state, &ServerMessage::PlayerRemoved { id });
        match outcome.handoff {
            Some(RoleHandoff::Transferred(next)) => {
                info!(id = %id, next = %next, "wolf left; role handed off");
                events::broadcast_role_changed(state, Some(next));
            }
            Some(RoleHandoff::Cleared) => events::broadcast_role_changed(state, None),
            None => {}
        }

        outcome
            .entry
            .identity
            .handle()
            .map(|h| (h.to_owned(), outcome.entry.pending_distance))
    };

    if let Some((handle, pixels)) = flush
        && pixels > 0.0
    {
        match stats_service::flush_distance(state, &handle, pixels).await {
            // The connection may already be gone; notify is a no-op then.
            Ok(update) => events::notify_unlocks(state, id, &update.newly_unlocked),
            Err(err) => {
                warn!(handle = %handle, error = %err, "failed to flush traveled distance on leave");
            }
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
