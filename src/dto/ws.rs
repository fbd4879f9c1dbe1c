use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{BackgroundState, arena::PlayerEntry};

#[serde_as]
#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Enter the game, optionally bound to a durable account handle.
    Join {
        /// Account handle; omitted for guest sessions.
        handle: Option<String>,
    },
    /// Leave the game while keeping the socket open (back to the lobby).
    Leave,
    /// Report a new avatar position.
    Move {
        /// New x coordinate.
        x: f64,
        /// New y coordinate.
        y: f64,
    },
    /// Attempt to tag another player while holding the wolf role.
    TagAttempt {
        /// Connection id of the tag target.
        target: Uuid,
    },
    /// Submit a new shared background image for moderation.
    ChangeBackground {
        /// Raw image bytes, base64-encoded on the wire.
        #[serde_as(as = "Base64")]
        #[schema(value_type = String, format = Byte)]
        image: Vec<u8>,
    },
    /// Select a different cosmetic skin.
    ChangeCosmetic {
        /// Hex color, unlocked skin token, or unlocked skin URL.
        skin: String,
    },
    /// Redeem a one-time secret code.
    RedeemCode {
        /// Code string, case-insensitive.
        code: String,
    },
    /// Forward-compatibility catch-all; ignored by the server.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a message from its JSON text frame.
    pub fn from_json_str(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

/// Public view of a session entry, shared in snapshots and join events.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Connection id.
    pub id: Uuid,
    /// Current x coordinate.
    pub x: f64,
    /// Current y coordinate.
    pub y: f64,
    /// Current skin reference.
    pub skin: String,
}

impl PlayerSummary {
    /// Build a summary from an arena entry.
    pub fn from_entry(id: Uuid, entry: &PlayerEntry) -> Self {
        Self {
            id,
            x: entry.x,
            y: entry.y,
            skin: entry.skin.clone(),
        }
    }
}

/// Wire view of the shared background.
#[serde_as]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BackgroundSnapshot {
    /// An accepted uploaded image.
    Image {
        /// Raw image bytes, base64-encoded on the wire.
        #[serde_as(as = "Base64")]
        #[schema(value_type = String, format = Byte)]
        data: Vec<u8>,
    },
    /// Fixed placeholder shown after a flagged upload.
    Placeholder,
}

impl From<&BackgroundState> for BackgroundSnapshot {
    fn from(value: &BackgroundState) -> Self {
        match value {
            BackgroundState::Image(data) => BackgroundSnapshot::Image { data: data.clone() },
            BackgroundState::Placeholder => BackgroundSnapshot::Placeholder,
        }
    }
}

/// Newly unlocked achievement, pushed to the unlocking player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AchievementSummary {
    /// Stable achievement id.
    pub id: String,
    /// Human readable label.
    pub name: String,
    /// Human readable unlock condition.
    pub description: String,
}

/// Newly unlocked cosmetic, pushed to the unlocking player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SkinSummary {
    /// Skin reference usable in `changeCosmetic`.
    pub skin: String,
    /// Display name of the skin.
    pub name: String,
}

/// Why a player was sent back to the lobby.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LobbyKickReason {
    /// Evicted by the liveness monitor for holding the wolf role while idle.
    Afk,
    /// Removed by a moderation decision.
    Banned,
    /// Server is shutting down.
    Maintenance,
    /// Removed by an operator.
    Kicked,
}

/// Messages pushed to player WebSocket clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Complete session state, sent once when the socket connects.
    FullSessionSnapshot {
        /// Connection id assigned to the receiving client.
        self_id: Uuid,
        /// All live players, in join order.
        players: Vec<PlayerSummary>,
        /// Current wolf, if any.
        wolf: Option<Uuid>,
    },
    /// Current wolf, sent on connect alongside the snapshot.
    CurrentRoleHolder {
        /// Current wolf, if any.
        wolf: Option<Uuid>,
    },
    /// A player entered the game.
    NewPlayerJoined {
        /// The new player.
        player: PlayerSummary,
    },
    /// A player reported a new position.
    PlayerMoved {
        /// Moving player.
        id: Uuid,
        /// New x coordinate.
        x: f64,
        /// New y coordinate.
        y: f64,
    },
    /// A player left the game or disconnected.
    PlayerRemoved {
        /// Removed player.
        id: Uuid,
    },
    /// The wolf role moved (tag, handoff, or vacancy).
    RoleChanged {
        /// New wolf, or `None` when the arena emptied.
        wolf: Option<Uuid>,
    },
    /// Impact marker for a successful tag.
    TagVisualEffect {
        /// Impact x coordinate (tagged avatar center).
        x: f64,
        /// Impact y coordinate (tagged avatar center).
        y: f64,
        /// Skin of the tagged player.
        skin: String,
    },
    /// The shared background changed.
    BackgroundChanged {
        /// New background content.
        background: BackgroundSnapshot,
    },
    /// A player selected a different skin.
    CosmeticChanged {
        /// Player whose skin changed.
        id: Uuid,
        /// New skin reference.
        skin: String,
    },
    /// Achievements newly unlocked by the receiving player.
    AchievementUnlocked {
        /// Newly unlocked achievements, in definition order.
        achievements: Vec<AchievementSummary>,
    },
    /// Cosmetics newly unlocked by the receiving player.
    CosmeticsUnlocked {
        /// Newly unlocked skins.
        skins: Vec<SkinSummary>,
    },
    /// A background upload was refused.
    UploadRejected {
        /// Human readable refusal reason.
        reason: String,
    },
    /// A secret code was accepted.
    CodeAccepted {
        /// Display name of the granted skin.
        reward_name: String,
    },
    /// A secret code was refused.
    CodeRejected {
        /// Human readable refusal reason.
        reason: String,
    },
    /// The receiving player was returned to the lobby by the server.
    ForcedToLobby {
        /// Why the player was removed.
        reason: LobbyKickReason,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_messages_parse_from_tagged_json() {
        let msg = ClientMessage::from_json_str(r#"{"type":"join","handle":"ada"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Join { handle: Some(h) } if h == "ada"));

        let msg = ClientMessage::from_json_str(r#"{"type":"move","x":12.5,"y":-3.0}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Move { x, y } if x == 12.5 && y == -3.0));

        let msg = ClientMessage::from_json_str(r#"{"type":"redeemCode","code":"gold"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::RedeemCode { code } if code == "gold"));
    }

    #[test]
    fn unknown_message_type_falls_back_to_unknown() {
        let msg = ClientMessage::from_json_str(r#"{"type":"teleport","x":1}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Unknown));
    }

    #[test]
    fn background_image_decodes_base64() {
        let msg =
            ClientMessage::from_json_str(r#"{"type":"changeBackground","image":"aGVsbG8="}"#)
                .unwrap();
        match msg {
            ClientMessage::ChangeBackground { image } => assert_eq!(image, b"hello"),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn outbound_messages_serialize_with_type_tag() {
        let payload = serde_json::to_string(&ServerMessage::RoleChanged { wolf: None }).unwrap();
        assert_eq!(payload, r#"{"type":"roleChanged","wolf":null}"#);

        let payload = serde_json::to_string(&ServerMessage::ForcedToLobby {
            reason: LobbyKickReason::Afk,
        })
        .unwrap();
        assert_eq!(payload, r#"{"type":"forcedToLobby","reason":"afk"}"#);

        for (reason, wire) in [
            (LobbyKickReason::Banned, "banned"),
            (LobbyKickReason::Maintenance, "maintenance"),
            (LobbyKickReason::Kicked, "kicked"),
        ] {
            let payload = serde_json::to_string(&reason).unwrap();
            assert_eq!(payload, format!("\"{wire}\""));
        }

        let payload = serde_json::to_string(&ServerMessage::CodeAccepted {
            reward_name: "Solid Gold".into(),
        })
        .unwrap();
        assert_eq!(payload, r#"{"type":"codeAccepted","rewardName":"Solid Gold"}"#);
    }
}
