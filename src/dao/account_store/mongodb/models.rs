use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::dao::models::{AccountEntity, StatCounters};

/// Storage representation of an account, keyed by handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAccountDocument {
    #[serde(rename = "_id")]
    handle: String,
    stats: StatCounters,
    selected_skin: Option<String>,
    #[serde(default)]
    unlocked_achievements: Vec<String>,
    #[serde(default)]
    unlocked_skins: Vec<String>,
    #[serde(default)]
    redeemed_codes: Vec<String>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<AccountEntity> for MongoAccountDocument {
    fn from(value: AccountEntity) -> Self {
        Self {
            handle: value.handle,
            stats: value.stats,
            selected_skin: value.selected_skin,
            unlocked_achievements: value.unlocked_achievements,
            unlocked_skins: value.unlocked_skins,
            redeemed_codes: value.redeemed_codes,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoAccountDocument> for AccountEntity {
    fn from(value: MongoAccountDocument) -> Self {
        Self {
            handle: value.handle,
            stats: value.stats,
            selected_skin: value.selected_skin,
            unlocked_achievements: value.unlocked_achievements,
            unlocked_skins: value.unlocked_skins,
            redeemed_codes: value.redeemed_codes,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}
