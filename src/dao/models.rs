use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Lifetime gameplay counters accumulated for an account.
///
/// Achievement predicates are pure functions over this struct, so every
/// counter that can gate an unlock lives here and nowhere else.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatCounters {
    /// Number of successful tags performed while holding the wolf role.
    pub tags_inflicted: u64,
    /// Number of times this account was tagged by the wolf.
    pub times_tagged: u64,
    /// Number of game sessions joined.
    pub games_joined: u64,
    /// Total distance traveled, in rounded pixels.
    pub distance_traveled: u64,
    /// Number of accepted shared-background changes.
    pub backgrounds_changed: u64,
}

/// Durable account record persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountEntity {
    /// Unique account handle, also the storage primary key.
    pub handle: String,
    /// Lifetime gameplay counters.
    pub stats: StatCounters,
    /// Cosmetic currently selected by the player, if any.
    pub selected_skin: Option<String>,
    /// Achievement ids already unlocked. Monotonic, never shrinks.
    pub unlocked_achievements: Vec<String>,
    /// Cosmetic skins already unlocked. Monotonic, never shrinks.
    pub unlocked_skins: Vec<String>,
    /// Secret codes already redeemed (stored uppercase). Monotonic.
    pub redeemed_codes: Vec<String>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the account record was updated.
    pub updated_at: SystemTime,
}

impl AccountEntity {
    /// Build a fresh account with zeroed counters and empty unlock sets.
    pub fn new(handle: String) -> Self {
        let timestamp = SystemTime::now();
        Self {
            handle,
            stats: StatCounters::default(),
            selected_skin: None,
            unlocked_achievements: Vec::new(),
            unlocked_skins: Vec::new(),
            redeemed_codes: Vec::new(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Whether the given achievement id is already unlocked.
    pub fn has_achievement(&self, id: &str) -> bool {
        self.unlocked_achievements.iter().any(|a| a == id)
    }

    /// Whether the given skin is already in the unlocked set.
    pub fn owns_skin(&self, skin: &str) -> bool {
        self.unlocked_skins.iter().any(|s| s == skin)
    }

    /// Whether the given (uppercase) code has already been redeemed.
    pub fn has_redeemed(&self, code: &str) -> bool {
        self.redeemed_codes.iter().any(|c| c == code)
    }
}
