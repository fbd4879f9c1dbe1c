//! Static achievement and secret-code tables plus the unlock evaluator.

use thiserror::Error;

use crate::dao::models::{AccountEntity, StatCounters};

/// Cosmetic granted by an achievement or code.
#[derive(Debug, Clone, Copy)]
pub struct SkinReward {
    /// Skin reference usable in `changeCosmetic`.
    pub skin: &'static str,
    /// Display name of the skin.
    pub name: &'static str,
}

/// One achievement: a pure predicate over the lifetime counters, with an
/// optional cosmetic reward.
///
/// Predicates must not depend on each other or on evaluation order; the
/// table order only decides the order of unlock notifications.
#[derive(Debug, Clone, Copy)]
pub struct AchievementDef {
    /// Stable id stored in the account's unlocked set.
    pub id: &'static str,
    /// Human readable label.
    pub name: &'static str,
    /// Human readable unlock condition.
    pub description: &'static str,
    /// Unlock condition over the lifetime counters.
    pub predicate: fn(&StatCounters) -> bool,
    /// Cosmetic granted on unlock, if any.
    pub reward: Option<SkinReward>,
}

/// One-time redeemable code granting a cosmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecretCode {
    /// Code string, matched case-insensitively.
    pub code: &'static str,
    /// Granted skin reference.
    pub skin: &'static str,
    /// Display name of the skin.
    pub name: &'static str,
}

/// Why a code redemption was refused. Reported back to the client, unlike
/// tag rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RedeemRejection {
    /// The code does not exist.
    #[error("unknown code")]
    UnknownCode,
    /// The account already redeemed this code.
    #[error("code already redeemed")]
    AlreadyRedeemed,
}

static DEFINITIONS: &[AchievementDef] = &[
    AchievementDef {
        id: "first_blood",
        name: "First Blood",
        description: "Inflict 1 tag",
        predicate: |s| s.tags_inflicted >= 1,
        reward: Some(SkinReward {
            skin: "#ff0000",
            name: "Blood Red",
        }),
    },
    AchievementDef {
        id: "hunter_pro",
        name: "Pro Hunter",
        description: "Inflict 10 tags",
        predicate: |s| s.tags_inflicted >= 10,
        reward: Some(SkinReward {
            skin: "linear-gradient(45deg, #ff9a9e 0%, #fecfef 99%, #fecfef 100%)",
            name: "Dawn",
        }),
    },
    AchievementDef {
        id: "master_hunter",
        name: "Master Hunter",
        description: "Inflict 50 tags",
        predicate: |s| s.tags_inflicted >= 50,
        reward: Some(SkinReward {
            skin: "skin-neon",
            name: "Neon",
        }),
    },
    AchievementDef {
        id: "traveler",
        name: "Traveler",
        description: "Travel 5,000 px",
        predicate: |s| s.distance_traveled >= 5_000,
        reward: Some(SkinReward {
            skin: "#00ccff",
            name: "Azure",
        }),
    },
    AchievementDef {
        id: "marathon",
        name: "Marathoner",
        description: "Travel 20,000 px",
        predicate: |s| s.distance_traveled >= 20_000,
        reward: Some(SkinReward {
            skin: "linear-gradient(to right, #f12711, #f5af19)",
            name: "Fire",
        }),
    },
    AchievementDef {
        id: "veteran",
        name: "Veteran",
        description: "Travel 1,000,000 px",
        predicate: |s| s.distance_traveled >= 1_000_000,
        reward: Some(SkinReward {
            skin: "skin-plasma",
            name: "Liquid Plasma",
        }),
    },
    AchievementDef {
        id: "architect",
        name: "Architect",
        description: "Change the background 5 times",
        predicate: |s| s.backgrounds_changed >= 5,
        reward: Some(SkinReward {
            skin: "#9b59b6",
            name: "Amethyst",
        }),
    },
    AchievementDef {
        id: "survivor",
        name: "Punching Bag",
        description: "Get tagged 10 times",
        predicate: |s| s.times_tagged >= 10,
        reward: Some(SkinReward {
            skin: "#7f8c8d",
            name: "Ghost",
        }),
    },
    AchievementDef {
        id: "god_mode",
        name: "Game Deity",
        description: "Unlock everything (impossible)",
        predicate: |_| false,
        reward: Some(SkinReward {
            skin: "skin-rainbow",
            name: "Divine Light",
        }),
    },
    AchievementDef {
        id: "white_walker",
        name: "White Walker",
        description: "Travel 2,000,000 px",
        predicate: |s| s.distance_traveled >= 2_000_000,
        reward: Some(SkinReward {
            skin: "skin-snow",
            name: "Eternal Winter",
        }),
    },
    AchievementDef {
        id: "badapple",
        name: "Bad Apple!",
        description: "Join 100 games",
        predicate: |s| s.games_joined >= 100,
        reward: Some(SkinReward {
            skin: "https://files.catbox.moe/8a4984.gif",
            name: "Bad Apple!",
        }),
    },
    AchievementDef {
        id: "cat",
        name: "Kawaii Cat",
        description: "Join 1,000 games",
        predicate: |s| s.games_joined >= 1_000,
        reward: Some(SkinReward {
            skin: "skin-kawaii-cat",
            name: "Kawaii Cat",
        }),
    },
    AchievementDef {
        id: "inverser",
        name: "Upside Down",
        description: "Inflict 100 tags",
        predicate: |s| s.tags_inflicted >= 100,
        reward: Some(SkinReward {
            skin: "skin-negative",
            name: "Negative",
        }),
    },
    AchievementDef {
        id: "hiden",
        name: "Hidden Cube",
        description: "Get tagged 100 times",
        predicate: |s| s.times_tagged >= 100,
        reward: Some(SkinReward {
            skin: "skin-hiden",
            name: "Hidden Cube",
        }),
    },
    AchievementDef {
        id: "triangle",
        name: "Triangle Cube?",
        description: "Change the background 5 times",
        predicate: |s| s.backgrounds_changed >= 5,
        reward: Some(SkinReward {
            skin: "skin-triangle",
            name: "Triangle Cube?",
        }),
    },
    AchievementDef {
        id: "eyes",
        name: "Cube 👁️👄👁️",
        description: "Travel 4,000,000 px",
        predicate: |s| s.distance_traveled >= 4_000_000,
        reward: Some(SkinReward {
            skin: "skin-eyes",
            name: "👁️👄👁️",
        }),
    },
];

static SECRET_CODES: &[SecretCode] = &[
    SecretCode {
        code: "PATPAT",
        skin: "linear-gradient(135deg, #667eea 0%, #764ba2 100%)",
        name: "Admin Skin",
    },
    SecretCode {
        code: "DEV2025",
        skin: "#00ff00",
        name: "Hacker Green",
    },
    SecretCode {
        code: "GOLD",
        skin: "linear-gradient(to bottom, #f7971e, #ffd200)",
        name: "Solid Gold",
    },
    SecretCode {
        code: "RAINBOW",
        skin: "skin-rainbow",
        name: "Rainbow",
    },
    SecretCode {
        code: "MATRIX",
        skin: "skin-glitch",
        name: "Matrix",
    },
    SecretCode {
        code: "BOOM",
        skin: "skin-pulse",
        name: "Pulse",
    },
    SecretCode {
        code: "PLASMA",
        skin: "skin-plasma",
        name: "Free Plasma",
    },
    SecretCode {
        code: "GENTLEMAN",
        skin: "skin-tophat",
        name: "The Chic",
    },
    SecretCode {
        code: "PIXEL",
        skin: "https://art.pixilart.com/original/sr5z26073f1b17aws3.gif",
        name: "Pixel Art",
    },
];

/// Evaluate every locked achievement against the account's counters.
///
/// Newly crossed achievements are added to the account's unlocked set along
/// with any reward skin not already owned. Returns the newly crossed
/// definitions, in table order, so the caller can notify the player.
/// Re-evaluating with unchanged counters yields nothing; persistence of the
/// mutated account is the caller's commit point.
pub fn evaluate(account: &mut AccountEntity) -> Vec<&'static AchievementDef> {
    let mut newly = Vec::new();

    for def in DEFINITIONS {
        if account.has_achievement(def.id) {
            continue;
        }
        if !(def.predicate)(&account.stats) {
            continue;
        }

        account.unlocked_achievements.push(def.id.to_owned());
        if let Some(reward) = &def.reward
            && !account.owns_skin(reward.skin)
        {
            account.unlocked_skins.push(reward.skin.to_owned());
        }
        newly.push(def);
    }

    newly
}

/// Redeem a one-time code for the account.
///
/// Codes match case-insensitively and are stored uppercase in the redeemed
/// set. The reward skin is unlocked only if not already owned.
pub fn redeem(
    account: &mut AccountEntity,
    code: &str,
) -> Result<&'static SecretCode, RedeemRejection> {
    let normalized = code.trim().to_uppercase();
    let entry = SECRET_CODES
        .iter()
        .find(|c| c.code == normalized)
        .ok_or(RedeemRejection::UnknownCode)?;

    if account.has_redeemed(&normalized) {
        return Err(RedeemRejection::AlreadyRedeemed);
    }

    account.redeemed_codes.push(normalized);
    if !account.owns_skin(entry.skin) {
        account.unlocked_skins.push(entry.skin.to_owned());
    }

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountEntity {
        AccountEntity::new("tester".into())
    }

    #[test]
    fn fresh_account_unlocks_nothing() {
        let mut account = account();
        assert!(evaluate(&mut account).is_empty());
        assert!(account.unlocked_achievements.is_empty());
        assert!(account.unlocked_skins.is_empty());
    }

    #[test]
    fn evaluation_is_idempotent_for_unchanged_counters() {
        let mut account = account();
        account.stats.tags_inflicted = 3;

        let first = evaluate(&mut account);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "first_blood");

        let second = evaluate(&mut account);
        assert!(second.is_empty());
        assert_eq!(account.unlocked_achievements, vec!["first_blood"]);
    }

    #[test]
    fn tenth_tag_unlocks_pro_hunter_exactly_once() {
        let mut account = account();
        account.stats.tags_inflicted = 9;
        let newly = evaluate(&mut account);
        assert_eq!(newly.len(), 1, "first_blood only at nine tags");

        account.stats.tags_inflicted = 10;
        let newly = evaluate(&mut account);
        assert_eq!(newly.len(), 1);
        assert_eq!(newly[0].id, "hunter_pro");
        let reward = newly[0].reward.expect("hunter_pro carries a reward");
        assert!(account.owns_skin(reward.skin));

        assert!(evaluate(&mut account).is_empty());
    }

    #[test]
    fn newly_crossed_achievements_follow_table_order() {
        let mut account = account();
        account.stats.tags_inflicted = 50;
        account.stats.distance_traveled = 20_000;

        let ids: Vec<&str> = evaluate(&mut account).iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            vec![
                "first_blood",
                "hunter_pro",
                "master_hunter",
                "traveler",
                "marathon"
            ]
        );
    }

    #[test]
    fn impossible_achievement_never_unlocks() {
        let mut account = account();
        account.stats = StatCounters {
            tags_inflicted: u64::MAX,
            times_tagged: u64::MAX,
            games_joined: u64::MAX,
            distance_traveled: u64::MAX,
            backgrounds_changed: u64::MAX,
        };

        evaluate(&mut account);
        assert!(!account.has_achievement("god_mode"));
    }

    #[test]
    fn shared_reward_skin_is_not_duplicated() {
        let mut account = account();
        // "plasma" is both the veteran reward and the PLASMA code reward.
        redeem(&mut account, "plasma").expect("code accepted");
        account.stats.distance_traveled = 1_000_000;
        evaluate(&mut account);

        let plasma_count = account
            .unlocked_skins
            .iter()
            .filter(|s| *s == "skin-plasma")
            .count();
        assert_eq!(plasma_count, 1);
    }

    #[test]
    fn code_redemption_round_trip() {
        let mut account = account();

        let entry = redeem(&mut account, "gold").expect("valid unused code");
        assert_eq!(entry.name, "Solid Gold");
        assert_eq!(account.unlocked_skins.len(), 1);

        // Case-insensitive repeat is refused and unlocks nothing new.
        assert_eq!(
            redeem(&mut account, "GoLd"),
            Err(RedeemRejection::AlreadyRedeemed)
        );
        assert_eq!(account.unlocked_skins.len(), 1);
    }

    #[test]
    fn unknown_code_is_rejected() {
        let mut account = account();
        assert_eq!(
            redeem(&mut account, "NOT_A_CODE"),
            Err(RedeemRejection::UnknownCode)
        );
        assert!(account.redeemed_codes.is_empty());
    }
}
