//! Read-modify-write of durable account statistics.
//!
//! Every mutation follows the same shape: load (or create) the account,
//! bump counters, run the achievement evaluator, persist. The upsert is the
//! commit point — when it fails the in-memory unlocks are discarded with the
//! account, so nothing is considered granted. Writes are last-write-wins;
//! see DESIGN.md for the accepted dual-device race window.

use std::time::SystemTime;

use crate::{
    dao::models::AccountEntity,
    error::ServiceError,
    services::achievement_service::{self, AchievementDef, RedeemRejection, SecretCode},
    state::SharedState,
};

/// Outcome of a counter bump: the persisted account and the achievements it
/// newly crossed.
pub struct StatUpdate {
    /// Account state after the persisted update.
    pub account: AccountEntity,
    /// Achievements newly unlocked by this update, in definition order.
    pub newly_unlocked: Vec<&'static AchievementDef>,
}

async fn load_or_create(state: &SharedState, handle: &str) -> Result<AccountEntity, ServiceError> {
    let store = state.require_account_store().await?;
    let account = store
        .find(handle)
        .await?
        .unwrap_or_else(|| AccountEntity::new(handle.to_owned()));
    Ok(account)
}

async fn persist(state: &SharedState, account: &AccountEntity) -> Result<(), ServiceError> {
    let store = state.require_account_store().await?;
    store.upsert(account.clone()).await?;
    Ok(())
}

/// Load the account, apply `mutate`, evaluate achievements, and persist.
async fn update_account(
    state: &SharedState,
    handle: &str,
    mutate: impl FnOnce(&mut AccountEntity),
) -> Result<StatUpdate, ServiceError> {
    let mut account = load_or_create(state, handle).await?;
    mutate(&mut account);
    let newly_unlocked = achievement_service::evaluate(&mut account);
    account.updated_at = SystemTime::now();
    persist(state, &account).await?;
    Ok(StatUpdate {
        account,
        newly_unlocked,
    })
}

/// Register a game join: bump `games_joined` and return the account so the
/// caller can derive the session skin from the saved cosmetic.
pub async fn register_join(state: &SharedState, handle: &str) -> Result<StatUpdate, ServiceError> {
    update_account(state, handle, |account| {
        account.stats.games_joined += 1;
    })
    .await
}

/// Record a successful tag for the wolf who performed it.
pub async fn record_tag_inflicted(
    state: &SharedState,
    handle: &str,
) -> Result<StatUpdate, ServiceError> {
    update_account(state, handle, |account| {
        account.stats.tags_inflicted += 1;
    })
    .await
}

/// Record a successful tag for the player who received it.
pub async fn record_times_tagged(
    state: &SharedState,
    handle: &str,
) -> Result<StatUpdate, ServiceError> {
    update_account(state, handle, |account| {
        account.stats.times_tagged += 1;
    })
    .await
}

/// Record an accepted background change.
pub async fn record_background_change(
    state: &SharedState,
    handle: &str,
) -> Result<StatUpdate, ServiceError> {
    update_account(state, handle, |account| {
        account.stats.backgrounds_changed += 1;
    })
    .await
}

/// Flush pending traveled distance (pixels) into the lifetime counter.
pub async fn flush_distance(
    state: &SharedState,
    handle: &str,
    pixels: f64,
) -> Result<StatUpdate, ServiceError> {
    update_account(state, handle, |account| {
        account.stats.distance_traveled += pixels.round() as u64;
    })
    .await
}

/// Persist the account's selected cosmetic.
pub async fn persist_selected_skin(
    state: &SharedState,
    handle: &str,
    skin: &str,
) -> Result<(), ServiceError> {
    let mut account = load_or_create(state, handle).await?;
    account.selected_skin = Some(skin.to_owned());
    account.updated_at = SystemTime::now();
    persist(state, &account).await
}

/// Whether the account owns the given non-hex skin.
pub async fn owns_skin(
    state: &SharedState,
    handle: &str,
    skin: &str,
) -> Result<bool, ServiceError> {
    let store = state.require_account_store().await?;
    let Some(account) = store.find(handle).await? else {
        return Ok(false);
    };
    Ok(account.owns_skin(skin))
}

/// Outcome of a code redemption attempt that reached the account.
pub enum RedeemOutcome {
    /// Code accepted; the skin was unlocked (if not already owned).
    Accepted(&'static SecretCode),
    /// Code refused for an account-level reason.
    Rejected(RedeemRejection),
}

/// Redeem a one-time code against the account, persisting on success.
pub async fn redeem_code(
    state: &SharedState,
    handle: &str,
    code: &str,
) -> Result<RedeemOutcome, ServiceError> {
    let mut account = load_or_create(state, handle).await?;
    match achievement_service::redeem(&mut account, code) {
        Ok(entry) => {
            account.updated_at = SystemTime::now();
            persist(state, &account).await?;
            Ok(RedeemOutcome::Accepted(entry))
        }
        Err(rejection) => Ok(RedeemOutcome::Rejected(rejection)),
    }
}
