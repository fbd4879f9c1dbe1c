use std::time::Instant;

use indexmap::IndexMap;
use rand::Rng;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::state::role::{TagRejection, WolfRole, within_reach};

/// How a session entry maps to durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerIdentity {
    /// Ephemeral connection; stats are never persisted.
    Guest,
    /// Connection bound to a durable account handle.
    Registered(String),
}

impl PlayerIdentity {
    /// Account handle for registered players, `None` for guests.
    pub fn handle(&self) -> Option<&str> {
        match self {
            PlayerIdentity::Guest => None,
            PlayerIdentity::Registered(handle) => Some(handle),
        }
    }
}

/// Per-connection session state, created on join and destroyed on leave.
#[derive(Debug, Clone)]
pub struct PlayerEntry {
    /// Current x coordinate on the shared plane.
    pub x: f64,
    /// Current y coordinate on the shared plane.
    pub y: f64,
    /// Skin reference: hex color, CSS token, or URL.
    pub skin: String,
    /// Durable account binding, or guest.
    pub identity: PlayerIdentity,
    /// Distance traveled since the last flush, in pixels.
    pub pending_distance: f64,
    /// Deadline before which background uploads are rejected.
    pub upload_blocked_until: Option<Instant>,
}

/// Result of seating a new player.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Spawn x coordinate.
    pub x: f64,
    /// Spawn y coordinate.
    pub y: f64,
    /// Whether the joiner was seated as the first wolf.
    pub became_wolf: bool,
}

/// Result of applying a movement update.
#[derive(Debug, Clone, Copy)]
pub struct MoveOutcome {
    /// New x coordinate.
    pub x: f64,
    /// New y coordinate.
    pub y: f64,
}

/// Result of a successful tag: the role moved from `previous` to `next`.
#[derive(Debug, Clone, PartialEq)]
pub struct TagTransfer {
    /// Holder before the tag.
    pub previous: Uuid,
    /// Holder after the tag (the tagged player).
    pub next: Uuid,
    /// Impact x coordinate (target position plus half the avatar size).
    pub impact_x: f64,
    /// Impact y coordinate (target position plus half the avatar size).
    pub impact_y: f64,
    /// Skin of the tagged player, echoed in the visual effect.
    pub target_skin: String,
}

/// What happened to the wolf role when a player was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleHandoff {
    /// The role moved to a surviving player, picked uniformly at random.
    Transferred(Uuid),
    /// No player remained; the role is vacant.
    Cleared,
}

/// Result of removing a player from the arena.
#[derive(Debug)]
pub struct RemovalOutcome {
    /// The removed entry, returned so the caller can flush pending distance.
    pub entry: PlayerEntry,
    /// Present only when the removed player was the wolf.
    pub handoff: Option<RoleHandoff>,
}

/// Authoritative in-memory session state: player map, wolf role, and the
/// process-wide tag cooldown clock.
///
/// The arena performs no I/O and never broadcasts; callers hold it behind a
/// single mutex and fan out events built from the returned outcomes. Time and
/// randomness are injected so tests are deterministic.
pub struct Arena {
    config: AppConfig,
    players: IndexMap<Uuid, PlayerEntry>,
    wolf: WolfRole,
    last_tag_at: Option<Instant>,
}

impl Arena {
    /// Create an empty arena using the given tuning.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            players: IndexMap::new(),
            wolf: WolfRole::Empty,
            last_tag_at: None,
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Whether the given connection has joined.
    pub fn contains(&self, id: Uuid) -> bool {
        self.players.contains_key(&id)
    }

    /// Read-only access to a single entry.
    pub fn get(&self, id: Uuid) -> Option<&PlayerEntry> {
        self.players.get(&id)
    }

    /// Read-only iteration over all entries, in join order.
    pub fn iter(&self) -> impl Iterator<Item = (Uuid, &PlayerEntry)> {
        self.players.iter().map(|(id, entry)| (*id, entry))
    }

    /// Connection id of the current wolf, if any.
    pub fn wolf(&self) -> Option<Uuid> {
        self.wolf.holder()
    }

    /// How long the current wolf has been idle, if the role is held.
    pub fn wolf_idle_for(&self, now: Instant) -> Option<(Uuid, std::time::Duration)> {
        self.wolf.idle_for(now)
    }

    /// Seat a new player at a randomized spawn position.
    ///
    /// Returns `None` when the connection already joined (idempotent guard).
    /// The first player to join an empty arena becomes the wolf.
    pub fn join(
        &mut self,
        id: Uuid,
        identity: PlayerIdentity,
        skin: String,
        rng: &mut impl Rng,
        now: Instant,
    ) -> Option<JoinOutcome> {
        if self.players.contains_key(&id) {
            return None;
        }

        let area = self.config.spawn_area;
        let x = rng.random_range(area.x_min..area.x_max);
        let y = rng.random_range(area.y_min..area.y_max);

        self.players.insert(
            id,
            PlayerEntry {
                x,
                y,
                skin,
                identity,
                pending_distance: 0.0,
                upload_blocked_until: None,
            },
        );

        let became_wolf = matches!(self.wolf, WolfRole::Empty);
        if became_wolf {
            self.wolf.seat(id, now);
        }

        Some(JoinOutcome { x, y, became_wolf })
    }

    /// Apply a position update, accumulating traveled distance.
    ///
    /// Unknown connection ids are a no-op: stale movement messages can arrive
    /// after a disconnect. Moving refreshes the wolf liveness clock when the
    /// mover holds the role.
    pub fn apply_move(&mut self, id: Uuid, x: f64, y: f64, now: Instant) -> Option<MoveOutcome> {
        let entry = self.players.get_mut(&id)?;

        let delta = ((x - entry.x).powi(2) + (y - entry.y).powi(2)).sqrt();
        entry.pending_distance += delta;
        entry.x = x;
        entry.y = y;

        self.wolf.refresh_liveness(id, now);

        Some(MoveOutcome { x, y })
    }

    /// Validate and apply a tag attempt.
    ///
    /// All five conditions must hold: the requester is the wolf, the target
    /// exists, the target differs from the requester, both axis deltas are
    /// under the tolerance, and the process-wide cooldown has elapsed.
    pub fn tag_attempt(
        &mut self,
        requester: Uuid,
        target: Uuid,
        now: Instant,
    ) -> Result<TagTransfer, TagRejection> {
        if !self.wolf.is_held_by(requester) {
            return Err(TagRejection::NotHolder);
        }
        if requester == target {
            return Err(TagRejection::SelfTag);
        }

        let target_entry = self.players.get(&target).ok_or(TagRejection::UnknownTarget)?;
        let requester_entry = self
            .players
            .get(&requester)
            .ok_or(TagRejection::NotHolder)?;

        if !within_reach(
            requester_entry.x,
            requester_entry.y,
            target_entry.x,
            target_entry.y,
            self.config.tag_tolerance_px,
        ) {
            return Err(TagRejection::OutOfReach);
        }

        if let Some(last) = self.last_tag_at
            && now.saturating_duration_since(last) < self.config.tag_cooldown
        {
            return Err(TagRejection::CooldownActive);
        }

        let half = self.config.avatar_size_px / 2.0;
        let transfer = TagTransfer {
            previous: requester,
            next: target,
            impact_x: target_entry.x + half,
            impact_y: target_entry.y + half,
            target_skin: target_entry.skin.clone(),
        };

        self.wolf.seat(target, now);
        self.last_tag_at = Some(now);

        Ok(transfer)
    }

    /// Remove a player, handing the wolf role off if they held it.
    ///
    /// The replacement is picked uniformly at random among survivors; a
    /// handoff also resets the tag cooldown clock so the new wolf cannot tag
    /// within the cooldown window.
    pub fn remove(&mut self, id: Uuid, rng: &mut impl Rng, now: Instant) -> Option<RemovalOutcome> {
        let entry = self.players.shift_remove(&id)?;

        let handoff = if self.wolf.is_held_by(id) {
            if self.players.is_empty() {
                self.wolf.clear();
                Some(RoleHandoff::Cleared)
            } else {
                let index = rng.random_range(0..self.players.len());
                let (&next, _) = self.players.get_index(index).expect("index in bounds");
                self.wolf.seat(next, now);
                self.last_tag_at = Some(now);
                Some(RoleHandoff::Transferred(next))
            }
        } else {
            None
        };

        Some(RemovalOutcome { entry, handoff })
    }

    /// Take the pending distance of one entry, resetting the accumulator.
    pub fn take_pending_distance(&mut self, id: Uuid) -> Option<f64> {
        let entry = self.players.get_mut(&id)?;
        Some(std::mem::take(&mut entry.pending_distance))
    }

    /// Credit distance back after a failed flush, if the entry still exists.
    pub fn credit_pending_distance(&mut self, id: Uuid, amount: f64) -> bool {
        match self.players.get_mut(&id) {
            Some(entry) => {
                entry.pending_distance += amount;
                true
            }
            None => false,
        }
    }

    /// Remaining upload cooldown for a connection, if one is active.
    pub fn upload_block_remaining(&self, id: Uuid, now: Instant) -> Option<std::time::Duration> {
        let until = self.players.get(&id)?.upload_blocked_until?;
        let remaining = until.saturating_duration_since(now);
        (remaining > std::time::Duration::ZERO).then_some(remaining)
    }

    /// Arm the upload cooldown for a connection.
    pub fn set_upload_block(&mut self, id: Uuid, until: Instant) {
        if let Some(entry) = self.players.get_mut(&id) {
            entry.upload_blocked_until = Some(until);
        }
    }

    /// Replace the skin of a live entry. Returns false for unknown ids.
    pub fn set_skin(&mut self, id: Uuid, skin: String) -> bool {
        match self.players.get_mut(&id) {
            Some(entry) => {
                entry.skin = skin;
                true
            }
            None => false,
        }
    }
}

/// Random `#rrggbb` fallback color for players without a saved cosmetic.
pub fn random_hex_color(rng: &mut impl Rng) -> String {
    format!("#{:06x}", rng.random_range(0..0x100_0000u32))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn arena() -> Arena {
        Arena::new(AppConfig::default())
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn join(arena: &mut Arena, rng: &mut StdRng, now: Instant) -> Uuid {
        let id = Uuid::new_v4();
        arena
            .join(id, PlayerIdentity::Guest, "#ff0000".into(), rng, now)
            .expect("fresh id joins");
        id
    }

    /// Move two players onto the same spot so tags are in range.
    fn colocate(arena: &mut Arena, a: Uuid, b: Uuid, now: Instant) {
        arena.apply_move(a, 200.0, 200.0, now);
        arena.apply_move(b, 200.0, 200.0, now);
    }

    fn assert_role_invariant(arena: &Arena) {
        if arena.is_empty() {
            assert_eq!(arena.wolf(), None);
        } else {
            let wolf = arena.wolf().expect("non-empty arena has a wolf");
            assert!(arena.contains(wolf), "wolf must be a live session");
        }
    }

    #[test]
    fn first_join_becomes_wolf_and_spawns_in_area() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();

        let id = Uuid::new_v4();
        let outcome = arena
            .join(id, PlayerIdentity::Guest, "#123456".into(), &mut rng, now)
            .expect("first join");

        assert!(outcome.became_wolf);
        assert_eq!(arena.wolf(), Some(id));
        assert!((50.0..550.0).contains(&outcome.x));
        assert!((50.0..450.0).contains(&outcome.y));
        assert_role_invariant(&arena);
    }

    #[test]
    fn join_is_idempotent_per_connection() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();

        let id = join(&mut arena, &mut rng, now);
        assert!(
            arena
                .join(id, PlayerIdentity::Guest, "#000000".into(), &mut rng, now)
                .is_none()
        );
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn second_join_does_not_steal_the_role() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();

        let first = join(&mut arena, &mut rng, now);
        let second = join(&mut arena, &mut rng, now);

        assert_eq!(arena.wolf(), Some(first));
        assert_ne!(arena.wolf(), Some(second));
        assert_role_invariant(&arena);
    }

    #[test]
    fn movement_accumulates_euclidean_distance() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();
        let id = join(&mut arena, &mut rng, now);

        arena.apply_move(id, 100.0, 100.0, now);
        let before = arena.get(id).unwrap().pending_distance;

        arena.apply_move(id, 103.0, 104.0, now);
        let after = arena.get(id).unwrap().pending_distance;

        assert!((after - before - 5.0).abs() < 1e-9);
        assert_eq!(arena.get(id).unwrap().x, 103.0);
    }

    #[test]
    fn movement_for_unknown_connection_is_noop() {
        let mut arena = arena();
        assert!(
            arena
                .apply_move(Uuid::new_v4(), 10.0, 10.0, Instant::now())
                .is_none()
        );
    }

    #[test]
    fn wolf_movement_refreshes_liveness() {
        let mut arena = arena();
        let mut rng = rng();
        let start = Instant::now();
        let wolf = join(&mut arena, &mut rng, start);
        join(&mut arena, &mut rng, start);

        let later = start + Duration::from_secs(10);
        arena.apply_move(wolf, 120.0, 120.0, later);

        let (holder, idle) = arena.wolf_idle_for(later).expect("role held");
        assert_eq!(holder, wolf);
        assert_eq!(idle, Duration::ZERO);
    }

    #[test]
    fn non_wolf_movement_does_not_refresh_liveness() {
        let mut arena = arena();
        let mut rng = rng();
        let start = Instant::now();
        join(&mut arena, &mut rng, start);
        let bystander = join(&mut arena, &mut rng, start);

        let later = start + Duration::from_secs(10);
        arena.apply_move(bystander, 120.0, 120.0, later);

        let (_, idle) = arena.wolf_idle_for(later).expect("role held");
        assert_eq!(idle, Duration::from_secs(10));
    }

    #[test]
    fn tag_transfers_role_when_all_conditions_hold() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();
        let wolf = join(&mut arena, &mut rng, now);
        let prey = join(&mut arena, &mut rng, now);
        colocate(&mut arena, wolf, prey, now);

        let transfer = arena.tag_attempt(wolf, prey, now).expect("valid tag");

        assert_eq!(transfer.previous, wolf);
        assert_eq!(transfer.next, prey);
        assert_eq!(transfer.impact_x, 225.0);
        assert_eq!(transfer.impact_y, 225.0);
        assert_eq!(arena.wolf(), Some(prey));
        assert_role_invariant(&arena);
    }

    #[test]
    fn tag_from_non_holder_is_rejected() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();
        let wolf = join(&mut arena, &mut rng, now);
        let prey = join(&mut arena, &mut rng, now);
        colocate(&mut arena, wolf, prey, now);

        assert_eq!(
            arena.tag_attempt(prey, wolf, now),
            Err(TagRejection::NotHolder)
        );
        assert_eq!(arena.wolf(), Some(wolf));
    }

    #[test]
    fn tag_against_missing_target_is_rejected() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();
        let wolf = join(&mut arena, &mut rng, now);

        assert_eq!(
            arena.tag_attempt(wolf, Uuid::new_v4(), now),
            Err(TagRejection::UnknownTarget)
        );
    }

    #[test]
    fn self_tag_is_rejected() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();
        let wolf = join(&mut arena, &mut rng, now);

        assert_eq!(
            arena.tag_attempt(wolf, wolf, now),
            Err(TagRejection::SelfTag)
        );
    }

    #[test]
    fn tag_out_of_reach_is_rejected_per_axis() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();
        let wolf = join(&mut arena, &mut rng, now);
        let prey = join(&mut arena, &mut rng, now);

        // y aligned, x one pixel past the tolerance
        arena.apply_move(wolf, 100.0, 100.0, now);
        arena.apply_move(prey, 191.0, 100.0, now);
        assert_eq!(
            arena.tag_attempt(wolf, prey, now),
            Err(TagRejection::OutOfReach)
        );

        // both axes just inside
        arena.apply_move(prey, 189.0, 189.0, now);
        assert!(arena.tag_attempt(wolf, prey, now).is_ok());
    }

    #[test]
    fn tag_during_cooldown_is_rejected_then_allowed() {
        let mut arena = arena();
        let mut rng = rng();
        let start = Instant::now();
        let wolf = join(&mut arena, &mut rng, start);
        let prey = join(&mut arena, &mut rng, start);
        colocate(&mut arena, wolf, prey, start);

        arena.tag_attempt(wolf, prey, start).expect("first tag");

        // Immediate retag by the new wolf at the same spot: cooldown active.
        let early = start + Duration::from_millis(999);
        assert_eq!(
            arena.tag_attempt(prey, wolf, early),
            Err(TagRejection::CooldownActive)
        );

        // Exactly at the cooldown boundary the tag goes through.
        let later = start + Duration::from_millis(1_000);
        assert!(arena.tag_attempt(prey, wolf, later).is_ok());
        assert_eq!(arena.wolf(), Some(wolf));
    }

    #[test]
    fn randomized_single_violation_cases_reject() {
        let mut rng = rng();
        let now = Instant::now();

        for _ in 0..50 {
            let mut arena = Arena::new(AppConfig::default());
            let wolf = join(&mut arena, &mut rng, now);
            let prey = join(&mut arena, &mut rng, now);

            let x: f64 = rng.random_range(0.0..600.0);
            let y: f64 = rng.random_range(0.0..500.0);
            arena.apply_move(wolf, x, y, now);

            // Violate exactly the reach condition with a random oversized offset.
            let off: f64 = rng.random_range(90.0..500.0);
            arena.apply_move(prey, x + off, y, now);
            assert_eq!(
                arena.tag_attempt(wolf, prey, now),
                Err(TagRejection::OutOfReach)
            );

            // Fix reach, violate only the cooldown.
            arena.apply_move(prey, x, y, now);
            arena.tag_attempt(wolf, prey, now).expect("in range");
            let withheld = now + Duration::from_millis(rng.random_range(0..1_000));
            assert_eq!(
                arena.tag_attempt(prey, wolf, withheld),
                Err(TagRejection::CooldownActive)
            );
        }
    }

    #[test]
    fn removing_wolf_hands_role_to_a_survivor() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();
        let wolf = join(&mut arena, &mut rng, now);
        let a = join(&mut arena, &mut rng, now);
        let b = join(&mut arena, &mut rng, now);

        let outcome = arena.remove(wolf, &mut rng, now).expect("wolf removed");
        match outcome.handoff {
            Some(RoleHandoff::Transferred(next)) => {
                assert!(next == a || next == b);
                assert_eq!(arena.wolf(), Some(next));
            }
            other => panic!("expected transfer, got {other:?}"),
        }
        assert_role_invariant(&arena);
    }

    #[test]
    fn removing_last_player_clears_the_role() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();
        let wolf = join(&mut arena, &mut rng, now);

        let outcome = arena.remove(wolf, &mut rng, now).expect("removed");
        assert_eq!(outcome.handoff, Some(RoleHandoff::Cleared));
        assert_eq!(arena.wolf(), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn removing_bystander_keeps_the_wolf() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();
        let wolf = join(&mut arena, &mut rng, now);
        let bystander = join(&mut arena, &mut rng, now);

        let outcome = arena.remove(bystander, &mut rng, now).expect("removed");
        assert!(outcome.handoff.is_none());
        assert_eq!(arena.wolf(), Some(wolf));
    }

    #[test]
    fn handoff_resets_the_tag_cooldown_clock() {
        let mut arena = arena();
        let mut rng = rng();
        let start = Instant::now();
        let wolf = join(&mut arena, &mut rng, start);
        let heir = join(&mut arena, &mut rng, start);
        let prey = join(&mut arena, &mut rng, start);
        arena.apply_move(heir, 200.0, 200.0, start);
        arena.apply_move(prey, 200.0, 200.0, start);

        arena.remove(wolf, &mut rng, start).expect("wolf removed");
        let new_wolf = arena.wolf().expect("role handed off");
        let (tagger, target) = if new_wolf == heir {
            (heir, prey)
        } else {
            (prey, heir)
        };

        assert_eq!(
            arena.tag_attempt(tagger, target, start + Duration::from_millis(500)),
            Err(TagRejection::CooldownActive)
        );
        assert!(
            arena
                .tag_attempt(tagger, target, start + Duration::from_millis(1_000))
                .is_ok()
        );
    }

    #[test]
    fn pending_distance_take_and_credit_round_trip() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();
        let id = join(&mut arena, &mut rng, now);

        arena.apply_move(id, 100.0, 100.0, now);
        arena.apply_move(id, 100.0, 175.5, now);
        let entry_distance = arena.get(id).unwrap().pending_distance;
        assert!(entry_distance > 0.0);

        let taken = arena.take_pending_distance(id).expect("entry exists");
        assert_eq!(taken, entry_distance);
        assert_eq!(arena.get(id).unwrap().pending_distance, 0.0);

        assert!(arena.credit_pending_distance(id, taken));
        assert_eq!(arena.get(id).unwrap().pending_distance, taken);

        assert!(!arena.credit_pending_distance(Uuid::new_v4(), 1.0));
    }

    #[test]
    fn upload_block_expires() {
        let mut arena = arena();
        let mut rng = rng();
        let now = Instant::now();
        let id = join(&mut arena, &mut rng, now);

        assert!(arena.upload_block_remaining(id, now).is_none());

        arena.set_upload_block(id, now + Duration::from_secs(60));
        let remaining = arena
            .upload_block_remaining(id, now + Duration::from_secs(10))
            .expect("block active");
        assert_eq!(remaining, Duration::from_secs(50));

        assert!(
            arena
                .upload_block_remaining(id, now + Duration::from_secs(60))
                .is_none()
        );
    }
}
