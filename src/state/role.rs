use std::time::{Duration, Instant};

use thiserror::Error;
use uuid::Uuid;

/// The "who is it" singleton.
///
/// At most one connection holds the wolf role at any time. Whenever at least
/// one session exists, exactly one of them is the wolf; the arena is
/// responsible for re-seating the role when the holder leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WolfRole {
    /// No session holds the role (empty arena).
    Empty,
    /// The role is held by a live connection.
    Held(WolfTenure),
}

/// Book-keeping attached to the current wolf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WolfTenure {
    /// Connection currently holding the role.
    pub holder: Uuid,
    /// Last time the holder moved; drives the AFK eviction sweep.
    pub last_move_at: Instant,
}

impl WolfRole {
    /// Connection id of the current holder, if any.
    pub fn holder(&self) -> Option<Uuid> {
        match self {
            WolfRole::Empty => None,
            WolfRole::Held(tenure) => Some(tenure.holder),
        }
    }

    /// Whether the given connection currently holds the role.
    pub fn is_held_by(&self, id: Uuid) -> bool {
        self.holder() == Some(id)
    }

    /// Seat a new holder, resetting the liveness clock.
    pub fn seat(&mut self, holder: Uuid, now: Instant) {
        *self = WolfRole::Held(WolfTenure {
            holder,
            last_move_at: now,
        });
    }

    /// Drop the role entirely (last player left).
    pub fn clear(&mut self) {
        *self = WolfRole::Empty;
    }

    /// Refresh the liveness clock if `id` is the current holder.
    pub fn refresh_liveness(&mut self, id: Uuid, now: Instant) {
        if let WolfRole::Held(tenure) = self
            && tenure.holder == id
        {
            tenure.last_move_at = now;
        }
    }

    /// How long the current holder has been idle, if the role is held.
    pub fn idle_for(&self, now: Instant) -> Option<(Uuid, Duration)> {
        match self {
            WolfRole::Empty => None,
            WolfRole::Held(tenure) => Some((
                tenure.holder,
                now.saturating_duration_since(tenure.last_move_at),
            )),
        }
    }
}

/// Why a tag attempt was refused.
///
/// Rejections are expected and frequent; callers drop them silently instead
/// of reporting an error to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TagRejection {
    /// The requester does not currently hold the wolf role.
    #[error("requester does not hold the wolf role")]
    NotHolder,
    /// The target connection is not part of the session.
    #[error("tag target is not in the session")]
    UnknownTarget,
    /// The requester targeted itself.
    #[error("a player cannot tag themselves")]
    SelfTag,
    /// The target is outside the per-axis reach tolerance.
    #[error("target is out of reach")]
    OutOfReach,
    /// The process-wide tag cooldown has not elapsed yet.
    #[error("tag cooldown has not elapsed")]
    CooldownActive,
}

/// Axis-aligned reach check: both |dx| and |dy| must be under `tolerance`.
///
/// A distance-squared comparison would be a stricter acceptable alternative;
/// the per-axis box matches the client's square avatars.
pub fn within_reach(ax: f64, ay: f64, bx: f64, by: f64, tolerance: f64) -> bool {
    (ax - bx).abs() < tolerance && (ay - by).abs() < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_role_has_no_holder() {
        let role = WolfRole::Empty;
        assert_eq!(role.holder(), None);
        assert!(role.idle_for(Instant::now()).is_none());
    }

    #[test]
    fn seat_and_refresh_track_liveness() {
        let start = Instant::now();
        let id = Uuid::new_v4();
        let mut role = WolfRole::Empty;

        role.seat(id, start);
        assert!(role.is_held_by(id));

        let later = start + Duration::from_secs(10);
        let (holder, idle) = role.idle_for(later).expect("role is held");
        assert_eq!(holder, id);
        assert_eq!(idle, Duration::from_secs(10));

        role.refresh_liveness(id, later);
        let (_, idle) = role.idle_for(later).expect("role is held");
        assert_eq!(idle, Duration::ZERO);
    }

    #[test]
    fn refresh_from_non_holder_is_ignored() {
        let start = Instant::now();
        let holder = Uuid::new_v4();
        let mut role = WolfRole::Empty;
        role.seat(holder, start);

        let later = start + Duration::from_secs(5);
        role.refresh_liveness(Uuid::new_v4(), later);

        let (_, idle) = role.idle_for(later).expect("role is held");
        assert_eq!(idle, Duration::from_secs(5));
    }

    #[test]
    fn reach_check_is_per_axis() {
        // Inside on both axes.
        assert!(within_reach(100.0, 100.0, 150.0, 60.0, 90.0));
        // One axis out is enough to fail, even when the other matches exactly.
        assert!(!within_reach(100.0, 100.0, 191.0, 100.0, 90.0));
        assert!(!within_reach(100.0, 100.0, 100.0, 210.0, 90.0));
        // Boundary is exclusive.
        assert!(!within_reach(0.0, 0.0, 90.0, 0.0, 90.0));
        assert!(within_reach(0.0, 0.0, 89.9, 0.0, 90.0));
    }
}
