//! Desk occupancy coordination.
//!
//! All mutations of the pairing/booking exclusivity invariants go through
//! the [`OccupancyCoordinator`]. Conflicts and not-found outcomes are
//! ordinary business results, not infrastructure failures; only store
//! errors propagate as fatal.
//!
//! Pair and book are check-then-insert sequences, so the coordinator holds
//! a per-desk lock across each of them. Operations on different desks run
//! fully in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::{Session, SessionStore, StoreError};

/// Outcomes other than success. Everything except `Store` is an expected
/// business result and is never logged as an error.
#[derive(Debug, Error)]
pub enum OccupancyError {
    #[error("desk already occupied by {0}")]
    Occupied(String),

    #[error("desk is booked by another user")]
    Booked,

    #[error("desk already booked for this time")]
    BookingOverlap,

    #[error("no active desk pairing")]
    NoActivePairing,

    #[error("no open pairing on this desk")]
    DeskNotPaired,

    #[error("booking start must be before its end")]
    InvalidWindow,

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl OccupancyError {
    /// Machine-readable reason for structured responses.
    pub fn reason(&self) -> String {
        match self {
            OccupancyError::Occupied(user) => format!("occupied_by:{user}"),
            OccupancyError::Booked => "booked".to_string(),
            OccupancyError::BookingOverlap => "booking_overlap".to_string(),
            OccupancyError::NoActivePairing => "no_active_pairing".to_string(),
            OccupancyError::DeskNotPaired => "desk_not_paired".to_string(),
            OccupancyError::InvalidWindow => "invalid_window".to_string(),
            OccupancyError::Store(_) => "store_failure".to_string(),
        }
    }

    /// Whether this is an expected business outcome rather than an
    /// infrastructure failure.
    pub fn is_business(&self) -> bool {
        !matches!(self, OccupancyError::Store(_))
    }
}

pub struct OccupancyCoordinator {
    store: Arc<dyn SessionStore>,
    desk_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl OccupancyCoordinator {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            desk_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Claim `desk_id` for `user_id`.
    ///
    /// Fails if another user holds an open pairing on the desk or a booking
    /// by another user covers `now`. Otherwise the caller's own open
    /// pairing (on any desk) is closed and a fresh one is created; the
    /// one-open-pairing-per-user invariant is maintained by that forced
    /// close, never by rejecting the request.
    pub fn pair(
        &self,
        user_id: &str,
        desk_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, OccupancyError> {
        let lock = self.desk_lock(desk_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = self.store.find_open_pairing_by_desk(desk_id)? {
            if existing.user_id() != user_id {
                return Err(OccupancyError::Occupied(existing.user_id().to_string()));
            }
        }
        if let Some(booking) = self.store.find_live_booking(desk_id, now)? {
            if booking.user_id() != user_id {
                return Err(OccupancyError::Booked);
            }
        }

        if let Some(previous) = self.store.close_open_pairing_for_user(user_id, now)? {
            tracing::info!(
                "closed previous pairing for {} on desk {}",
                user_id,
                previous.desk_id()
            );
        }
        let session = self.store.create_pairing(user_id, desk_id, now)?;
        tracing::info!("paired {} with desk {} ({})", user_id, desk_id, session.id());
        Ok(session)
    }

    /// Close the caller's open pairing.
    pub fn unpair(&self, user_id: &str, now: DateTime<Utc>) -> Result<Session, OccupancyError> {
        let closed = self
            .store
            .close_open_pairing_for_user(user_id, now)?
            .ok_or(OccupancyError::NoActivePairing)?;
        tracing::info!("unpaired {} from desk {}", user_id, closed.desk_id());
        Ok(closed)
    }

    /// Close whichever pairing is open on `desk_id`, regardless of owner.
    /// Elevated privilege is the caller's responsibility to check.
    pub fn force_unpair(
        &self,
        desk_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, OccupancyError> {
        let closed = self
            .store
            .close_open_pairing_for_desk(desk_id, now)?
            .ok_or(OccupancyError::DeskNotPaired)?;
        tracing::info!("force-unpaired {} from desk {}", closed.user_id(), desk_id);
        Ok(closed)
    }

    /// Reserve `desk_id` for `[start, end)`. Touching an existing booking's
    /// endpoint is not a conflict.
    pub fn book(
        &self,
        user_id: &str,
        desk_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Session, OccupancyError> {
        if start >= end {
            return Err(OccupancyError::InvalidWindow);
        }

        let lock = self.desk_lock(desk_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        if self
            .store
            .find_overlapping_booking(desk_id, start, end)?
            .is_some()
        {
            return Err(OccupancyError::BookingOverlap);
        }
        let session = self.store.create_booking(user_id, desk_id, start, end)?;
        tracing::info!("booked desk {} for {} ({})", desk_id, user_id, session.id());
        Ok(session)
    }

    fn desk_lock(&self, desk_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.desk_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(desk_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
