//! Session records and the persistence seam.
//!
//! Two kinds of occupancy record exist: *pairings* (open-ended, at most one
//! active per user and per desk) and *bookings* (fixed time window). Both
//! carry an append-only log of height samples taken while the session runs.
//!
//! Persistence itself is a collaborator behind the [`SessionStore`] trait;
//! the shipped [`MemoryStore`] keeps everything in process memory and is the
//! reference for the concurrency contract a database-backed implementation
//! must honor (per-session atomic sample append in particular).

pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;

/// One height reading, `offset_seconds` after the session started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightSample {
    pub offset_seconds: i64,
    pub height_mm: i32,
}

impl HeightSample {
    pub fn new(offset_seconds: i64, height_mm: i32) -> Self {
        Self {
            offset_seconds,
            height_mm,
        }
    }
}

/// An open-ended occupancy claim a user makes on a desk.
///
/// `end_time == None` means the pairing is currently active. It is closed
/// explicitly by unpair, by an admin, or implicitly when the same user pairs
/// another desk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingSession {
    pub id: Uuid,
    pub user_id: String,
    pub desk_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub height_history: Vec<HeightSample>,
}

/// A fixed-window reservation of a desk.
///
/// Bookings are never explicitly closed; they are "live" only while
/// `start_time <= now < end_time` and expire naturally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSession {
    pub id: Uuid,
    pub user_id: String,
    pub desk_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub height_history: Vec<HeightSample>,
}

impl BookingSession {
    /// Whether the booking covers `now` (half-open window).
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }
}

/// A session record, tagged by kind.
///
/// Both variants expose the same accessor surface so the sampler and the
/// analyzer never branch on record shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Session {
    Pairing(PairingSession),
    Booking(BookingSession),
}

impl Session {
    pub fn id(&self) -> Uuid {
        match self {
            Session::Pairing(s) => s.id,
            Session::Booking(s) => s.id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Session::Pairing(s) => &s.user_id,
            Session::Booking(s) => &s.user_id,
        }
    }

    pub fn desk_id(&self) -> &str {
        match self {
            Session::Pairing(s) => &s.desk_id,
            Session::Booking(s) => &s.desk_id,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        match self {
            Session::Pairing(s) => s.start_time,
            Session::Booking(s) => s.start_time,
        }
    }

    /// `None` for an open pairing; bookings always have a fixed end.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Session::Pairing(s) => s.end_time,
            Session::Booking(s) => Some(s.end_time),
        }
    }

    pub fn height_history(&self) -> &[HeightSample] {
        match self {
            Session::Pairing(s) => &s.height_history,
            Session::Booking(s) => &s.height_history,
        }
    }

    pub fn is_open_pairing(&self) -> bool {
        matches!(self, Session::Pairing(s) if s.end_time.is_none())
    }

    /// Most recently recorded height, if any sample exists.
    pub fn last_height_mm(&self) -> Option<i32> {
        self.height_history().last().map(|s| s.height_mm)
    }

    /// Seconds elapsed since the session started, clamped to the session's
    /// own window for closed or booking sessions sampled at or after their
    /// end. Never negative.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        let mut elapsed = (now - self.start_time()).num_seconds();
        if let Some(end) = self.end_time() {
            elapsed = elapsed.min((end - self.start_time()).num_seconds());
        }
        elapsed.max(0)
    }
}

/// Store failures. `Backend` is infrastructure loss and the only error
/// category the rest of the system lets propagate to callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("store backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The read/write contract this core needs from persistence.
///
/// Implementations must serialize mutations per session so that
/// [`SessionStore::append_sample`] behaves as an atomic conditional append;
/// two concurrent samplers must never silently lose a sample. Cross-desk
/// exclusivity is the coordinator's job, not the store's.
pub trait SessionStore: Send + Sync {
    /// Create an open pairing for `user_id` on `desk_id`.
    fn create_pairing(
        &self,
        user_id: &str,
        desk_id: &str,
        start: DateTime<Utc>,
    ) -> StoreResult<Session>;

    /// Close the user's open pairing, if any, and return it as closed.
    fn close_open_pairing_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>>;

    /// Close whichever pairing is open on `desk_id`, regardless of owner.
    fn close_open_pairing_for_desk(
        &self,
        desk_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>>;

    fn find_open_pairing_by_user(&self, user_id: &str) -> StoreResult<Option<Session>>;

    fn find_open_pairing_by_desk(&self, desk_id: &str) -> StoreResult<Option<Session>>;

    fn create_booking(
        &self,
        user_id: &str,
        desk_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Session>;

    /// First booking on `desk_id` whose `[start_time, end_time)` overlaps
    /// `[start, end)`. Touching endpoints do not overlap.
    fn find_overlapping_booking(
        &self,
        desk_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Option<Session>>;

    /// Booking on `desk_id` that covers `now`, if one exists.
    fn find_live_booking(&self, desk_id: &str, now: DateTime<Utc>)
        -> StoreResult<Option<Session>>;

    /// Atomic conditional append: records `(offset_seconds, height_mm)` only
    /// if the session's log is empty or the offset is at least
    /// `min_gap_seconds` past the last recorded offset. Returns whether a
    /// sample was appended. The check and the append happen under the same
    /// per-session serialization.
    fn append_sample(
        &self,
        session_id: Uuid,
        offset_seconds: i64,
        height_mm: i32,
        min_gap_seconds: i64,
    ) -> StoreResult<bool>;

    fn get(&self, session_id: Uuid) -> StoreResult<Option<Session>>;

    /// Sessions feeding the user's metrics for a reporting window: open
    /// pairings active now, plus bookings whose window covers `now`.
    /// `window_start` bounds the reporting period the caller is
    /// aggregating over.
    fn list_active_sessions(
        &self,
        user_id: &str,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Session>>;
}

/// Half-open interval overlap: `[a_start, a_end)` vs `[b_start, b_end)`.
pub(crate) fn windows_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}
