//! In-process session store.
//!
//! A single mutex over the session map gives the per-session serialization
//! the [`SessionStore`] contract demands; the conditional sample append runs
//! entirely under that lock. A lost lock (a writer panicked) surfaces as
//! [`StoreError::Backend`], the one error class callers treat as fatal.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    windows_overlap, BookingSession, HeightSample, PairingSession, Session, SessionStore,
    StoreError, StoreResult,
};

#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<Uuid, Session>>> {
        self.sessions
            .lock()
            .map_err(|_| StoreError::Backend("session map lock poisoned".to_string()))
    }
}

impl SessionStore for MemoryStore {
    fn create_pairing(
        &self,
        user_id: &str,
        desk_id: &str,
        start: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let session = Session::Pairing(PairingSession {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            desk_id: desk_id.to_string(),
            start_time: start,
            end_time: None,
            height_history: Vec::new(),
        });
        self.lock()?.insert(session.id(), session.clone());
        Ok(session)
    }

    fn close_open_pairing_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        let mut sessions = self.lock()?;
        for session in sessions.values_mut() {
            if let Session::Pairing(p) = session {
                if p.user_id == user_id && p.end_time.is_none() {
                    p.end_time = Some(now);
                    return Ok(Some(session.clone()));
                }
            }
        }
        Ok(None)
    }

    fn close_open_pairing_for_desk(
        &self,
        desk_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        let mut sessions = self.lock()?;
        for session in sessions.values_mut() {
            if let Session::Pairing(p) = session {
                if p.desk_id == desk_id && p.end_time.is_none() {
                    p.end_time = Some(now);
                    return Ok(Some(session.clone()));
                }
            }
        }
        Ok(None)
    }

    fn find_open_pairing_by_user(&self, user_id: &str) -> StoreResult<Option<Session>> {
        let sessions = self.lock()?;
        Ok(sessions
            .values()
            .find(|s| s.is_open_pairing() && s.user_id() == user_id)
            .cloned())
    }

    fn find_open_pairing_by_desk(&self, desk_id: &str) -> StoreResult<Option<Session>> {
        let sessions = self.lock()?;
        Ok(sessions
            .values()
            .find(|s| s.is_open_pairing() && s.desk_id() == desk_id)
            .cloned())
    }

    fn create_booking(
        &self,
        user_id: &str,
        desk_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let session = Session::Booking(BookingSession {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            desk_id: desk_id.to_string(),
            start_time: start,
            end_time: end,
            height_history: Vec::new(),
        });
        self.lock()?.insert(session.id(), session.clone());
        Ok(session)
    }

    fn find_overlapping_booking(
        &self,
        desk_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        let sessions = self.lock()?;
        Ok(sessions
            .values()
            .find(|s| match s {
                Session::Booking(b) => {
                    b.desk_id == desk_id && windows_overlap(b.start_time, b.end_time, start, end)
                }
                Session::Pairing(_) => false,
            })
            .cloned())
    }

    fn find_live_booking(
        &self,
        desk_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        let sessions = self.lock()?;
        Ok(sessions
            .values()
            .find(|s| match s {
                Session::Booking(b) => b.desk_id == desk_id && b.is_live(now),
                Session::Pairing(_) => false,
            })
            .cloned())
    }

    fn append_sample(
        &self,
        session_id: Uuid,
        offset_seconds: i64,
        height_mm: i32,
        min_gap_seconds: i64,
    ) -> StoreResult<bool> {
        let mut sessions = self.lock()?;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(StoreError::SessionNotFound(session_id))?;

        let history = match session {
            Session::Pairing(p) => &mut p.height_history,
            Session::Booking(b) => &mut b.height_history,
        };

        let due = match history.last() {
            None => true,
            // Offsets must stay strictly increasing even with min_gap == 0.
            Some(last) => {
                offset_seconds > last.offset_seconds
                    && offset_seconds - last.offset_seconds >= min_gap_seconds
            }
        };
        if due {
            history.push(HeightSample::new(offset_seconds, height_mm));
        }
        Ok(due)
    }

    fn get(&self, session_id: Uuid) -> StoreResult<Option<Session>> {
        Ok(self.lock()?.get(&session_id).cloned())
    }

    fn list_active_sessions(
        &self,
        user_id: &str,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Session>> {
        let sessions = self.lock()?;
        let mut active: Vec<Session> = sessions
            .values()
            .filter(|s| s.user_id() == user_id)
            .filter(|s| match s {
                Session::Pairing(p) => p.end_time.is_none() && p.start_time <= now,
                Session::Booking(b) => b.is_live(now) && b.end_time > window_start,
            })
            .cloned()
            .collect();
        // Deterministic ordering for aggregation and tests.
        active.sort_by_key(|s| s.start_time());
        Ok(active)
    }
}
