//! Opportunistic height sampling.
//!
//! Sampling is pull-based: a sample is taken when something asks for
//! metrics, never from a background timer. A session that is never polled
//! accrues no posture detail beyond its last known height; such sessions
//! are not timed out or flagged stale. The tick gate makes sampling
//! idempotent within a tick, so it is safe to run on every metrics request.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::store::{Session, SessionStore, StoreResult};
use crate::telemetry::TelemetrySource;

pub struct TelemetrySampler {
    store: Arc<dyn SessionStore>,
    telemetry: Arc<dyn TelemetrySource>,
    tick_seconds: i64,
    default_height_mm: i32,
}

impl TelemetrySampler {
    pub fn new(
        store: Arc<dyn SessionStore>,
        telemetry: Arc<dyn TelemetrySource>,
        tick_seconds: i64,
        default_height_mm: i32,
    ) -> Self {
        Self {
            store,
            telemetry,
            tick_seconds,
            default_height_mm,
        }
    }

    /// Record the desk's current height against `session`, at most once per
    /// tick. A telemetry failure degrades to the session's last known
    /// height (or the configured default for a bare log); the caller's
    /// request never fails for lack of telemetry. Only store failures
    /// propagate. Returns whether a sample was appended.
    pub fn sample(&self, session: &Session, now: DateTime<Utc>) -> StoreResult<bool> {
        let elapsed = session.elapsed_seconds(now);

        let height_mm = match self.telemetry.get_state(session.desk_id()) {
            Ok(state) => state.position_mm,
            Err(err) => {
                let fallback = session.last_height_mm().unwrap_or(self.default_height_mm);
                tracing::warn!(
                    "telemetry unavailable for desk {}, using {}mm: {}",
                    session.desk_id(),
                    fallback,
                    err
                );
                fallback
            }
        };

        self.store
            .append_sample(session.id(), elapsed, height_mm, self.tick_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::telemetry::{DeskTelemetry, TelemetryError};
    use std::sync::Mutex;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    /// Scriptable telemetry: a queue of results, repeating the last.
    struct FakeTelemetry {
        responses: Mutex<Vec<Result<DeskTelemetry, ()>>>,
    }

    impl FakeTelemetry {
        fn ok(position_mm: i32) -> Self {
            Self {
                responses: Mutex::new(vec![Ok(DeskTelemetry::new(position_mm, 0))]),
            }
        }

        fn failing() -> Self {
            Self {
                responses: Mutex::new(vec![Err(())]),
            }
        }

        fn script(responses: Vec<Result<DeskTelemetry, ()>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    impl TelemetrySource for FakeTelemetry {
        fn get_state(&self, desk_id: &str) -> Result<DeskTelemetry, TelemetryError> {
            let mut responses = self.responses.lock().unwrap();
            let next = if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            };
            next.map_err(|_| TelemetryError::Network(format!("desk {desk_id} unreachable")))
        }
    }

    fn setup(telemetry: FakeTelemetry) -> (Arc<MemoryStore>, TelemetrySampler) {
        let store = Arc::new(MemoryStore::new());
        let sampler = TelemetrySampler::new(store.clone(), Arc::new(telemetry), 1, 700);
        (store, sampler)
    }

    #[test]
    fn test_sampling_is_idempotent_within_a_tick() {
        let (store, sampler) = setup(FakeTelemetry::ok(900));
        let session = store.create_pairing("alice", "d1", ts(0)).unwrap();

        assert!(sampler.sample(&session, ts(5)).unwrap());
        // Same instant again: no new sample.
        assert!(!sampler.sample(&session, ts(5)).unwrap());
        let history = store.get(session.id()).unwrap().unwrap().height_history().to_vec();
        assert_eq!(history.len(), 1);

        // Next tick records again.
        assert!(sampler.sample(&session, ts(6)).unwrap());
        assert_eq!(
            store
                .get(session.id())
                .unwrap()
                .unwrap()
                .height_history()
                .len(),
            2
        );
    }

    #[test]
    fn test_telemetry_failure_uses_default_on_empty_log() {
        let (store, sampler) = setup(FakeTelemetry::failing());
        let session = store.create_pairing("alice", "d1", ts(0)).unwrap();

        assert!(sampler.sample(&session, ts(3)).unwrap());
        let history = store.get(session.id()).unwrap().unwrap().height_history().to_vec();
        assert_eq!(history[0].height_mm, 700);
        assert_eq!(history[0].offset_seconds, 3);
    }

    #[test]
    fn test_telemetry_failure_repeats_last_known_height() {
        let (store, sampler) = setup(FakeTelemetry::script(vec![
            Ok(DeskTelemetry::new(1050, 0)),
            Err(()),
        ]));
        let session = store.create_pairing("alice", "d1", ts(0)).unwrap();

        sampler.sample(&session, ts(1)).unwrap();
        let session = store.get(session.id()).unwrap().unwrap();
        sampler.sample(&session, ts(4)).unwrap();

        let history = store.get(session.id()).unwrap().unwrap().height_history().to_vec();
        assert_eq!(history[0].height_mm, 1050);
        assert_eq!(history[1].height_mm, 1050);
    }

    #[test]
    fn test_booking_sampled_after_end_clamps_offset() {
        let (store, sampler) = setup(FakeTelemetry::ok(700));
        let booking = store.create_booking("alice", "d1", ts(0), ts(60)).unwrap();

        assert!(sampler.sample(&booking, ts(500)).unwrap());
        let history = store.get(booking.id()).unwrap().unwrap().height_history().to_vec();
        assert_eq!(history[0].offset_seconds, 60);

        // Clamped offset never advances, so later calls are no-ops.
        let booking = store.get(booking.id()).unwrap().unwrap();
        assert!(!sampler.sample(&booking, ts(900)).unwrap());
    }
}
