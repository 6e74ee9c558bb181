//! Time-windowed request buffer
//!
//! Records accumulate until more than `interval` has passed since the last
//! dispatch. The call that crosses the threshold drains the whole buffer into
//! a [`DispatchPayload`] and resets the window, all under one lock, so two
//! threads can never hand off overlapping snapshots.

use crate::payload::DispatchPayload;
use crate::record::RequestRecord;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Context of the most recent logging call, reused when the buffer is
/// drained without a triggering call (explicit flush, shutdown).
#[derive(Debug, Clone, PartialEq)]
struct CallContext {
    api_key: String,
    framework: String,
    privacy_level: i32,
}

impl CallContext {
    fn matches(&self, api_key: &str, framework: &str, privacy_level: i32) -> bool {
        self.api_key == api_key && self.framework == framework && self.privacy_level == privacy_level
    }
}

struct BufferState {
    records: Vec<RequestRecord>,
    last_dispatch: Instant,
    last_context: Option<CallContext>,
}

pub struct RequestBuffer {
    state: Mutex<BufferState>,
    interval: Duration,
}

impl RequestBuffer {
    /// Create an empty buffer whose first window starts now
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    /// Create an empty buffer whose first window starts at `start`
    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            state: Mutex::new(BufferState {
                records: Vec::new(),
                last_dispatch: start,
                last_context: None,
            }),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Append `record` and, if the window has expired at `now`, drain.
    ///
    /// The returned payload carries this call's key, framework and privacy
    /// level together with every record buffered since the previous drain,
    /// including `record` itself.
    pub fn push(
        &self,
        api_key: &str,
        framework: &str,
        privacy_level: i32,
        record: RequestRecord,
        now: Instant,
    ) -> Option<DispatchPayload> {
        let mut state = self.lock();

        state.records.push(record);

        let context_changed = state
            .last_context
            .as_ref()
            .map_or(true, |ctx| !ctx.matches(api_key, framework, privacy_level));
        if context_changed {
            state.last_context = Some(CallContext {
                api_key: api_key.to_string(),
                framework: framework.to_string(),
                privacy_level,
            });
        }

        if now.saturating_duration_since(state.last_dispatch) <= self.interval {
            return None;
        }

        state.last_dispatch = now;
        let requests = std::mem::take(&mut state.records);

        Some(DispatchPayload {
            api_key: api_key.to_string(),
            requests,
            framework: framework.to_string(),
            privacy_level,
        })
    }

    /// Drain whatever is buffered regardless of the window.
    ///
    /// Uses the context of the most recent `push`. Returns `None` when
    /// nothing is buffered.
    pub fn drain(&self, now: Instant) -> Option<DispatchPayload> {
        let mut state = self.lock();

        if state.records.is_empty() {
            return None;
        }
        let context = state.last_context.clone()?;

        state.last_dispatch = now;
        let requests = std::mem::take(&mut state.records);

        Some(DispatchPayload {
            api_key: context.api_key,
            requests,
            framework: context.framework,
            privacy_level: context.privacy_level,
        })
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_dispatch(&self) -> Instant {
        self.lock().last_dispatch
    }

    // State is a plain Vec + Instant, still consistent after a poisoning panic
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(60);

    fn path_record(path: &str) -> RequestRecord {
        RequestRecord::new().with("path", path)
    }

    #[test]
    fn test_push_within_window_accumulates() {
        let t0 = Instant::now();
        let buffer = RequestBuffer::starting_at(WINDOW, t0);

        for secs in [1, 5, 10] {
            let drained = buffer.push("k1", "FastAPI", 0, path_record("/x"), t0 + Duration::from_secs(secs));
            assert!(drained.is_none());
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.last_dispatch(), t0);
    }

    #[test]
    fn test_exactly_at_window_does_not_drain() {
        let t0 = Instant::now();
        let buffer = RequestBuffer::starting_at(WINDOW, t0);

        let drained = buffer.push("k1", "FastAPI", 0, path_record("/x"), t0 + WINDOW);
        assert!(drained.is_none());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_window_expiry_drains_everything_and_resets() {
        let t0 = Instant::now();
        let buffer = RequestBuffer::starting_at(WINDOW, t0);

        for i in 0..3 {
            buffer.push("k1", "FastAPI", 0, path_record(&format!("/{i}")), t0 + Duration::from_secs(i));
        }

        let t61 = t0 + Duration::from_secs(61);
        let payload = buffer
            .push("k1", "FastAPI", 0, path_record("/3"), t61)
            .expect("window expired");

        assert_eq!(payload.api_key, "k1");
        assert_eq!(payload.framework, "FastAPI");
        assert_eq!(payload.privacy_level, 0);
        let paths: Vec<_> = payload.requests.iter().map(|r| r.get("path").cloned()).collect();
        assert_eq!(
            paths,
            vec![Some(json!("/0")), Some(json!("/1")), Some(json!("/2")), Some(json!("/3"))]
        );

        assert!(buffer.is_empty());
        assert_eq!(buffer.last_dispatch(), t61);

        // Next call starts a fresh window holding only its own record
        let next = buffer.push("k1", "FastAPI", 0, path_record("/4"), t61 + Duration::from_secs(1));
        assert!(next.is_none());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_drained_payload_uses_triggering_call_context() {
        let t0 = Instant::now();
        let buffer = RequestBuffer::starting_at(WINDOW, t0);

        buffer.push("old-key", "Flask", 1, path_record("/a"), t0);
        let payload = buffer
            .push("new-key", "Django", 2, path_record("/b"), t0 + Duration::from_secs(90))
            .unwrap();

        assert_eq!(payload.api_key, "new-key");
        assert_eq!(payload.framework, "Django");
        assert_eq!(payload.privacy_level, 2);
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn test_drain_uses_last_context() {
        let t0 = Instant::now();
        let buffer = RequestBuffer::starting_at(WINDOW, t0);

        assert!(buffer.drain(t0).is_none());

        buffer.push("k1", "Flask", 0, path_record("/a"), t0);
        buffer.push("k2", "Flask", 1, path_record("/b"), t0);

        let later = t0 + Duration::from_secs(5);
        let payload = buffer.drain(later).unwrap();
        assert_eq!(payload.api_key, "k2");
        assert_eq!(payload.privacy_level, 1);
        assert_eq!(payload.len(), 2);
        assert!(buffer.is_empty());
        assert_eq!(buffer.last_dispatch(), later);
    }

    #[test]
    fn test_concurrent_pushes_never_duplicate_or_drop() {
        let buffer = Arc::new(RequestBuffer::new(Duration::ZERO));
        let threads: usize = 8;
        let per_thread: usize = 250;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    let mut drained = Vec::new();
                    for i in 0..per_thread {
                        let record = RequestRecord::new().with("id", t * per_thread + i);
                        // A zero window drains on almost every call
                        if let Some(payload) = buffer.push("k", "Axum", 0, record, Instant::now()) {
                            drained.extend(payload.requests);
                        }
                    }
                    drained
                })
            })
            .collect();

        let mut seen: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .map(|r| r.get("id").and_then(|v| v.as_u64()).unwrap())
            .collect();
        if let Some(rest) = buffer.drain(Instant::now()) {
            seen.extend(rest.requests.iter().map(|r| r.get("id").and_then(|v| v.as_u64()).unwrap()));
        }

        seen.sort_unstable();
        let expected: Vec<u64> = (0..(threads * per_thread) as u64).collect();
        assert_eq!(seen, expected);
    }
}
