//! Pending request registry.
//!
//! Correlates asynchronous venue callbacks with the blocking call that issued
//! the request. The session thread mutates slots through `fulfill` and
//! `complete_and_remove`; the caller thread blocks in `PendingRequest::wait`.
//!
//! Waiting is a condvar wait sliced into `poll_interval` chunks, so a
//! notification wakes the caller at once while cancellation and deadlines are
//! still re-checked at a bounded interval.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::trace;

// ============================================================================
// Correlation ids
// ============================================================================

/// Per-connection correlation id counter.
///
/// Independent of the persisted order id counter. Shared by all registries of
/// a session so that ids never collide across request kinds.
#[derive(Debug)]
pub struct RequestIdSequence {
    next: AtomicU64,
}

impl RequestIdSequence {
    pub const FIRST_ID: u64 = 1001;

    pub fn new() -> Self {
        Self::starting_at(Self::FIRST_ID)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for RequestIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Wait limits
// ============================================================================

/// Bounds on a blocking wait.
#[derive(Debug, Clone)]
pub struct WaitLimit {
    /// Upper bound on the time between cancellation/deadline checks.
    pub poll_interval: Duration,
    /// Total time allowed; `None` waits forever.
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl WaitLimit {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Wait until the slot completes, however long that takes.
    pub fn unbounded() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            timeout: None,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

impl Default for WaitLimit {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("wait timed out after {waited:?}")]
    TimedOut { waited: Duration },

    #[error("wait cancelled")]
    Cancelled,
}

// ============================================================================
// PendingRequest
// ============================================================================

type Trigger<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct SlotState<T> {
    ready: bool,
    payload: Option<T>,
    updates: u32,
}

/// One outstanding request.
///
/// The registry drops its reference when the request completes; the caller
/// keeps its own `Arc` and reads the payload afterwards.
pub struct PendingRequest<T> {
    id: u64,
    state: Mutex<SlotState<T>>,
    ready_cv: Condvar,
    /// Latches `ready` on the first payload that satisfies it.
    trigger: Option<Trigger<T>>,
}

impl<T> PendingRequest<T> {
    fn new(id: u64, trigger: Option<Trigger<T>>) -> Self {
        Self {
            id,
            state: Mutex::new(SlotState {
                ready: false,
                payload: None,
                updates: 0,
            }),
            ready_cv: Condvar::new(),
            trigger,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    /// Number of payloads accepted so far.
    pub fn updates(&self) -> u32 {
        self.state.lock().updates
    }

    /// Returns false once the slot is terminal.
    fn set_payload(&self, payload: T) -> bool {
        let mut state = self.state.lock();
        if state.ready {
            return false;
        }

        let latch = self.trigger.as_ref().is_some_and(|trigger| trigger(&payload));
        state.payload = Some(payload);
        state.updates += 1;
        if latch {
            state.ready = true;
            self.ready_cv.notify_all();
        }
        true
    }

    fn mark_ready(&self) {
        let mut state = self.state.lock();
        state.ready = true;
        self.ready_cv.notify_all();
    }
}

impl<T: Clone> PendingRequest<T> {
    /// Most recent payload, ready or not.
    pub fn payload(&self) -> Option<T> {
        self.state.lock().payload.clone()
    }

    /// Block until the slot is ready and return its last payload.
    ///
    /// `Ok(None)` means the request completed without any payload.
    pub fn wait(&self, limit: &WaitLimit) -> Result<Option<T>, WaitError> {
        let started = Instant::now();
        let mut state = self.state.lock();

        loop {
            if state.ready {
                return Ok(state.payload.clone());
            }

            if limit.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(WaitError::Cancelled);
            }

            let mut slice = limit.poll_interval;
            if let Some(timeout) = limit.timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(WaitError::TimedOut { waited });
                }
                slice = slice.min(timeout - waited);
            }

            self.ready_cv.wait_for(&mut state, slice);
        }
    }
}

impl<T> std::fmt::Debug for PendingRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("ready", &state.ready)
            .field("updates", &state.updates)
            .field("trigger", &self.trigger.is_some())
            .finish()
    }
}

// ============================================================================
// PendingRequestRegistry
// ============================================================================

/// Correlation id to pending slot map.
pub struct PendingRequestRegistry<T> {
    ids: Arc<RequestIdSequence>,
    pending: DashMap<u64, Arc<PendingRequest<T>>>,
}

impl<T> PendingRequestRegistry<T> {
    pub fn new(ids: Arc<RequestIdSequence>) -> Self {
        Self {
            ids,
            pending: DashMap::new(),
        }
    }

    /// Register a slot that becomes ready on `complete_and_remove`.
    pub fn create(&self) -> Arc<PendingRequest<T>> {
        self.insert(None)
    }

    /// Register a slot that also becomes ready on the first payload for
    /// which `trigger` returns true. Later payloads are ignored.
    pub fn create_with_trigger<F>(&self, trigger: F) -> Arc<PendingRequest<T>>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.insert(Some(Box::new(trigger)))
    }

    fn insert(&self, trigger: Option<Trigger<T>>) -> Arc<PendingRequest<T>> {
        let id = self.ids.next_id();
        let slot = Arc::new(PendingRequest::new(id, trigger));
        self.pending.insert(id, Arc::clone(&slot));
        slot
    }

    /// Store a payload for `id`.
    ///
    /// No-op returning false when `id` is unknown or already terminal.
    pub fn fulfill(&self, id: u64, payload: T) -> bool {
        let Some(slot) = self.pending.get(&id).map(|entry| Arc::clone(entry.value())) else {
            trace!(req_id = id, "Payload for unknown request dropped");
            return false;
        };
        slot.set_payload(payload)
    }

    /// Mark `id` terminal, evict it and wake its waiter.
    pub fn complete_and_remove(&self, id: u64) -> bool {
        match self.pending.remove(&id) {
            Some((_, slot)) => {
                slot.mark_ready();
                true
            }
            None => false,
        }
    }

    /// Evict `id` without completing it.
    pub fn remove(&self, id: u64) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl<T> Default for PendingRequestRegistry<T> {
    fn default() -> Self {
        Self::new(Arc::new(RequestIdSequence::new()))
    }
}
