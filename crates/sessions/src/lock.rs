//! Cross-tab access coordinator for the session record.
//!
//! Cookie writes are not atomic across tabs, so read-modify-write sequences
//! are wrapped in an optimistic lock: a tab writes a unique token under the
//! `lock` key, reads it back, runs the transform, and checks the token is
//! still its own after processing and after persisting.  Any mismatch means
//! another tab got in the way and the whole request is retried after a short
//! delay, up to a bounded number of attempts.  Past that the request is
//! dropped without a trace for the caller.
//!
//! Inside one process, requests go through a FIFO queue: only one is ever in
//! flight, and the next one starts once the current one has completed or
//! given up.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use ts_domain::config::LockConfig;
use ts_domain::error::{Error, Result};
use ts_domain::trace::TraceEvent;

use crate::backend::{CookieOptions, StorageBackend};
use crate::persistence::{persist_session, retrieve_session, write_session};
use crate::state::SessionState;

pub const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);
pub const MAX_NUMBER_OF_LOCK_RETRIES: u32 = 100;

pub type ProcessFn = Box<dyn FnMut(SessionState) -> Option<SessionState> + Send>;
pub type AfterFn = Box<dyn FnOnce(&SessionState) + Send>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Requests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One logical read-modify-write of the session record.
///
/// `process` gets the current record (holding this request's lock token when
/// locking is on) and returns the record to persist, or `None` to leave
/// storage alone.  It may run more than once if the request is retried.
/// `after` runs exactly once, with the final observable record, unless the
/// request gives up.
pub struct LockRequest {
    pub options: CookieOptions,
    pub storage: StorageBackend,
    process: ProcessFn,
    after: Option<AfterFn>,
}

impl LockRequest {
    pub fn new<F>(storage: StorageBackend, options: CookieOptions, process: F) -> Self
    where
        F: FnMut(SessionState) -> Option<SessionState> + Send + 'static,
    {
        Self {
            options,
            storage,
            process: Box::new(process),
            after: None,
        }
    }

    pub fn after<F>(mut self, after: F) -> Self
    where
        F: FnOnce(&SessionState) + Send + 'static,
    {
        self.after = Some(Box::new(after));
        self
    }
}

impl fmt::Debug for LockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockRequest")
            .field("storage", &self.storage)
            .field("has_after", &self.after.is_some())
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lock tokens
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Source of lock tokens.  Tokens must be unique per call and valid session
/// values (`[a-z0-9-]+`).
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// UUID v4 tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTokens;

impl TokenGenerator for UuidTokens {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Coordinator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where in the critical section a lock mismatch was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Checkpoint {
    /// Another tab already held the lock.
    Initial,
    /// Our token was overwritten right after we wrote it.
    Acquired,
    PostProcess,
    PostPersist,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::Acquired => "acquired",
            Self::PostProcess => "post_process",
            Self::PostPersist => "post_persist",
        };
        f.write_str(name)
    }
}

enum Attempt {
    Done,
    Contended(Checkpoint),
}

#[derive(Default)]
struct CoordinatorState {
    ongoing: bool,
    queue: VecDeque<LockRequest>,
    pending_retry: Option<AbortHandle>,
    /// Bumped by `shutdown`; retries scheduled before then are stale.
    epoch: u64,
}

struct Inner {
    lock_enabled: bool,
    retry_delay: Duration,
    max_retries: u32,
    tokens: Arc<dyn TokenGenerator>,
    runtime: Handle,
    state: Mutex<CoordinatorState>,
}

/// Serializes session record accesses from this process and guards them
/// against other tabs with the optimistic lock.  Clones share one queue.
#[derive(Clone)]
pub struct ClientLockCoordinator {
    inner: Arc<Inner>,
}

impl ClientLockCoordinator {
    /// Build a coordinator on the current Tokio runtime.
    pub fn new(config: &LockConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("lock coordinator needs a Tokio runtime: {e}")))?;
        Ok(Self::with_parts(config, runtime, Arc::new(UuidTokens)))
    }

    pub fn with_parts(
        config: &LockConfig,
        runtime: Handle,
        tokens: Arc<dyn TokenGenerator>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                lock_enabled: config.enabled,
                retry_delay: config.retry_delay(),
                max_retries: config.max_retries,
                tokens,
                runtime,
                state: Mutex::new(CoordinatorState::default()),
            }),
        }
    }

    pub fn lock_enabled(&self) -> bool {
        self.inner.lock_enabled
    }

    /// Submit a request.  Returns immediately; if another request is in
    /// flight this one is queued and started after it.
    pub fn with_client_lock_access(&self, request: LockRequest) {
        let mut state = self.inner.state.lock();
        if state.ongoing {
            state.queue.push_back(request);
            let queued = state.queue.len();
            drop(state);
            tracing::debug!(queued, "session access queued");
            TraceEvent::RequestQueued { queued }.emit();
        } else {
            state.ongoing = true;
            drop(state);
            self.inner.run(request, 0);
        }
    }

    /// True when nothing is in flight or queued.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.state.lock();
        !state.ongoing && state.queue.is_empty()
    }

    pub fn queued_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// True while the in-flight request is waiting for its next attempt.
    pub fn has_pending_retry(&self) -> bool {
        self.inner.state.lock().pending_retry.is_some()
    }

    /// Cancel the pending retry and drop every queued request without
    /// running it.  Returns how many requests were dropped.
    pub fn shutdown(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.epoch += 1;
        let mut dropped = state.queue.len();
        state.queue.clear();
        if let Some(task) = state.pending_retry.take() {
            task.abort();
            state.ongoing = false;
            dropped += 1;
        }
        if dropped > 0 {
            tracing::info!(dropped, "session coordinator shut down");
        }
        dropped
    }
}

impl fmt::Debug for ClientLockCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ClientLockCoordinator")
            .field("lock_enabled", &self.inner.lock_enabled)
            .field("ongoing", &state.ongoing)
            .field("queued", &state.queue.len())
            .field("pending_retry", &state.pending_retry.is_some())
            .finish()
    }
}

impl Inner {
    /// Drive `request` (at attempt `retries`) and then the queue, until the
    /// queue is empty or a request has to wait for a retry.
    fn run(self: &Arc<Self>, mut request: LockRequest, mut retries: u32) {
        loop {
            if retries >= self.max_retries {
                tracing::warn!(
                    storage = %request.storage.kind(),
                    attempts = retries,
                    "session lock retries exhausted, dropping request"
                );
                TraceEvent::LockRetriesExhausted {
                    storage: request.storage.kind().to_string(),
                    attempts: retries,
                }
                .emit();
            } else if let Attempt::Contended(checkpoint) = self.attempt(&mut request) {
                tracing::debug!(
                    storage = %request.storage.kind(),
                    %checkpoint,
                    attempt = retries,
                    "session lock contention"
                );
                TraceEvent::LockContention {
                    storage: request.storage.kind().to_string(),
                    checkpoint: checkpoint.to_string(),
                    attempt: retries,
                }
                .emit();
                self.retry_later(request, retries);
                return;
            }

            match self.next_request() {
                Some(next) => {
                    request = next;
                    retries = 0;
                }
                None => return,
            }
        }
    }

    /// One pass through the critical section.
    fn attempt(&self, request: &mut LockRequest) -> Attempt {
        let LockRequest {
            options,
            storage,
            process,
            after,
        } = request;

        let mut current = retrieve_session(storage);
        let mut token = None;

        if self.lock_enabled {
            if current.lock().is_some() {
                return Attempt::Contended(Checkpoint::Initial);
            }
            let candidate = self.tokens.generate();
            current.set_lock(candidate.as_str());
            write_session(&current, options, storage);

            current = retrieve_session(storage);
            if !current.is_locked_by(&candidate) {
                return Attempt::Contended(Checkpoint::Acquired);
            }
            token = Some(candidate);
        }

        let mut processed = process(current.clone());

        if let Some(token) = &token {
            current = retrieve_session(storage);
            if !current.is_locked_by(token) {
                return Attempt::Contended(Checkpoint::PostProcess);
            }
        }

        if let Some(mut session) = processed.take() {
            if let Some(token) = &token {
                if !session.is_expired() {
                    session.set_lock(token.as_str());
                }
            }
            processed = Some(persist_session(session, options, storage));
        }

        if let Some(token) = &token {
            // Clearing an expired session skips the last corruption check:
            // handling a lock around expiration would need changes at several
            // layers and no such conflict has been observed.
            let cleared = processed.as_ref().is_some_and(SessionState::is_expired);
            if !cleared {
                current = retrieve_session(storage);
                if !current.is_locked_by(token) {
                    return Attempt::Contended(Checkpoint::PostPersist);
                }
                current.clear_lock();
                write_session(&current, options, storage);
                processed = Some(current.clone());
            }
        }

        // `after` runs even when nothing was persisted so the caller sees the
        // latest record, possibly written by another tab.
        let final_state = processed.unwrap_or(current);
        if let Some(after) = after.take() {
            after(&final_state);
        }
        Attempt::Done
    }

    fn retry_later(self: &Arc<Self>, request: LockRequest, retries: u32) {
        let inner = Arc::clone(self);
        let delay = self.retry_delay;

        // Hold the state lock across spawn so the task cannot observe a
        // missing `pending_retry` handle.
        let mut state = self.state.lock();
        let epoch = state.epoch;
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = inner.state.lock();
                if state.epoch != epoch {
                    return;
                }
                state.pending_retry = None;
            }
            inner.run(request, retries + 1);
        });
        state.pending_retry = Some(task.abort_handle());
    }

    fn next_request(&self) -> Option<LockRequest> {
        let mut state = self.state.lock();
        let next = state.queue.pop_front();
        if next.is_none() {
            state.ongoing = false;
        }
        next
    }
}
