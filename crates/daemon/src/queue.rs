//! Coalescing queue in front of the boot-splash rethemer.
//!
//! At most one worker task runs at a time. Submissions that arrive while it is busy collapse
//! into a single pending slot, so only the latest factor is applied once the worker finishes
//! its current (non-cancellable) call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scaled_proto::{QueueStatus, ScaleSignal};
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::{errors::{RethemeError, ScaleError}, notifier::Notifier, rethemer::Rethemer};

/// Inclusive range every submitted factor is clamped into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FactorBounds {
    min: u8,
    max: u8,
}

impl FactorBounds {
    pub fn new(min: u8, max: u8) -> Result<Self, ScaleError> {
        if min == 0 || min > max {
            return Err(ScaleError::Validation(format!("invalid factor bounds [{}, {}]", min, max)));
        }
        Ok(Self { min, max })
    }

    pub fn clamp(&self, factor: i64) -> u8 {
        // bounds fit in u8, so the clamped value does too
        factor.clamp(self.min as i64, self.max as i64) as u8
    }
}

impl Default for FactorBounds {
    fn default() -> Self {
        Self { min: 1, max: 2 }
    }
}

/// What happened to a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// The queue was idle and a worker was started for this factor.
    Started,
    /// A worker is busy; the factor now occupies the pending slot.
    Coalesced,
}

#[derive(Default)]
struct QueueState {
    active: bool,
    pending: Option<u8>,
    superseded: u64,
}

struct Inner {
    state: Mutex<QueueState>,
    // true while no worker is running
    idle: watch::Sender<bool>,
    rethemer: Arc<dyn Rethemer>,
    notifier: Arc<dyn Notifier>,
    bounds: FactorBounds,
}

#[derive(Debug)]
enum Outcome {
    Applied,
    Unchanged,
}

#[derive(Clone)]
pub struct CoalescingQueue {
    inner: Arc<Inner>,
}

impl CoalescingQueue {
    pub fn new(rethemer: Arc<dyn Rethemer>, notifier: Arc<dyn Notifier>, bounds: FactorBounds) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                idle,
                rethemer,
                notifier,
                bounds,
            }),
        }
    }

    /// Request the boot splash be rethemed at `factor`. Returns after a brief state update and
    /// never waits on the rethemer. Must be called from within a tokio runtime.
    pub fn submit(&self, factor: i64, notify: bool) -> Submission {
        let factor = self.inner.bounds.clamp(factor);
        let mut state = self.inner.lock_state();

        if state.active {
            match state.pending.replace(factor) {
                Some(old) => {
                    state.superseded += 1;
                    debug!("pending factor {} superseded by {}", old, factor);
                }
                None => debug!("add to pending: {}", factor),
            }
            return Submission::Coalesced;
        }

        state.active = true;
        self.inner.idle.send_replace(false);
        drop(state);

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run_worker(factor, notify).await });
        Submission::Started
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.inner.lock_state();
        QueueStatus { active: state.active, pending: state.pending, superseded: state.superseded }
    }

    /// Resolves once no worker is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.idle.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|idle| *idle).await;
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        // every transition leaves the state consistent, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_worker(self: Arc<Self>, mut factor: u8, mut notify: bool) {
        let _guard = WorkerGuard(self.clone());
        loop {
            let run_id = Uuid::new_v4();
            self.process(factor, notify)
                .instrument(info_span!("retheme", %run_id, factor))
                .await;

            let next = {
                let mut state = self.lock_state();
                let next = state.pending.take();
                if next.is_none() {
                    state.active = false;
                    self.idle.send_replace(true);
                }
                next
            };

            match next {
                Some(next) => {
                    debug!("use last pending factor: {}", next);
                    factor = next;
                    // drained work stands for real requests whose own signals were absorbed
                    notify = true;
                }
                None => return,
            }
        }
    }

    async fn process(&self, factor: u8, notify: bool) {
        debug!("start scaling boot splash to {}", factor);
        if notify {
            self.emit(ScaleSignal::Started);
        }

        let rethemer = self.rethemer.clone();
        let span = Span::current();
        let result = tokio::task::spawn_blocking(move || -> Result<Outcome, RethemeError> {
            let _enter = span.enter();
            match rethemer.current() {
                Ok(Some(current)) if current == factor => return Ok(Outcome::Unchanged),
                Ok(_) => {}
                Err(e) => warn!("failed to read current boot splash factor: {}", e),
            }
            rethemer.apply(factor)?;
            Ok(Outcome::Applied)
        })
        .await
        .map_err(RethemeError::from)
        .and_then(|r| r);

        match result {
            Ok(Outcome::Unchanged) => debug!("boot splash already at {}, quick end", factor),
            Ok(Outcome::Applied) => info!("boot splash rethemed at {}", factor),
            Err(RethemeError::JoinError(e)) => error!("re-theming thread failed: {}", e),
            Err(e) => warn!("failed to retheme boot splash at {}: {}", factor, e),
        }

        if notify {
            self.emit(ScaleSignal::Done);
        }
    }

    fn emit(&self, signal: ScaleSignal) {
        if let Err(e) = self.notifier.emit(signal) {
            warn!("{}", e);
        }
    }
}

/// Returns the queue to idle if the worker task unwinds, so later submissions can start a new one.
struct WorkerGuard(Arc<Inner>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut state = self.0.lock_state();
            if let Some(lost) = state.pending.take() {
                error!("re-theming worker panicked, dropping pending factor {}", lost);
            }
            state.active = false;
            self.0.idle.send_replace(true);
        }
    }
}
