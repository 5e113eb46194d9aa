//! In-process stand-ins for the rethemer and notifier.

use std::{
    sync::{atomic::{AtomicUsize, Ordering}, mpsc, Mutex},
    time::Duration,
};

use scaled_proto::ScaleSignal;

use crate::{
    errors::{NotifyError, RethemeError},
    notifier::Notifier,
    rethemer::Rethemer,
};

#[derive(Default)]
pub struct FakeRethemer {
    pub current: Mutex<Option<u8>>,
    pub applied: Mutex<Vec<u8>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub gate: Option<Mutex<mpsc::Receiver<()>>>,
    pub delay: Option<Duration>,
    pub fail: bool,
    /// `current` reports an unreadable boot-splash config.
    pub current_fail: bool,
    /// `apply` records the call, then panics.
    pub panic_on_apply: bool,
}

impl FakeRethemer {
    /// Each `apply` blocks until a permit is sent on the returned channel.
    pub fn gated() -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (Self { gate: Some(Mutex::new(rx)), ..Default::default() }, tx)
    }

    pub fn applied(&self) -> Vec<u8> {
        self.applied.lock().unwrap().clone()
    }
}

impl Rethemer for FakeRethemer {
    fn current(&self) -> Result<Option<u8>, RethemeError> {
        if self.current_fail {
            return Err(RethemeError::Config(std::io::Error::other("plymouthd.conf unreadable")));
        }
        Ok(*self.current.lock().unwrap())
    }

    fn apply(&self, factor: u8) -> Result<(), RethemeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.lock().unwrap().recv().unwrap();
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.applied.lock().unwrap().push(factor);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.panic_on_apply {
            panic!("rethemer crashed at factor {}", factor);
        }
        if self.fail {
            return Err(RethemeError::ExitStatus { command: "fake".into(), status: "exit status: 1".into() });
        }
        *self.current.lock().unwrap() = Some(factor);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    signals: Mutex<Vec<ScaleSignal>>,
}

impl RecordingNotifier {
    pub fn signals(&self) -> Vec<ScaleSignal> {
        self.signals.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn emit(&self, signal: ScaleSignal) -> Result<(), NotifyError> {
        self.signals.lock().unwrap().push(signal);
        Ok(())
    }
}
