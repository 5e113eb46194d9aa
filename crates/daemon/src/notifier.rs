use scaled_proto::ScaleSignal;
use tokio::sync::broadcast;
use tracing::debug;

use crate::errors::NotifyError;

/// Fire-and-forget delivery of scaling signals to observers.
pub trait Notifier: Send + Sync {
    fn emit(&self, signal: ScaleSignal) -> Result<(), NotifyError>;
}

/// Fans signals out to every subscriber (the `/events` stream uses this).
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ScaleSignal>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScaleSignal> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn emit(&self, signal: ScaleSignal) -> Result<(), NotifyError> {
        // no subscribers is not a failure
        match self.tx.send(signal) {
            Ok(n) => debug!("emitted {} to {} subscribers", signal.name(), n),
            Err(_) => debug!("emitted {} with no subscribers", signal.name()),
        }
        Ok(())
    }
}
