//! Signal delivery for loop control.
//!
//! Signals are queued by external tasks and read non-blockingly by the
//! controller at cycle boundaries. The controller never waits on the
//! channel, which bounds signal-response latency to at most one full cycle.

use std::sync::Mutex;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::domain::Signal;

/// Cloneable sender half used by schedulers and operators
#[derive(Debug, Clone)]
pub struct SignalNotifier {
    tx: UnboundedSender<Signal>,
}

impl SignalNotifier {
    /// Queue a signal; returns false if the channel is closed
    pub fn notify(&self, signal: Signal) -> bool {
        self.tx.send(signal).is_ok()
    }
}

/// Receiving half owned by the controller
#[derive(Debug)]
pub struct SignalChannel {
    tx: UnboundedSender<Signal>,
    rx: Mutex<UnboundedReceiver<Signal>>,
}

impl SignalChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Get a sender handle for this channel
    pub fn notifier(&self) -> SignalNotifier {
        SignalNotifier {
            tx: self.tx.clone(),
        }
    }

    /// Take the next queued signal without blocking
    pub fn poll(&self) -> Option<Signal> {
        self.rx.lock().ok()?.try_recv().ok()
    }
}

impl Default for SignalChannel {
    fn default() -> Self {
        Self::new()
    }
}
