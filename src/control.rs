//! Control signaling and the blocking wait primitive.
//!
//! External actors deliver named wake-up reasons through a [`ControlChannel`]
//! bound to the active test script; the worker consumes them one per
//! `wait-for-control` command through the wait queue. Reasons are handed off,
//! not notified: a reason signalled while no wait is pending is buffered and
//! delivered to the next wait, in FIFO order.

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// The blocking receive was unblocked by cancellation, not a control reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaitCancelled;

/// FIFO hand-off of control reasons from signalers to the worker thread.
///
/// `put` never blocks and never coalesces; `take` blocks until a reason or a
/// cancellation arrives, and the two wake-up causes stay distinguishable.
pub(crate) struct WaitQueue {
    tx: Sender<String>,
    rx: Receiver<String>,
}

impl WaitQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Producer endpoint for binding a control channel to this queue.
    pub(crate) fn sender(&self) -> Sender<String> {
        self.tx.clone()
    }

    /// Block until a reason is delivered or the current run is cancelled.
    pub(crate) fn take(&self, cancel: &CancelToken) -> Result<String, WaitCancelled> {
        if cancel.is_cancelled() {
            return Err(WaitCancelled);
        }
        select! {
            recv(self.rx) -> reason => reason.map_err(|_| WaitCancelled),
            recv(cancel.unblock) -> _ => Err(WaitCancelled),
        }
    }
}

/// Handle an external actor uses to wake a pending `wait-for-control`.
///
/// Bound to one active test script; torn down and replaced when the next
/// script begins, torn down for good when the session ends. Handles are
/// cheap clones sharing one teardown state.
#[derive(Clone)]
pub struct ControlChannel {
    reasons: Sender<String>,
    active: Arc<AtomicBool>,
}

impl ControlChannel {
    pub(crate) fn new(reasons: Sender<String>) -> Self {
        Self {
            reasons,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Deliver `reason` to the next (or currently blocked) wait.
    ///
    /// Buffered if no wait is pending. A no-op once the channel is torn
    /// down; safe to call from any thread.
    pub fn signal(&self, reason: &str) {
        if !self.active.load(Ordering::Acquire) {
            debug!(reason, "signal on torn-down control channel ignored");
            return;
        }
        let _ = self.reasons.send(reason.to_string());
    }

    /// Invalidate the channel. Idempotent; later `signal` calls are no-ops.
    pub fn teardown(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Requester side of the advisory cancellation pair.
pub(crate) struct CancelHandle {
    flag: Arc<AtomicBool>,
    unblock: Sender<()>,
}

impl CancelHandle {
    /// Request cancellation and unblock any wait parked in `take`.
    pub(crate) fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
        let _ = self.unblock.send(());
    }
}

/// Worker side of the cancellation pair, checked at every per-command
/// checkpoint. Dropping the matching handle also unblocks parked waits.
pub(crate) struct CancelToken {
    flag: Arc<AtomicBool>,
    unblock: Receiver<()>,
}

impl CancelToken {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

pub(crate) fn cancel_pair() -> (CancelHandle, CancelToken) {
    let flag = Arc::new(AtomicBool::new(false));
    let (tx, rx) = unbounded();
    (
        CancelHandle {
            flag: flag.clone(),
            unblock: tx,
        },
        CancelToken { flag, unblock: rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn buffered_reasons_deliver_in_fifo_order() {
        let queue = WaitQueue::new();
        let (_handle, token) = cancel_pair();
        let channel = ControlChannel::new(queue.sender());

        channel.signal("first");
        channel.signal("second");

        assert_eq!(queue.take(&token), Ok("first".to_string()));
        assert_eq!(queue.take(&token), Ok("second".to_string()));
    }

    #[test]
    fn signal_from_another_thread_unblocks_take() {
        let queue = WaitQueue::new();
        let (_handle, token) = cancel_pair();
        let channel = ControlChannel::new(queue.sender());

        let signaler = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            channel.signal("resumed");
        });

        assert_eq!(queue.take(&token), Ok("resumed".to_string()));
        signaler.join().unwrap();
    }

    #[test]
    fn trigger_unblocks_parked_take() {
        let queue = WaitQueue::new();
        let (handle, token) = cancel_pair();

        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.trigger();
        });

        assert_eq!(queue.take(&token), Err(WaitCancelled));
        assert!(token.is_cancelled());
        trigger.join().unwrap();
    }

    #[test]
    fn dropping_handle_unblocks_parked_take() {
        let queue = WaitQueue::new();
        let (handle, token) = cancel_pair();
        drop(handle);
        assert_eq!(queue.take(&token), Err(WaitCancelled));
    }

    #[test]
    fn teardown_is_idempotent_and_silences_signal() {
        let queue = WaitQueue::new();
        let (handle, token) = cancel_pair();
        let channel = ControlChannel::new(queue.sender());

        channel.teardown();
        channel.teardown();
        channel.signal("ignored");

        // Nothing was buffered; only the cancel trigger can unblock now.
        handle.trigger();
        assert_eq!(queue.take(&token), Err(WaitCancelled));
    }

    #[test]
    fn clones_share_teardown_state() {
        let queue = WaitQueue::new();
        let channel = ControlChannel::new(queue.sender());
        let clone = channel.clone();

        clone.teardown();
        channel.signal("ignored");

        let (handle, token) = cancel_pair();
        handle.trigger();
        assert_eq!(queue.take(&token), Err(WaitCancelled));
    }
}
