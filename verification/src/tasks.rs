//! Plumbing between background tasks and the flow that owns them.
//!
//! Timers and pollers never touch flow state. They send signals tagged with
//! the id of the task that produced them; the owning flow applies a signal
//! only if that task is still the current occupant of its slot. Anything
//! from a cancelled or replaced task is dropped on receipt.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A signal and the id of the task that sent it.
#[derive(Debug)]
pub(crate) struct Tagged<S> {
    pub task: u64,
    pub signal: S,
}

/// The flow's inbox.
pub(crate) struct SignalBus<S> {
    tx: mpsc::UnboundedSender<Tagged<S>>,
    rx: mpsc::UnboundedReceiver<Tagged<S>>,
    next_id: u64,
}

impl<S: Send + 'static> SignalBus<S> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx, next_id: 0 }
    }

    /// Allocate an id for a task about to be started.
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// A sender that tags every signal with `task`.
    pub fn sender(&self, task: u64) -> impl Fn(S) + Send + Sync + Clone + 'static {
        let tx = self.tx.clone();
        move |signal| {
            // The flow may already be gone; nothing to do then.
            let _ = tx.send(Tagged { task, signal });
        }
    }

    pub fn try_recv(&mut self) -> Option<Tagged<S>> {
        self.rx.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<Tagged<S>> {
        self.rx.recv().await
    }
}

/// Holds at most one live task of a kind; replacing or clearing it drops
/// (and so cancels) the previous one.
pub(crate) struct TaskSlot<T> {
    current: Option<(u64, T)>,
}

impl<T> TaskSlot<T> {
    pub fn empty() -> Self {
        Self { current: None }
    }

    pub fn set(&mut self, id: u64, task: T) {
        self.current = Some((id, task));
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn holds(&self, id: u64) -> bool {
        matches!(self.current, Some((current, _)) if current == id)
    }

    pub fn get(&self) -> Option<&T> {
        self.current.as_ref().map(|(_, task)| task)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

/// Sends one signal after a delay unless dropped first.
pub(crate) struct DelayedSignal {
    handle: JoinHandle<()>,
}

impl DelayedSignal {
    pub fn schedule<F>(delay: Duration, fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        });
        Self { handle }
    }
}

impl Drop for DelayedSignal {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
