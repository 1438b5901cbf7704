//! Bounded fragment hand-off between a turn and its listener
//!
//! One relay exists per session. Producers (turns) block while it is full and
//! consumers (listeners) block while it is empty. Every fragment is delivered
//! to exactly one consumer: whichever was waiting first.

use crate::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Default number of fragments buffered between producer and consumer
pub const DEFAULT_CAPACITY: usize = 10;

/// The unit carried on the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum Fragment {
    /// An incremental piece of generated text
    Text(String),
    /// The turn that produced the preceding fragments has completed
    EndOfTurn,
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Fragment::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Fragment::Text(text) => Some(text),
            Fragment::EndOfTurn => None,
        }
    }

    pub fn is_end_of_turn(&self) -> bool {
        matches!(self, Fragment::EndOfTurn)
    }
}

struct Inner {
    /// Taken on close; publishers clone it out so close never waits on them
    sender: Mutex<Option<mpsc::Sender<Fragment>>>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<Fragment>>,
    capacity: usize,
}

/// Shared bounded FIFO of fragments
#[derive(Clone)]
pub struct FragmentRelay {
    inner: Arc<Inner>,
}

impl FragmentRelay {
    /// Create a relay holding at most `capacity` undelivered fragments.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(sender)),
                receiver: tokio::sync::Mutex::new(receiver),
                capacity,
            }),
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<Fragment>> {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Enqueue a fragment, waiting for room if the relay is full
    pub async fn publish(&self, fragment: Fragment) -> RelayResult<()> {
        let sender = self.sender().ok_or(RelayError::RelayClosed)?;
        sender
            .send(fragment)
            .await
            .map_err(|_| RelayError::RelayClosed)
    }

    /// Wait for the next fragment.
    ///
    /// Returns `None` once the relay is closed and every queued fragment has
    /// been taken. Dropping the returned future before it completes never
    /// loses a fragment.
    pub async fn take_next(&self) -> Option<Fragment> {
        let mut receiver = self.inner.receiver.lock().await;
        receiver.recv().await
    }

    /// Stop accepting fragments. Queued fragments stay available to consumers.
    ///
    /// Returns false if the relay was already closed.
    pub fn close(&self) -> bool {
        let closed = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some();
        if closed {
            tracing::info!("Fragment relay closed");
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.sender().is_none()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Fragments published but not yet taken. Reports zero once closed.
    pub fn pending(&self) -> usize {
        self.sender()
            .map(|s| s.max_capacity() - s.capacity())
            .unwrap_or(0)
    }
}

impl Default for FragmentRelay {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for FragmentRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentRelay")
            .field("capacity", &self.inner.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
