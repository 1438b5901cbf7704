//! Relay consumers

use crate::relay::{Fragment, FragmentRelay};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use uuid::Uuid;

/// One attached consumer of the shared relay.
///
/// Yields fragments until the relay is closed and drained. Dropping the
/// listener detaches it; a fragment it was waiting for stays in the relay
/// for the next consumer.
pub struct Listener {
    id: Uuid,
    delivered: usize,
    fragments: BoxStream<'static, Fragment>,
}

impl Listener {
    pub(crate) fn new(relay: FragmentRelay) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!("Listener {} attached", id);

        let fragments = futures::stream::unfold(relay, |relay| async move {
            relay.take_next().await.map(|fragment| (fragment, relay))
        })
        .boxed();

        Self {
            id,
            delivered: 0,
            fragments,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Fragments handed to this listener so far
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Wait for the next fragment; `None` once the relay is closed and empty
    pub async fn next_fragment(&mut self) -> Option<Fragment> {
        self.next().await
    }
}

impl Stream for Listener {
    type Item = Fragment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Fragment>> {
        let poll = self.fragments.poll_next_unpin(cx);
        if let Poll::Ready(Some(_)) = &poll {
            self.delivered += 1;
        }
        poll
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        tracing::debug!(
            "Listener {} detached after {} fragments",
            self.id,
            self.delivered
        );
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("delivered", &self.delivered)
            .finish_non_exhaustive()
    }
}
