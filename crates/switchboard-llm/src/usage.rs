//! Per-engine usage side channel

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::types::Usage;

const SUBSCRIBER_CAPACITY: usize = 16;

/// Publishes usage events for exactly one engine
///
/// Clones share the same channel. Distinct engines never share one.
#[derive(Debug, Clone)]
pub struct UsageChannel {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    events: broadcast::Sender<Usage>,
    last: watch::Sender<Option<Usage>>,
}

impl UsageChannel {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        let (last, _) = watch::channel(None);

        Self {
            inner: Arc::new(Inner { events, last }),
        }
    }

    /// Record and broadcast a usage report
    pub fn publish(&self, usage: Usage) {
        tracing::debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            total_tokens = usage.total_tokens,
            "usage reported"
        );

        self.inner.last.send_replace(Some(usage));
        // No subscribers is fine
        let _ = self.inner.events.send(usage);
    }

    /// Receive every usage report published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Usage> {
        self.inner.events.subscribe()
    }

    /// Most recent usage report, if any
    pub fn last(&self) -> Option<Usage> {
        *self.inner.last.borrow()
    }
}

impl Default for UsageChannel {
    fn default() -> Self {
        Self::new()
    }
}
