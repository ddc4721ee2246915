//! IdleLifecycleManager - tears down readers nobody is watching.
//!
//! Removing the last viewer arms a one-shot timer. When it fires it re-checks,
//! under the viewer lock, that the conversation is still unwatched and that
//! it is still the armed timer (generation match) before stopping the reader.
//! Adding a viewer bumps the generation and aborts the timer in the same
//! critical section, so a reattaching viewer disarms teardown synchronously.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::ClientId;
use crate::ports::ViewerConnection;

use super::conversation::Conversation;

#[derive(Debug, Clone, Copy)]
pub struct IdleLifecycleManager {
    grace: Duration,
}

impl IdleLifecycleManager {
    /// A zero grace period disables teardown.
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Registers a viewer and disarms any pending teardown.
    ///
    /// Returns the new viewer count.
    pub fn on_connection_added(
        &self,
        conv: &Conversation,
        viewer: Arc<dyn ViewerConnection>,
    ) -> usize {
        let mut viewers = conv.viewers.lock();
        viewers.idle_generation += 1;
        if let Some(timer) = viewers.idle_timer.take() {
            timer.abort();
            tracing::debug!(conv_id = %conv.id(), "idle teardown cancelled");
        }
        viewers.connections.insert(viewer.client_id(), viewer);
        conv.touch();
        viewers.connections.len()
    }

    /// Unregisters a viewer; arms teardown when it was the last one.
    ///
    /// Returns the remaining viewer count.
    pub fn on_connection_removed(&self, conv: &Arc<Conversation>, client_id: &ClientId) -> usize {
        let mut viewers = conv.viewers.lock();
        viewers.connections.remove(client_id);
        conv.touch();
        let remaining = viewers.connections.len();

        if remaining == 0 && !self.grace.is_zero() {
            viewers.idle_generation += 1;
            let generation = viewers.idle_generation;
            if let Some(previous) = viewers.idle_timer.take() {
                previous.abort();
            }

            let grace = self.grace;
            let target = conv.clone();
            viewers.idle_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                Self::expire(&target, generation);
            }));
            tracing::debug!(conv_id = %conv.id(), grace_ms = grace.as_millis() as u64, "idle teardown armed");
        }
        remaining
    }

    /// Timer callback. Returns whether the reader was torn down.
    fn expire(conv: &Conversation, generation: u64) -> bool {
        {
            let mut viewers = conv.viewers.lock();
            if viewers.idle_generation != generation || !viewers.connections.is_empty() {
                return false;
            }
            viewers.idle_timer = None;
            if let Some(stop) = viewers.reader_stop.take() {
                stop.cancel();
            }
            viewers.reader_active = false;
        }

        conv.translator().tool_cache().clear();
        tracing::info!(conv_id = %conv.id(), topic = %conv.topic(), "idle teardown: reader stopped");
        true
    }
}
