//! StreamingHub - the streaming core as seen by the HTTP and socket layers.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::{ClientId, ConversationId};
use crate::domain::profile::ChatProfile;
use crate::ports::{EngineFactory, EventBus, ToolRegistry, ViewerConnection};

use super::admission::{AdmittedRun, RunAdmission};
use super::conversation::{Conversation, StreamingSettings};
use super::error::StreamError;
use super::idle::IdleLifecycleManager;
use super::registry::ConversationRegistry;

pub struct StreamingHub {
    registry: ConversationRegistry,
    idle: IdleLifecycleManager,
    admission: RunAdmission,
}

impl StreamingHub {
    pub fn new(
        bus: Arc<dyn EventBus>,
        engines: Arc<dyn EngineFactory>,
        tools: Arc<dyn ToolRegistry>,
        settings: StreamingSettings,
    ) -> Self {
        Self {
            idle: IdleLifecycleManager::new(settings.idle_timeout),
            admission: RunAdmission::new(tools),
            registry: ConversationRegistry::new(bus, engines, settings),
        }
    }

    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    /// Attaches a viewer, creating the conversation or restarting its reader as needed.
    pub async fn attach(
        &self,
        conv_id: &ConversationId,
        profile: &ChatProfile,
        viewer: Arc<dyn ViewerConnection>,
    ) -> Result<Arc<Conversation>, StreamError> {
        let client_id = viewer.client_id();
        let (conv, count) = self
            .registry
            .with_conversation(conv_id, profile, |conv| self.idle.on_connection_added(conv, viewer))
            .await?;

        if let Err(e) = self.registry.reader().start(&conv).await {
            self.idle.on_connection_removed(&conv, &client_id);
            return Err(e);
        }

        tracing::info!(conv_id = %conv_id, %client_id, viewers = count, "viewer attached");
        Ok(conv)
    }

    pub fn detach(&self, conv: &Arc<Conversation>, client_id: &ClientId) {
        let remaining = self.idle.on_connection_removed(conv, client_id);
        tracing::info!(conv_id = %conv.id(), %client_id, viewers = remaining, "viewer detached");
    }

    /// Submits a prompt, creating the conversation if needed.
    pub async fn submit(
        &self,
        conv_id: &ConversationId,
        profile: &ChatProfile,
        prompt: &str,
    ) -> Result<AdmittedRun, StreamError> {
        let (_, admitted) = self
            .registry
            .with_conversation(conv_id, profile, |conv| self.admission.submit(conv, prompt))
            .await?;
        admitted
    }

    /// Spawns the periodic idle-conversation sweep, stopped by `shutdown`.
    ///
    /// Returns `None` when eviction is disabled.
    pub fn spawn_eviction_loop(self: &Arc<Self>, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let settings = self.registry.settings();
        let (idle, period) = (settings.evict_idle, settings.evict_interval);
        if idle.is_zero() || period.is_zero() {
            tracing::info!("conversation eviction disabled");
            return None;
        }

        let hub = Arc::clone(self);
        tracing::info!(idle_secs = idle.as_secs(), interval_secs = period.as_secs(), "conversation eviction enabled");
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    now = ticker.tick() => {
                        let evicted = hub.registry.evict_idle(now).await;
                        if evicted > 0 {
                            tracing::debug!(evicted, "eviction sweep finished");
                        }
                    }
                }
            }
        }))
    }

    /// Cancels in-flight runs and stops every reader.
    pub async fn shutdown(&self) {
        let conversations = self.registry.all().await;
        for conv in &conversations {
            self.admission.cancel(conv);
            conv.stop_reader();
        }
        tracing::info!(conversations = conversations.len(), "streaming hub shut down");
    }
}
