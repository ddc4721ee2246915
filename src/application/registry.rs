//! ConversationRegistry - exactly-once creation and lookup by external id.
//!
//! Creation happens entirely under the registry lock: build the engine and
//! sink, start the reader, then register. Concurrent first requests for one
//! id therefore create a single conversation with a single reader. If the
//! reader cannot subscribe, nothing is registered and the error is returned.
//!
//! Conversations nobody watches or runs are evicted once they have been idle
//! for `evict_idle`. Callers that need a conversation to stay registered
//! (attaching a viewer, admitting a run) do so through
//! [`ConversationRegistry::with_conversation`], which runs under the same
//! lock as the eviction sweep.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::foundation::ConversationId;
use crate::domain::profile::ChatProfile;
use crate::ports::{EngineFactory, EventBus};

use super::conversation::{Conversation, StreamingSettings};
use super::error::StreamError;
use super::reader::EventReader;
use super::sink::TopicEventSink;

pub struct ConversationRegistry {
    conversations: Mutex<HashMap<ConversationId, Arc<Conversation>>>,
    bus: Arc<dyn EventBus>,
    engines: Arc<dyn EngineFactory>,
    reader: EventReader,
    settings: StreamingSettings,
}

impl ConversationRegistry {
    pub fn new(
        bus: Arc<dyn EventBus>,
        engines: Arc<dyn EngineFactory>,
        settings: StreamingSettings,
    ) -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            reader: EventReader::new(bus.clone()),
            bus,
            engines,
            settings,
        }
    }

    pub fn reader(&self) -> &EventReader {
        &self.reader
    }

    pub fn settings(&self) -> &StreamingSettings {
        &self.settings
    }

    /// Returns the conversation for `id`, creating it (and starting its reader) if needed.
    ///
    /// `profile` is only consulted when the conversation is created.
    pub async fn get_or_create(
        &self,
        id: &ConversationId,
        profile: &ChatProfile,
    ) -> Result<Arc<Conversation>, StreamError> {
        self.with_conversation(id, profile, |_| ()).await.map(|(conv, ())| conv)
    }

    /// Like [`get_or_create`](Self::get_or_create), then applies `f` before
    /// the registry lock is released, so no sweep can evict in between.
    pub async fn with_conversation<R>(
        &self,
        id: &ConversationId,
        profile: &ChatProfile,
        f: impl FnOnce(&Arc<Conversation>) -> R,
    ) -> Result<(Arc<Conversation>, R), StreamError> {
        let mut conversations = self.conversations.lock().await;
        if let Some(existing) = conversations.get(id) {
            let out = f(existing);
            return Ok((existing.clone(), out));
        }

        let engine = self
            .engines
            .build(id, profile)
            .map_err(|source| StreamError::Engine {
                conv_id: id.clone(),
                source,
            })?;
        let sink = Arc::new(TopicEventSink::new(
            self.bus.clone(),
            self.settings.topic_for(id),
        ));
        let conv = Arc::new(
            Conversation::new(id.clone(), engine, sink, &self.settings).with_profile(&profile.slug),
        );

        self.reader.start(&conv).await?;

        tracing::info!(
            conv_id = %id,
            run_id = %conv.run_id(),
            topic = %conv.topic(),
            profile = %profile.slug,
            "conversation created"
        );
        conversations.insert(id.clone(), conv.clone());
        let out = f(&conv);
        Ok((conv, out))
    }

    /// Removes every conversation that is evictable at `now` and stops its reader.
    ///
    /// Returns how many were evicted.
    pub async fn evict_idle(&self, now: Instant) -> usize {
        let idle = self.settings.evict_idle;
        if idle.is_zero() {
            return 0;
        }

        let mut conversations = self.conversations.lock().await;
        let expired: Vec<ConversationId> = conversations
            .iter()
            .filter(|(_, conv)| conv.is_evictable(now, idle))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(conv) = conversations.remove(id) {
                conv.stop_reader();
                conv.translator().tool_cache().clear();
                tracing::info!(conv_id = %id, topic = %conv.topic(), "idle conversation evicted");
            }
        }
        expired.len()
    }

    pub async fn get(&self, id: &ConversationId) -> Option<Arc<Conversation>> {
        self.conversations.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.conversations.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every registered conversation.
    pub async fn all(&self) -> Vec<Arc<Conversation>> {
        self.conversations.lock().await.values().cloned().collect()
    }
}
