//! Conversation - the unit of streaming state.
//!
//! ```text
//!   Conversation
//!   ├── run lock     ─ running, cancel, transcript        (RunAdmission)
//!   └── viewer lock  ─ connections, reader flag/stop,     (IdleLifecycleManager,
//!                      idle timer                          EventReader, Broadcaster)
//! ```
//!
//! The two locks are independent so admission checks never wait on
//! connection churn and vice versa. Both guard short, non-blocking critical
//! sections only; no lock is held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::{ClientId, ConversationId, RunId};
use crate::domain::profile::DEFAULT_PROFILE;
use crate::domain::streaming::{EventTranslator, Protocol};
use crate::domain::transcript::Transcript;
use crate::ports::{Engine, EventSink, ViewerConnection};

/// Settings every conversation is created with.
#[derive(Debug, Clone)]
pub struct StreamingSettings {
    /// Topic name prefix; the conversation id is appended.
    pub topic_prefix: String,
    /// Bus consumer name prefix; `:<conv_id>` is appended.
    pub consumer_prefix: String,
    /// Grace period before an unwatched conversation's reader is torn down.
    /// Zero disables teardown.
    pub idle_timeout: Duration,
    pub protocol: Protocol,
    pub custom_renderers: HashMap<String, String>,
    pub tool_cache_capacity: usize,
    /// How long an unwatched, idle conversation stays registered.
    /// Zero disables eviction.
    pub evict_idle: Duration,
    /// Period of the eviction sweep. Zero disables the sweep.
    pub evict_interval: Duration,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        let mut custom_renderers = HashMap::new();
        custom_renderers.insert("calc".to_string(), "calc_result".to_string());
        Self {
            topic_prefix: "chat:".to_string(),
            consumer_prefix: "ws-forwarder".to_string(),
            idle_timeout: Duration::from_secs(60),
            protocol: Protocol::Semantic,
            custom_renderers,
            tool_cache_capacity: 1024,
            evict_idle: Duration::from_secs(300),
            evict_interval: Duration::from_secs(60),
        }
    }
}

impl StreamingSettings {
    pub fn topic_for(&self, id: &ConversationId) -> String {
        format!("{}{}", self.topic_prefix, id)
    }

    pub fn consumer_for(&self, id: &ConversationId) -> String {
        format!("{}:{}", self.consumer_prefix, id)
    }
}

/// Admission state, guarded by the run lock.
pub(crate) struct RunState {
    pub(crate) running: bool,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) transcript: Transcript,
}

/// Viewer and reader lifecycle state, guarded by the viewer lock.
pub(crate) struct ViewerState {
    pub(crate) connections: HashMap<ClientId, Arc<dyn ViewerConnection>>,
    pub(crate) reader_active: bool,
    pub(crate) reader_stop: Option<CancellationToken>,
    /// Bumped on every reader start; a reader only resets state it still owns.
    pub(crate) reader_epoch: u64,
    pub(crate) idle_timer: Option<JoinHandle<()>>,
    /// Bumped on every arm/disarm; a firing timer only acts on its own generation.
    pub(crate) idle_generation: u64,
}

/// Server-side state of one logical chat session.
pub struct Conversation {
    id: ConversationId,
    run_id: RunId,
    topic: String,
    consumer: String,
    profile: String,
    engine: Arc<dyn Engine>,
    sink: Arc<dyn EventSink>,
    translator: EventTranslator,
    last_activity: Mutex<Instant>,
    pub(crate) run: Mutex<RunState>,
    pub(crate) viewers: Mutex<ViewerState>,
}

impl Conversation {
    pub fn new(
        id: ConversationId,
        engine: Arc<dyn Engine>,
        sink: Arc<dyn EventSink>,
        settings: &StreamingSettings,
    ) -> Self {
        let run_id = RunId::new();
        Self {
            topic: settings.topic_for(&id),
            consumer: settings.consumer_for(&id),
            profile: DEFAULT_PROFILE.to_string(),
            id,
            run_id,
            engine,
            sink,
            translator: EventTranslator::new(
                settings.protocol,
                settings.custom_renderers.clone(),
                settings.tool_cache_capacity,
            ),
            last_activity: Mutex::new(Instant::now()),
            run: Mutex::new(RunState {
                running: false,
                cancel: None,
                transcript: Transcript::new(run_id),
            }),
            viewers: Mutex::new(ViewerState {
                connections: HashMap::new(),
                reader_active: false,
                reader_stop: None,
                reader_epoch: 0,
                idle_timer: None,
                idle_generation: 0,
            }),
        }
    }

    /// Records which profile the engine was built from.
    pub fn with_profile(mut self, slug: impl Into<String>) -> Self {
        self.profile = slug.into();
        self
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Slug of the profile the conversation's engine was built from.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Correlation tag events must carry (or leave empty) to be accepted.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    pub fn translator(&self) -> &EventTranslator {
        &self.translator
    }

    // === Activity ===

    /// Records activity: a viewer came or went, or a run started or ended.
    pub(crate) fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    /// Whether the registry may drop this conversation at `now`.
    pub fn is_evictable(&self, now: Instant, idle: Duration) -> bool {
        if idle.is_zero() || self.is_running() || self.viewer_count() > 0 {
            return false;
        }
        now.saturating_duration_since(self.last_activity()) >= idle
    }

    // === Run state ===

    pub fn is_running(&self) -> bool {
        self.run.lock().running
    }

    /// Snapshot of the transcript.
    pub fn transcript(&self) -> Transcript {
        self.run.lock().transcript.clone()
    }

    // === Viewer state ===

    pub fn viewer_count(&self) -> usize {
        self.viewers.lock().connections.len()
    }

    pub fn is_reader_active(&self) -> bool {
        self.viewers.lock().reader_active
    }

    pub fn has_idle_timer(&self) -> bool {
        self.viewers.lock().idle_timer.is_some()
    }

    /// Stops the reader and disarms any idle timer.
    pub(crate) fn stop_reader(&self) {
        let mut viewers = self.viewers.lock();
        if let Some(timer) = viewers.idle_timer.take() {
            timer.abort();
        }
        viewers.idle_generation += 1;
        if let Some(stop) = viewers.reader_stop.take() {
            stop.cancel();
        }
        viewers.reader_active = false;
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("id", &self.id)
            .field("run_id", &self.run_id)
            .field("topic", &self.topic)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared doubles for application tests.

    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::domain::streaming::EngineEvent;
    use crate::ports::{BusError, RunContext, RunFailure};

    /// Records every frame it is offered.
    pub struct RecordingViewer {
        id: ClientId,
        pub frames: Mutex<Vec<String>>,
        accept: bool,
    }

    impl RecordingViewer {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                id: ClientId::new(),
                frames: Mutex::new(Vec::new()),
                accept: true,
            })
        }

        /// A viewer whose queue is always full.
        pub fn broken() -> Arc<Self> {
            Arc::new(Self {
                id: ClientId::new(),
                frames: Mutex::new(Vec::new()),
                accept: false,
            })
        }

        pub fn frame_count(&self) -> usize {
            self.frames.lock().len()
        }
    }

    impl ViewerConnection for RecordingViewer {
        fn client_id(&self) -> ClientId {
            self.id
        }

        fn try_deliver(&self, frame: &str) -> bool {
            if self.accept {
                self.frames.lock().push(frame.to_string());
            }
            self.accept
        }
    }

    /// Discards events.
    pub struct NullSink;

    #[async_trait]
    impl EventSink for NullSink {
        async fn publish_event(&self, _event: EngineEvent) -> Result<(), BusError> {
            Ok(())
        }
    }

    /// Returns the transcript unchanged.
    pub struct IdleEngine;

    #[async_trait]
    impl Engine for IdleEngine {
        async fn run_inference(
            &self,
            _ctx: RunContext,
            transcript: Transcript,
        ) -> Result<Transcript, RunFailure> {
            Ok(transcript)
        }
    }

    pub fn conversation(id: &str) -> Arc<Conversation> {
        Arc::new(Conversation::new(
            ConversationId::new(id).unwrap(),
            Arc::new(IdleEngine),
            Arc::new(NullSink),
            &StreamingSettings::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::conversation;
    use super::*;

    #[test]
    fn derives_topic_and_consumer_from_id() {
        let conv = conversation("abc");
        assert_eq!(conv.topic(), "chat:abc");
        assert_eq!(conv.consumer(), "ws-forwarder:abc");
        assert_eq!(conv.profile(), "default");
    }

    #[test]
    fn starts_idle_with_no_viewers() {
        let conv = conversation("abc");
        assert!(!conv.is_running());
        assert!(!conv.is_reader_active());
        assert!(!conv.has_idle_timer());
        assert_eq!(conv.viewer_count(), 0);
        assert!(conv.transcript().is_empty());
        assert_eq!(conv.transcript().run_id, conv.run_id());
    }

    #[test]
    fn each_conversation_gets_its_own_run_id() {
        assert_ne!(conversation("a").run_id(), conversation("a").run_id());
    }

    #[tokio::test(start_paused = true)]
    async fn evictable_only_when_unwatched_idle_and_quiet_long_enough() {
        let conv = conversation("abc");
        let idle = Duration::from_secs(30);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!conv.is_evictable(Instant::now(), idle));

        tokio::time::advance(Duration::from_secs(25)).await;
        assert!(conv.is_evictable(Instant::now(), idle));
        assert!(!conv.is_evictable(Instant::now(), Duration::ZERO));

        conv.touch();
        assert!(!conv.is_evictable(Instant::now(), idle));

        tokio::time::advance(idle).await;
        conv.run.lock().running = true;
        assert!(!conv.is_evictable(Instant::now(), idle));
        conv.run.lock().running = false;

        let viewer = test_support::RecordingViewer::new();
        conv.viewers.lock().connections.insert(viewer.client_id(), viewer);
        assert!(!conv.is_evictable(Instant::now(), idle));
    }

    #[test]
    fn stop_reader_cancels_token() {
        let conv = conversation("abc");
        let stop = CancellationToken::new();
        {
            let mut viewers = conv.viewers.lock();
            viewers.reader_active = true;
            viewers.reader_stop = Some(stop.clone());
        }

        conv.stop_reader();
        assert!(stop.is_cancelled());
        assert!(!conv.is_reader_active());
    }
}
