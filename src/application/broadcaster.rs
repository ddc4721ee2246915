//! Broadcaster - fans a wire frame out to every viewer of a conversation.
//!
//! Delivery is best effort. A frame is serialized once and offered to each
//! viewer with [`ViewerConnection::try_deliver`]; a full or closed viewer
//! misses the frame without affecting the others or the conversation.

use crate::domain::streaming::WireFrame;

use super::conversation::Conversation;

/// Result of one broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastOutcome {
    pub attempted: usize,
    pub delivered: usize,
}

impl BroadcastOutcome {
    pub fn dropped(&self) -> usize {
        self.attempted - self.delivered
    }
}

pub struct Broadcaster;

impl Broadcaster {
    pub fn broadcast(conv: &Conversation, frame: &WireFrame) -> BroadcastOutcome {
        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(conv_id = %conv.id(), error = %e, "failed to serialize frame");
                return BroadcastOutcome::default();
            }
        };
        Self::broadcast_raw(conv, &json)
    }

    /// Offers an already serialized frame to every viewer.
    pub fn broadcast_raw(conv: &Conversation, json: &str) -> BroadcastOutcome {
        let viewers = conv.viewers.lock();
        let mut outcome = BroadcastOutcome {
            attempted: viewers.connections.len(),
            delivered: 0,
        };
        for viewer in viewers.connections.values() {
            if viewer.try_deliver(json) {
                outcome.delivered += 1;
            } else {
                tracing::debug!(
                    conv_id = %conv.id(),
                    client_id = %viewer.client_id(),
                    "viewer dropped frame"
                );
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::conversation::test_support::{conversation, RecordingViewer};
    use crate::domain::streaming::SemEvent;
    use crate::ports::ViewerConnection;

    fn frame() -> WireFrame {
        WireFrame::Semantic(SemEvent::ToolDone { id: "t1".into() })
    }

    #[test]
    fn delivers_to_every_viewer() {
        let conv = conversation("b");
        let a = RecordingViewer::new();
        let b = RecordingViewer::new();
        {
            let mut viewers = conv.viewers.lock();
            viewers.connections.insert(a.client_id(), a.clone());
            viewers.connections.insert(b.client_id(), b.clone());
        }

        let outcome = Broadcaster::broadcast(&conv, &frame());

        assert_eq!(outcome, BroadcastOutcome { attempted: 2, delivered: 2 });
        assert_eq!(a.frames.lock()[0], r#"{"sem":true,"event":{"type":"tool.done","id":"t1"}}"#);
        assert_eq!(b.frame_count(), 1);
    }

    #[test]
    fn broken_viewer_does_not_block_others() {
        let conv = conversation("b");
        let broken = RecordingViewer::broken();
        let healthy = RecordingViewer::new();
        {
            let mut viewers = conv.viewers.lock();
            viewers.connections.insert(broken.client_id(), broken.clone());
            viewers.connections.insert(healthy.client_id(), healthy.clone());
        }

        let outcome = Broadcaster::broadcast(&conv, &frame());

        assert_eq!(outcome.dropped(), 1);
        assert_eq!(healthy.frame_count(), 1);
        assert_eq!(conv.viewer_count(), 2);
    }

    #[test]
    fn no_viewers_is_a_noop() {
        let conv = conversation("b");
        assert_eq!(Broadcaster::broadcast(&conv, &frame()), BroadcastOutcome::default());
    }
}
