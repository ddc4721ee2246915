//! WebSocketViewer - a viewer connection backed by a bounded frame queue.
//!
//! The broadcaster only ever calls [`ViewerConnection::try_deliver`], which
//! must not block. Frames go into a bounded queue that the socket's writer
//! task drains; a slow socket fills its own queue and loses frames without
//! holding up the other viewers.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::foundation::ClientId;
use crate::ports::ViewerConnection;

pub struct WebSocketViewer {
    client_id: ClientId,
    tx: mpsc::Sender<String>,
}

impl WebSocketViewer {
    /// Creates a viewer and the receiving end its writer task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let viewer = Self {
            client_id: ClientId::new(),
            tx,
        };
        (viewer, rx)
    }
}

impl ViewerConnection for WebSocketViewer {
    fn client_id(&self) -> ClientId {
        self.client_id
    }

    fn try_deliver(&self, frame: &str) -> bool {
        match self.tx.try_send(frame.to_owned()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(client_id = %self.client_id, "viewer queue full, dropping frame");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(client_id = %self.client_id, "viewer gone, dropping frame");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivered_frames_reach_the_writer_in_order() {
        let (viewer, mut rx) = WebSocketViewer::channel(4);
        assert!(viewer.try_deliver("a"));
        assert!(viewer.try_deliver("b"));
        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
    }

    #[test]
    fn full_queue_drops_frames() {
        let (viewer, _rx) = WebSocketViewer::channel(1);
        assert!(viewer.try_deliver("first"));
        assert!(!viewer.try_deliver("second"));
    }

    #[test]
    fn closed_writer_drops_frames() {
        let (viewer, rx) = WebSocketViewer::channel(4);
        drop(rx);
        assert!(!viewer.try_deliver("late"));
    }

    #[test]
    fn each_viewer_gets_its_own_client_id() {
        let (a, _ra) = WebSocketViewer::channel(1);
        let (b, _rb) = WebSocketViewer::channel(1);
        assert_ne!(a.client_id(), b.client_id());
    }
}
