//! ViewerConnection port - One attached client of a conversation.

use crate::domain::foundation::ClientId;

/// A viewer that frames are pushed to.
///
/// Delivery is best effort: implementations must not block and must not
/// fail the caller. A full or closed connection simply drops the frame.
pub trait ViewerConnection: Send + Sync {
    fn client_id(&self) -> ClientId;

    /// Attempts to queue `frame` for the viewer. Returns whether it was queued.
    fn try_deliver(&self, frame: &str) -> bool;
}
