//! WebSocket adapter - streams conversation frames to browser viewers.
//!
//! ```text
//!   GET /ws?conv_id=c1
//!        │ upgrade
//!        ▼
//!   handle_socket ── attach(WebSocketViewer) ──► StreamingHub
//!        │                                           │
//!        │   ┌──────── bounded queue ◄── try_deliver ┘ (Broadcaster)
//!        ▼   ▼
//!   send_task ──► socket          recv_task ◄── socket (liveness only)
//!        └────────── either ends ──► detach
//! ```

mod handler;
mod viewer;

pub use handler::{websocket_routes, ws_handler, ConnectParams, WebSocketState};
pub use viewer::WebSocketViewer;
