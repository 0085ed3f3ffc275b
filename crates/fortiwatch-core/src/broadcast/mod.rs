// ── Broadcast layer ──
//
// Typed channel registry plus the WebSocket server that feeds it to
// viewers. Subscription state lives only as long as each socket.

pub mod hub;
pub mod protocol;
pub mod server;

pub use hub::{DEFAULT_CLIENT_BUFFER, Frame, Hub, PublishStats};
pub use protocol::{Channel, ClientMessage, ServerMessage, UpdateFrame};
pub use server::BroadcastServer;
