//! Transport Adapter — the remote WebSocket connection plus the wire
//! envelope format it carries.

pub mod envelope;
pub mod websocket;

pub use websocket::{TransportAdapter, TransportEvent};
