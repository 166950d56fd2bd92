//! Binary RPC protocol spoken over the WebSocket.
//!
//! Every frame is a MessagePack array `[method, ...args]`. The method is
//! either a reserved top-level name (`init`, `close`) or
//! `subsystem[:method]`. The transport decodes only enough to route a
//! frame; subsystems decode their own payloads from the raw bytes.

mod error;
mod frame;
pub mod methods;
mod models;
mod route;

pub use error::ProtocolError;
pub use frame::Frame;
pub use models::{Capabilities, InitRequest};
pub use route::{Route, SubsystemKind};
