//! Method names shared by the transport, orchestrator and subsystems.

use crate::platform::Platform;

use super::SubsystemKind;

/// Client asks for modules to be enabled.
pub const INIT: &str = "init";

/// Server reply to [`INIT`] listing the modules actually enabled.
pub const INIT_REPLY: &str = "rinit";

/// Client ends the session.
pub const CLOSE: &str = "close";

/// Portable event name, `subsystem:event`.
pub fn method(kind: SubsystemKind, event: &str) -> String {
    format!("{}:{event}", kind.name())
}

/// Event name tagged with the running platform, `subsystem:platform:event`.
pub fn platform_method(kind: SubsystemKind, event: &str) -> String {
    format!("{}:{}:{event}", kind.name(), Platform::current())
}
