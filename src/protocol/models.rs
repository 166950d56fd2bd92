use serde::{Deserialize, Serialize};

/// Module list exchanged during `init`/`rinit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Capabilities {
    /// Module names, e.g. `["mp"]`
    pub capabilities: Vec<String>,
}

/// Payload of the client's `init` frame.
///
/// Clients send either the [`Capabilities`] object or a bare list of names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum InitRequest {
    /// `{"Capabilities": [...]}` or the same struct packed as an array
    Wrapped(Capabilities),
    /// `[...]`
    Bare(Vec<String>),
}

impl InitRequest {
    /// Requested module names, in client order.
    pub fn into_modules(self) -> Vec<String> {
        match self {
            InitRequest::Wrapped(capabilities) => capabilities.capabilities,
            InitRequest::Bare(names) => names,
        }
    }
}
