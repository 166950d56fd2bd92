/// Errors produced while decoding, routing or encoding frames.
///
/// `Malformed` and `UnknownMethod` are deliberately separate: the first
/// means the bytes could not be understood at all, the second that the
/// frame was well formed but nobody handles its method.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Bytes are not a `[method, ...args]` MessagePack array
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Frame is well formed but its method is not handled
    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    /// A required positional argument is absent
    #[error("missing argument {position} for '{method}'")]
    MissingArgument {
        /// Method the argument belongs to
        method: String,
        /// Zero-based position after the method name
        position: usize,
    },

    /// Argument present but of the wrong shape
    #[error("invalid payload for '{method}': {details}")]
    InvalidPayload {
        /// Method the payload belongs to
        method: String,
        /// Decoder message
        details: String,
    },

    /// Outbound frame could not be serialized
    #[error("failed to encode '{method}': {details}")]
    Encode {
        /// Method of the frame being encoded
        method: String,
        /// Encoder message
        details: String,
    },
}
