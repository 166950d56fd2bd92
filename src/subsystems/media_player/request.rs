//! Decoding of `mp:` requests sent by the client.

use serde::Deserialize;
use tracing::debug;

use crate::protocol::{Frame, ProtocolError};

/// A decoded client request for the media player module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpCommand {
    /// Stop the command routine
    Close,
    /// Reply with the registered names
    List,
    /// Start playback of the player at the index
    Play(i64),
    /// Pause the player at the index
    Pause(i64),
    /// Toggle the player at the index
    PlayPause(i64),
    /// Skip forward on the player at the index
    Next(i64),
    /// Skip back on the player at the index
    Previous(i64),
    /// Seek the player at `index` by a relative offset
    Seek {
        /// Player position
        index: i64,
        /// Offset in microseconds
        offset_us: i64,
    },
}

/// Index argument as sent by clients: a bare integer or `{PlayerIndex: n}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IndexArgument {
    Bare(i64),
    Wrapped {
        #[serde(rename = "PlayerIndex")]
        player_index: i64,
    },
}

impl IndexArgument {
    fn index(self) -> i64 {
        match self {
            Self::Bare(index) => index,
            Self::Wrapped { player_index } => player_index,
        }
    }
}

impl MpCommand {
    /// Decodes raw frame bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Malformed`] for undecodable bytes and
    /// [`ProtocolError::UnknownMethod`] for methods the module lacks.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::from_frame(&Frame::decode(bytes)?)
    }

    /// Maps a frame's method and arguments to a command.
    ///
    /// The bare `mp` prefix behaves like `mp:list`. The un-prefixed control
    /// names (`play`, `fwd`, ...) are accepted as aliases of the indexed
    /// ones.
    ///
    /// # Errors
    /// Returns an error when the method is unknown or an argument is missing
    /// or has the wrong shape.
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        let method = frame.method().split_once(':').map_or("", |(_, m)| m);
        if frame.args().is_empty() {
            debug!(method = frame.method(), "Request carries no payload");
        }

        let command = match method {
            "" | "list" => Self::List,
            "close" => Self::Close,
            "iplay" | "play" => Self::Play(index(frame)?),
            "ipause" | "pause" => Self::Pause(index(frame)?),
            "iplaypause" | "playpause" => Self::PlayPause(index(frame)?),
            "ifwd" | "fwd" => Self::Next(index(frame)?),
            "iprv" | "prv" => Self::Previous(index(frame)?),
            "iseek" | "seek" => Self::Seek {
                index: index(frame)?,
                offset_us: frame.arg(1)?,
            },
            _ => return Err(ProtocolError::UnknownMethod(frame.method().to_string())),
        };

        Ok(command)
    }
}

fn index(frame: &Frame) -> Result<i64, ProtocolError> {
    frame.arg::<IndexArgument>(0).map(IndexArgument::index)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rmpv::Value;

    use super::*;

    fn frame(method: &str, args: Vec<Value>) -> Frame {
        Frame::new(method, args)
    }

    #[test]
    fn indexed_controls_accept_both_index_shapes() {
        let bare = frame("mp:iplay", vec![Value::from(1)]);
        let wrapped = frame(
            "mp:ipause",
            vec![Value::Map(vec![(Value::from("PlayerIndex"), Value::from(2))])],
        );

        assert_eq!(MpCommand::from_frame(&bare).unwrap(), MpCommand::Play(1));
        assert_eq!(MpCommand::from_frame(&wrapped).unwrap(), MpCommand::Pause(2));
    }

    #[test]
    fn legacy_aliases_map_to_indexed_commands() {
        let cases = [
            ("mp:playpause", MpCommand::PlayPause(0)),
            ("mp:fwd", MpCommand::Next(0)),
            ("mp:prv", MpCommand::Previous(0)),
        ];

        for (method, expected) in cases {
            let parsed = MpCommand::from_frame(&frame(method, vec![Value::from(0)])).unwrap();
            assert_eq!(parsed, expected, "{method}");
        }
    }

    #[test]
    fn bare_prefix_and_list_both_list() {
        assert_eq!(
            MpCommand::from_frame(&frame("mp", Vec::new())).unwrap(),
            MpCommand::List
        );
        assert_eq!(
            MpCommand::from_frame(&frame("mp:list", vec![Value::Nil])).unwrap(),
            MpCommand::List
        );
    }

    #[test]
    fn seek_reads_offset() {
        let seek = frame("mp:iseek", vec![Value::from(0), Value::from(-5_000_000)]);

        assert_eq!(
            MpCommand::from_frame(&seek).unwrap(),
            MpCommand::Seek {
                index: 0,
                offset_us: -5_000_000
            }
        );
    }

    #[test]
    fn unknown_method_is_reported_as_such() {
        assert_eq!(
            MpCommand::from_frame(&frame("mp:explode", vec![Value::from(0)])),
            Err(ProtocolError::UnknownMethod("mp:explode".to_string()))
        );
    }

    #[test]
    fn missing_or_wrong_index_is_an_argument_error() {
        assert!(matches!(
            MpCommand::from_frame(&frame("mp:iplay", Vec::new())),
            Err(ProtocolError::MissingArgument { position: 0, .. })
        ));
        assert!(matches!(
            MpCommand::from_frame(&frame("mp:iplay", vec![Value::from("first")])),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }
}
