//! Match rules installed on the bus daemon.

use zbus::{MatchRule, message::Type};

use crate::subsystems::media_player::signals::PLAYER_INTERFACE;

const PLAYER_PATH: &str = "/org/mpris/MediaPlayer2";

/// Ownership changes of any MPRIS name.
pub(crate) fn name_owner_changed() -> zbus::Result<MatchRule<'static>> {
    Ok(MatchRule::builder()
        .msg_type(Type::Signal)
        .sender("org.freedesktop.DBus")?
        .interface("org.freedesktop.DBus")?
        .member("NameOwnerChanged")?
        .arg0ns("org.mpris.MediaPlayer2")?
        .build())
}

/// Property changes of one player, addressed by its well-known name.
pub(crate) fn properties_changed(name: &str) -> zbus::Result<MatchRule<'static>> {
    Ok(MatchRule::builder()
        .msg_type(Type::Signal)
        .sender(name.to_owned())?
        .path(PLAYER_PATH)?
        .interface("org.freedesktop.DBus.Properties")?
        .member("PropertiesChanged")?
        .build())
}

/// Seek notices of one player, addressed by its unique name.
pub(crate) fn seeked(sender: &str) -> zbus::Result<MatchRule<'static>> {
    Ok(MatchRule::builder()
        .msg_type(Type::Signal)
        .sender(sender.to_owned())?
        .path(PLAYER_PATH)?
        .interface(PLAYER_INTERFACE)?
        .member("Seeked")?
        .build())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rules_render_expected_filters() {
        let owner = name_owner_changed().unwrap().to_string();
        assert!(owner.contains("member='NameOwnerChanged'"));
        assert!(owner.contains("arg0namespace='org.mpris.MediaPlayer2'"));

        let seek = seeked(":1.42").unwrap().to_string();
        assert!(seek.contains("sender=':1.42'"));
        assert!(seek.contains("member='Seeked'"));

        assert!(properties_changed("not a bus name").is_err());
    }
}
