//! Classification of bus signals the module subscribes to.

/// Well-known name prefix shared by all MPRIS players.
pub const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";

/// Interface carrying player properties.
pub const PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";

/// Which handler a signal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// `org.freedesktop.DBus.Properties.PropertiesChanged`
    PropertiesChanged,
    /// `org.freedesktop.DBus.NameOwnerChanged`
    NameOwnerChanged,
    /// `org.mpris.MediaPlayer2.Player.Seeked`
    Seeked,
    /// Anything else
    Other,
}

impl SignalKind {
    /// Classifies a signal by its interface and member.
    pub fn classify(interface: &str, member: &str) -> Self {
        match (interface, member) {
            ("org.freedesktop.DBus.Properties", "PropertiesChanged") => Self::PropertiesChanged,
            ("org.freedesktop.DBus", "NameOwnerChanged") => Self::NameOwnerChanged,
            (PLAYER_INTERFACE, "Seeked") => Self::Seeked,
            _ => Self::Other,
        }
    }
}

/// What a `NameOwnerChanged` signal means for the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerChange {
    /// Name acquired by a new connection
    Created,
    /// Name released
    Removed,
    /// Name moved from one connection to another
    Replaced,
    /// Neither side has an owner
    Ignored,
}

impl OwnerChange {
    /// Interprets the old and new owner fields.
    pub fn from_owners(old_owner: &str, new_owner: &str) -> Self {
        match (old_owner.is_empty(), new_owner.is_empty()) {
            (true, false) => Self::Created,
            (false, true) => Self::Removed,
            (false, false) => Self::Replaced,
            (true, true) => Self::Ignored,
        }
    }
}

/// Whether `name` is an MPRIS player's well-known name.
pub fn is_player_name(name: &str) -> bool {
    name.starts_with(MPRIS_PREFIX) && name.len() > MPRIS_PREFIX.len()
}
