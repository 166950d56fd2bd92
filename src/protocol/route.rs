use std::fmt;

use super::methods;

/// Functional modules a client can enable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubsystemKind {
    /// MPRIS media player bridge, addressed as `mp`
    MediaPlayer,
}

impl SubsystemKind {
    /// Every module known to this build.
    pub const ALL: [SubsystemKind; 1] = [SubsystemKind::MediaPlayer];

    /// Looks a module up by its wire prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Wire prefix of the module.
    pub const fn name(self) -> &'static str {
        match self {
            SubsystemKind::MediaPlayer => "mp",
        }
    }
}

impl fmt::Display for SubsystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the transport should send a decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Client requests module initialization
    Init,
    /// Client ends the session
    Close,
    /// Frame for a module; `method` is `None` for the bare prefix, which
    /// asks for the module's default handling
    Subsystem {
        /// Target module
        kind: SubsystemKind,
        /// Part after the first `:`
        method: Option<String>,
    },
    /// Prefix that names neither a reserved method nor a module
    Unknown(String),
}

impl Route {
    /// Splits `method` on its first `:` and classifies the prefix.
    pub fn parse(method: &str) -> Self {
        let (prefix, rest) = match method.split_once(':') {
            Some((prefix, rest)) => (prefix, Some(rest)),
            None => (method, None),
        };

        match prefix {
            methods::INIT => Route::Init,
            methods::CLOSE => Route::Close,
            other => match SubsystemKind::from_name(other) {
                Some(kind) => Route::Subsystem {
                    kind,
                    method: rest.map(str::to_string),
                },
                None => Route::Unknown(other.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_methods() {
        assert_eq!(Route::parse("init"), Route::Init);
        assert_eq!(Route::parse("close"), Route::Close);
    }

    #[test]
    fn subsystem_with_method() {
        assert_eq!(
            Route::parse("mp:iplay"),
            Route::Subsystem {
                kind: SubsystemKind::MediaPlayer,
                method: Some("iplay".to_string()),
            }
        );
    }

    #[test]
    fn bare_subsystem_prefix_requests_default_handling() {
        assert_eq!(
            Route::parse("mp"),
            Route::Subsystem {
                kind: SubsystemKind::MediaPlayer,
                method: None,
            }
        );
    }

    #[test]
    fn only_first_colon_splits() {
        assert_eq!(
            Route::parse("mp:linux:seeked"),
            Route::Subsystem {
                kind: SubsystemKind::MediaPlayer,
                method: Some("linux:seeked".to_string()),
            }
        );
    }

    #[test]
    fn unknown_prefix() {
        assert_eq!(Route::parse("fs:list"), Route::Unknown("fs".to_string()));
        assert_eq!(Route::parse(""), Route::Unknown(String::new()));
    }

    #[test]
    fn kind_lookup_round_trips_names() {
        for kind in SubsystemKind::ALL {
            assert_eq!(SubsystemKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(SubsystemKind::from_name("np"), None);
    }
}
