use std::fmt;

/// Operating system the binary was built for.
///
/// Platform-specific notification names embed this tag
/// (`mp:linux:seeked`), and subsystems without a binding for the current
/// platform report it in their construction error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Linux and other freedesktop systems with a session bus
    Linux,
    /// Microsoft Windows
    Windows,
    /// Apple macOS
    MacOs,
    /// Anything else
    Other,
}

impl Platform {
    /// The platform selected at compile time.
    pub const fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Other
        }
    }

    /// Lowercase tag used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::MacOs => "darwin",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
