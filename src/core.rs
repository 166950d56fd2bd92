use std::{fmt, io, path::Path, result};

use thiserror::Error;

/// Errors raised while preparing the process: configuration and filesystem.
///
/// Runtime failures of the bridge itself live next to the component that
/// produces them (`TransportError`, `MediaError`, `ServerError`, ...).
#[derive(Error, Debug)]
pub enum CyprusError {
    /// Configuration value rejected after parsing
    #[error("invalid config field '{field}': {reason}")]
    InvalidConfigField {
        /// Dotted path of the offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Standard I/O failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// TOML parsing error with location context
    #[error("failed to parse TOML at '{location}': {details}")]
    TomlParse {
        /// File path or "string"
        location: String,
        /// Parser message
        details: String,
    },
}

/// A specialized `Result` for configuration and startup operations.
pub type Result<T> = result::Result<T, CyprusError>;

impl CyprusError {
    /// Creates a TOML parsing error with optional file path context.
    pub fn toml_parse(error: impl fmt::Display, path: Option<&Path>) -> Self {
        let location = match path {
            Some(p) => {
                let clean_path = p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
                clean_path.to_string_lossy().to_string()
            }
            None => "string".to_string(),
        };

        CyprusError::TomlParse {
            location,
            details: error.to_string(),
        }
    }

    /// Creates a field validation error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CyprusError::InvalidConfigField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
