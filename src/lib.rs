//! Cyprus - local bridge exposing desktop media players to a remote client.
//!
//! The bridge listens for a single WebSocket client, advertises itself over
//! mDNS while no client is attached, and starts the functional modules the
//! client asks for in its `init` frame. Frames are MessagePack arrays of the
//! form `[method, args...]`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cyprus::{config::Config, server::ServerModule};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_default()?;
//! ServerModule::new(config).run().await?;
//! # Ok(())
//! # }
//! ```

/// In-process channels between transport, orchestrator and subsystems.
pub mod comm;

/// Configuration schema definitions and validation.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// mDNS advertisement.
pub mod discovery;

/// Connection and subsystem lifecycle state machine.
pub mod lifecycle;

/// Build-time platform detection.
pub mod platform;

/// Wire protocol: frames, routing and shared payloads.
pub mod protocol;

/// Top-level orchestrator.
pub mod server;

/// Functional modules a client can enable.
pub mod subsystems;

/// Logging setup.
pub mod tracing_config;

/// WebSocket transport.
pub mod transmission;

/// Re-exported core types for convenience.
pub use core::{CyprusError, Result};
