//! Small state machine shared by connections and subsystems.
//!
//! ```text
//! Idle ──► Initializing ──► Active ──► Closing ──► Idle
//!                 └──────────────────────►┘
//! ```
//!
//! Anything else is rejected with a [`LifecycleError`] so callers can log
//! and ignore out-of-order requests (a second `init`, a `close` on an idle
//! connection) instead of silently mutating state.

use std::fmt;

use thiserror::Error;

/// Phase of a connection or subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing negotiated yet
    #[default]
    Idle,
    /// Init received, work in progress
    Initializing,
    /// Fully running
    Active,
    /// Tear-down in progress
    Closing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Initializing => "initializing",
            Phase::Active => "active",
            Phase::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// A transition that the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{owner}: illegal transition {from} -> {to}")]
pub struct LifecycleError {
    /// What the state machine belongs to (`connection`, `mp`, ...)
    pub owner: &'static str,
    /// Phase before the attempted transition
    pub from: Phase,
    /// Requested phase
    pub to: Phase,
}

/// Tracks the phase of one connection or subsystem.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    owner: &'static str,
    phase: Phase,
}

impl Lifecycle {
    /// Creates a state machine in [`Phase::Idle`].
    pub fn new(owner: &'static str) -> Self {
        Self {
            owner,
            phase: Phase::Idle,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the owner is fully running.
    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Moves to `to`, returning the previous phase.
    ///
    /// # Errors
    /// Returns [`LifecycleError`] and leaves the phase unchanged when the
    /// transition is not allowed.
    pub fn transition(&mut self, to: Phase) -> Result<Phase, LifecycleError> {
        if !Self::allowed(self.phase, to) {
            return Err(LifecycleError {
                owner: self.owner,
                from: self.phase,
                to,
            });
        }

        let from = self.phase;
        self.phase = to;
        Ok(from)
    }

    /// Forces the phase back to [`Phase::Idle`], e.g. after the peer vanished.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    fn allowed(from: Phase, to: Phase) -> bool {
        matches!(
            (from, to),
            (Phase::Idle, Phase::Initializing)
                | (Phase::Initializing, Phase::Active)
                | (Phase::Initializing, Phase::Closing)
                | (Phase::Active, Phase::Closing)
                | (Phase::Closing, Phase::Idle)
        )
    }
}
