//! Session status and its transition rules.
//!
//! One authoritative value owned by the orchestrator. Every mutation goes
//! through [`StatusCell`], which rejects illegal transitions instead of
//! silently tolerating them; the only short-circuit is the forced return to
//! idle on session end.

use crate::error::{Result, VoxError};
use std::fmt;
use std::sync::Mutex;

/// The session status cycle:
/// idle → connecting → listening → processing → speaking → listening → … → idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No active resources.
    Idle,
    /// Microphone/recognizer initialization in progress.
    Connecting,
    /// Recognizer active, silence detection armed.
    Listening,
    /// One backend call in flight; this status is the request mutex.
    Processing,
    /// Reply playback in progress; silence detection stays paused.
    Speaking,
}

impl SessionStatus {
    /// Whether the normal cycle allows moving from `self` to `to`.
    ///
    /// The user-initiated end action does not go through this table; it
    /// forces idle from any state via [`StatusCell::force_idle`].
    pub fn can_transition_to(self, to: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, to),
            (Idle, Connecting)
                | (Connecting, Listening)
                | (Connecting, Idle)
                | (Listening, Processing)
                | (Processing, Speaking)
                | (Processing, Listening)
                | (Speaking, Listening)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Listening => "listening",
            SessionStatus::Processing => "processing",
            SessionStatus::Speaking => "speaking",
        };
        write!(f, "{}", name)
    }
}

/// The single mutation point for session status.
///
/// Async continuations read the current value through this cell rather than
/// a captured copy, and use [`StatusCell::transition_from`] to re-check their
/// precondition and mutate in one step.
pub struct StatusCell {
    inner: Mutex<SessionStatus>,
}

impl StatusCell {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SessionStatus::Idle),
        }
    }

    /// The current status.
    pub fn get(&self) -> SessionStatus {
        self.inner
            .lock()
            .map(|status| *status)
            .unwrap_or(SessionStatus::Idle)
    }

    /// Moves to `to`, rejecting transitions the cycle does not allow.
    pub fn transition(&self, to: SessionStatus) -> Result<()> {
        let mut status = self.inner.lock().map_err(|_| VoxError::Other(
            "session status lock poisoned".to_string(),
        ))?;
        if status.can_transition_to(to) {
            *status = to;
            Ok(())
        } else {
            Err(VoxError::InvalidTransition {
                from: status.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Moves to `to` only when the status is still `from`; returns whether
    /// the transition happened. Check-and-mutate is atomic, so a stale
    /// handler observes `false` and must no-op.
    pub fn transition_from(&self, from: SessionStatus, to: SessionStatus) -> bool {
        match self.inner.lock() {
            Ok(mut status) => {
                if *status == from && status.can_transition_to(to) {
                    *status = to;
                    true
                } else {
                    false
                }
            }
            Err(_) => false,
        }
    }

    /// Forces idle unconditionally — the session-end short-circuit.
    pub fn force_idle(&self) {
        if let Ok(mut status) = self.inner.lock() {
            *status = SessionStatus::Idle;
        }
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}
