//! Link failsafe state machine.
//!
//! ```text
//! Disconnected --LinkUp--> Connected --no command for > timeout--> CommandStale
//! CommandStale --ValidCommand--> Connected
//! Connected | CommandStale --LinkDown--> Disconnected
//! ```
//!
//! Only `Connected` lets commands through to the actuators.

use crate::time::Millis;

/// Health of the command link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    #[default]
    Disconnected,
    Connected,
    /// Connected, but no valid command for longer than the timeout.
    CommandStale,
}

impl LinkState {
    #[inline]
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Input to the failsafe transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailsafeEvent {
    LinkUp,
    LinkDown,
    ValidCommand,
    /// Periodic check with the time since the last valid command (or connect).
    Elapsed(u64),
}

/// Pure transition function.
#[must_use]
pub const fn next_state(state: LinkState, event: FailsafeEvent, timeout_ms: u64) -> LinkState {
    match (state, event) {
        (_, FailsafeEvent::LinkDown) => LinkState::Disconnected,
        (LinkState::Disconnected, FailsafeEvent::LinkUp) => LinkState::Connected,
        (LinkState::CommandStale, FailsafeEvent::ValidCommand) => LinkState::Connected,
        (LinkState::Connected, FailsafeEvent::Elapsed(ms)) if ms > timeout_ms => {
            LinkState::CommandStale
        }
        (state, _) => state,
    }
}

/// Tracks the link state against the command timeout.
///
/// The time of the last valid command is owned by the command channel and
/// passed in on every [`tick`](Self::tick); the monitor only remembers when
/// the link came up.
#[derive(Debug)]
pub struct FailsafeMonitor {
    state: LinkState,
    connected_at: Millis,
    timeout_ms: u64,
    stale_transitions: u32,
}

impl FailsafeMonitor {
    #[must_use]
    pub const fn new(timeout_ms: u64) -> Self {
        Self {
            state: LinkState::Disconnected,
            connected_at: Millis(0),
            timeout_ms,
            stale_transitions: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Times the link went stale since boot.
    #[inline]
    #[must_use]
    pub fn stale_transitions(&self) -> u32 {
        self.stale_transitions
    }

    pub fn link_up(&mut self, now: Millis) -> LinkState {
        if self.state == LinkState::Disconnected {
            self.connected_at = now;
        }
        self.apply(FailsafeEvent::LinkUp)
    }

    pub fn link_down(&mut self) -> LinkState {
        self.apply(FailsafeEvent::LinkDown)
    }

    /// Record that a valid command was accepted.
    pub fn command_accepted(&mut self) -> LinkState {
        self.apply(FailsafeEvent::ValidCommand)
    }

    /// Re-evaluate the timeout at `now`.
    ///
    /// The timer runs from `last_valid` or from the connect, whichever is
    /// later, so a command from an earlier session never extends this one.
    pub fn tick(&mut self, now: Millis, last_valid: Option<Millis>) -> LinkState {
        let reference = match last_valid {
            Some(at) if at > self.connected_at => at,
            _ => self.connected_at,
        };
        self.apply(FailsafeEvent::Elapsed(now.saturating_since(reference)))
    }

    fn apply(&mut self, event: FailsafeEvent) -> LinkState {
        let next = next_state(self.state, event, self.timeout_ms);
        if next != self.state {
            info!("link {:?} -> {:?}", self.state, next);
            if next == LinkState::CommandStale {
                self.stale_transitions = self.stale_transitions.wrapping_add(1);
            }
            self.state = next;
        }
        self.state
    }
}
