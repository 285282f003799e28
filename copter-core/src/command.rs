//! Command ingestion over the radio link.

use copter_proto::{
    decode_command, CommandPacket, DecodeError, Field, Serialize, TelemetryPacket,
    MAX_FRAME_LEN, TELEMETRY_FRAME_LEN,
};

use crate::battery::BatteryState;
use crate::telemetry::TelemetryError;
use crate::time::Millis;

/// One frame as delivered by the radio.
pub type RawFrame = heapless::Vec<u8, MAX_FRAME_LEN>;

/// Connection notifications from the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    Connected,
    Disconnected,
}

/// Error type for radio transmit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// No controller connected.
    NotConnected,
    /// Transmit queue full.
    Busy,
    /// Radio I/O error.
    Io,
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Busy => write!(f, "radio busy"),
            Self::Io => write!(f, "radio I/O error"),
        }
    }
}

/// Connection-oriented packet interface of the radio.
///
/// Every method must return immediately; the control tick calls them
/// in-line and cannot wait.
pub trait RadioLink {
    /// Next pending connect/disconnect event, oldest first.
    fn poll_event(&mut self) -> Option<LinkEvent>;

    /// The most recent frame received since the last call, if any.
    fn receive(&mut self) -> Option<RawFrame>;

    /// Queue a frame for transmission.
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError>;
}

/// Why a command frame was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvalidCommand {
    /// Bad length, sync, kind or checksum.
    Framing(DecodeError),
    /// A field is outside its range.
    OutOfRange(Field),
    /// Sequence id not newer than the last accepted one.
    Replayed { last: u32, received: u32 },
}

impl From<DecodeError> for InvalidCommand {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::OutOfRange(field) => InvalidCommand::OutOfRange(field),
            other => InvalidCommand::Framing(other),
        }
    }
}

impl core::fmt::Display for InvalidCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Framing(e) => write!(f, "malformed frame: {}", e),
            Self::OutOfRange(field) => write!(f, "{:?} out of range", field),
            Self::Replayed { last, received } => {
                write!(f, "sequence {} not after {}", received, last)
            }
        }
    }
}

/// Validates inbound commands and sends telemetry.
pub struct CommandChannel<L> {
    link: L,
    last_sequence: Option<u32>,
    last_valid_at: Option<Millis>,
    accepted: u32,
    rejected: u32,
}

impl<L: RadioLink> CommandChannel<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            last_sequence: None,
            last_valid_at: None,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Pass through the next radio event.
    pub fn poll_event(&mut self) -> Option<LinkEvent> {
        self.link.poll_event()
    }

    /// Take at most one pending frame and validate it.
    ///
    /// Invalid frames are counted and dropped.
    pub fn receive(&mut self, now: Millis) -> Option<CommandPacket> {
        let raw = self.link.receive()?;
        match self.validate(&raw, now) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                debug!("command rejected: {:?}", e);
                None
            }
        }
    }

    /// Take the pending frame, if any, without looking at it.
    ///
    /// Returns whether a frame was dropped.
    pub fn discard_pending(&mut self) -> bool {
        self.link.receive().is_some()
    }

    /// Decode, range-check and replay-check a frame.
    ///
    /// On success the sequence id and `now` become the new reference; on
    /// failure nothing changes.
    pub fn validate(&mut self, raw: &[u8], now: Millis) -> Result<CommandPacket, InvalidCommand> {
        let result = self.check(raw);
        match result {
            Ok(cmd) => {
                self.last_sequence = Some(cmd.sequence_id);
                self.last_valid_at = Some(now);
                self.accepted = self.accepted.wrapping_add(1);
            }
            Err(_) => self.rejected = self.rejected.wrapping_add(1),
        }
        result
    }

    fn check(&self, raw: &[u8]) -> Result<CommandPacket, InvalidCommand> {
        let cmd = decode_command(raw)?;
        if let Some(last) = self.last_sequence {
            if cmd.sequence_id <= last {
                return Err(InvalidCommand::Replayed {
                    last,
                    received: cmd.sequence_id,
                });
            }
        }
        Ok(cmd)
    }

    /// Send one telemetry frame. No retry.
    pub fn send_telemetry(&mut self, state: &BatteryState) -> Result<(), TelemetryError> {
        let mut buf = [0u8; TELEMETRY_FRAME_LEN];
        let len = TelemetryPacket::from(state).serialize(&mut buf)?;
        self.link.send(&buf[..len])?;
        Ok(())
    }

    /// Forget the sequence history so a reconnecting controller may start over.
    pub fn reset_session(&mut self) {
        self.last_sequence = None;
    }

    #[inline]
    #[must_use]
    pub fn last_sequence(&self) -> Option<u32> {
        self.last_sequence
    }

    /// Time of the last accepted command. The failsafe timer runs from here.
    #[inline]
    #[must_use]
    pub fn last_valid_at(&self) -> Option<Millis> {
        self.last_valid_at
    }

    #[inline]
    #[must_use]
    pub fn accepted(&self) -> u32 {
        self.accepted
    }

    #[inline]
    #[must_use]
    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}
