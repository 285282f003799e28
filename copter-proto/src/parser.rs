//! Binary frame decoding.
//!
//! Every frame is `SYNC | kind | payload | crc8`, little-endian, with the
//! CRC-8/SMBUS covering the kind byte and the payload:
//!
//! ```text
//! command:   A5 01 <seq:u32> <throttle:u16> <yaw:i16> <pitch:i16> <crc>   (13 bytes)
//! telemetry: A5 81 <voltage_mv:u16> <class:u8> <flags:u8> <crc>             (7 bytes)
//! ```

use crate::crc::calculate_crc8;
use crate::types::{BatteryClass, CommandPacket, Field, TelemetryFlags, TelemetryPacket};

/// Frame start marker.
pub const SYNC: u8 = 0xA5;

/// Kind byte of a command frame (controller → helicopter).
pub const KIND_COMMAND: u8 = 0x01;

/// Kind byte of a telemetry frame (helicopter → controller).
pub const KIND_TELEMETRY: u8 = 0x81;

/// Total size of a command frame.
pub const COMMAND_FRAME_LEN: usize = 13;

/// Total size of a telemetry frame.
pub const TELEMETRY_FRAME_LEN: usize = 7;

/// Largest frame the protocol defines.
pub const MAX_FRAME_LEN: usize = COMMAND_FRAME_LEN;

/// Error type for frame decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Frame length does not match its kind.
    Length,
    /// First byte is not [`SYNC`].
    Sync,
    /// Unexpected kind byte.
    Kind,
    /// CRC mismatch.
    Checksum,
    /// A field is outside its declared range.
    OutOfRange(Field),
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Length => write!(f, "bad frame length"),
            Self::Sync => write!(f, "missing sync byte"),
            Self::Kind => write!(f, "unexpected frame kind"),
            Self::Checksum => write!(f, "checksum mismatch"),
            Self::OutOfRange(field) => write!(f, "{:?} out of range", field),
        }
    }
}

/// Frame length for a kind byte, if the kind is known.
#[inline]
#[must_use]
pub const fn frame_len(kind: u8) -> Option<usize> {
    match kind {
        KIND_COMMAND => Some(COMMAND_FRAME_LEN),
        KIND_TELEMETRY => Some(TELEMETRY_FRAME_LEN),
        _ => None,
    }
}

/// Decode and range-check a command frame.
///
/// The sequence id is returned as-is; replay rejection needs the receiver's
/// history and happens one layer up.
pub fn decode_command(frame: &[u8]) -> Result<CommandPacket, DecodeError> {
    let body = verified_body(frame, KIND_COMMAND, COMMAND_FRAME_LEN)?;

    let packet = CommandPacket {
        sequence_id: u32::from_le_bytes([body[0], body[1], body[2], body[3]]),
        throttle: u16::from_le_bytes([body[4], body[5]]),
        yaw_trim: i16::from_le_bytes([body[6], body[7]]),
        pitch_trim: i16::from_le_bytes([body[8], body[9]]),
    };

    packet.check_ranges().map_err(DecodeError::OutOfRange)?;
    Ok(packet)
}

/// Decode a telemetry frame.
pub fn decode_telemetry(frame: &[u8]) -> Result<TelemetryPacket, DecodeError> {
    let body = verified_body(frame, KIND_TELEMETRY, TELEMETRY_FRAME_LEN)?;

    let class = BatteryClass::try_from(body[2]).map_err(|_| DecodeError::Kind)?;

    Ok(TelemetryPacket {
        voltage_mv: u16::from_le_bytes([body[0], body[1]]),
        class,
        flags: TelemetryFlags(body[3]),
    })
}

/// Check framing and CRC, returning the payload between the kind byte and the CRC.
fn verified_body(frame: &[u8], kind: u8, len: usize) -> Result<&[u8], DecodeError> {
    if frame.len() != len {
        return Err(DecodeError::Length);
    }
    if frame[0] != SYNC {
        return Err(DecodeError::Sync);
    }
    if frame[1] != kind {
        return Err(DecodeError::Kind);
    }

    let crc_pos = len - 1;
    if calculate_crc8(&frame[1..crc_pos]) != frame[crc_pos] {
        return Err(DecodeError::Checksum);
    }

    Ok(&frame[2..crc_pos])
}

/// Splits a raw byte stream into candidate frames.
///
/// Radio modules that expose a serial port deliver the payload as a plain
/// byte stream. The assembler hunts for [`SYNC`], picks the frame length from
/// the kind byte and hands back whole frames whose CRC matches. When the CRC
/// does not match, the hunt restarts at the next [`SYNC`] inside the rejected
/// bytes, so a frame that lost a byte does not take the following one down
/// with it. Range checks are left to [`decode_command`] / [`decode_telemetry`].
pub struct FrameAssembler {
    buffer: [u8; MAX_FRAME_LEN],
    pos: usize,
    state: AssemblerState,
}

#[derive(Clone, Copy)]
enum AssemblerState {
    WaitingForSync,
    ReadingKind,
    ReadingFrame { expected_len: usize },
}

impl FrameAssembler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0u8; MAX_FRAME_LEN],
            pos: 0,
            state: AssemblerState::WaitingForSync,
        }
    }

    /// Drop any partial frame and go back to hunting for sync.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.state = AssemblerState::WaitingForSync;
    }

    /// Feed one byte.
    ///
    /// Returns the complete frame when this byte finished one. The slice is
    /// valid until the next call.
    pub fn push_byte(&mut self, byte: u8) -> Option<&[u8]> {
        match self.state {
            AssemblerState::WaitingForSync => {
                if byte == SYNC {
                    self.buffer[0] = byte;
                    self.pos = 1;
                    self.state = AssemblerState::ReadingKind;
                }
                None
            }
            AssemblerState::ReadingKind => match frame_len(byte) {
                Some(expected_len) => {
                    self.buffer[1] = byte;
                    self.pos = 2;
                    self.state = AssemblerState::ReadingFrame { expected_len };
                    None
                }
                // A repeated sync byte may be the real start of the next frame
                None if byte == SYNC => None,
                None => {
                    self.reset();
                    None
                }
            },
            AssemblerState::ReadingFrame { expected_len } => {
                self.buffer[self.pos] = byte;
                self.pos += 1;

                if self.pos < expected_len {
                    return None;
                }
                let crc = calculate_crc8(&self.buffer[1..expected_len - 1]);
                if crc == self.buffer[expected_len - 1] {
                    self.reset();
                    Some(&self.buffer[..expected_len])
                } else {
                    self.resync(expected_len);
                    None
                }
            }
        }
    }

    /// Restart from the first plausible frame start in `buffer[1..len]`.
    fn resync(&mut self, len: usize) {
        let mut start = 1;
        while let Some(offset) = self.buffer[start..len].iter().position(|&b| b == SYNC) {
            let at = start + offset;
            let tail = len - at;
            let state = if tail == 1 {
                Some(AssemblerState::ReadingKind)
            } else {
                match frame_len(self.buffer[at + 1]) {
                    Some(expected_len) if expected_len > tail => {
                        Some(AssemblerState::ReadingFrame { expected_len })
                    }
                    _ => None,
                }
            };

            if let Some(state) = state {
                self.buffer.copy_within(at..len, 0);
                self.pos = tail;
                self.state = state;
                return;
            }
            start = at + 1;
        }
        self.reset();
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
