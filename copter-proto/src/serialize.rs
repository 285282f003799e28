//! Frame serialization for command and telemetry packets.
//!
//! # Example
//!
//! ```
//! use copter_proto::{decode_command, CommandPacket, Serialize, COMMAND_FRAME_LEN};
//!
//! let cmd = CommandPacket::new(1, 400, 0, -50);
//! let mut buf = [0u8; COMMAND_FRAME_LEN];
//! let len = cmd.serialize(&mut buf).unwrap();
//!
//! assert_eq!(decode_command(&buf[..len]), Ok(cmd));
//! ```

use crate::crc::Crc8Digest;
use crate::parser::{COMMAND_FRAME_LEN, KIND_COMMAND, KIND_TELEMETRY, SYNC, TELEMETRY_FRAME_LEN};
use crate::types::{CommandPacket, TelemetryPacket};

/// Writes a frame while accumulating its CRC.
struct SerializeBuf<'a> {
    buf: &'a mut [u8],
    pos: usize,
    crc: Crc8Digest,
}

impl<'a> SerializeBuf<'a> {
    /// Start a frame: sync byte (not checksummed) followed by the kind byte.
    #[inline]
    fn start(buf: &'a mut [u8], kind: u8) -> Self {
        buf[0] = SYNC;
        let mut sb = Self {
            buf,
            pos: 1,
            crc: Crc8Digest::new(),
        };
        sb.write_slice(&[kind]);
        sb
    }

    #[inline]
    fn write_slice(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.crc.update(bytes);
        self.pos = end;
    }

    /// Append the CRC and return the frame length.
    #[inline]
    fn finalize(self) -> usize {
        let pos = self.pos;
        self.buf[pos] = self.crc.finalize();
        pos + 1
    }
}

/// Error type for serialization operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerializeError {
    /// The output buffer is too small to hold the frame.
    BufferTooSmall,
}

impl core::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}

/// Serialize a packet into its wire frame.
pub trait Serialize {
    /// Serialize into `buf`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if the buffer cannot hold the frame.
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError>;

    /// Serialize into a fresh `heapless::Vec`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if `N` is not large enough.
    #[cfg(feature = "heapless")]
    fn serialize_to_vec<const N: usize>(&self) -> Result<heapless::Vec<u8, N>, SerializeError> {
        let mut vec = heapless::Vec::new();
        vec.resize(N, 0)
            .map_err(|_| SerializeError::BufferTooSmall)?;
        let len = self.serialize(&mut vec)?;
        vec.truncate(len);
        Ok(vec)
    }
}

impl Serialize for CommandPacket {
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        if buf.len() < COMMAND_FRAME_LEN {
            return Err(SerializeError::BufferTooSmall);
        }

        let mut sb = SerializeBuf::start(buf, KIND_COMMAND);
        sb.write_slice(&self.sequence_id.to_le_bytes());
        sb.write_slice(&self.throttle.to_le_bytes());
        sb.write_slice(&self.yaw_trim.to_le_bytes());
        sb.write_slice(&self.pitch_trim.to_le_bytes());
        Ok(sb.finalize())
    }
}

impl Serialize for TelemetryPacket {
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        if buf.len() < TELEMETRY_FRAME_LEN {
            return Err(SerializeError::BufferTooSmall);
        }

        let mut sb = SerializeBuf::start(buf, KIND_TELEMETRY);
        sb.write_slice(&self.voltage_mv.to_le_bytes());
        sb.write_slice(&[self.class as u8, self.flags.0]);
        Ok(sb.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::calculate_crc8;
    use crate::parser::{decode_command, decode_telemetry};
    use crate::types::{BatteryClass, TelemetryFlags};

    #[test]
    fn test_serialize_command_layout() {
        let cmd = CommandPacket::new(0x0102_0304, 1000, -1, 2);
        let mut buf = [0u8; 16];
        let len = cmd.serialize(&mut buf).unwrap();

        assert_eq!(len, COMMAND_FRAME_LEN);
        assert_eq!(
            &buf[..12],
            &[0xA5, 0x01, 0x04, 0x03, 0x02, 0x01, 0xE8, 0x03, 0xFF, 0xFF, 0x02, 0x00]
        );
        assert_eq!(buf[12], calculate_crc8(&buf[1..12]));
    }

    #[test]
    fn test_serialize_command_decodes() {
        let cmd = CommandPacket::new(77, 999, 1000, -1000);
        let mut buf = [0u8; COMMAND_FRAME_LEN];
        let len = cmd.serialize(&mut buf).unwrap();
        assert_eq!(decode_command(&buf[..len]), Ok(cmd));
    }

    #[test]
    fn test_serialize_telemetry_decodes() {
        let mut flags = TelemetryFlags::NONE;
        flags.set(TelemetryFlags::CHARGE_INPUT, true);
        let packet = TelemetryPacket {
            voltage_mv: 4150,
            class: BatteryClass::Charging,
            flags,
        };

        let mut buf = [0u8; TELEMETRY_FRAME_LEN];
        let len = packet.serialize(&mut buf).unwrap();

        assert_eq!(len, TELEMETRY_FRAME_LEN);
        assert_eq!(buf[4], 3);
        assert_eq!(buf[5], 0b01);
        assert_eq!(decode_telemetry(&buf[..len]), Ok(packet));
    }

    #[test]
    fn test_serialize_buffer_too_small() {
        let mut buf = [0u8; 6];
        assert_eq!(
            CommandPacket::neutral().serialize(&mut buf),
            Err(SerializeError::BufferTooSmall)
        );
        assert_eq!(
            TelemetryPacket::default().serialize(&mut buf),
            Err(SerializeError::BufferTooSmall)
        );
    }

    #[cfg(feature = "heapless")]
    #[test]
    fn test_serialize_to_vec() {
        let vec = CommandPacket::new(5, 10, 0, 0)
            .serialize_to_vec::<COMMAND_FRAME_LEN>()
            .unwrap();
        assert_eq!(vec.len(), COMMAND_FRAME_LEN);

        assert_eq!(
            CommandPacket::neutral().serialize_to_vec::<8>(),
            Err(SerializeError::BufferTooSmall)
        );
    }
}
