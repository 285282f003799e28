//! Fluent builder for command frames.
//!
//! Mostly useful on the controller side and in tests, where frames are
//! assembled one axis at a time.
//!
//! ```
//! use copter_proto::{decode_command, MessageBuilder, COMMAND_FRAME_LEN};
//!
//! let mut buf = [0u8; COMMAND_FRAME_LEN];
//! let len = MessageBuilder::command()
//!     .sequence(12)
//!     .throttle(600)
//!     .yaw_trim(-40)
//!     .serialize(&mut buf)
//!     .unwrap();
//!
//! let cmd = decode_command(&buf[..len]).unwrap();
//! assert_eq!(cmd.throttle, 600);
//! assert_eq!(cmd.pitch_trim, 0);
//! ```

use crate::serialize::{Serialize, SerializeError};
use crate::types::{BatteryClass, CommandPacket, TelemetryFlags, TelemetryPacket};

/// Entry point for building frames.
pub struct MessageBuilder;

impl MessageBuilder {
    /// Start a command frame from the neutral command.
    #[must_use]
    pub fn command() -> CommandBuilder {
        CommandBuilder {
            packet: CommandPacket::neutral(),
        }
    }

    /// Start a telemetry frame with zero voltage and no flags.
    #[must_use]
    pub fn telemetry() -> TelemetryBuilder {
        TelemetryBuilder {
            packet: TelemetryPacket::default(),
        }
    }
}

/// Builder for command frames.
///
/// Values are written as given; range checking happens on decode.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    packet: CommandPacket,
}

impl CommandBuilder {
    #[must_use]
    pub fn sequence(mut self, sequence_id: u32) -> Self {
        self.packet.sequence_id = sequence_id;
        self
    }

    #[must_use]
    pub fn throttle(mut self, throttle: u16) -> Self {
        self.packet.throttle = throttle;
        self
    }

    #[must_use]
    pub fn yaw_trim(mut self, yaw_trim: i16) -> Self {
        self.packet.yaw_trim = yaw_trim;
        self
    }

    #[must_use]
    pub fn pitch_trim(mut self, pitch_trim: i16) -> Self {
        self.packet.pitch_trim = pitch_trim;
        self
    }

    #[must_use]
    pub fn build(self) -> CommandPacket {
        self.packet
    }

    /// Serialize the frame into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if the buffer is too small.
    pub fn serialize(self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        self.packet.serialize(buf)
    }
}

/// Builder for telemetry frames.
#[derive(Debug, Clone)]
pub struct TelemetryBuilder {
    packet: TelemetryPacket,
}

impl TelemetryBuilder {
    #[must_use]
    pub fn voltage_mv(mut self, voltage_mv: u16) -> Self {
        self.packet.voltage_mv = voltage_mv;
        self
    }

    #[must_use]
    pub fn class(mut self, class: BatteryClass) -> Self {
        self.packet.class = class;
        self
    }

    #[must_use]
    pub fn charge_input(mut self, present: bool) -> Self {
        self.packet.flags.set(TelemetryFlags::CHARGE_INPUT, present);
        self
    }

    #[must_use]
    pub fn charger_fault(mut self, fault: bool) -> Self {
        self.packet.flags.set(TelemetryFlags::CHARGER_FAULT, fault);
        self
    }

    #[must_use]
    pub fn build(self) -> TelemetryPacket {
        self.packet
    }

    /// Serialize the frame into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if the buffer is too small.
    pub fn serialize(self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        self.packet.serialize(buf)
    }
}
