//! Radio wire formats for the helicopter controller.
//!
//! - **Types**: [`CommandPacket`], [`TelemetryPacket`], [`BatteryClass`], [`TelemetryFlags`]
//! - **Decoding**: [`decode_command()`], [`decode_telemetry()`], [`FrameAssembler`]
//! - **Encoding**: [`Serialize`] trait and the [`MessageBuilder`] fluent API
//!
//! # Frame Format
//!
//! Binary, little-endian, CRC-8/SMBUS over every byte between the sync byte
//! and the checksum itself.
//!
//! ```text
//! command   (13 bytes): A5 01 seq:u32 throttle:u16 yaw:i16 pitch:i16 crc
//! telemetry  (7 bytes): A5 81 voltage_mv:u16 class:u8 flags:u8 crc
//! ```
//!
//! Throttle spans `0..=1000`, both trims `-1000..=1000`. A frame with any
//! field out of range is rejected as a whole.
//!
//! # Example
//!
//! ```
//! use copter_proto::{decode_command, DecodeError, MessageBuilder};
//!
//! let mut buf = [0u8; 16];
//! let len = MessageBuilder::command()
//!     .sequence(1)
//!     .throttle(300)
//!     .serialize(&mut buf)
//!     .unwrap();
//!
//! assert_eq!(decode_command(&buf[..len]).unwrap().throttle, 300);
//!
//! buf[len - 1] ^= 0x01;
//! assert_eq!(decode_command(&buf[..len]), Err(DecodeError::Checksum));
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Derive `defmt::Format` for every public type
//! - **`heapless`**: Enable `serialize_to_vec()`

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod builder;
pub mod crc;
pub mod parser;
pub mod serialize;
pub mod types;

pub use builder::{CommandBuilder, MessageBuilder, TelemetryBuilder};
pub use crc::{calculate_crc8, Crc8Digest};
pub use parser::{
    decode_command, decode_telemetry, frame_len, DecodeError, FrameAssembler, COMMAND_FRAME_LEN,
    KIND_COMMAND, KIND_TELEMETRY, MAX_FRAME_LEN, SYNC, TELEMETRY_FRAME_LEN,
};
pub use serialize::{Serialize, SerializeError};
pub use types::{
    BatteryClass, CommandPacket, Field, TelemetryFlags, TelemetryPacket, AXIS_MAX,
};
