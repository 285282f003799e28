//! Platform-agnostic flight control core for the radio helicopter.
//!
//! Everything here is plain, synchronous, `no_std` code driven by a caller
//! supplied clock, so the whole control loop can be exercised on the host.
//!
//! # Overview
//!
//! - [`command`]: radio link trait and command validation ([`CommandChannel`])
//! - [`failsafe`]: link state machine ([`FailsafeMonitor`])
//! - [`mixer`]: command to actuator levels ([`MixerEngine`])
//! - [`actuator`]: actuator trait and PWM driver ([`PwmActuatorDriver`])
//! - [`battery`]: voltage sampling and classification ([`BatteryMonitor`])
//! - [`charge`]: flight/charging arbitration ([`ChargeController`])
//! - [`scheduler`]: the control loop tying it together ([`ControlScheduler`])
//! - [`config`]: tunables ([`ControlConfig`])
//!
//! # Example
//!
//! ```
//! use copter_core::{failsafe::next_state, FailsafeEvent, LinkState};
//!
//! let state = next_state(LinkState::Connected, FailsafeEvent::Elapsed(1001), 1000);
//! assert_eq!(state, LinkState::CommandStale);
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log through defmt and derive `defmt::Format` on public types

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod fmt;

pub mod actuator;
pub mod battery;
pub mod charge;
pub mod command;
pub mod config;
pub mod failsafe;
pub mod indication;
pub mod mixer;
pub mod scheduler;
pub mod telemetry;
pub mod time;

pub use actuator::{ActuatorDriver, ActuatorError, ActuatorOutput, PwmActuatorDriver, LEVEL_MAX};
pub use battery::{classify, BatteryMonitor, BatterySensor, BatteryState, ChargeSense, SensorError};
pub use charge::{ChargeController, OperatingMode};
pub use command::{CommandChannel, InvalidCommand, LinkError, LinkEvent, RadioLink, RawFrame};
pub use config::{ConfigError, ControlConfig, TailCurve};
pub use failsafe::{FailsafeEvent, FailsafeMonitor, LinkState};
pub use indication::{indication_for, IndicationStyle};
pub use mixer::MixerEngine;
pub use scheduler::{ControlContext, ControlCounters, ControlScheduler, TickReport};
pub use telemetry::TelemetryError;
pub use time::Millis;

pub use copter_proto::{BatteryClass, CommandPacket};
