//! Command-to-actuator mixing.

use copter_proto::CommandPacket;

use crate::actuator::ActuatorOutput;
use crate::charge::OperatingMode;
use crate::config::{OutputLimits, TailCurve};
use crate::failsafe::LinkState;

/// Maps a command onto actuator levels.
///
/// Command axes and actuator levels share the same per-mille scale, so the
/// mixer only adds the tail compensation and bounds each channel. Anything
/// out of range is clamped silently.
#[derive(Debug, Clone, Copy)]
pub struct MixerEngine {
    limits: OutputLimits,
    tail_curve: TailCurve,
}

impl MixerEngine {
    #[must_use]
    pub const fn new(limits: OutputLimits, tail_curve: TailCurve) -> Self {
        Self { limits, tail_curve }
    }

    /// Tail offset needed to hold heading at `throttle`.
    #[inline]
    #[must_use]
    pub fn tail_compensation(&self, throttle: u16) -> i32 {
        self.tail_curve.offset(throttle)
    }

    /// Actuator levels for this tick.
    ///
    /// `Charging` or any link state other than `Connected` yields
    /// [`ActuatorOutput::SAFE`] before the command is looked at.
    #[must_use]
    pub fn mix(&self, command: &CommandPacket, link: LinkState, mode: OperatingMode) -> ActuatorOutput {
        if mode == OperatingMode::Charging || !link.is_connected() {
            return ActuatorOutput::SAFE;
        }

        let main_max = i32::from(self.limits.main_max);
        let tail_max = i32::from(self.limits.tail_max);
        let trim_max = i32::from(self.limits.trim_max);

        let throttle = i32::from(command.throttle);
        let tail = self.tail_compensation(command.throttle) + i32::from(command.yaw_trim);
        let trim = i32::from(command.pitch_trim);

        ActuatorOutput {
            main_motor: throttle.clamp(0, main_max) as u16,
            tail_motor: tail.clamp(0, tail_max) as u16,
            trim: trim.clamp(-trim_max, trim_max) as i16,
        }
    }
}
