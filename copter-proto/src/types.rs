//! Wire-level message types: CommandPacket, TelemetryPacket, BatteryClass.

/// Full-scale value for every command axis.
///
/// Throttle spans `0..=AXIS_MAX`, the trims span `-AXIS_MAX..=AXIS_MAX`.
pub const AXIS_MAX: i16 = 1000;

/// Command axis that failed range validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Throttle,
    YawTrim,
    PitchTrim,
}

/// Control command sent by the paired controller.
///
/// # Example
///
/// ```
/// use copter_proto::CommandPacket;
///
/// let cmd = CommandPacket::new(7, 500, -120, 0);
/// assert!(cmd.check_ranges().is_ok());
/// assert_eq!(CommandPacket::neutral().throttle, 0);
/// ```
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandPacket {
    /// Monotonic counter used for replay rejection.
    pub sequence_id: u32,
    /// Main rotor throttle, `0..=AXIS_MAX`.
    pub throttle: u16,
    /// Yaw trim, `-AXIS_MAX..=AXIS_MAX`.
    pub yaw_trim: i16,
    /// Pitch trim, `-AXIS_MAX..=AXIS_MAX`.
    pub pitch_trim: i16,
}

impl CommandPacket {
    #[must_use]
    pub const fn new(sequence_id: u32, throttle: u16, yaw_trim: i16, pitch_trim: i16) -> Self {
        Self {
            sequence_id,
            throttle,
            yaw_trim,
            pitch_trim,
        }
    }

    /// Zero throttle, centered trims.
    #[must_use]
    pub const fn neutral() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Check every axis against its declared range.
    ///
    /// Reports the first offending field.
    pub const fn check_ranges(&self) -> Result<(), Field> {
        if self.throttle > AXIS_MAX as u16 {
            return Err(Field::Throttle);
        }
        if self.yaw_trim < -AXIS_MAX || self.yaw_trim > AXIS_MAX {
            return Err(Field::YawTrim);
        }
        if self.pitch_trim < -AXIS_MAX || self.pitch_trim > AXIS_MAX {
            return Err(Field::PitchTrim);
        }
        Ok(())
    }
}

/// Battery classification reported in telemetry.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BatteryClass {
    #[default]
    Normal = 0,
    Low = 1,
    Critical = 2,
    Charging = 3,
}

impl TryFrom<u8> for BatteryClass {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Low),
            2 => Ok(Self::Critical),
            3 => Ok(Self::Charging),
            other => Err(other),
        }
    }
}

/// Telemetry flag bits.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryFlags(pub u8);

impl TelemetryFlags {
    pub const CHARGE_INPUT: Self = Self(1 << 0);
    pub const CHARGER_FAULT: Self = Self(1 << 1);

    pub const NONE: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn contains(self, flag: TelemetryFlags) -> bool {
        (self.0 & flag.0) == flag.0
    }

    #[inline]
    pub fn set(&mut self, flag: TelemetryFlags, on: bool) {
        if on {
            self.0 |= flag.0;
        } else {
            self.0 &= !flag.0;
        }
    }
}

/// Battery telemetry sent back to the controller once per battery sample.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryPacket {
    pub voltage_mv: u16,
    pub class: BatteryClass,
    pub flags: TelemetryFlags,
}
