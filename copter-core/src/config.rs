//! Control tunables.
//!
//! Everything the control loop can be tuned with lives in [`ControlConfig`].
//! [`ControlConfig::DEFAULT`] suits a 1S LiPo toy helicopter with a 2:1
//! battery divider into a 12-bit, 3.3 V ADC.

use fixed::types::U16F16;
use fixed_macro::fixed;

use crate::actuator::LEVEL_MAX;
use copter_proto::AXIS_MAX;

/// Number of breakpoints in the tail compensation curve.
pub const TAIL_CURVE_POINTS: usize = 5;

/// Throttle-to-tail offset mapping.
///
/// Breakpoints are evenly spaced over `0..=AXIS_MAX` throttle; values in
/// between are interpolated linearly. Offsets are actuator levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TailCurve {
    pub points: [u16; TAIL_CURVE_POINTS],
}

impl TailCurve {
    /// No compensation at all.
    pub const FLAT: Self = Self {
        points: [0; TAIL_CURVE_POINTS],
    };

    #[must_use]
    pub const fn new(points: [u16; TAIL_CURVE_POINTS]) -> Self {
        Self { points }
    }

    /// Tail offset for a throttle value. Throttle above `AXIS_MAX` is treated as `AXIS_MAX`.
    #[must_use]
    pub fn offset(&self, throttle: u16) -> i32 {
        let max = AXIS_MAX as i32;
        let t = i32::from(throttle).min(max);
        let segments = (TAIL_CURVE_POINTS - 1) as i32;

        // Position along the curve in segment units, scaled by AXIS_MAX
        let scaled = t * segments;
        let idx = (scaled / max) as usize;
        if idx >= TAIL_CURVE_POINTS - 1 {
            return i32::from(self.points[TAIL_CURVE_POINTS - 1]);
        }

        let frac = scaled % max;
        let lo = i32::from(self.points[idx]);
        let hi = i32::from(self.points[idx + 1]);
        lo + (hi - lo) * frac / max
    }

    #[must_use]
    pub fn is_monotonic(&self) -> bool {
        self.points.windows(2).all(|w| w[0] <= w[1])
    }
}

/// Upper bounds on each actuator level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputLimits {
    pub main_max: u16,
    pub tail_max: u16,
    /// Trim is bounded to `-trim_max..=trim_max`.
    pub trim_max: u16,
}

/// Enter/exit pair for one battery tier.
///
/// A tier is entered strictly below `enter_mv` and left strictly above `exit_mv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Threshold {
    pub enter_mv: u16,
    pub exit_mv: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryThresholds {
    pub low: Threshold,
    pub critical: Threshold,
}

/// ADC counts to millivolts at the battery terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcCalibration {
    /// Millivolts per ADC count, divider included.
    pub mv_per_count: U16F16,
}

impl AdcCalibration {
    #[must_use]
    pub fn to_millivolts(&self, raw: u16) -> u16 {
        self.mv_per_count
            .saturating_mul(U16F16::from_num(raw))
            .to_num::<u16>()
    }
}

/// Error returned by [`ControlConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Control period is zero.
    ZeroPeriod,
    /// Battery cadence divider is zero.
    ZeroDivider,
    /// Command timeout is zero.
    ZeroTimeout,
    /// An output limit exceeds `LEVEL_MAX`.
    LimitOutOfRange,
    /// Tail curve decreases somewhere.
    TailCurveNotMonotonic,
    /// Battery thresholds overlap or are inverted.
    ThresholdOrder,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ZeroPeriod => write!(f, "control period must be non-zero"),
            Self::ZeroDivider => write!(f, "battery divider must be non-zero"),
            Self::ZeroTimeout => write!(f, "command timeout must be non-zero"),
            Self::LimitOutOfRange => write!(f, "output limit above {}", LEVEL_MAX),
            Self::TailCurveNotMonotonic => write!(f, "tail curve is not monotonic"),
            Self::ThresholdOrder => write!(f, "battery thresholds out of order"),
        }
    }
}

/// Control loop configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlConfig {
    /// Control tick period.
    pub control_period_ms: u32,
    /// Control ticks per battery sample.
    pub battery_divider: u32,
    /// Command staleness timeout.
    pub command_timeout_ms: u64,
    pub limits: OutputLimits,
    pub tail_curve: TailCurve,
    pub battery: BatteryThresholds,
    pub adc: AdcCalibration,
}

impl ControlConfig {
    pub const DEFAULT: Self = Self {
        control_period_ms: 5,
        battery_divider: 200,
        command_timeout_ms: 1000,
        limits: OutputLimits {
            main_max: LEVEL_MAX,
            tail_max: LEVEL_MAX,
            trim_max: LEVEL_MAX,
        },
        tail_curve: TailCurve::new([0, 150, 300, 450, 600]),
        battery: BatteryThresholds {
            low: Threshold {
                enter_mv: 3500,
                exit_mv: 3650,
            },
            critical: Threshold {
                enter_mv: 3300,
                exit_mv: 3450,
            },
        },
        // 3300 mV / 4096 counts, times 2 for the divider
        adc: AdcCalibration {
            mv_per_count: fixed!(1.6113: U16F16),
        },
    };

    /// Battery sampling period implied by the divider.
    #[must_use]
    pub const fn battery_period_ms(&self) -> u64 {
        self.control_period_ms as u64 * self.battery_divider as u64
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.battery_divider == 0 {
            return Err(ConfigError::ZeroDivider);
        }
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let limits = &self.limits;
        if limits.main_max > LEVEL_MAX || limits.tail_max > LEVEL_MAX || limits.trim_max > LEVEL_MAX
        {
            return Err(ConfigError::LimitOutOfRange);
        }

        if !self.tail_curve.is_monotonic() {
            return Err(ConfigError::TailCurveNotMonotonic);
        }

        let BatteryThresholds { low, critical } = self.battery;
        let ordered = critical.enter_mv < critical.exit_mv
            && low.enter_mv < low.exit_mv
            && critical.enter_mv < low.enter_mv
            && critical.exit_mv <= low.exit_mv;
        if !ordered {
            return Err(ConfigError::ThresholdOrder);
        }

        Ok(())
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(ControlConfig::DEFAULT.validate(), Ok(()));
        assert_eq!(ControlConfig::DEFAULT.battery_period_ms(), 1000);
    }

    #[test]
    fn test_tail_curve_breakpoints() {
        let curve = TailCurve::new([0, 100, 200, 400, 800]);
        assert_eq!(curve.offset(0), 0);
        assert_eq!(curve.offset(250), 100);
        assert_eq!(curve.offset(500), 200);
        assert_eq!(curve.offset(750), 400);
        assert_eq!(curve.offset(1000), 800);
    }

    #[test]
    fn test_tail_curve_interpolates() {
        let curve = TailCurve::new([0, 100, 200, 400, 800]);
        assert_eq!(curve.offset(125), 50);
        assert_eq!(curve.offset(875), 600);
        // Beyond the axis the last point holds
        assert_eq!(curve.offset(u16::MAX), 800);
    }

    #[test]
    fn test_flat_curve() {
        assert_eq!(TailCurve::FLAT.offset(640), 0);
    }

    #[test]
    fn test_validate_rejects_decreasing_curve() {
        let config = ControlConfig {
            tail_curve: TailCurve::new([0, 300, 200, 400, 500]),
            ..ControlConfig::DEFAULT
        };
        assert_eq!(config.validate(), Err(ConfigError::TailCurveNotMonotonic));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = ControlConfig {
            control_period_ms: 0,
            ..ControlConfig::DEFAULT
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPeriod));

        let config = ControlConfig {
            battery_divider: 0,
            ..ControlConfig::DEFAULT
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroDivider));
    }

    #[test]
    fn test_validate_rejects_limits() {
        let mut config = ControlConfig::DEFAULT;
        config.limits.tail_max = LEVEL_MAX + 1;
        assert_eq!(config.validate(), Err(ConfigError::LimitOutOfRange));
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = ControlConfig::DEFAULT;
        config.battery.low.exit_mv = config.battery.low.enter_mv;
        assert_eq!(config.validate(), Err(ConfigError::ThresholdOrder));

        let mut config = ControlConfig::DEFAULT;
        config.battery.critical.enter_mv = 3600;
        assert_eq!(config.validate(), Err(ConfigError::ThresholdOrder));
    }

    #[test]
    fn test_adc_to_millivolts() {
        let adc = ControlConfig::DEFAULT.adc;
        assert_eq!(adc.to_millivolts(0), 0);
        // ~3.7 V battery reads ~2296 counts through the divider
        let mv = adc.to_millivolts(2296);
        assert!((3695..=3705).contains(&mv), "got {}", mv);
        assert_eq!(adc.to_millivolts(4095), 6598);
    }
}
