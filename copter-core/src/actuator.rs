//! Actuator outputs and the PWM driver.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

/// Full-scale actuator level.
pub const LEVEL_MAX: u16 = 1000;

/// One tick's worth of actuator levels, produced by the mixer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorOutput {
    /// Main rotor, `0..=LEVEL_MAX`.
    pub main_motor: u16,
    /// Tail rotor, `0..=LEVEL_MAX`.
    pub tail_motor: u16,
    /// Trim actuator, `-LEVEL_MAX..=LEVEL_MAX`. Sign selects the direction.
    pub trim: i16,
}

impl ActuatorOutput {
    /// Everything off.
    pub const SAFE: Self = Self {
        main_motor: 0,
        tail_motor: 0,
        trim: 0,
    };

    #[inline]
    #[must_use]
    pub fn is_safe(&self) -> bool {
        *self == Self::SAFE
    }
}

/// Actuator channel, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Main,
    Tail,
    Trim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorError {
    /// A PWM channel refused the duty cycle.
    Pwm(Channel),
    /// The trim direction pin could not be driven.
    Direction,
}

impl core::fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Pwm(ch) => write!(f, "PWM error on {:?} channel", ch),
            Self::Direction => write!(f, "trim direction pin error"),
        }
    }
}

/// Sink for actuator levels.
pub trait ActuatorDriver {
    /// Drive all actuators to `output`.
    fn apply(&mut self, output: &ActuatorOutput) -> Result<(), ActuatorError>;
}

/// Drives the three actuators from `embedded-hal` PWM channels.
///
/// The trim actuator is an H-bridge with one PWM leg and one GPIO leg. With
/// the direction pin high the bridge conducts while the PWM leg is low, so
/// the duty cycle is inverted for positive trim.
pub struct PwmActuatorDriver<M, T, P, D> {
    main: M,
    tail: T,
    trim: P,
    trim_dir: D,
}

impl<M, T, P, D> PwmActuatorDriver<M, T, P, D>
where
    M: SetDutyCycle,
    T: SetDutyCycle,
    P: SetDutyCycle,
    D: OutputPin,
{
    pub fn new(main: M, tail: T, trim: P, trim_dir: D) -> Self {
        Self {
            main,
            tail,
            trim,
            trim_dir,
        }
    }

    /// Give the channels back.
    pub fn release(self) -> (M, T, P, D) {
        (self.main, self.tail, self.trim, self.trim_dir)
    }

    fn set_trim(&mut self, trim: i16) -> Result<(), ActuatorError> {
        let magnitude = trim.unsigned_abs().min(LEVEL_MAX);

        let duty = if trim > 0 {
            self.trim_dir
                .set_high()
                .map_err(|_| ActuatorError::Direction)?;
            LEVEL_MAX - magnitude
        } else {
            self.trim_dir
                .set_low()
                .map_err(|_| ActuatorError::Direction)?;
            magnitude
        };

        self.trim
            .set_duty_cycle_fraction(duty, LEVEL_MAX)
            .map_err(|_| ActuatorError::Pwm(Channel::Trim))
    }
}

impl<M, T, P, D> ActuatorDriver for PwmActuatorDriver<M, T, P, D>
where
    M: SetDutyCycle,
    T: SetDutyCycle,
    P: SetDutyCycle,
    D: OutputPin,
{
    fn apply(&mut self, output: &ActuatorOutput) -> Result<(), ActuatorError> {
        self.main
            .set_duty_cycle_fraction(output.main_motor.min(LEVEL_MAX), LEVEL_MAX)
            .map_err(|_| ActuatorError::Pwm(Channel::Main))?;
        self.tail
            .set_duty_cycle_fraction(output.tail_motor.min(LEVEL_MAX), LEVEL_MAX)
            .map_err(|_| ActuatorError::Pwm(Channel::Tail))?;
        self.set_trim(output.trim)
    }
}
