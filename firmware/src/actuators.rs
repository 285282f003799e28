//! PWM setup for the motor drivers.
//!
//! # Pins
//!
//! - GPIO 0 (PWM0 A): main rotor MOSFET
//! - GPIO 2 (PWM1 A): tail rotor MOSFET
//! - GPIO 4 (PWM2 A): trim H-bridge PWM leg
//! - GPIO 5: trim H-bridge direction leg

use copter_core::PwmActuatorDriver;
use embassy_rp::gpio::Output;
use embassy_rp::pwm::{Config as PwmConfig, Pwm};

/// Motor PWM frequency, above the audible range.
pub const PWM_FREQUENCY_HZ: u32 = 20_000;

/// System clock the PWM slices run from.
const SYS_CLOCK_HZ: u32 = 125_000_000;

pub type Actuators = PwmActuatorDriver<Pwm<'static>, Pwm<'static>, Pwm<'static>, Output<'static>>;

/// Slice configuration shared by all three channels, output low.
#[must_use]
pub fn motor_pwm_config() -> PwmConfig {
    let mut config = PwmConfig::default();
    config.top = (SYS_CLOCK_HZ / PWM_FREQUENCY_HZ - 1) as u16;
    config.compare_a = 0;
    config.compare_b = 0;
    config
}
