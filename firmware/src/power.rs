//! Battery sense and charger status lines.
//!
//! # Pins
//!
//! - GPIO 29 (ADC3): battery through a 3:1 divider
//! - GPIO 11: charger CHRG, active low
//! - GPIO 12: charger FAULT, active low

use copter_core::{BatterySensor, ChargeSense, SensorError};
use embassy_rp::adc::{self, Adc, Blocking, Channel};
use embassy_rp::gpio::Input;

/// Battery voltage from the on-chip ADC.
pub struct AdcBatterySensor {
    adc: Adc<'static, Blocking>,
    channel: Channel<'static>,
}

impl AdcBatterySensor {
    pub fn new(adc: Adc<'static, Blocking>, channel: Channel<'static>) -> Self {
        Self { adc, channel }
    }
}

impl BatterySensor for AdcBatterySensor {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        self.adc
            .blocking_read(&mut self.channel)
            .map_err(|_: adc::Error| SensorError::Conversion)
    }
}

/// Charger IC open-drain status outputs, pulled up on our side.
pub struct GpioChargeSense {
    charging: Input<'static>,
    fault: Input<'static>,
}

impl GpioChargeSense {
    pub fn new(charging: Input<'static>, fault: Input<'static>) -> Self {
        Self { charging, fault }
    }
}

impl ChargeSense for GpioChargeSense {
    fn charge_input_present(&mut self) -> bool {
        self.charging.is_low()
    }

    fn charger_fault(&mut self) -> bool {
        self.fault.is_low()
    }
}
