//! Battery sampling and classification.

use heapless::HistoryBuffer;

use crate::config::{AdcCalibration, BatteryThresholds};
use copter_proto::BatteryClass;

/// Readings averaged before classification.
pub const VOLTAGE_WINDOW: usize = 4;

/// Error from the battery voltage sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// The ADC conversion failed.
    Conversion,
    /// The sensor is not ready yet.
    NotReady,
}

/// Raw battery voltage source.
pub trait BatterySensor {
    /// Read the battery channel in raw ADC counts.
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

/// Charger status lines.
pub trait ChargeSense {
    /// `true` while external power is connected.
    fn charge_input_present(&mut self) -> bool;

    /// `true` while the charger reports a fault.
    fn charger_fault(&mut self) -> bool;
}

/// Latest battery snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryState {
    pub voltage_mv: u16,
    pub charge_input_present: bool,
    pub charger_fault: bool,
    pub classification: BatteryClass,
}

/// Next classification given the previous one and a fresh reading.
///
/// Each tier is entered strictly below its `enter_mv` and left strictly
/// above its `exit_mv`. Charge input overrides the voltage. Coming out of
/// `Charging`, the voltage is classified without history.
#[must_use]
pub fn classify(
    prev: BatteryClass,
    voltage_mv: u16,
    charge_input_present: bool,
    thresholds: &BatteryThresholds,
) -> BatteryClass {
    if charge_input_present {
        return BatteryClass::Charging;
    }

    let low = thresholds.low;
    let critical = thresholds.critical;

    match prev {
        BatteryClass::Normal | BatteryClass::Charging => {
            if voltage_mv < critical.enter_mv {
                BatteryClass::Critical
            } else if voltage_mv < low.enter_mv {
                BatteryClass::Low
            } else {
                BatteryClass::Normal
            }
        }
        BatteryClass::Low => {
            if voltage_mv < critical.enter_mv {
                BatteryClass::Critical
            } else if voltage_mv > low.exit_mv {
                BatteryClass::Normal
            } else {
                BatteryClass::Low
            }
        }
        BatteryClass::Critical => {
            if voltage_mv > low.exit_mv {
                BatteryClass::Normal
            } else if voltage_mv > critical.exit_mv {
                BatteryClass::Low
            } else {
                BatteryClass::Critical
            }
        }
    }
}

/// Samples the battery and keeps the classified state.
pub struct BatteryMonitor<S, C> {
    sensor: S,
    charge: C,
    calibration: AdcCalibration,
    thresholds: BatteryThresholds,
    window: HistoryBuffer<u16, VOLTAGE_WINDOW>,
    state: BatteryState,
    sensor_errors: u32,
}

impl<S: BatterySensor, C: ChargeSense> BatteryMonitor<S, C> {
    pub fn new(
        sensor: S,
        charge: C,
        calibration: AdcCalibration,
        thresholds: BatteryThresholds,
    ) -> Self {
        Self {
            sensor,
            charge,
            calibration,
            thresholds,
            window: HistoryBuffer::new(),
            state: BatteryState::default(),
            sensor_errors: 0,
        }
    }

    /// Take a sample and reclassify.
    ///
    /// A failed read keeps the previous voltage; charger lines are still
    /// refreshed.
    pub fn sample(&mut self) -> BatteryState {
        match self.sensor.read_raw() {
            Ok(raw) => self.window.write(self.calibration.to_millivolts(raw)),
            Err(e) => {
                self.sensor_errors = self.sensor_errors.wrapping_add(1);
                warn!("battery read failed: {:?}", e);
            }
        }

        let charge_input_present = self.charge.charge_input_present();
        let charger_fault = self.charge.charger_fault();
        if charger_fault && !self.state.charger_fault {
            warn!("charger fault");
        }

        let readings = self.window.as_slice();
        let prev = self.state.classification;
        let (voltage_mv, classification) = if readings.is_empty() {
            // Nothing measured yet
            let class = if charge_input_present {
                BatteryClass::Charging
            } else {
                BatteryClass::Normal
            };
            (self.state.voltage_mv, class)
        } else {
            let sum: u32 = readings.iter().map(|&mv| u32::from(mv)).sum();
            let mv = (sum / readings.len() as u32) as u16;
            (mv, classify(prev, mv, charge_input_present, &self.thresholds))
        };

        if classification != prev {
            info!("battery {:?} -> {:?} at {} mV", prev, classification, voltage_mv);
        }

        self.state = BatteryState {
            voltage_mv,
            charge_input_present,
            charger_fault,
            classification,
        };
        self.state
    }

    /// Read only the charge input line.
    ///
    /// Cheap enough for every control tick.
    pub fn poll_charge_input(&mut self) -> bool {
        self.charge.charge_input_present()
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &BatteryState {
        &self.state
    }

    #[inline]
    #[must_use]
    pub fn sensor_errors(&self) -> u32 {
        self.sensor_errors
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn charge_mut(&mut self) -> &mut C {
        &mut self.charge
    }
}
