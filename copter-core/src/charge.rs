//! Flight/charging arbitration.

/// Whether the actuators may run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    #[default]
    Flight,
    /// External power connected; all actuators held off.
    Charging,
}

/// Next mode given the charge input line.
#[must_use]
pub const fn next_mode(_current: OperatingMode, charge_input_present: bool) -> OperatingMode {
    if charge_input_present {
        OperatingMode::Charging
    } else {
        OperatingMode::Flight
    }
}

/// Owns the operating mode.
///
/// Entering `Charging` is checked every control tick through [`enter`](Self::enter)
/// so the actuators stop on the very next tick. Leaving it only happens on
/// the slower battery cadence through [`tick`](Self::tick), after a full
/// battery sample has confirmed the input is gone.
#[derive(Debug, Default)]
pub struct ChargeController {
    mode: OperatingMode,
}

impl ChargeController {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: OperatingMode::Flight,
        }
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Fast path: switch to `Charging` as soon as charge input appears.
    pub fn enter(&mut self, charge_input_present: bool) -> OperatingMode {
        if charge_input_present && self.mode == OperatingMode::Flight {
            self.set(OperatingMode::Charging);
        }
        self.mode
    }

    /// Full transition, both directions.
    pub fn tick(&mut self, charge_input_present: bool) -> OperatingMode {
        let next = next_mode(self.mode, charge_input_present);
        if next != self.mode {
            self.set(next);
        }
        self.mode
    }

    fn set(&mut self, mode: OperatingMode) {
        info!("mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
    }
}
